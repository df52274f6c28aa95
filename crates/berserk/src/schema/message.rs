use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct InlineKeyboardButton {
    /// 按钮上显示的文字
    pub text: String,
    /// 按下按钮后随回调事件返回的数据，1-64 字节
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub callback_data: Option<String>,
}

impl InlineKeyboardButton {
    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: Some(data.into()),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

impl InlineKeyboardMarkup {
    /// 单行排列的按钮
    pub fn row(buttons: Vec<InlineKeyboardButton>) -> Self {
        Self {
            inline_keyboard: vec![buttons],
        }
    }

    /// 空键盘，用于移除消息上已有的按钮
    pub fn empty() -> Self {
        Self::default()
    }
}

/// 发送图片时的文件来源
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum InputFile {
    /// 本地文件，需要以 multipart 的形式上传
    #[serde(skip)]
    Path(PathBuf),
    /// 已存在于 Telegram 服务器的 file_id 或可公开访问的 URL
    Remote(String),
}
