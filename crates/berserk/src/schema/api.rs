use enum_as_inner::EnumAsInner;
use serde::{Deserialize, Serialize};

use crate::schema::{InlineKeyboardMarkup, InputFile, Message, Update, User};

/// 拉取更新的参数
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct GetUpdatesParams {
    /// 第一条需要返回的更新 ID，之前的更新会被服务端视为已确认
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    /// 长轮询超时时间，单位秒
    pub timeout: u64,
    /// 只关心的更新类型
    pub allowed_updates: Vec<String>,
}

/// 发送文本消息的参数
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct SendMessageParams {
    /// 目标会话 ID
    pub chat_id: i64,
    /// 要发送的内容
    pub text: String,
    /// 附带的内联按钮
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

/// 发送图片消息的参数
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct SendPhotoParams {
    /// 目标会话 ID
    pub chat_id: i64,
    /// 图片来源，本地文件不会被序列化，由适配器负责上传
    pub photo: InputFile,
    /// 图片说明，0-1024 个字符
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    /// 附带的内联按钮
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

/// 修改消息按钮的参数
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct EditMessageReplyMarkupParams {
    pub chat_id: i64,
    pub message_id: i64,
    /// 为空时移除消息上的全部按钮
    pub reply_markup: InlineKeyboardMarkup,
}

/// 应答回调事件的参数，不应答的话客户端按钮会一直处于加载状态
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct AnswerCallbackQueryParams {
    pub callback_query_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum RequestParams {
    GetMe,
    GetUpdates(GetUpdatesParams),
    SendMessage(SendMessageParams),
    SendPhoto(SendPhotoParams),
    EditMessageReplyMarkup(EditMessageReplyMarkupParams),
    AnswerCallbackQuery(AnswerCallbackQueryParams),
}

impl RequestParams {
    /// Bot API 的方法名
    pub fn method(&self) -> &'static str {
        match self {
            Self::GetMe => "getMe",
            Self::GetUpdates(_) => "getUpdates",
            Self::SendMessage(_) => "sendMessage",
            Self::SendPhoto(_) => "sendPhoto",
            Self::EditMessageReplyMarkup(_) => "editMessageReplyMarkup",
            Self::AnswerCallbackQuery(_) => "answerCallbackQuery",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub params: RequestParams,
}

impl ApiRequest {
    pub fn new(params: RequestParams) -> Self {
        Self { params }
    }

    pub fn method(&self) -> &'static str {
        self.params.method()
    }
}

#[derive(Debug, Deserialize, EnumAsInner)]
#[serde(untagged)]
pub enum ResponseBody {
    Updates(Vec<Update>),
    Message(Message),
    User(User),
    Bool(bool),
    Fallback(serde_json::Value),
}

#[derive(Debug, Deserialize)]
pub struct ApiResponse {
    pub ok: bool,
    #[serde(default)]
    pub result: Option<ResponseBody>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub error_code: Option<i64>,
}

impl ApiResponse {
    pub fn success(result: ResponseBody) -> Self {
        Self {
            ok: true,
            result: Some(result),
            description: None,
            error_code: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::schema::InlineKeyboardButton;

    #[test]
    fn test_api_serialize() {
        let send_message = ApiRequest::new(RequestParams::SendMessage(SendMessageParams {
            chat_id: 10000,
            text: "Hello, world!".to_string(),
            reply_markup: Some(InlineKeyboardMarkup::row(vec![
                InlineKeyboardButton::callback("是", "yes|10000"),
                InlineKeyboardButton::callback("否", "no|10000"),
            ])),
        }));
        assert_eq!(send_message.method(), "sendMessage");
        assert_eq!(
            serde_json::to_string(&send_message.params).unwrap(),
            r#"{"chat_id":10000,"text":"Hello, world!","reply_markup":{"inline_keyboard":[[{"text":"是","callback_data":"yes|10000"},{"text":"否","callback_data":"no|10000"}]]}}"#
        );
    }

    #[test]
    fn test_remote_photo_serialize() {
        let params = RequestParams::SendPhoto(SendPhotoParams {
            chat_id: 1,
            photo: InputFile::Remote("file-id".to_string()),
            caption: Some("caption".to_string()),
            reply_markup: None,
        });
        assert_eq!(
            serde_json::to_value(&params).unwrap(),
            serde_json::json!({"chat_id": 1, "photo": "file-id", "caption": "caption"})
        );
        // 本地文件由适配器单独上传，序列化时不应出现
        let local = InputFile::Path(PathBuf::from("/tmp/a.jpg"));
        assert!(serde_json::to_value(&local).is_err());
    }

    #[test]
    fn test_response_deserialize() {
        let resp: ApiResponse = serde_json::from_str(
            r#"{"ok":true,"result":{"message_id":5,"chat":{"id":1,"type":"private"},"date":0,"text":"hi"}}"#,
        )
        .unwrap();
        let message = resp.result.unwrap().into_message().unwrap();
        assert_eq!(message.message_id, 5);

        let resp: ApiResponse = serde_json::from_str(r#"{"ok":true,"result":true}"#).unwrap();
        assert!(matches!(resp.result, Some(ResponseBody::Bool(true))));

        let resp: ApiResponse =
            serde_json::from_str(r#"{"ok":false,"error_code":403,"description":"Forbidden: bot was blocked by the user"}"#)
                .unwrap();
        assert!(!resp.ok);
        assert_eq!(resp.error_code, Some(403));
    }
}
