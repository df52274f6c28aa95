use std::borrow::Cow;

use serde::Deserialize;
use thiserror::Error;

use crate::schema::InlineKeyboardMarkup;

#[derive(Error, Debug)]
pub enum EventError {
    #[error("Event has no sender")]
    NoSender,
    #[error("Event has no chat")]
    NoChat,
    #[error("Event has no message")]
    NoMessage,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub is_bot: bool,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub language_code: Option<String>,
}

impl User {
    /// 用于展示的名字，优先使用完整姓名
    pub fn display_name(&self) -> String {
        match &self.last_name {
            Some(last_name) => format!("{} {}", self.first_name, last_name),
            None => self.first_name.clone(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Chat {
    pub id: i64,
    /// private、group、supergroup 或 channel
    pub r#type: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
    pub date: i64,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    /// 按钮所在的消息，消息过旧时 Telegram 不会返回
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

/// getUpdates 返回的原始结构，message 与 callback_query 至多存在一个
#[derive(Deserialize, Debug, Clone)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone)]
pub enum Event {
    Message(Message),
    CallbackQuery(CallbackQuery),
    Unsupported,
}

impl From<Update> for Event {
    fn from(update: Update) -> Self {
        match (update.message, update.callback_query) {
            (Some(message), _) => Event::Message(message),
            (_, Some(callback_query)) => Event::CallbackQuery(callback_query),
            _ => Event::Unsupported,
        }
    }
}

impl Event {
    pub fn sender(&self) -> Option<&User> {
        match self {
            Self::Message(message) => message.from.as_ref(),
            Self::CallbackQuery(query) => Some(&query.from),
            Self::Unsupported => None,
        }
    }

    pub fn try_user_id(&self) -> Result<i64, EventError> {
        self.sender().map(|user| user.id).ok_or(EventError::NoSender)
    }

    pub fn try_chat_id(&self) -> Result<i64, EventError> {
        match self {
            Self::Message(message) => Ok(message.chat.id),
            Self::CallbackQuery(CallbackQuery {
                message: Some(message), ..
            }) => Ok(message.chat.id),
            // 私聊中 chat_id 与 user_id 相同
            Self::CallbackQuery(query) => Ok(query.from.id),
            Self::Unsupported => Err(EventError::NoChat),
        }
    }

    pub fn try_message_id(&self) -> Result<i64, EventError> {
        match self {
            Self::Message(message) => Ok(message.message_id),
            Self::CallbackQuery(CallbackQuery {
                message: Some(message), ..
            }) => Ok(message.message_id),
            _ => Err(EventError::NoMessage),
        }
    }

    pub fn nickname(&self) -> String {
        self.sender().map(User::display_name).unwrap_or_default()
    }

    pub fn is_private(&self) -> bool {
        match self {
            Self::Message(message) => message.chat.r#type == "private",
            Self::CallbackQuery(CallbackQuery {
                message: Some(message), ..
            }) => message.chat.r#type == "private",
            _ => false,
        }
    }

    /// 消息的文本内容，回调事件与非文本消息返回空字符串
    pub fn text(&self) -> Cow<'_, str> {
        match self {
            Self::Message(Message { text: Some(text), .. }) => Cow::Borrowed(text.trim()),
            _ => Cow::Borrowed(""),
        }
    }

    /// 解析形如 `/start@bot_name args` 的命令，返回命令名与参数
    pub fn command(&self) -> Option<(&str, &str)> {
        let Self::Message(Message { text: Some(text), .. }) = self else {
            return None;
        };
        let text = text.trim().strip_prefix('/')?;
        let (head, args) = text.split_once(char::is_whitespace).unwrap_or((text, ""));
        let name = head.split_once('@').map_or(head, |(name, _)| name);
        if name.is_empty() {
            return None;
        }
        Some((name, args.trim()))
    }

    pub fn callback_data(&self) -> Option<&str> {
        match self {
            Self::CallbackQuery(CallbackQuery { data: Some(data), .. }) => Some(data.as_str()),
            _ => None,
        }
    }

    pub fn callback_query_id(&self) -> Option<&str> {
        match self {
            Self::CallbackQuery(query) => Some(query.id.as_str()),
            _ => None,
        }
    }
}
