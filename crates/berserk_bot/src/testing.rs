use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use anyhow::Result;
use async_trait::async_trait;
use berserk::{
    adapter::Caller,
    schema::{ApiRequest, ApiResponse, InlineKeyboardMarkup, Message, RequestParams, ResponseBody},
};
use chrono_tz::Tz;
use tempfile::TempDir;

use crate::{assets::Assets, checkin::CheckIn, model::user::UserRecord, scheduler::Scheduler, store::UserStore};

/// 记录所有请求的 Caller，发往 unreachable 中会话的请求返回 403
#[derive(Default)]
pub struct RecordingCaller {
    requests: Mutex<Vec<RequestParams>>,
    unreachable: HashSet<i64>,
}

impl RecordingCaller {
    pub fn unreachable(chat_ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            unreachable: chat_ids.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn requests(&self) -> Vec<RequestParams> {
        self.requests.lock().unwrap().clone()
    }

    /// 发给 chat_id 的文本与图片说明，按发送顺序排列
    pub fn texts_to(&self, chat_id: i64) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter_map(|params| match params {
                RequestParams::SendMessage(p) if p.chat_id == chat_id => Some(p.text),
                RequestParams::SendPhoto(p) if p.chat_id == chat_id => p.caption,
                _ => None,
            })
            .collect()
    }

    /// 发给 chat_id 的每日提醒数量，包括发送失败的
    pub fn prompts_to(&self, chat_id: i64) -> usize {
        let yes = format!("yes|{chat_id}");
        self.requests()
            .into_iter()
            .filter_map(|params| match params {
                RequestParams::SendMessage(p) if p.chat_id == chat_id => p.reply_markup,
                RequestParams::SendPhoto(p) if p.chat_id == chat_id => p.reply_markup,
                _ => None,
            })
            .filter(|markup| {
                markup
                    .inline_keyboard
                    .iter()
                    .flatten()
                    .any(|button| button.callback_data.as_deref() == Some(yes.as_str()))
            })
            .count()
    }

    pub fn last_buttons_to(&self, chat_id: i64) -> Option<InlineKeyboardMarkup> {
        self.requests().into_iter().rev().find_map(|params| match params {
            RequestParams::SendMessage(p) if p.chat_id == chat_id => p.reply_markup,
            RequestParams::SendPhoto(p) if p.chat_id == chat_id => p.reply_markup,
            _ => None,
        })
    }
}

fn fake_message(chat_id: i64) -> Message {
    serde_json::from_value(serde_json::json!({
        "message_id": 100,
        "chat": {"id": chat_id, "type": "private"},
        "date": 0,
    }))
    .unwrap()
}

#[async_trait]
impl Caller for RecordingCaller {
    async fn call(&self, request: ApiRequest) -> Result<ApiResponse> {
        let chat_id = match &request.params {
            RequestParams::SendMessage(p) => Some(p.chat_id),
            RequestParams::SendPhoto(p) => Some(p.chat_id),
            RequestParams::EditMessageReplyMarkup(p) => Some(p.chat_id),
            _ => None,
        };
        self.requests.lock().unwrap().push(request.params.clone());
        if let Some(chat_id) = chat_id.filter(|id| self.unreachable.contains(id)) {
            return Ok(ApiResponse {
                ok: false,
                result: None,
                description: Some(format!("Forbidden: bot was blocked by the user {chat_id}")),
                error_code: Some(403),
            });
        }
        let body = match chat_id {
            Some(chat_id) if !matches!(request.params, RequestParams::EditMessageReplyMarkup(_)) => {
                ResponseBody::Message(fake_message(chat_id))
            }
            _ => ResponseBody::Bool(true),
        };
        Ok(ApiResponse::success(body))
    }
}

pub struct Fixture {
    pub service: Arc<CheckIn>,
    pub caller: Arc<RecordingCaller>,
    _dir: TempDir,
}

impl Fixture {
    pub async fn new(caller: RecordingCaller) -> Self {
        Self::with_assets(caller, Assets::default()).await
    }

    pub async fn with_assets(caller: RecordingCaller, assets: Assets) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = UserStore::open(dir.path().join("users.json")).await.unwrap();
        let caller = Arc::new(caller);
        let service = CheckIn::new(
            Arc::new(store),
            Arc::new(Scheduler::new(Tz::Europe__Moscow)),
            caller.clone(),
            Arc::new(assets),
        );
        Self {
            service,
            caller,
            _dir: dir,
        }
    }

    pub async fn user(&self, user_id: i64) -> Option<UserRecord> {
        self.service.store().get(&user_id.to_string()).await
    }

    pub async fn put(&self, user_id: i64, record: UserRecord) {
        self.service.store().upsert(&user_id.to_string(), record).await.unwrap();
    }
}
