use std::{future::Future, pin::Pin, sync::Arc};

use anyhow::Result;

use crate::{
    adapter::Caller,
    plugin::Plugin,
    schema::{AnswerCallbackQueryParams, Event, Message, SendMessageParams},
};

#[derive(Clone)]
pub struct Context {
    pub caller: Arc<dyn Caller>,
    pub event: Arc<Event>,
    pub plugins: Arc<Vec<Plugin>>,
}

impl Context {
    /// 向事件所在的会话回复一条文本消息
    pub async fn reply(&self, text: impl Into<String>) -> Result<Message> {
        self.caller
            .send_message(SendMessageParams {
                chat_id: self.event.try_chat_id()?,
                text: text.into(),
                reply_markup: None,
            })
            .await
    }

    /// 应答回调事件，非回调事件时什么也不做
    pub async fn answer_callback(&self) -> Result<()> {
        if let Some(callback_query_id) = self.event.callback_query_id() {
            self.caller
                .answer_callback_query(AnswerCallbackQueryParams {
                    callback_query_id: callback_query_id.to_owned(),
                    text: None,
                })
                .await?;
        }
        Ok(())
    }
}

pub type Handler = Box<dyn Fn(Context) -> Pin<Box<dyn Future<Output = Result<bool>> + Send>> + Send + Sync>;
