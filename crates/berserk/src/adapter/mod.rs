use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use tokio::{sync::mpsc, time};
mod error;
mod polling;

pub use error::ConnectError;
pub use polling::PollingAdapter;

use crate::{
    caller,
    chain::{Context, MatchUnion},
    plugin::Plugin,
    schema::*,
};

#[async_trait]
pub trait Connector: Send + Sync {
    async fn spawn(self: Box<Self>, plugins: Vec<Plugin>) -> Result<()>;
}

/// 与 Telegram 交互的出口，除 `call` 外的方法都基于 `call` 实现
#[async_trait]
pub trait Caller: Send + Sync {
    async fn call(&self, request: ApiRequest) -> Result<ApiResponse>;

    async fn get_me(&self) -> Result<User> {
        caller::get_me(self).await
    }

    async fn get_updates(&self, param: GetUpdatesParams) -> Result<Vec<Update>> {
        caller::get_updates(self, param).await
    }

    async fn send_message(&self, param: SendMessageParams) -> Result<Message> {
        caller::send_message(self, param).await
    }

    async fn send_photo(&self, param: SendPhotoParams) -> Result<Message> {
        caller::send_photo(self, param).await
    }

    async fn edit_message_reply_markup(&self, param: EditMessageReplyMarkupParams) -> Result<()> {
        caller::edit_message_reply_markup(self, param).await
    }

    async fn answer_callback_query(&self, param: AnswerCallbackQueryParams) -> Result<bool> {
        caller::answer_callback_query(self, param).await
    }
}

#[async_trait]
pub trait Adapter: Connector + Caller {}

pub(crate) fn extract_match_unions(plugins: &[Plugin]) -> Vec<Arc<MatchUnion>> {
    // 每个插件都有自己的 MatchUnion，但处理时不按插件分割，而是统一按照优先级排序处理
    // 将排序过程提前，避免在处理任务中重复排序（引入的代价就是 MatchUnion 需要用 Arc 包装）
    let mut match_unions = plugins
        .iter()
        .flat_map(|plugin| plugin.match_unions())
        .cloned()
        .collect::<Vec<_>>();
    // 优先级从大到小排序
    match_unions.sort_by(|a, b| b.priority.cmp(&a.priority));
    match_unions
}

/// 按照优先级顺序匹配并处理事件
pub(crate) async fn handle_event(match_unions: &[Arc<MatchUnion>], context: Context) {
    for match_union in match_unions {
        if match_union.is_match(&context.event) {
            match (*match_union.handler)(context.clone()).await {
                // 事件的返回值被视为中断标志，如果返回 true 则不再继续匹配
                Err(e) => error!("Failed to handle event with {}: {e:?}", match_union.description),
                Ok(true) => break,
                _ => (),
            }
        }
    }
}

/// 处理任务空闲超过该时长后退出，下次收到该用户的事件时重新创建
const WORKER_IDLE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

type Workers = DashMap<i64, mpsc::UnboundedSender<Arc<Event>>>;

/// 为每个用户维护一个串行处理的任务，保证同一用户的事件按到达顺序处理，不同用户之间互不阻塞
///
/// 只有近期活跃的用户持有处理任务，空闲的任务会从表中移除并退出。
pub(crate) struct Dispatcher {
    caller: Arc<dyn Caller>,
    plugins: Arc<Vec<Plugin>>,
    match_unions: Arc<Vec<Arc<MatchUnion>>>,
    workers: Arc<Workers>,
}

impl Dispatcher {
    pub(crate) fn new(caller: Arc<dyn Caller>, plugins: Vec<Plugin>) -> Self {
        Self {
            caller,
            match_unions: Arc::new(extract_match_unions(&plugins)),
            plugins: Arc::new(plugins),
            workers: Arc::new(DashMap::new()),
        }
    }

    pub(crate) fn caller(&self) -> &dyn Caller {
        self.caller.as_ref()
    }

    pub(crate) fn dispatch(&self, event: Event) {
        let user_id = match event.try_user_id() {
            Ok(user_id) => user_id,
            Err(e) => {
                debug!("Skip event without sender: {e}");
                return;
            }
        };
        let event = Arc::new(event);
        let worker = self
            .workers
            .entry(user_id)
            .or_insert_with(|| self.spawn_worker(user_id))
            .value()
            .clone();
        if let Err(mpsc::error::SendError(event)) = worker.send(event) {
            // 处理任务因空闲或 panic 退出时重新创建
            debug!("Worker for user {user_id} exited, respawning");
            let worker = self.spawn_worker(user_id);
            if worker.send(event).is_ok() {
                self.workers.insert(user_id, worker);
            }
        }
    }

    fn spawn_worker(&self, user_id: i64) -> mpsc::UnboundedSender<Arc<Event>> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Arc<Event>>();
        let (caller, plugins, match_unions) = (self.caller.clone(), self.plugins.clone(), self.match_unions.clone());
        let (workers, own) = (self.workers.clone(), tx.downgrade());
        tokio::spawn(async move {
            let context = |event: Arc<Event>| {
                debug!("Handle event for user {user_id}: {event:?}");
                Context {
                    caller: caller.clone(),
                    event,
                    plugins: plugins.clone(),
                }
            };
            loop {
                match time::timeout(WORKER_IDLE_TIMEOUT, rx.recv()).await {
                    Ok(Some(event)) => handle_event(&match_unions, context(event)).await,
                    Ok(None) => break,
                    Err(_) => {
                        // 只移除自己，表中的发送端可能已经被替换
                        workers.remove_if(&user_id, |_, current| {
                            own.upgrade().is_some_and(|own| own.same_channel(current))
                        });
                        // 移除前已经发出的事件仍需处理完
                        rx.close();
                        while let Some(event) = rx.recv().await {
                            handle_event(&match_unions, context(event)).await;
                        }
                        debug!("Worker for user {user_id} exited after idle timeout");
                        break;
                    }
                }
            }
        });
        tx
    }
}
