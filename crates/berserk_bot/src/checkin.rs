use std::{
    fmt,
    future::Future,
    str::FromStr,
    sync::{Arc, Weak},
};

use berserk::{
    adapter::Caller,
    schema::{
        EditMessageReplyMarkupParams, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, Message,
        SendMessageParams, SendPhotoParams,
    },
};
use chrono::NaiveDate;
use derive_more::Display;
use futures::FutureExt;

use crate::{
    assets::{Assets, ImagePool},
    error::CheckInError,
    model::user::{Answer, CheckInOutcome, ReminderTime, TimeSetup, UserRecord},
    scheduler::{Job, Scheduler},
    store::UserStore,
};

const WELCOME: &str = "你好！我会每天在你设定的时间提醒你打卡，并记录你的连续打卡天数。\n\
                       请发送 HH:MM 格式的时间（例如 09:30）来设置每日提醒。";
const WELCOME_BACK: &str = "欢迎回来！发送 HH:MM 格式的时间即可设置或修改每日提醒，/time 查看当前设置。";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    Yes,
    No,
    ChangeYes,
    ChangeNo,
}

impl CallbackAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
            Self::ChangeYes => "change_yes",
            Self::ChangeNo => "change_no",
        }
    }
}

impl fmt::Display for CallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallbackAction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yes" => Ok(Self::Yes),
            "no" => Ok(Self::No),
            "change_yes" => Ok(Self::ChangeYes),
            "change_no" => Ok(Self::ChangeNo),
            _ => Err(()),
        }
    }
}

/// 按钮携带的回调数据，格式为 `action|user_id`
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
#[display("{action}|{user_id}")]
pub struct Callback {
    pub action: CallbackAction,
    pub user_id: i64,
}

impl FromStr for Callback {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (action, user_id) = s.split_once('|').ok_or(())?;
        Ok(Self {
            action: action.parse()?,
            user_id: user_id.parse().map_err(|_| ())?,
        })
    }
}

fn button_pair(user_id: i64, (yes, no): (CallbackAction, CallbackAction)) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::row(vec![
        InlineKeyboardButton::callback("是 ✅", Callback { action: yes, user_id }.to_string()),
        InlineKeyboardButton::callback("否 ❌", Callback { action: no, user_id }.to_string()),
    ])
}

/// 每日打卡的状态机，串联存储、定时器与消息发送
pub struct CheckIn {
    store: Arc<UserStore>,
    scheduler: Arc<Scheduler>,
    caller: Arc<dyn Caller>,
    assets: Arc<Assets>,
    this: Weak<CheckIn>,
}

impl CheckIn {
    pub fn new(
        store: Arc<UserStore>,
        scheduler: Arc<Scheduler>,
        caller: Arc<dyn Caller>,
        assets: Arc<Assets>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            store,
            scheduler,
            caller,
            assets,
            this: this.clone(),
        })
    }

    pub fn store(&self) -> &UserStore {
        &self.store
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn today(&self) -> NaiveDate {
        self.scheduler.today()
    }

    /// 定时器触发时执行的任务，只持有弱引用，避免与定时器形成循环引用
    fn reminder_job(&self) -> Job {
        let this = self.this.clone();
        Arc::new(move |user_id: String| {
            let this = this.clone();
            async move {
                let Some(service) = this.upgrade() else {
                    return Ok(());
                };
                service.send_prompt(&user_id).await.or_else(CheckInError::into_result)
            }
            .boxed()
        })
    }

    pub async fn rehydrate(&self) -> usize {
        self.scheduler.rehydrate(&self.store, self.reminder_job()).await
    }

    fn schedule_user(&self, user_id: i64, time: ReminderTime) {
        self.scheduler.schedule(&user_id.to_string(), time, self.reminder_job());
    }

    async fn user(&self, user_id: i64) -> Result<UserRecord, CheckInError> {
        let key = user_id.to_string();
        self.store.get(&key).await.ok_or(CheckInError::UnknownUser(key))
    }

    async fn deliver<T>(
        &self,
        user_id: i64,
        request: impl Future<Output = anyhow::Result<T>>,
    ) -> Result<T, CheckInError> {
        request.await.map_err(|source| CheckInError::Delivery { user_id, source })
    }

    async fn send_text(
        &self,
        user_id: i64,
        text: impl Into<String>,
        buttons: Option<InlineKeyboardMarkup>,
    ) -> Result<Message, CheckInError> {
        let params = SendMessageParams {
            chat_id: user_id,
            text: text.into(),
            reply_markup: buttons,
        };
        self.deliver(user_id, self.caller.send_message(params)).await
    }

    /// 图片池为空时退化为纯文本消息
    async fn send_picture(
        &self,
        user_id: i64,
        pool: ImagePool,
        caption: String,
        buttons: Option<InlineKeyboardMarkup>,
    ) -> Result<Message, CheckInError> {
        let Some(path) = self.assets.image(pool) else {
            return self.send_text(user_id, caption, buttons).await;
        };
        let params = SendPhotoParams {
            chat_id: user_id,
            photo: InputFile::Path(path.to_owned()),
            caption: Some(caption),
            reply_markup: buttons,
        };
        self.deliver(user_id, self.caller.send_photo(params)).await
    }

    /// 移除已处理消息上的按钮，失败时只记录日志
    async fn clear_buttons(&self, user_id: i64, message_id: Option<i64>) {
        let Some(message_id) = message_id else {
            return;
        };
        let params = EditMessageReplyMarkupParams {
            chat_id: user_id,
            message_id,
            reply_markup: InlineKeyboardMarkup::empty(),
        };
        if let Err(e) = self.caller.edit_message_reply_markup(params).await {
            warn!("Failed to clear buttons of message {message_id} for {user_id}: {e:?}");
        }
    }

    pub async fn start(&self, user_id: i64, name: &str) -> Result<(), CheckInError> {
        let key = user_id.to_string();
        let created = self
            .store
            .update(|users| {
                if users.contains_key(&key) {
                    return false;
                }
                users.insert(key.clone(), UserRecord::new(name));
                true
            })
            .await?;
        if created {
            info!("New user {user_id} ({name})");
        }
        self.send_text(user_id, if created { WELCOME } else { WELCOME_BACK }, None)
            .await?;
        Ok(())
    }

    /// 先取消定时器再落盘，返回时不会再有新的提醒被触发
    pub async fn stop(&self, user_id: i64) -> Result<(), CheckInError> {
        let key = user_id.to_string();
        self.scheduler.cancel(&key);
        self.store
            .update_user(&key, UserRecord::disable_reminder)
            .await?
            .ok_or_else(|| CheckInError::UnknownUser(key))?;
        self.send_text(user_id, "已关闭每日提醒，发送 HH:MM 格式的时间即可重新开启。", None)
            .await?;
        Ok(())
    }

    pub async fn show_time(&self, user_id: i64) -> Result<(), CheckInError> {
        let text = match self.user(user_id).await?.reminder {
            Some(time) => format!("当前每日提醒时间为 {time}，发送新的 HH:MM 时间即可修改。"),
            None => "还没有设置提醒时间，请发送 HH:MM 格式的时间，例如 09:30。".to_owned(),
        };
        self.send_text(user_id, text, None).await?;
        Ok(())
    }

    pub async fn show_streak(&self, user_id: i64) -> Result<(), CheckInError> {
        let user = self.user(user_id).await?;
        self.send_text(user_id, user.to_string(), None).await?;
        Ok(())
    }

    pub async fn set_time(&self, user_id: i64, input: &str) -> Result<(), CheckInError> {
        let key = user_id.to_string();
        if self.store.get(&key).await.is_none() {
            return Err(CheckInError::UnknownUser(key));
        }
        let time = match input.parse::<ReminderTime>() {
            Ok(time) => time,
            Err(e) => {
                self.send_text(user_id, e.to_string(), None).await?;
                return Err(e.into());
            }
        };
        let setup = self
            .store
            .update_user(&key, |user| user.propose_time(time))
            .await?
            .ok_or_else(|| CheckInError::UnknownUser(key))?;
        match setup {
            TimeSetup::Applied(time) => {
                self.schedule_user(user_id, time);
                self.send_text(user_id, format!("好的，每天 {time} 提醒你打卡。"), None)
                    .await?;
            }
            TimeSetup::Pending { current, proposed } => {
                let buttons = button_pair(user_id, (CallbackAction::ChangeYes, CallbackAction::ChangeNo));
                self.send_text(
                    user_id,
                    format!("当前提醒时间为 {current}，确定修改为 {proposed} 吗？"),
                    Some(buttons),
                )
                .await?;
            }
        }
        Ok(())
    }

    /// 处理提醒消息上的是/否按钮
    pub async fn answer(
        &self,
        user_id: i64,
        answer: Answer,
        message_id: Option<i64>,
    ) -> Result<(), CheckInError> {
        let key = user_id.to_string();
        let today = self.today();
        let outcome = self
            .store
            .update_user(&key, |user| user.record_answer(answer, today))
            .await?
            .ok_or_else(|| CheckInError::UnknownUser(key.clone()))?;
        // 无论是否生效都移除按钮，避免重复点击
        self.clear_buttons(user_id, message_id).await;
        match outcome {
            CheckInOutcome::Counted(streak) => {
                info!("User {user_id} checked in, streak {streak}");
                let caption = format!("太棒了！今天的打卡已记录，已连续打卡 {streak} 天。");
                self.send_picture(user_id, ImagePool::Success, caption, None).await?;
            }
            CheckInOutcome::Declined => {
                let caption = "没关系，休息也是前进的一部分，明天继续加油！".to_owned();
                self.send_picture(user_id, ImagePool::Fail, caption, None).await?;
            }
            CheckInOutcome::Duplicate => return Err(CheckInError::DuplicateResponse(key)),
        }
        Ok(())
    }

    /// 处理修改提醒时间的确认/取消按钮
    pub async fn resolve_change(
        &self,
        user_id: i64,
        confirm: bool,
        message_id: Option<i64>,
    ) -> Result<(), CheckInError> {
        let key = user_id.to_string();
        let (changed, current) = self
            .store
            .update_user(&key, |user| {
                if confirm {
                    (user.confirm_change().is_some(), user.reminder)
                } else {
                    (user.cancel_change(), user.reminder)
                }
            })
            .await?
            .ok_or_else(|| CheckInError::UnknownUser(key))?;
        self.clear_buttons(user_id, message_id).await;
        let (true, Some(current)) = (changed, current) else {
            debug!("No pending time change for {user_id}");
            return Ok(());
        };
        let text = if confirm {
            self.schedule_user(user_id, current);
            format!("提醒时间已修改为 {current}。")
        } else {
            format!("已取消修改，提醒时间保持 {current}。")
        };
        self.send_text(user_id, text, None).await?;
        Ok(())
    }

    /// 定时器触发：今天还没有打卡的用户会收到带是/否按钮的提醒
    pub async fn send_prompt(&self, key: &str) -> Result<(), CheckInError> {
        let user = self
            .store
            .get(key)
            .await
            .ok_or_else(|| CheckInError::UnknownUser(key.to_owned()))?;
        if user.reminder.is_none() {
            debug!("Skip prompt for {key}: reminder disabled");
            return Ok(());
        }
        if user.checked_in_on(self.today()) {
            debug!("Skip prompt for {key}: already checked in today");
            return Ok(());
        }
        let user_id = key
            .parse::<i64>()
            .map_err(|_| CheckInError::UnknownUser(key.to_owned()))?;
        let caption = format!("{}\n\n今天的目标完成了吗？", self.assets.quote());
        let buttons = button_pair(user_id, (CallbackAction::Yes, CallbackAction::No));
        self.send_picture(user_id, ImagePool::Prompt, caption, Some(buttons))
            .await?;
        info!("Sent daily prompt to {key}");
        Ok(())
    }

    pub(crate) async fn notify_streak_broken(&self, key: &str, previous: u32) -> Result<(), CheckInError> {
        let user_id = key
            .parse::<i64>()
            .map_err(|_| CheckInError::UnknownUser(key.to_owned()))?;
        let caption = format!("昨天没有打卡，连续 {previous} 天的记录中断了。没关系，今天重新开始吧！");
        self.send_picture(user_id, ImagePool::Fail, caption, None).await?;
        Ok(())
    }
}
