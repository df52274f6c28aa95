use std::{
    fmt::Display,
    future::Future,
    sync::{Arc, Mutex, PoisonError},
};

use anyhow::Result;
use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use dashmap::DashMap;
use futures::future::BoxFuture;
use tokio::{task::JoinHandle, time};

use crate::{model::user::ReminderTime, store::UserStore};

/// 用户提醒触发时执行的任务，参数为用户 ID
pub type Job = Arc<dyn Fn(String) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// 后台任务句柄，被丢弃时任务随之取消
struct Task(JoinHandle<()>);

impl Drop for Task {
    fn drop(&mut self) {
        self.0.abort();
    }
}

struct Trigger {
    time: ReminderTime,
    _task: Task,
}

/// 按参考时区的墙上时间每日触发任务
///
/// 每个用户至多存在一个触发器，重新注册会在同一次插入中替换并取消旧的触发器。
/// 每个用户最近一次触发的日期单独保存，取消或替换触发器都不会清除，
/// 新触发器会跳过不晚于该日期的时间点，保证同一天至多提醒一次。
pub struct Scheduler {
    timezone: Tz,
    triggers: DashMap<String, Trigger>,
    last_fired: Arc<DashMap<String, NaiveDate>>,
    daily_tasks: Mutex<Vec<Task>>,
}

impl Scheduler {
    pub fn new(timezone: Tz) -> Self {
        Self {
            timezone,
            triggers: DashMap::new(),
            last_fired: Arc::new(DashMap::new()),
            daily_tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.timezone)
    }

    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    /// 注册或替换用户的每日提醒
    pub fn schedule(&self, user_id: &str, time: ReminderTime, job: Job) {
        let label = format!("reminder for {user_id}");
        let skip_through = self.last_fired(user_id);
        let (owned_id, last_fired) = (user_id.to_owned(), self.last_fired.clone());
        let task = spawn_daily(self.timezone, time.as_naive_time(), label, skip_through, move |date| {
            last_fired.insert(owned_id.clone(), date);
            job(owned_id.clone())
        });
        let replaced = self.triggers.insert(
            user_id.to_owned(),
            Trigger {
                time,
                _task: task,
            },
        );
        match replaced {
            Some(old) => info!("Rescheduled reminder for {user_id}: {} -> {time}", old.time),
            None => info!("Scheduled reminder for {user_id} at {time}"),
        }
    }

    /// 取消用户的提醒，返回之前是否存在；已经开始执行的那一次不会被打断
    pub fn cancel(&self, user_id: &str) -> bool {
        let removed = self.triggers.remove(user_id).is_some();
        if removed {
            info!("Cancelled reminder for {user_id}");
        }
        removed
    }

    pub fn scheduled_time(&self, user_id: &str) -> Option<ReminderTime> {
        self.triggers.get(user_id).map(|trigger| trigger.time)
    }

    /// 用户的提醒最近一次触发的日期
    pub fn last_fired(&self, user_id: &str) -> Option<NaiveDate> {
        self.last_fired.get(user_id).map(|date| *date)
    }

    pub fn trigger_count(&self) -> usize {
        self.triggers.len()
    }

    /// 注册与用户无关的每日任务
    pub fn schedule_daily<F>(&self, label: impl Into<String>, at: NaiveTime, job: F)
    where
        F: Fn() -> BoxFuture<'static, Result<()>> + Send + Sync + 'static,
    {
        let label = label.into();
        info!("Scheduled daily job {label} at {}", at.format("%H:%M"));
        let task = spawn_daily(self.timezone, at, label, None, move |_| job());
        // 锁内只有 push，即使被污染数据也是完整的
        self.daily_tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(task);
    }

    /// 启动时根据存储重新注册所有开启了提醒的用户
    pub async fn rehydrate(&self, store: &UserStore, job: Job) -> usize {
        let users = store.all().await;
        let mut count = 0;
        for (user_id, user) in users {
            if let Some(time) = user.reminder {
                self.schedule(&user_id, time, job.clone());
                count += 1;
            }
        }
        info!("Restored {count} reminders");
        count
    }
}

/// 提交后台任务，任务失败只记录日志，不影响调用方
pub fn submit<F>(label: impl Display + Send + 'static, task: F)
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = task.await {
            error!("Task {label} failed: {e:?}");
        }
    });
}

/// 每天在 at 触发 job，参数为本次触发的日期；skip_through 及之前的日期不会触发
fn spawn_daily<F>(timezone: Tz, at: NaiveTime, label: String, mut skip_through: Option<NaiveDate>, job: F) -> Task
where
    F: Fn(NaiveDate) -> BoxFuture<'static, Result<()>> + Send + Sync + 'static,
{
    Task(tokio::spawn(async move {
        let mut last_run: Option<DateTime<Tz>> = None;
        loop {
            let now = Utc::now().with_timezone(&timezone);
            // 从上次触发的时间点往后推算，避免时钟回拨造成同一天触发两次
            let base = match &last_run {
                Some(last_run) if *last_run > now => last_run.clone(),
                _ => now.clone(),
            };
            let mut next = next_occurrence(&base, at);
            if skip_through.take().is_some_and(|skip| next.date_naive() <= skip) {
                next = next_occurrence(&next, at);
            }
            let wait = (next.clone() - now).to_std().unwrap_or_default();
            debug!("Next run of {label}: {next} (in {}s)", wait.as_secs());
            time::sleep(wait).await;
            // 每次触发都在独立的任务中执行，失败或 panic 都不会影响下一次触发
            submit(label.clone(), job(next.date_naive()));
            last_run = Some(next);
        }
    }))
}

/// 严格晚于 now 的下一个本地时间点 at
pub fn next_occurrence<T: TimeZone>(now: &DateTime<T>, at: NaiveTime) -> DateTime<T> {
    let timezone = now.timezone();
    let today = now.date_naive();
    (0..=2)
        .filter_map(|days| today.checked_add_days(Days::new(days)))
        .filter_map(|date| resolve_local(&timezone, date.and_time(at)))
        .find(|candidate| candidate > now)
        .unwrap_or_else(|| now.clone() + TimeDelta::days(1))
}

fn resolve_local<T: TimeZone>(timezone: &T, naive: NaiveDateTime) -> Option<DateTime<T>> {
    // 夏令时跳过的时间点不存在，顺延一小时
    timezone
        .from_local_datetime(&naive)
        .earliest()
        .or_else(|| timezone.from_local_datetime(&(naive + TimeDelta::hours(1))).earliest())
}
