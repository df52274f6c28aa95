use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
#[error("时间格式错误，请使用 HH:MM 格式，例如 09:30")]
pub struct TimeParseError;

/// 每日提醒的时间点，小时与分钟总是同时存在
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
#[display("{hour:02}:{minute:02}")]
pub struct ReminderTime {
    hour: u8,
    minute: u8,
}

impl ReminderTime {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        (hour < 24 && minute < 60).then(|| Self {
            hour: hour as u8,
            minute: minute as u8,
        })
    }

    pub fn hour(&self) -> u32 {
        self.hour as u32
    }

    pub fn minute(&self) -> u32 {
        self.minute as u32
    }

    pub fn as_naive_time(&self) -> chrono::NaiveTime {
        // new 已经保证了范围，这里不会失败
        chrono::NaiveTime::from_hms_opt(self.hour(), self.minute(), 0).unwrap_or_default()
    }
}

impl FromStr for ReminderTime {
    type Err = TimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hour, minute) = s.trim().split_once(':').ok_or(TimeParseError)?;
        let hour = hour.trim().parse::<u32>().map_err(|_| TimeParseError)?;
        let minute = minute.trim().parse::<u32>().map_err(|_| TimeParseError)?;
        Self::new(hour, minute).ok_or(TimeParseError)
    }
}

/// 修改提醒时间的确认流程
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeChange {
    #[default]
    Normal,
    Pending(ReminderTime),
}

/// 用户对每日提醒的回答
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckInOutcome {
    /// 打卡成功，携带新的连续天数
    Counted(u32),
    /// 今天没有完成，连续天数不变
    Declined,
    /// 今天已经打过卡，重复点击或点击了旧消息的按钮
    Duplicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSetup {
    /// 直接生效，需要重新注册定时任务
    Applied(ReminderTime),
    /// 已有提醒时间，等待用户确认
    Pending { current: ReminderTime, proposed: ReminderTime },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredUser", into = "StoredUser")]
pub struct UserRecord {
    pub name: String,
    pub checkin_streak: u32,
    pub last_checkin_date: Option<NaiveDate>,
    pub reminder: Option<ReminderTime>,
    pub time_change: TimeChange,
}

impl UserRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            checkin_streak: 0,
            last_checkin_date: None,
            reminder: None,
            time_change: TimeChange::Normal,
        }
    }

    pub fn checked_in_on(&self, today: NaiveDate) -> bool {
        self.last_checkin_date == Some(today)
    }

    /// 处理提醒消息上的是/否按钮，同一天只有第一次回答会生效
    pub fn record_answer(&mut self, answer: Answer, today: NaiveDate) -> CheckInOutcome {
        if self.checked_in_on(today) {
            return CheckInOutcome::Duplicate;
        }
        match answer {
            Answer::Yes => {
                self.checkin_streak += 1;
                self.last_checkin_date = Some(today);
                CheckInOutcome::Counted(self.checkin_streak)
            }
            Answer::No => CheckInOutcome::Declined,
        }
    }

    /// 首次设置或已有待确认的修改时直接生效，否则进入待确认状态
    pub fn propose_time(&mut self, time: ReminderTime) -> TimeSetup {
        match (self.reminder, self.time_change) {
            (Some(current), TimeChange::Normal) => {
                self.time_change = TimeChange::Pending(time);
                TimeSetup::Pending { current, proposed: time }
            }
            _ => {
                self.reminder = Some(time);
                self.time_change = TimeChange::Normal;
                TimeSetup::Applied(time)
            }
        }
    }

    /// 确认修改，返回新的提醒时间；没有待确认的修改时返回 None
    pub fn confirm_change(&mut self) -> Option<ReminderTime> {
        let TimeChange::Pending(time) = std::mem::take(&mut self.time_change) else {
            return None;
        };
        self.reminder = Some(time);
        Some(time)
    }

    /// 取消修改，返回是否存在待确认的修改
    pub fn cancel_change(&mut self) -> bool {
        matches!(std::mem::take(&mut self.time_change), TimeChange::Pending(_))
    }

    pub fn disable_reminder(&mut self) {
        self.reminder = None;
        self.time_change = TimeChange::Normal;
    }

    /// 最近一次打卡早于昨天，说明错过了完整的一天
    pub fn missed_day(&self, today: NaiveDate) -> bool {
        match (self.last_checkin_date, today.pred_opt()) {
            (Some(last), Some(yesterday)) => last < yesterday,
            _ => false,
        }
    }

    /// 错过一天后清零，返回是否真的发生了变化
    pub fn break_streak(&mut self, today: NaiveDate) -> bool {
        if self.checkin_streak == 0 || !self.missed_day(today) {
            return false;
        }
        self.checkin_streak = 0;
        true
    }
}

impl fmt::Display for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "当前连续打卡：{} 天", self.checkin_streak)?;
        if let Some(date) = self.last_checkin_date {
            write!(f, "\n最后打卡日期：{}", date.format("%Y-%m-%d"))?;
        }
        match self.reminder {
            Some(time) => write!(f, "\n每日提醒时间：{time}"),
            None => write!(f, "\n每日提醒：未开启"),
        }
    }
}

/// 落盘格式，保持扁平的字段以便旧快照可以继续读取
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct StoredUser {
    name: String,
    checkin_streak: u32,
    last_checkin_date: Option<NaiveDate>,
    hour: Option<i64>,
    minute: Option<i64>,
    pending_change: bool,
    temp_hour: Option<i64>,
    temp_minute: Option<i64>,
}

/// 越界或负数的时间与缺失同样处理，单条坏数据不影响整个快照的读取
fn stored_time(hour: Option<i64>, minute: Option<i64>) -> Option<ReminderTime> {
    let (hour, minute) = hour.zip(minute)?;
    ReminderTime::new(u32::try_from(hour).ok()?, u32::try_from(minute).ok()?)
}

impl From<StoredUser> for UserRecord {
    fn from(stored: StoredUser) -> Self {
        let time_change = match (stored.pending_change, stored_time(stored.temp_hour, stored.temp_minute)) {
            (true, Some(time)) => TimeChange::Pending(time),
            _ => TimeChange::Normal,
        };
        Self {
            name: stored.name,
            checkin_streak: stored.checkin_streak,
            last_checkin_date: stored.last_checkin_date,
            reminder: stored_time(stored.hour, stored.minute),
            time_change,
        }
    }
}

impl From<UserRecord> for StoredUser {
    fn from(user: UserRecord) -> Self {
        let pending = match user.time_change {
            TimeChange::Pending(time) => Some(time),
            TimeChange::Normal => None,
        };
        Self {
            name: user.name,
            checkin_streak: user.checkin_streak,
            last_checkin_date: user.last_checkin_date,
            hour: user.reminder.map(|time| time.hour().into()),
            minute: user.reminder.map(|time| time.minute().into()),
            pending_change: pending.is_some(),
            temp_hour: pending.map(|time| time.hour().into()),
            temp_minute: pending.map(|time| time.minute().into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_parse_reminder_time() {
        for (input, expected) in [("09:30", (9, 30)), ("0:0", (0, 0)), ("23:59", (23, 59)), (" 7 : 05 ", (7, 5))] {
            let time: ReminderTime = input.parse().unwrap();
            assert_eq!((time.hour(), time.minute()), expected, "input: {input}");
        }
        for input in ["25:00", "24:00", "12:60", "9-30", "abc", "", "12:", ":30", "-1:30", "12:30:00"] {
            assert_eq!(input.parse::<ReminderTime>(), Err(TimeParseError), "input: {input}");
        }
        assert_eq!(ReminderTime::new(9, 5).unwrap().to_string(), "09:05");
    }

    #[test]
    fn test_answer_only_counts_once_per_day() {
        let today = date("2024-05-02");
        let mut user = UserRecord::new("Guts");
        assert_eq!(user.record_answer(Answer::Yes, today), CheckInOutcome::Counted(1));
        assert_eq!(user.record_answer(Answer::Yes, today), CheckInOutcome::Duplicate);
        assert_eq!(user.record_answer(Answer::No, today), CheckInOutcome::Duplicate);
        assert_eq!(user.checkin_streak, 1);
        assert_eq!(user.last_checkin_date, Some(today));
    }

    #[test]
    fn test_answer_no_keeps_streak() {
        let mut user = UserRecord::new("Guts");
        user.checkin_streak = 3;
        user.last_checkin_date = Some(date("2024-05-01"));
        assert_eq!(user.record_answer(Answer::No, date("2024-05-02")), CheckInOutcome::Declined);
        assert_eq!(user.checkin_streak, 3);
        assert_eq!(user.last_checkin_date, Some(date("2024-05-01")));
    }

    #[test]
    fn test_time_change_flow() {
        let (morning, evening) = (ReminderTime::new(9, 30).unwrap(), ReminderTime::new(18, 0).unwrap());
        let mut user = UserRecord::new("Guts");
        assert_eq!(user.propose_time(morning), TimeSetup::Applied(morning));
        assert_eq!(
            user.propose_time(evening),
            TimeSetup::Pending {
                current: morning,
                proposed: evening
            }
        );
        assert_eq!(user.reminder, Some(morning));

        let mut cancelled = user.clone();
        assert!(cancelled.cancel_change());
        assert_eq!(cancelled.reminder, Some(morning));
        assert_eq!(cancelled.time_change, TimeChange::Normal);
        assert!(!cancelled.cancel_change());

        assert_eq!(user.confirm_change(), Some(evening));
        assert_eq!(user.reminder, Some(evening));
        assert_eq!(user.time_change, TimeChange::Normal);
        assert_eq!(user.confirm_change(), None);
    }

    #[test]
    fn test_time_input_while_pending_applies_directly() {
        let mut user = UserRecord::new("Guts");
        user.propose_time(ReminderTime::new(9, 30).unwrap());
        user.propose_time(ReminderTime::new(18, 0).unwrap());
        let night = ReminderTime::new(22, 15).unwrap();
        assert_eq!(user.propose_time(night), TimeSetup::Applied(night));
        assert_eq!(user.reminder, Some(night));
        assert_eq!(user.time_change, TimeChange::Normal);
    }

    #[test]
    fn test_missed_day() {
        let today = date("2024-05-10");
        let mut user = UserRecord::new("Guts");
        assert!(!user.missed_day(today));
        for (last, missed) in [("2024-05-10", false), ("2024-05-09", false), ("2024-05-08", true), ("2024-05-07", true)] {
            user.last_checkin_date = Some(date(last));
            assert_eq!(user.missed_day(today), missed, "last: {last}");
        }
        user.checkin_streak = 5;
        assert!(user.break_streak(today));
        assert_eq!(user.checkin_streak, 0);
        // 已经清零的用户不会重复处理
        assert!(!user.break_streak(today));
    }

    #[test]
    fn test_stored_format() {
        let mut user = UserRecord::new("Guts");
        user.checkin_streak = 2;
        user.last_checkin_date = Some(date("2024-05-01"));
        user.propose_time(ReminderTime::new(9, 30).unwrap());
        user.propose_time(ReminderTime::new(18, 0).unwrap());
        let value = serde_json::to_value(&user).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "name": "Guts",
                "checkin_streak": 2,
                "last_checkin_date": "2024-05-01",
                "hour": 9,
                "minute": 30,
                "pending_change": true,
                "temp_hour": 18,
                "temp_minute": 0,
            })
        );
        assert_eq!(serde_json::from_value::<UserRecord>(value).unwrap(), user);
    }

    #[test]
    fn test_inconsistent_snapshot_is_normalized() {
        let user: UserRecord = serde_json::from_value(serde_json::json!({
            "name": "Casca",
            "hour": 9,
            "minute": null,
            "pending_change": true,
            "temp_hour": null,
        }))
        .unwrap();
        assert_eq!(user.reminder, None);
        assert_eq!(user.time_change, TimeChange::Normal);
        assert_eq!(user.checkin_streak, 0);
    }
}
