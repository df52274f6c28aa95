use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use futures::FutureExt;

use crate::{checkin::CheckIn, error::CheckInError};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// 连续天数被清零的用户数
    pub reset: usize,
    /// 通知发送失败的用户数
    pub failed: usize,
}

/// 将错过一整天的用户连续天数清零，并逐个发送通知
///
/// 清零在一次存储修改中完成，之后再发送通知，单个用户发送失败不影响其他用户。
pub async fn sweep_missed_days(service: &CheckIn, today: NaiveDate) -> Result<SweepReport, CheckInError> {
    let broken = service
        .store()
        .update(|users| {
            users
                .iter_mut()
                .filter_map(|(user_id, user)| {
                    let previous = user.checkin_streak;
                    user.break_streak(today).then(|| (user_id.clone(), previous))
                })
                .collect::<Vec<_>>()
        })
        .await?;
    let mut report = SweepReport {
        reset: broken.len(),
        failed: 0,
    };
    for (user_id, previous) in broken {
        if let Err(e) = service.notify_streak_broken(&user_id, previous).await {
            warn!("Failed to notify {user_id} about broken streak: {e}");
            report.failed += 1;
        }
    }
    info!("Sweep of {today} done, reset {} users, {} notifications failed", report.reset, report.failed);
    Ok(report)
}

pub fn schedule_sweep(service: &Arc<CheckIn>, at: NaiveTime) {
    let this = Arc::downgrade(service);
    service.scheduler().schedule_daily("missed day sweep", at, move || {
        let this = this.clone();
        async move {
            let Some(service) = this.upgrade() else {
                return Ok(());
            };
            sweep_missed_days(&service, service.today()).await?;
            Ok::<_, anyhow::Error>(())
        }
        .boxed()
    });
}
