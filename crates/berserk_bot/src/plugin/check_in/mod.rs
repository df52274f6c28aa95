use std::sync::Arc;

use anyhow::Ok;
use berserk::{
    chain::{Context, Rule},
    plugin::Plugin,
};

use crate::{
    checkin::{Callback, CallbackAction, CheckIn},
    error::CheckInError,
    model::user::Answer,
};

/// 解析按钮的回调数据，只接受按钮所属用户本人的点击
fn own_callback(ctx: &Context) -> Option<Callback> {
    let callback = ctx.event.callback_data()?.parse::<Callback>().ok()?;
    let presser = ctx.event.try_user_id().ok()?;
    if callback.user_id != presser {
        debug!("Ignore callback {callback} pressed by {presser}");
        return None;
    }
    Some(callback)
}

pub fn check_in_plugin(service: Arc<CheckIn>) -> Plugin {
    let mut plugin = Plugin::new("每日打卡插件", "每天定时提醒打卡，并记录连续打卡天数");

    let svc = service.clone();
    plugin.on_command("start", "开始使用并创建打卡记录", move |ctx| {
        let service = svc.clone();
        async move {
            let user_id = ctx.event.try_user_id()?;
            service
                .start(user_id, &ctx.event.nickname())
                .await
                .or_else(CheckInError::into_result)
        }
    });

    let svc = service.clone();
    plugin.on_command("stop", "关闭每日提醒", move |ctx| {
        let service = svc.clone();
        async move {
            let user_id = ctx.event.try_user_id()?;
            service.stop(user_id).await.or_else(CheckInError::into_result)
        }
    });

    let svc = service.clone();
    plugin.on_command("time", "查看提醒时间，或使用 /time HH:MM 设置", move |ctx| {
        let service = svc.clone();
        async move {
            let user_id = ctx.event.try_user_id()?;
            let (_, args) = ctx.event.command().unwrap_or_default();
            let result = if args.is_empty() {
                service.show_time(user_id).await
            } else {
                service.set_time(user_id, args).await
            };
            result.or_else(CheckInError::into_result)
        }
    });

    let svc = service.clone();
    plugin.on_command("streak", "查看当前连续打卡天数", move |ctx| {
        let service = svc.clone();
        async move {
            let user_id = ctx.event.try_user_id()?;
            service.show_streak(user_id).await.or_else(CheckInError::into_result)
        }
    });

    let svc = service.clone();
    plugin.on(
        "私聊发送 HH:MM 设置每日提醒时间",
        i32::default(),
        Rule::on_private_message() & Rule::on_plain_text(),
        move |ctx| {
            let service = svc.clone();
            async move {
                let user_id = ctx.event.try_user_id()?;
                service
                    .set_time(user_id, &ctx.event.text())
                    .await
                    .or_else(CheckInError::into_result)?;
                Ok(true)
            }
        },
    );

    for (action, description) in [
        (CallbackAction::Yes, "提醒消息上的“是”按钮"),
        (CallbackAction::No, "提醒消息上的“否”按钮"),
        (CallbackAction::ChangeYes, "确认修改提醒时间"),
        (CallbackAction::ChangeNo, "取消修改提醒时间"),
    ] {
        let svc = service.clone();
        plugin.on(
            description,
            i32::default(),
            Rule::on_callback() & Rule::on_callback_action(action.as_str()),
            move |ctx| {
                let service = svc.clone();
                async move {
                    // 先应答回调，客户端的按钮才会结束加载状态
                    if let Err(e) = ctx.answer_callback().await {
                        warn!("Failed to answer callback query: {e:?}");
                    }
                    let Some(callback) = own_callback(&ctx) else {
                        return Ok(true);
                    };
                    let (user_id, message_id) = (callback.user_id, ctx.event.try_message_id().ok());
                    let result = match callback.action {
                        CallbackAction::Yes => service.answer(user_id, Answer::Yes, message_id).await,
                        CallbackAction::No => service.answer(user_id, Answer::No, message_id).await,
                        CallbackAction::ChangeYes => service.resolve_change(user_id, true, message_id).await,
                        CallbackAction::ChangeNo => service.resolve_change(user_id, false, message_id).await,
                    };
                    result.or_else(CheckInError::into_result)?;
                    Ok(true)
                }
            },
        );
    }

    plugin
}

#[cfg(test)]
mod tests {
    use berserk::schema::{Event, Update};

    use super::*;
    use crate::testing::RecordingCaller;

    fn callback_context(presser: i64, data: &str) -> Context {
        let update: Update = serde_json::from_value(serde_json::json!({
            "update_id": 1,
            "callback_query": {
                "id": "q1",
                "from": {"id": presser, "is_bot": false, "first_name": "u"},
                "data": data,
            }
        }))
        .unwrap();
        Context {
            caller: Arc::new(RecordingCaller::default()),
            event: Arc::new(Event::from(update)),
            plugins: Arc::new(Vec::new()),
        }
    }

    #[test]
    fn test_own_callback() {
        assert_eq!(
            own_callback(&callback_context(1, "yes|1")),
            Some(Callback {
                action: CallbackAction::Yes,
                user_id: 1
            })
        );
        assert_eq!(own_callback(&callback_context(2, "yes|1")), None);
        assert_eq!(own_callback(&callback_context(1, "unknown")), None);
    }
}
