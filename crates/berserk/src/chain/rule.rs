use std::{borrow::Cow, ops};

use regex::Regex;

use crate::{
    chain::Matcher,
    schema::{Event, User},
};

#[allow(clippy::enum_variant_names)]
pub enum InnerRule {
    OnEventStatic(&'static (dyn Fn(&Event) -> bool + Send + Sync)),
    OnText(Box<dyn Fn(&str) -> bool + Send + Sync>),
    OnSender(Box<dyn Fn(&User) -> bool + Send + Sync>),
    OnEvent(Box<dyn Fn(&Event) -> bool + Send + Sync>),
}

pub struct Rule {
    pub(crate) name: Cow<'static, str>,
    pub(crate) inner: InnerRule,
}

impl Rule {
    pub fn on_message() -> Rule {
        Self {
            name: "on_message".into(),
            inner: InnerRule::OnEventStatic(&|event: &Event| -> bool { matches!(event, Event::Message(_)) }),
        }
    }

    pub fn on_private_message() -> Rule {
        Self {
            name: "on_private_message".into(),
            inner: InnerRule::OnEventStatic(&|event: &Event| -> bool {
                matches!(event, Event::Message(message) if message.chat.r#type == "private")
            }),
        }
    }

    pub fn on_callback() -> Rule {
        Self {
            name: "on_callback".into(),
            inner: InnerRule::OnEventStatic(&|event: &Event| -> bool { matches!(event, Event::CallbackQuery(_)) }),
        }
    }

    /// 非命令的文本消息
    pub fn on_plain_text() -> Rule {
        Self {
            name: "on_plain_text".into(),
            inner: InnerRule::OnEventStatic(&|event: &Event| -> bool {
                let text = event.text();
                !text.is_empty() && !text.starts_with('/')
            }),
        }
    }

    pub fn on_sender_id(user_id: i64) -> Rule {
        Self {
            name: format!("on_sender_id({user_id})").into(),
            inner: InnerRule::OnSender(Box::new(move |sender: &User| -> bool { sender.id == user_id })),
        }
    }

    /// 匹配 `/name`，兼容群聊中的 `/name@bot_name` 与带参数的写法
    pub fn on_command(name: &'static str) -> Rule {
        Self {
            name: format!("/{name}").into(),
            inner: InnerRule::OnEvent(Box::new(move |event: &Event| -> bool {
                event.command().is_some_and(|(command, _)| command == name)
            })),
        }
    }

    /// 匹配回调数据形如 `action|payload` 的按钮
    pub fn on_callback_action(action: &'static str) -> Rule {
        Self {
            name: format!("on_callback_action({action})").into(),
            inner: InnerRule::OnEvent(Box::new(move |event: &Event| -> bool {
                event
                    .callback_data()
                    .is_some_and(|data| data.split_once('|').map_or(data, |(head, _)| head) == action)
            })),
        }
    }

    fn on_text(name: Cow<'static, str>, is_valid: impl Fn(&str) -> bool + Send + Sync + 'static) -> Rule {
        Self {
            name,
            inner: InnerRule::OnText(Box::new(move |text| is_valid(text.trim()))),
        }
    }

    pub fn on_exact_match(str: &'static str) -> Rule {
        Self::on_text(format!("on_exact_match({str})").into(), move |text| text == str.trim())
    }

    pub fn on_prefix(prefix: &'static str) -> Rule {
        Self::on_text(format!("on_prefix({prefix})").into(), move |text| {
            text.starts_with(prefix.trim())
        })
    }

    pub fn on_regex(regex: Regex) -> Rule {
        Self::on_text(format!("on_regex({})", regex.as_str()).into(), move |text| {
            regex.is_match(text)
        })
    }
}

impl ops::BitAnd<Rule> for Rule {
    type Output = Matcher;

    fn bitand(self, rhs: Rule) -> Matcher {
        Matcher {
            condition: vec![self, rhs],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Update;

    fn event(value: serde_json::Value) -> Event {
        serde_json::from_value::<Update>(value).unwrap().into()
    }

    fn text_event(text: &str) -> Event {
        event(serde_json::json!({
            "update_id": 1,
            "message": {
                "message_id": 1,
                "from": {"id": 5, "is_bot": false, "first_name": "u"},
                "chat": {"id": 5, "type": "private"},
                "date": 0,
                "text": text,
            }
        }))
    }

    fn callback_event(data: &str) -> Event {
        event(serde_json::json!({
            "update_id": 1,
            "callback_query": {"id": "q", "from": {"id": 5, "is_bot": false, "first_name": "u"}, "data": data}
        }))
    }

    #[test]
    fn test_command_rule() {
        let matcher = Matcher::from(Rule::on_message() & Rule::on_command("start"));
        assert!(matcher.is_match(&text_event("/start")));
        assert!(matcher.is_match(&text_event("/start@berserk_bot")));
        assert!(!matcher.is_match(&text_event("/stop")));
        assert!(!matcher.is_match(&text_event("start")));
        assert!(!matcher.is_match(&callback_event("start|5")));
    }

    #[test]
    fn test_callback_action_rule() {
        let matcher = Matcher::from(Rule::on_callback_action("yes"));
        assert!(matcher.is_match(&callback_event("yes|5")));
        assert!(!matcher.is_match(&callback_event("no|5")));
        // change_yes 不能被 yes 匹配到
        assert!(!matcher.is_match(&callback_event("change_yes|5")));
        assert!(!matcher.is_match(&text_event("yes|5")));
    }

    #[test]
    fn test_text_rules() {
        let plain = Matcher::from(Rule::on_private_message() & Rule::on_plain_text());
        assert!(plain.is_match(&text_event("09:30")));
        assert!(!plain.is_match(&text_event("/time")));
        let regex = Matcher::from(Rule::on_regex(Regex::new(r"^\d{1,2}:\d{1,2}$").unwrap()));
        assert!(regex.is_match(&text_event(" 9:30 ")));
        assert!(!regex.is_match(&text_event("9-30")));
        assert!(Matcher::from(Rule::on_sender_id(5)).is_match(&text_event("x")));
        assert!(!Matcher::from(Rule::on_sender_id(6)).is_match(&callback_event("x")));
    }

    #[test]
    fn test_matcher_display() {
        let matcher = Rule::on_message() & Rule::on_command("help") & Rule::on_plain_text();
        assert_eq!(matcher.to_string(), "on_message & /help & on_plain_text");
    }
}
