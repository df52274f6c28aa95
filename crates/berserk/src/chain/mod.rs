mod handler;
mod matcher;
mod rule;
use std::borrow::Cow;

pub use handler::{Context, Handler};
pub use matcher::Matcher;
pub use rule::Rule;

use crate::schema::Event;

/// 一条处理规则：满足 matcher 的事件交给 handler 处理，priority 越大越先处理
pub struct MatchUnion {
    pub description: Cow<'static, str>,
    pub priority: i32,
    pub matcher: Matcher,
    pub handler: Handler,
}

impl MatchUnion {
    pub fn new(description: Cow<'static, str>, priority: i32, matcher: Matcher, handler: Handler) -> Self {
        Self {
            description,
            priority,
            matcher,
            handler,
        }
    }

    pub fn is_match(&self, event: &Event) -> bool {
        self.matcher.is_match(event)
    }
}
