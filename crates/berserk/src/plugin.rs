use std::{borrow::Cow, future::Future, sync::Arc};

use anyhow::Result;

use crate::chain::{Context, MatchUnion, Matcher, Rule};

pub struct Plugin {
    pub name: Cow<'static, str>,
    pub description: Cow<'static, str>,
    match_unions: Vec<Arc<MatchUnion>>,
}

impl Plugin {
    pub fn new(name: impl Into<Cow<'static, str>>, description: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            match_unions: Vec::new(),
        }
    }

    pub fn on<D, M, H, Fut>(&mut self, description: D, priority: i32, matcher: M, handler: H)
    where
        D: Into<Cow<'static, str>>,
        M: Into<Matcher>,
        H: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool>> + Send + 'static,
    {
        self.match_unions.push(Arc::new(MatchUnion::new(
            description.into(),
            priority,
            matcher.into(),
            Box::new(move |ctx| Box::pin(handler(ctx))),
        )));
    }

    /// 注册私聊中的 `/name` 命令，默认优先级，处理后不再向下传递
    pub fn on_command<D, H, Fut>(&mut self, name: &'static str, description: D, handler: H)
    where
        D: Into<Cow<'static, str>>,
        H: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.on(
            description,
            i32::default(),
            Rule::on_message() & Rule::on_command(name),
            move |ctx| {
                let fut = handler(ctx);
                async move { fut.await.map(|_| true) }
            },
        );
    }

    pub(crate) fn match_unions(&self) -> &[Arc<MatchUnion>] {
        &self.match_unions
    }
}
