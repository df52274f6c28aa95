use std::{borrow::Cow, future::Future, sync::Arc};

use anyhow::Result;

use crate::{
    adapter::{Adapter, Caller, Connector},
    chain::{Context, Matcher, Rule},
    plugin::Plugin,
};

pub struct Bot {
    connector: Box<dyn Connector>,
    caller: Arc<dyn Caller>,
    plugins: Vec<Plugin>,
}

impl Bot {
    pub fn new<A>(adapter: A) -> Self
    where
        A: Adapter + Clone + 'static,
    {
        Bot {
            connector: Box::new(adapter.clone()),
            caller: Arc::new(adapter),
            plugins: vec![Plugin::new("内建插件", "直接注册在 Bot 上的插件")],
        }
    }

    /// 供定时任务等事件之外的场景主动发送消息
    pub fn caller(&self) -> Arc<dyn Caller> {
        self.caller.clone()
    }

    pub fn on<D, M, H, Fut>(&mut self, description: D, priority: i32, matcher: M, handler: H)
    where
        D: Into<Cow<'static, str>>,
        M: Into<Matcher>,
        H: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool>> + Send + 'static,
    {
        self.plugins[0].on(description, priority, matcher, handler);
    }

    pub fn register_plugin(&mut self, plugin: Plugin) {
        self.plugins.push(plugin);
    }

    pub async fn start(self) -> Result<()> {
        self.connector.spawn(self.plugins).await
    }

    pub fn use_builtin_handler(&mut self) {
        self.on(
            "显示帮助信息",
            i32::MAX,
            Rule::on_message() & Rule::on_command("help"),
            |ctx| async move {
                ctx.reply(help_message(&ctx.plugins)).await?;
                Ok(true)
            },
        );
    }
}

fn help_message(plugins: &[Plugin]) -> String {
    let mut help_message = String::from("由 Rust 与 Tokio 驱动的打卡机器人！目前由如下插件提供服务：\n");
    let mut tab_str = 2;
    for plugin in plugins {
        help_message.push_str(&format!(
            "\n{}{} - {}\n",
            " ".repeat(tab_str),
            plugin.name,
            plugin.description
        ));
        tab_str += 2;
        for mu in plugin.match_unions() {
            help_message.push_str(&format!("{}{} - {}\n", " ".repeat(tab_str), mu.matcher, mu.description));
        }
        tab_str -= 2;
    }
    help_message
}
