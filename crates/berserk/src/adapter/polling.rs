use std::{path::Path, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{
    Client, ClientBuilder,
    multipart::{Form, Part},
};
use tokio::time;

use crate::{
    adapter::{Adapter, Caller, Connector, Dispatcher, error::ConnectError},
    plugin::Plugin,
    schema::*,
};

/// 拉取更新失败后的等待时间
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// 通过 getUpdates 长轮询接收事件的适配器
#[derive(Clone)]
pub struct PollingAdapter {
    client: Client,
    base_url: String,
    poll_timeout: u64,
}

impl PollingAdapter {
    pub fn new(api_url: &str, token: &str, poll_timeout: u64) -> Result<Self> {
        Ok(Self {
            client: ClientBuilder::new().timeout(Duration::from_secs(20)).build()?,
            base_url: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
            poll_timeout,
        })
    }
}

async fn photo_form(params: &SendPhotoParams, path: &Path) -> Result<Form> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "photo.jpg".to_owned());
    let content = tokio::fs::read(path).await?;
    let mut form = Form::new()
        .text("chat_id", params.chat_id.to_string())
        .part("photo", Part::bytes(content).file_name(file_name));
    if let Some(caption) = &params.caption {
        form = form.text("caption", caption.clone());
    }
    if let Some(reply_markup) = &params.reply_markup {
        form = form.text("reply_markup", serde_json::to_string(reply_markup)?);
    }
    Ok(form)
}

#[async_trait]
impl Connector for PollingAdapter {
    async fn spawn(self: Box<Self>, plugins: Vec<Plugin>) -> Result<()> {
        let me = self.get_me().await?;
        info!("Bot started as @{}", me.username.unwrap_or(me.first_name));
        let poll_timeout = self.poll_timeout;
        let dispatcher = Dispatcher::new(std::sync::Arc::new(*self), plugins);
        let mut offset = None;
        loop {
            let params = GetUpdatesParams {
                offset,
                timeout: poll_timeout,
                allowed_updates: vec!["message".to_owned(), "callback_query".to_owned()],
            };
            let updates = match dispatcher.caller().get_updates(params).await {
                Ok(updates) => updates,
                Err(e) => {
                    error!("Failed to get updates: {e:?}");
                    time::sleep(RETRY_DELAY).await;
                    continue;
                }
            };
            for update in updates {
                // offset 前移后服务端才会丢弃已收到的更新
                offset = Some(update.update_id + 1);
                dispatcher.dispatch(update.into());
            }
        }
    }
}

#[async_trait]
impl Caller for PollingAdapter {
    async fn call(&self, request: ApiRequest) -> Result<ApiResponse> {
        let builder = self.client.post(format!("{}/{}", self.base_url, request.method()));
        let builder = match &request.params {
            RequestParams::GetMe => builder,
            RequestParams::GetUpdates(params) => builder
                .json(params)
                // 长轮询本身会阻塞 timeout 秒，需要额外留出余量
                .timeout(Duration::from_secs(params.timeout + 10)),
            RequestParams::SendPhoto(
                params @ SendPhotoParams {
                    photo: InputFile::Path(path),
                    ..
                },
            ) => builder.multipart(photo_form(params, path).await.map_err(|e| {
                error!("Failed to build photo form for {}: {e:?}", path.display());
                ConnectError::LocalFile(path.display().to_string())
            })?),
            params => builder.json(params),
        };
        let response = builder.send().await?;
        let status = response.status();
        // Telegram 出错时同样会返回带有描述的 json，只有在无法解析时才使用 http 状态码
        match response.json::<ApiResponse>().await {
            Ok(response) => Ok(response),
            Err(e) if status.is_success() => Err(e.into()),
            Err(_) => Err(ConnectError::Status(status).into()),
        }
    }
}

#[async_trait]
impl Adapter for PollingAdapter {}
