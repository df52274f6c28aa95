#[macro_use]
extern crate tracing;

mod assets;
mod checkin;
mod config;
mod error;
mod model;
mod plugin;
mod scheduler;
mod store;
mod sweep;
#[cfg(test)]
mod testing;

use std::sync::Arc;

use anyhow::Result;
use berserk::{adapter::PollingAdapter, bot::Bot};
use tracing_subscriber::EnvFilter;

use crate::{
    assets::Assets, checkin::CheckIn, config::Config, plugin::check_in_plugin, scheduler::Scheduler,
    store::UserStore, sweep::schedule_sweep,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let config = Config::from_env()?;
    info!("Using timezone {}, store {}", config.timezone, config.store_path.display());

    let adapter = PollingAdapter::new(&config.api_url, &config.bot_token, config.poll_timeout)?;
    let mut bot_instance = Bot::new(adapter);
    bot_instance.use_builtin_handler();

    let store = Arc::new(UserStore::open(&config.store_path).await?);
    let scheduler = Arc::new(Scheduler::new(config.timezone));
    let assets = Arc::new(Assets::load(&config.assets).await);
    let service = CheckIn::new(store, scheduler, bot_instance.caller(), assets);
    service.rehydrate().await;
    schedule_sweep(&service, config.sweep_time);

    bot_instance.register_plugin(check_in_plugin(service));
    tokio::select! {
        res = bot_instance.start() => res,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl-C, shutting down");
            Ok(())
        }
    }
}
