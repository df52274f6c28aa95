use std::{env, path::PathBuf, str::FromStr};

use chrono::NaiveTime;
use chrono_tz::Tz;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing environment variable {0}")]
    Missing(&'static str),
    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AssetsConfig {
    pub quotes_path: PathBuf,
    pub prompt_images: PathBuf,
    pub success_images: PathBuf,
    pub fail_images: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub api_url: String,
    pub poll_timeout: u64,
    pub store_path: PathBuf,
    pub timezone: Tz,
    pub sweep_time: NaiveTime,
    pub assets: AssetsConfig,
}

impl Config {
    /// 从环境变量读取配置，当前目录存在 .env 时先加载
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            debug!("No .env loaded: {e}");
        }
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_owned());
        Ok(Self {
            bot_token: lookup("BOT_TOKEN")
                .filter(|token| !token.trim().is_empty())
                .ok_or(ConfigError::Missing("BOT_TOKEN"))?,
            api_url: get("API_URL", "https://api.telegram.org"),
            poll_timeout: parse_var("POLL_TIMEOUT", get("POLL_TIMEOUT", "30"), |value| value.parse().ok())?,
            store_path: get("STORE_PATH", "users.json").into(),
            timezone: parse_var("TIMEZONE", get("TIMEZONE", "Europe/Moscow"), |value| {
                Tz::from_str(value).ok()
            })?,
            sweep_time: parse_var("SWEEP_TIME", get("SWEEP_TIME", "00:05"), |value| {
                NaiveTime::parse_from_str(value, "%H:%M").ok()
            })?,
            assets: AssetsConfig {
                quotes_path: get("QUOTES_PATH", "assets/quotes.txt").into(),
                prompt_images: get("PROMPT_IMAGES", "assets/images/prompt").into(),
                success_images: get("SUCCESS_IMAGES", "assets/images/success").into(),
                fail_images: get("FAIL_IMAGES", "assets/images/fail").into(),
            },
        })
    }
}

fn parse_var<T>(name: &'static str, value: String, parser: impl FnOnce(&str) -> Option<T>) -> Result<T, ConfigError> {
    match parser(value.trim()) {
        Some(parsed) => Ok(parsed),
        None => Err(ConfigError::Invalid { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[("BOT_TOKEN", "123:abc")]).unwrap();
        assert_eq!(config.bot_token, "123:abc");
        assert_eq!(config.poll_timeout, 30);
        assert_eq!(config.timezone, chrono_tz::Europe::Moscow);
        assert_eq!(config.sweep_time, NaiveTime::from_hms_opt(0, 5, 0).unwrap());
        assert_eq!(config.store_path, PathBuf::from("users.json"));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(config(&[]), Err(ConfigError::Missing("BOT_TOKEN"))));
        assert!(matches!(
            config(&[("BOT_TOKEN", "t"), ("TIMEZONE", "Mars/Olympus")]),
            Err(ConfigError::Invalid { name: "TIMEZONE", .. })
        ));
        assert!(matches!(
            config(&[("BOT_TOKEN", "t"), ("SWEEP_TIME", "25:00")]),
            Err(ConfigError::Invalid { name: "SWEEP_TIME", .. })
        ));
        let config = config(&[("BOT_TOKEN", "t"), ("TIMEZONE", "Asia/Shanghai"), ("SWEEP_TIME", "01:30")]).unwrap();
        assert_eq!(config.timezone, chrono_tz::Asia::Shanghai);
        assert_eq!(config.sweep_time, NaiveTime::from_hms_opt(1, 30, 0).unwrap());
    }
}
