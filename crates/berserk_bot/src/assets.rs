use std::path::{Path, PathBuf};

use futures::StreamExt;
use rand::seq::IndexedRandom;
use tokio::fs;
use tokio_stream::wrappers::ReadDirStream;

use crate::config::AssetsConfig;

const DEFAULT_QUOTE: &str = "坚持下去，今天的努力会成为明天的底气。";
const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImagePool {
    /// 每日提醒
    Prompt,
    /// 打卡成功
    Success,
    /// 未完成或中断
    Fail,
}

/// 名言与三组图片，均为均匀随机选取
#[derive(Debug, Default)]
pub struct Assets {
    quotes: Vec<String>,
    prompt_images: Vec<PathBuf>,
    success_images: Vec<PathBuf>,
    fail_images: Vec<PathBuf>,
}

impl Assets {
    pub fn new(
        quotes: Vec<String>,
        prompt_images: Vec<PathBuf>,
        success_images: Vec<PathBuf>,
        fail_images: Vec<PathBuf>,
    ) -> Self {
        Self {
            quotes,
            prompt_images,
            success_images,
            fail_images,
        }
    }

    /// 读取失败的资源只记录日志，对应的池为空
    pub async fn load(config: &AssetsConfig) -> Self {
        let quotes = match fs::read_to_string(&config.quotes_path).await {
            Ok(content) => content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_owned)
                .collect(),
            Err(e) => {
                warn!("Failed to read quotes from {}: {e}", config.quotes_path.display());
                Vec::new()
            }
        };
        let assets = Self::new(
            quotes,
            list_images(&config.prompt_images).await,
            list_images(&config.success_images).await,
            list_images(&config.fail_images).await,
        );
        info!(
            "Loaded {} quotes, {}/{}/{} prompt/success/fail images",
            assets.quotes.len(),
            assets.prompt_images.len(),
            assets.success_images.len(),
            assets.fail_images.len()
        );
        assets
    }

    pub fn quote(&self) -> &str {
        self.quotes
            .choose(&mut rand::rng())
            .map(String::as_str)
            .unwrap_or(DEFAULT_QUOTE)
    }

    pub fn image(&self, pool: ImagePool) -> Option<&Path> {
        let images = match pool {
            ImagePool::Prompt => &self.prompt_images,
            ImagePool::Success => &self.success_images,
            ImagePool::Fail => &self.fail_images,
        };
        images.choose(&mut rand::rng()).map(PathBuf::as_path)
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

async fn list_images(dir: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Failed to read image directory {}: {e}", dir.display());
            return Vec::new();
        }
    };
    let mut images = ReadDirStream::new(entries)
        .filter_map(|entry| async move {
            let path = entry.ok()?.path();
            is_image(&path).then_some(path)
        })
        .collect::<Vec<_>>()
        .await;
    // 目录遍历顺序不固定，排序后便于排查问题
    images.sort();
    images
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_assets() {
        let dir = tempfile::tempdir().unwrap();
        let quotes_path = dir.path().join("quotes.txt");
        fs::write(&quotes_path, "第一句\n\n  第二句  \n").await.unwrap();
        let prompt_dir = dir.path().join("prompt");
        fs::create_dir(&prompt_dir).await.unwrap();
        for name in ["a.jpg", "b.PNG", "notes.txt"] {
            fs::write(prompt_dir.join(name), b"").await.unwrap();
        }
        let config = AssetsConfig {
            quotes_path,
            prompt_images: prompt_dir.clone(),
            success_images: dir.path().join("missing"),
            fail_images: dir.path().join("missing"),
        };
        let assets = Assets::load(&config).await;
        assert_eq!(assets.quotes, vec!["第一句", "第二句"]);
        assert_eq!(assets.prompt_images, vec![prompt_dir.join("a.jpg"), prompt_dir.join("b.PNG")]);
        assert!(assets.image(ImagePool::Prompt).is_some());
        assert!(assets.image(ImagePool::Success).is_none());
        assert!(["第一句", "第二句"].contains(&assets.quote()));
    }

    #[test]
    fn test_default_quote() {
        assert_eq!(Assets::default().quote(), DEFAULT_QUOTE);
    }
}
