use std::{
    collections::HashMap,
    io,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tokio::{fs, sync::Mutex};

use crate::model::user::UserRecord;

pub type Users = HashMap<String, UserRecord>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to read snapshot {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("Failed to write snapshot {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("Malformed snapshot: {0}")]
    Format(#[from] serde_json::Error),
}

/// 以单个 json 快照保存全部用户的存储
///
/// 所有修改都经过同一把锁：读取当前快照、应用修改、整体写回，写入成功后才替换内存中的快照，
/// 因此并发修改不同用户也不会互相覆盖，写入失败时快照保持原样。
pub struct UserStore {
    path: PathBuf,
    users: Mutex<Users>,
}

impl UserStore {
    /// 打开快照文件，文件不存在或为空时视为没有用户
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let users = load(&path).await?;
        info!("Loaded {} users from {}", users.len(), path.display());
        Ok(Self {
            path,
            users: Mutex::new(users),
        })
    }

    pub async fn get(&self, user_id: &str) -> Option<UserRecord> {
        self.users.lock().await.get(user_id).cloned()
    }

    pub async fn all(&self) -> Users {
        self.users.lock().await.clone()
    }

    pub async fn upsert(&self, user_id: &str, record: UserRecord) -> Result<(), StoreError> {
        self.update(|users| {
            users.insert(user_id.to_owned(), record);
        })
        .await
    }

    /// 在锁内对整个快照应用修改并写回，快照没有变化时不会写盘
    pub async fn update<T>(&self, transform: impl FnOnce(&mut Users) -> T) -> Result<T, StoreError> {
        let mut users = self.users.lock().await;
        let mut next = users.clone();
        let res = transform(&mut next);
        if next != *users {
            save(&self.path, &next).await?;
            *users = next;
        }
        Ok(res)
    }

    /// 修改单个用户，用户不存在时返回 None 且不做任何修改
    pub async fn update_user<T>(
        &self,
        user_id: &str,
        transform: impl FnOnce(&mut UserRecord) -> T,
    ) -> Result<Option<T>, StoreError> {
        self.update(|users| users.get_mut(user_id).map(transform)).await
    }
}

pub async fn load(path: &Path) -> Result<Users, StoreError> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Users::new()),
        Err(source) => {
            return Err(StoreError::Read {
                path: path.to_owned(),
                source,
            });
        }
    };
    if content.trim().is_empty() {
        return Ok(Users::new());
    }
    Ok(serde_json::from_str(&content)?)
}

/// 先写入同目录下的临时文件再重命名，保证快照要么是旧的要么是新的
pub async fn save(path: &Path, users: &Users) -> Result<(), StoreError> {
    let content = serde_json::to_vec_pretty(users)?;
    let mut tmp_path = path.as_os_str().to_owned();
    tmp_path.push(".tmp");
    let tmp_path = PathBuf::from(tmp_path);
    let write_err = |source| StoreError::Write {
        path: path.to_owned(),
        source,
    };
    fs::write(&tmp_path, content).await.map_err(write_err)?;
    fs::rename(&tmp_path, path).await.map_err(write_err)
}
