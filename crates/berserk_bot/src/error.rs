use thiserror::Error;

use crate::{model::user::TimeParseError, store::StoreError};

#[derive(Error, Debug)]
pub enum CheckInError {
    #[error(transparent)]
    Validation(#[from] TimeParseError),
    #[error("Unknown user {0}")]
    UnknownUser(String),
    #[error("User {0} already checked in today")]
    DuplicateResponse(String),
    #[error("Failed to deliver message to {user_id}: {source:?}")]
    Delivery { user_id: i64, source: anyhow::Error },
    #[error(transparent)]
    Persistence(#[from] StoreError),
}

impl CheckInError {
    /// 只有存储失败需要向上传递，其余情况都已经在本地处理完毕
    pub fn into_result(self) -> anyhow::Result<()> {
        match self {
            Self::Persistence(e) => Err(e.into()),
            Self::Delivery { user_id, source } => {
                warn!("Failed to deliver message to {user_id}: {source:?}");
                Ok(())
            }
            e => {
                debug!("{e}");
                Ok(())
            }
        }
    }
}
