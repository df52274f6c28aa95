use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("Unexpected http status: {0}")]
    Status(reqwest::StatusCode),
    #[error("Local photo can't be sent as json: {0}")]
    LocalFile(String),
}
