use thiserror::Error;

use crate::schema::ResponseBody;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid Response Type: {0:?}")]
    ResponseTypeError(ResponseBody),
    #[error("Empty response for {0}")]
    EmptyResponse(&'static str),
    #[error("Telegram error {code}: {description}")]
    Telegram { code: i64, description: String },
}
