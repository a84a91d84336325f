use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Sync error: {0}")]
    Sync(#[from] funtodo_core::SyncError),

    #[error("Date parsing error: {0}")]
    DateParse(#[from] chrono::ParseError),

    #[error("Failed to acquire lock: {0}")]
    LockError(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        let detail = if err.is_timeout() {
            format!("request timed out: {err}")
        } else {
            err.to_string()
        };
        ClientError::Sync(funtodo_core::SyncError::Network(detail))
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
