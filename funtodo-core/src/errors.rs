use thiserror::Error;

/// Failures talking to the task server. Callers treat every variant as
/// "server unavailable"; none of them is fatal to local operation.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Server returned status {0}")]
    Status(u16),
}
