use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error body shape returned by the remote record and asset stores.
/// Fields beyond `message` are advisory and frequently absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

impl StoreErrorBody {
    pub fn message_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.message.as_deref().unwrap_or(fallback)
    }
}

/// A non-success response from a remote collaborator, normalized at
/// the adapter boundary.
#[derive(Debug, Error)]
#[error("remote call failed with status {status}: {message}")]
pub struct RemoteError {
    pub status: u16,
    pub message: String,
}

impl RemoteError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}
