//! Harness error types
//!
//! No step in the run is retried: the first failure aborts the sequence and
//! propagates out of `main` as a non-zero exit.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("Navigation to {url} did not reach network-idle within {timeout:?}")]
    NavigationTimeout { url: String, timeout: Duration },

    #[error("Element not ready: {what} (waited {timeout:?})")]
    ElementTimeout { what: String, timeout: Duration },

    #[error("Control not found on page: {0}")]
    ElementNotFound(String),

    #[error("Response did not complete within {0:?}")]
    ResponseTimeout(Duration),

    #[error("Browser operation failed: {0}")]
    Browser(String),

    #[error("Artifact write failed: {0}")]
    Io(#[from] std::io::Error),
}

impl From<chromiumoxide::error::CdpError> for HarnessError {
    fn from(e: chromiumoxide::error::CdpError) -> Self {
        HarnessError::Browser(e.to_string())
    }
}
