//! Unified error handling for corvid.
//!
//! Library-facing failures get their own thiserror enums here; the
//! binary boundary (`main`, plugin and job callbacks) uses `anyhow`.

use thiserror::Error;

/// Errors raised while establishing the connection.
///
/// A connect failure is fatal to that attempt only; the reconnect loop
/// in `main` decides whether to try again.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid server name: {0}")]
    InvalidServerName(String),

    #[error("tls error: {0}")]
    Tls(#[from] tokio_rustls::rustls::Error),
}

/// Scheduler misuse, returned to the caller.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("job already exists: {0}")]
    DuplicateJob(String),

    #[error("no such job: {0}")]
    UnknownJob(String),
}
