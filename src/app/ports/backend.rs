use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Backend, Statement};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Query failed: {0}")]
    QueryFailed(String),
    #[error("Command not found: {0}")]
    CommandNotFound(String),
    #[error("Unexpected output: {0}")]
    UnexpectedOutput(String),
    #[error("Operation timed out")]
    Timeout,
}

/// An open connection to one backend.
///
/// Handles are not assumed to tolerate concurrent use: every caller gets its
/// own handle and drives it through `&mut self`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BackendHandle: Send {
    /// Executes one statement and returns the rows the backend reports as
    /// affected (rows returned, for reads).
    async fn execute(&mut self, statement: &Statement) -> Result<u64, BackendError>;

    /// Whether writes need an explicit `commit` to become durable.
    fn requires_commit(&self) -> bool {
        false
    }

    async fn commit(&mut self) -> Result<(), BackendError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        Ok(())
    }
}

#[async_trait]
pub trait BackendConnector: Send + Sync {
    async fn connect(&self, backend: &Backend) -> Result<Box<dyn BackendHandle>, BackendError>;
}
