use std::fmt;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use super::backend::BackendId;
use super::operation::OperationKind;

/// A worker slot: one sequential operation stream bound to one backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkerId {
    pub backend: BackendId,
    pub slot: u16,
}

impl WorkerId {
    pub fn new(backend: BackendId, slot: u16) -> Self {
        Self { backend, slot }
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-W{}", self.backend, self.slot)
    }
}

/// Where a failed outcome was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureOrigin {
    /// The backend rejected or failed the statement.
    Backend,
    /// The per-operation deadline elapsed before the backend answered.
    Timeout,
    /// The worker loop caught a panic outside the executor's own recovery.
    WorkerLoop,
}

impl FailureOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Backend => "backend",
            Self::Timeout => "timeout",
            Self::WorkerLoop => "worker-loop",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub message: String,
    pub origin: FailureOrigin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeStatus {
    Succeeded { rows_affected: u64 },
    Failed(Failure),
}

/// Immutable record of one dispatched operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub backend: BackendId,
    pub kind: OperationKind,
    pub worker: WorkerId,
    /// Position of the operation within its worker's stream.
    pub sequence: u32,
    pub started_at: SystemTime,
    pub duration: Duration,
    pub status: OutcomeStatus,
}

impl Outcome {
    pub fn succeeded(
        worker: &WorkerId,
        kind: OperationKind,
        sequence: u32,
        started_at: SystemTime,
        duration: Duration,
        rows_affected: u64,
    ) -> Self {
        Self {
            backend: worker.backend.clone(),
            kind,
            worker: worker.clone(),
            sequence,
            started_at,
            duration,
            status: OutcomeStatus::Succeeded { rows_affected },
        }
    }

    pub fn failed(
        worker: &WorkerId,
        kind: OperationKind,
        sequence: u32,
        started_at: SystemTime,
        duration: Duration,
        message: impl Into<String>,
        origin: FailureOrigin,
    ) -> Self {
        Self {
            backend: worker.backend.clone(),
            kind,
            worker: worker.clone(),
            sequence,
            started_at,
            duration,
            status: OutcomeStatus::Failed(Failure {
                message: message.into(),
                origin,
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, OutcomeStatus::Succeeded { .. })
    }

    /// Rows reported by the backend; zero for failures.
    pub fn rows_affected(&self) -> u64 {
        match self.status {
            OutcomeStatus::Succeeded { rows_affected } => rows_affected,
            OutcomeStatus::Failed(_) => 0,
        }
    }

    pub fn failure(&self) -> Option<&Failure> {
        match &self.status {
            OutcomeStatus::Succeeded { .. } => None,
            OutcomeStatus::Failed(failure) => Some(failure),
        }
    }

    pub fn error(&self) -> Option<&str> {
        self.failure().map(|f| f.message.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worker() -> WorkerId {
        WorkerId::new(BackendId::new("iceberg_hms").unwrap(), 2)
    }

    #[test]
    fn worker_id_display_includes_backend_and_slot() {
        assert_eq!(worker().to_string(), "iceberg_hms-W2");
    }

    mod succeeded {
        use super::*;

        #[test]
        fn carries_rows_and_no_error() {
            let outcome = Outcome::succeeded(
                &worker(),
                OperationKind::Insert,
                0,
                SystemTime::UNIX_EPOCH,
                Duration::from_millis(5),
                30,
            );
            assert!(outcome.is_success());
            assert_eq!(outcome.rows_affected(), 30);
            assert_eq!(outcome.error(), None);
            assert_eq!(outcome.backend.as_str(), "iceberg_hms");
        }
    }

    mod failed {
        use super::*;

        #[test]
        fn carries_error_and_zero_rows() {
            let outcome = Outcome::failed(
                &worker(),
                OperationKind::Delete,
                4,
                SystemTime::UNIX_EPOCH,
                Duration::ZERO,
                "timeout",
                FailureOrigin::Backend,
            );
            assert!(!outcome.is_success());
            assert_eq!(outcome.rows_affected(), 0);
            assert_eq!(outcome.error(), Some("timeout"));
            assert_eq!(outcome.failure().unwrap().origin, FailureOrigin::Backend);
        }
    }
}
