use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::backend::BackendId;
use super::outcome::{Outcome, WorkerId};
use super::statement::TableRef;
use super::workload::ThroughputBasis;

/// Unique identifier for one harness run
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(String);

impl RunId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A worker task that died outside its own per-operation recovery.
/// Its outcomes are missing from the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerFault {
    pub worker: WorkerId,
    pub message: String,
}

/// Every outcome of a run plus the run's wall-clock span.
/// Built once by the coordinator after all workers joined.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub run_id: RunId,
    pub table: TableRef,
    pub outcomes: Vec<Outcome>,
    pub wall_clock: Duration,
    /// Configured operation count per backend.
    pub expected_operations: BTreeMap<BackendId, u64>,
    pub throughput_basis: ThroughputBasis,
    pub worker_faults: Vec<WorkerFault>,
}

impl RunResult {
    pub fn has_faults(&self) -> bool {
        !self.worker_faults.is_empty()
    }

    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_generates_unique_ids() {
        assert_ne!(RunId::new(), RunId::new());
    }

    #[test]
    fn from_string_preserves_value() {
        let id = RunId::from_string("run-1");
        assert_eq!(id.as_str(), "run-1");
        assert_eq!(id.to_string(), "run-1");
    }
}
