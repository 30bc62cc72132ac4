use serde::Serialize;

use super::backend::BackendId;
use super::operation::OperationKind;
use super::run::{RunId, WorkerFault};
use super::workload::ThroughputBasis;

/// Duration distribution of successful operations, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DurationStats {
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub std_dev: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KindStats {
    pub kind: OperationKind,
    pub total: u64,
    pub succeeded: u64,
    pub mean_duration: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendStats {
    pub backend: BackendId,
    pub expected_operations: u64,
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Percentage in `0.0..=100.0`.
    pub success_rate: f64,
    pub rows_affected: u64,
    pub durations: Option<DurationStats>,
    pub throughput: f64,
    pub by_kind: Vec<KindStats>,
    /// Up to three distinct error messages, earliest first.
    pub failure_preview: Vec<String>,
    pub distinct_failures: usize,
}

impl BackendStats {
    pub fn failure_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.failed as f64 / self.total as f64 * 100.0
        }
    }

    /// Whether every configured operation produced an outcome.
    pub fn is_complete(&self) -> bool {
        self.total == self.expected_operations
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankEntry {
    pub backend: BackendId,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Rankings {
    /// Mean duration ascending; backends without successes are left out.
    pub fastest: Vec<RankEntry>,
    /// Throughput descending.
    pub throughput: Vec<RankEntry>,
    /// Success rate descending.
    pub reliability: Vec<RankEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub table: String,
    pub wall_clock_secs: f64,
    pub throughput_basis: ThroughputBasis,
    pub total_operations: u64,
    pub succeeded: u64,
    pub backends: Vec<BackendStats>,
    pub rankings: Rankings,
    pub worker_faults: Vec<WorkerFault>,
}

impl RunReport {
    pub fn backend(&self, id: &str) -> Option<&BackendStats> {
        self.backends.iter().find(|b| b.backend.as_str() == id)
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_operations == 0 {
            0.0
        } else {
            self.succeeded as f64 / self.total_operations as f64 * 100.0
        }
    }
}
