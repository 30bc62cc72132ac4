use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::backend::{Backend, BackendId};
use super::operation::{OperationKind, OperationMix};

pub const DEFAULT_NAMESPACE: &str = "stress_test";
pub const DEFAULT_POPULATION_BATCH_SIZE: u32 = 1000;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorkloadConfigError {
    #[error("at least one backend is required")]
    NoBackends,
    #[error("backend {0} is configured more than once")]
    DuplicateBackend(BackendId),
    #[error("workers per backend must be at least 1")]
    NoWorkers,
    #[error("operations per worker must be at least 1")]
    NoOperations,
    #[error("rows per insert must be at least 1")]
    EmptyInsertBatch,
    #[error("population batch size must be at least 1")]
    EmptyPopulationBatch,
    #[error("operation mix has no enabled kind")]
    EmptyMix,
    #[error("delay range is inverted: min {min:?} > max {max:?}")]
    InvertedDelay { min: Duration, max: Duration },
    #[error("delay must be a finite non-negative number of seconds, got {0}")]
    InvalidDelay(f64),
    #[error("namespace cannot be empty")]
    EmptyNamespace,
}

/// Inclusive range the inter-operation sleep is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    min: Duration,
    max: Duration,
}

impl DelayRange {
    pub const ZERO: Self = Self {
        min: Duration::ZERO,
        max: Duration::ZERO,
    };

    pub fn new(min: Duration, max: Duration) -> Result<Self, WorkloadConfigError> {
        if min > max {
            return Err(WorkloadConfigError::InvertedDelay { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn from_millis(min_ms: u64, max_ms: u64) -> Result<Self, WorkloadConfigError> {
        Self::new(Duration::from_millis(min_ms), Duration::from_millis(max_ms))
    }

    pub fn from_secs_f64(min: f64, max: f64) -> Result<Self, WorkloadConfigError> {
        let to_duration = |secs: f64| {
            Duration::try_from_secs_f64(secs).map_err(|_| WorkloadConfigError::InvalidDelay(secs))
        };
        Self::new(to_duration(min)?, to_duration(max)?)
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    pub fn is_zero(&self) -> bool {
        self.max.is_zero()
    }
}

/// What the throughput figure counts per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThroughputBasis {
    Rows,
    Operations,
}

impl ThroughputBasis {
    pub fn unit(self) -> &'static str {
        match self {
            Self::Rows => "rows/sec",
            Self::Operations => "ops/sec",
        }
    }
}

/// Immutable description of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadConfig {
    pub backends: Vec<Backend>,
    pub workers_per_backend: u16,
    pub operations_per_worker: u32,
    pub rows_per_insert: u32,
    pub delay: DelayRange,
    pub mix: OperationMix,
    pub prepopulate_rows: u64,
    pub population_batch_size: u32,
    pub seed: Option<u64>,
    pub operation_timeout: Option<Duration>,
    pub namespace: String,
    pub drop_table_on_teardown: bool,
}

impl WorkloadConfig {
    pub fn new(backends: Vec<Backend>, mix: OperationMix) -> Self {
        Self {
            backends,
            workers_per_backend: 3,
            operations_per_worker: 5,
            rows_per_insert: 50,
            delay: DelayRange::ZERO,
            mix,
            prepopulate_rows: 0,
            population_batch_size: DEFAULT_POPULATION_BATCH_SIZE,
            seed: None,
            operation_timeout: None,
            namespace: DEFAULT_NAMESPACE.to_string(),
            drop_table_on_teardown: false,
        }
    }

    pub fn validate(&self) -> Result<(), WorkloadConfigError> {
        if self.backends.is_empty() {
            return Err(WorkloadConfigError::NoBackends);
        }
        let mut seen = HashSet::new();
        for backend in &self.backends {
            if !seen.insert(&backend.id) {
                return Err(WorkloadConfigError::DuplicateBackend(backend.id.clone()));
            }
        }
        if self.workers_per_backend == 0 {
            return Err(WorkloadConfigError::NoWorkers);
        }
        if self.operations_per_worker == 0 {
            return Err(WorkloadConfigError::NoOperations);
        }
        if self.rows_per_insert == 0 {
            return Err(WorkloadConfigError::EmptyInsertBatch);
        }
        if self.population_batch_size == 0 {
            return Err(WorkloadConfigError::EmptyPopulationBatch);
        }
        if self.mix.total_weight() == 0 {
            return Err(WorkloadConfigError::EmptyMix);
        }
        if self.namespace.trim().is_empty() {
            return Err(WorkloadConfigError::EmptyNamespace);
        }
        Ok(())
    }

    pub fn total_workers(&self) -> usize {
        self.backends.len() * usize::from(self.workers_per_backend)
    }

    pub fn expected_operations_per_backend(&self) -> u64 {
        u64::from(self.workers_per_backend) * u64::from(self.operations_per_worker)
    }

    /// Insert-only runs measure rows per second, everything else operations per second.
    pub fn throughput_basis(&self) -> ThroughputBasis {
        match self.mix.single_kind() {
            Some(OperationKind::Insert) => ThroughputBasis::Rows,
            _ => ThroughputBasis::Operations,
        }
    }

    /// Prefix of the generated table name, e.g. `update_stress`.
    pub fn table_prefix(&self) -> String {
        format!("{}_stress", self.mix.label())
    }
}
