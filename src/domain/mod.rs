pub mod backend;
pub mod operation;
pub mod outcome;
pub mod report;
pub mod run;
pub mod statement;
pub mod workload;

pub use backend::{Backend, BackendId, BackendIdError};
pub use operation::{OperationKind, OperationMix};
pub use outcome::{Failure, FailureOrigin, Outcome, OutcomeStatus, WorkerId};
pub use report::{BackendStats, DurationStats, KindStats, RankEntry, Rankings, RunReport};
pub use run::{RunId, RunResult, WorkerFault};
pub use statement::{
    Assignment, ColumnType, PARTITION_COLUMN, Predicate, STRESS_COLUMNS, SelectShape, Statement,
    StressRow, TableRef,
};
pub use workload::{DelayRange, ThroughputBasis, WorkloadConfig, WorkloadConfigError};
