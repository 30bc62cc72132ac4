// Application layer: workload orchestration over the backend ports.

pub use tablestress_domain as domain;

pub mod aggregator;
pub mod coordinator;
pub mod executor;
pub mod generator;
pub mod harness;
pub mod ports;
pub mod worker;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use aggregator::aggregate;
pub use coordinator::{Coordinator, Environment, SetupError, SetupStep};
pub use executor::OperationExecutor;
pub use generator::StatementGenerator;
pub use harness::{HarnessRun, ProbeResult, check_backends, run_harness};
pub use worker::{Worker, WorkerReport, WorkerState};
