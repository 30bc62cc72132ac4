pub mod fixtures;

use std::sync::Arc;
use std::time::Duration;

use tablestress::app::testing::{FakeBehavior, FakeConnector};
use tablestress::app::{HarnessRun, run_harness};
use tablestress::domain::WorkloadConfig;

pub const LATENCY: Duration = Duration::from_millis(100);

/// Connector where every named backend answers after [`LATENCY`].
pub fn healthy(backends: &[&str], rows: u64) -> FakeConnector {
    backends.iter().fold(FakeConnector::new(), |connector, id| {
        connector.with(id, FakeBehavior::succeed(LATENCY, rows))
    })
}

pub async fn run(connector: &FakeConnector, config: WorkloadConfig) -> HarnessRun {
    run_harness(Arc::new(connector.clone()), config)
        .await
        .expect("setup should succeed")
}
