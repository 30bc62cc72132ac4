use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use crate::aggregator::aggregate;
use crate::coordinator::{Coordinator, SetupError};
use crate::domain::{Backend, BackendId, RunReport, RunResult, Statement, WorkloadConfig};
use crate::ports::{BackendConnector, BackendError};

/// Raw outcomes and their summary for one completed run.
#[derive(Debug, Clone)]
pub struct HarnessRun {
    pub result: RunResult,
    pub report: RunReport,
}

/// Setup, timed phase, aggregation and teardown for one workload.
///
/// Only setup failures abort; everything after the environment is ready ends
/// in a report.
pub async fn run_harness(
    connector: Arc<dyn BackendConnector>,
    config: WorkloadConfig,
) -> Result<HarnessRun, SetupError> {
    let coordinator = Coordinator::new(connector, config);
    let mut env = coordinator.setup().await?;

    let result = coordinator.run(&mut env).await;
    let report = aggregate(&result);

    coordinator.teardown(env).await;
    info!(
        run_id = %report.run_id,
        operations = report.total_operations,
        succeeded = report.succeeded,
        "run complete"
    );

    Ok(HarnessRun { result, report })
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub backend: BackendId,
    pub outcome: Result<Duration, BackendError>,
}

impl ProbeResult {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Connects to each backend in turn and runs a trivial query.
pub async fn check_backends(
    connector: &dyn BackendConnector,
    backends: &[Backend],
) -> Vec<ProbeResult> {
    let mut results = Vec::with_capacity(backends.len());
    for backend in backends {
        let start = Instant::now();
        let outcome = match connector.connect(backend).await {
            Ok(mut handle) => {
                let probed = handle.execute(&Statement::Probe).await.map(|_| start.elapsed());
                if let Err(e) = handle.close().await {
                    warn!(backend = %backend.id, error = %e, "error closing probe handle");
                }
                probed
            }
            Err(e) => Err(e),
        };
        match &outcome {
            Ok(elapsed) => info!(backend = %backend.id, ?elapsed, "backend reachable"),
            Err(e) => warn!(backend = %backend.id, error = %e, "backend unreachable"),
        }
        results.push(ProbeResult {
            backend: backend.id.clone(),
            outcome,
        });
    }
    results
}
