use std::time::{Duration, SystemTime};

use tokio::time::Instant;

use crate::domain::{FailureOrigin, OperationKind, Outcome, Statement, WorkerId};
use crate::ports::{BackendError, BackendHandle};

/// Runs one statement against one handle and turns whatever happens into an
/// [`Outcome`]. Never retries.
#[derive(Debug, Clone, Copy, Default)]
pub struct OperationExecutor {
    timeout: Option<Duration>,
}

impl OperationExecutor {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    pub async fn execute(
        &self,
        handle: &mut dyn BackendHandle,
        worker: &WorkerId,
        sequence: u32,
        kind: OperationKind,
        statement: &Statement,
    ) -> Outcome {
        let started_at = SystemTime::now();
        let start = Instant::now();

        let result = match self.timeout {
            Some(limit) => {
                match tokio::time::timeout(limit, run_durably(handle, kind, statement)).await {
                    Ok(result) => result.map_err(classify),
                    Err(_) => Err((
                        format!("operation timed out after {:?}", limit),
                        FailureOrigin::Timeout,
                    )),
                }
            }
            None => run_durably(handle, kind, statement).await.map_err(classify),
        };

        let duration = start.elapsed();

        match result {
            Ok(rows_affected) => {
                Outcome::succeeded(worker, kind, sequence, started_at, duration, rows_affected)
            }
            Err((message, origin)) => Outcome::failed(
                worker, kind, sequence, started_at, duration, message, origin,
            ),
        }
    }
}

/// Timing covers the commit, so writes are measured up to durability.
async fn run_durably(
    handle: &mut dyn BackendHandle,
    kind: OperationKind,
    statement: &Statement,
) -> Result<u64, BackendError> {
    let rows = handle.execute(statement).await?;
    if kind.is_mutating() && handle.requires_commit() {
        handle.commit().await?;
    }
    Ok(rows)
}

fn classify(error: BackendError) -> (String, FailureOrigin) {
    let origin = match error {
        BackendError::Timeout => FailureOrigin::Timeout,
        _ => FailureOrigin::Backend,
    };
    (error.to_string(), origin)
}
