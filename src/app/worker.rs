use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, SystemTime};

use futures::FutureExt;
use rand::Rng;
use rand::rngs::StdRng;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::domain::{DelayRange, FailureOrigin, OperationKind, Outcome, WorkerId, WorkloadConfig};
use crate::executor::OperationExecutor;
use crate::generator::StatementGenerator;
use crate::ports::BackendHandle;

/// Message prefix of outcomes synthesized after a panic inside one iteration.
pub const WORKER_LOOP_PANIC: &str = "worker loop panic";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    NotStarted,
    Running,
    Completed,
    CompletedWithFailures,
}

/// What a finished worker hands back to the coordinator.
pub struct WorkerReport {
    pub worker: WorkerId,
    pub state: WorkerState,
    pub outcomes: Vec<Outcome>,
    pub handle: Box<dyn BackendHandle>,
}

/// One sequential operation stream bound to one backend handle.
///
/// Runs its full operation count regardless of failures so totals stay
/// comparable across backends.
pub struct Worker {
    id: WorkerId,
    handle: Box<dyn BackendHandle>,
    generator: StatementGenerator,
    executor: OperationExecutor,
    operations: u32,
    delay: DelayRange,
    state: WorkerState,
}

impl Worker {
    pub fn new(
        id: WorkerId,
        handle: Box<dyn BackendHandle>,
        generator: StatementGenerator,
        config: &WorkloadConfig,
    ) -> Self {
        Self {
            id,
            handle,
            generator,
            executor: OperationExecutor::new(config.operation_timeout),
            operations: config.operations_per_worker,
            delay: config.delay,
            state: WorkerState::NotStarted,
        }
    }

    pub fn id(&self) -> &WorkerId {
        &self.id
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub async fn run(mut self) -> WorkerReport {
        self.state = WorkerState::Running;
        info!(worker = %self.id, operations = self.operations, "worker started");

        let mut outcomes = Vec::with_capacity(self.operations as usize);
        for sequence in 0..self.operations {
            let kind = self.generator.next_kind();
            let started_at = SystemTime::now();
            let start = Instant::now();
            let outcome = match AssertUnwindSafe(self.step(kind, sequence))
                .catch_unwind()
                .await
            {
                Ok(outcome) => outcome,
                Err(payload) => {
                    let message = format!("{}: {}", WORKER_LOOP_PANIC, panic_message(&*payload));
                    error!(worker = %self.id, sequence, %message, "iteration panicked");
                    Outcome::failed(
                        &self.id,
                        kind,
                        sequence,
                        started_at,
                        start.elapsed(),
                        message,
                        FailureOrigin::WorkerLoop,
                    )
                }
            };

            log_outcome(&outcome, self.operations);
            outcomes.push(outcome);

            if sequence + 1 < self.operations {
                let pause = sample_delay(self.generator.rng(), self.delay);
                if !pause.is_zero() {
                    tokio::time::sleep(pause).await;
                }
            }
        }

        let failures = outcomes.iter().filter(|o| !o.is_success()).count();
        self.state = if failures == 0 {
            WorkerState::Completed
        } else {
            WorkerState::CompletedWithFailures
        };
        info!(
            worker = %self.id,
            operations = outcomes.len(),
            failures,
            state = ?self.state,
            "worker finished"
        );

        WorkerReport {
            worker: self.id,
            state: self.state,
            outcomes,
            handle: self.handle,
        }
    }

    async fn step(&mut self, kind: OperationKind, sequence: u32) -> Outcome {
        let statement = self.generator.statement(kind, sequence);
        self.executor
            .execute(self.handle.as_mut(), &self.id, sequence, kind, &statement)
            .await
    }
}

fn log_outcome(outcome: &Outcome, total: u32) {
    let position = outcome.sequence + 1;
    match outcome.error() {
        None => debug!(
            worker = %outcome.worker,
            kind = %outcome.kind,
            "operation {}/{} completed in {:.2}s, {} rows",
            position,
            total,
            outcome.duration.as_secs_f64(),
            outcome.rows_affected()
        ),
        Some(error) => warn!(
            worker = %outcome.worker,
            kind = %outcome.kind,
            "operation {}/{} failed: {}",
            position,
            total,
            error
        ),
    }
}

/// Uniform draw from the inclusive delay range.
pub fn sample_delay(rng: &mut StdRng, range: DelayRange) -> Duration {
    if range.min() == range.max() {
        return range.min();
    }
    let to_nanos = |d: Duration| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX);
    Duration::from_nanos(rng.gen_range(to_nanos(range.min())..=to_nanos(range.max())))
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
