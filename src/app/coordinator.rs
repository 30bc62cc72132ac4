use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use futures::FutureExt;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::domain::{
    Backend, BackendId, RunId, RunResult, Statement, TableRef, WorkerFault, WorkerId,
    WorkloadConfig, WorkloadConfigError,
};
use crate::generator::{StatementGenerator, population_batches};
use crate::ports::{BackendConnector, BackendError, BackendHandle};
use crate::worker::{Worker, WorkerReport, panic_message};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStep {
    Connect,
    CreateNamespace,
    CreateTable,
    Populate { batch: usize },
}

impl fmt::Display for SetupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "connect"),
            Self::CreateNamespace => write!(f, "create namespace"),
            Self::CreateTable => write!(f, "create table"),
            Self::Populate { batch } => write!(f, "populate batch {}", batch + 1),
        }
    }
}

/// Fatal problems before the timed phase. Nothing has been measured yet.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("invalid workload: {0}")]
    InvalidConfig(#[from] WorkloadConfigError),
    #[error("{backend}: {step} failed: {source}")]
    Step {
        backend: BackendId,
        step: SetupStep,
        #[source]
        source: BackendError,
    },
}

struct BackendSession {
    backend: Backend,
    control: Box<dyn BackendHandle>,
    workers: Vec<Box<dyn BackendHandle>>,
}

/// Prepared backends for one run: the stress table exists on every backend
/// and each worker slot has its own open handle.
pub struct Environment {
    run_id: RunId,
    table: TableRef,
    sessions: Vec<BackendSession>,
}

impl Environment {
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }
}

type GuardedReport = Result<WorkerReport, WorkerFault>;

pub struct Coordinator {
    connector: Arc<dyn BackendConnector>,
    config: Arc<WorkloadConfig>,
}

impl Coordinator {
    pub fn new(connector: Arc<dyn BackendConnector>, config: WorkloadConfig) -> Self {
        Self {
            connector,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &WorkloadConfig {
        &self.config
    }

    pub async fn setup(&self) -> Result<Environment, SetupError> {
        self.config.validate()?;

        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let table = TableRef::new(
            self.config.namespace.clone(),
            format!("{}_{}", self.config.table_prefix(), suffix),
        );
        let mut env = Environment {
            run_id: RunId::new(),
            table,
            sessions: Vec::with_capacity(self.config.backends.len()),
        };

        for backend in &self.config.backends {
            match self.prepare_backend(backend, &env.table).await {
                Ok(session) => env.sessions.push(session),
                Err(e) => {
                    error!(backend = %backend.id, error = %e, "setup failed, aborting run");
                    self.close_sessions(env.sessions).await;
                    return Err(e);
                }
            }
        }

        info!(
            run_id = %env.run_id,
            table = %env.table,
            backends = env.sessions.len(),
            "environment ready"
        );
        Ok(env)
    }

    async fn prepare_backend(
        &self,
        backend: &Backend,
        table: &TableRef,
    ) -> Result<BackendSession, SetupError> {
        let mut control = self
            .connector
            .connect(backend)
            .await
            .map_err(step_error(backend, SetupStep::Connect))?;

        let mut workers = Vec::with_capacity(usize::from(self.config.workers_per_backend));
        match self
            .provision(backend, table, control.as_mut(), &mut workers)
            .await
        {
            Ok(()) => Ok(BackendSession {
                backend: backend.clone(),
                control,
                workers,
            }),
            Err(e) => {
                close_handles(&backend.id, std::iter::once(control).chain(workers)).await;
                Err(e)
            }
        }
    }

    /// Creates the stress table through `control` and opens the worker handles.
    /// Handles opened before a failure are left in `workers` for the caller to close.
    async fn provision(
        &self,
        backend: &Backend,
        table: &TableRef,
        control: &mut dyn BackendHandle,
        workers: &mut Vec<Box<dyn BackendHandle>>,
    ) -> Result<(), SetupError> {
        let create_namespace = Statement::CreateNamespace {
            namespace: table.namespace.clone(),
        };
        control
            .execute(&create_namespace)
            .await
            .map_err(step_error(backend, SetupStep::CreateNamespace))?;
        info!(backend = %backend.id, namespace = %table.namespace, "namespace ready");

        // Absence of the table is the usual case; the drop result does not matter.
        if let Err(e) = control
            .execute(&Statement::DropTable {
                table: table.clone(),
            })
            .await
        {
            debug!(backend = %backend.id, error = %e, "no stale table dropped");
        }

        control
            .execute(&Statement::CreateTable {
                table: table.clone(),
            })
            .await
            .map_err(step_error(backend, SetupStep::CreateTable))?;
        info!(backend = %backend.id, table = %table, "table created");

        if self.config.prepopulate_rows > 0 {
            let batches = population_batches(
                table,
                self.config.prepopulate_rows,
                self.config.population_batch_size,
                self.config.seed,
            );
            let count = batches.len();
            for (batch, statement) in batches.iter().enumerate() {
                control
                    .execute(statement)
                    .await
                    .map_err(step_error(backend, SetupStep::Populate { batch }))?;
                debug!(backend = %backend.id, "populated batch {}/{}", batch + 1, count);
            }
            info!(
                backend = %backend.id,
                rows = self.config.prepopulate_rows,
                "initial data populated"
            );
        }

        for _ in 0..self.config.workers_per_backend {
            workers.push(
                self.connector
                    .connect(backend)
                    .await
                    .map_err(step_error(backend, SetupStep::Connect))?,
            );
        }
        Ok(())
    }

    /// Runs every worker concurrently and waits for all of them.
    pub async fn run(&self, env: &mut Environment) -> RunResult {
        let mut set: JoinSet<GuardedReport> = JoinSet::new();
        let mut spawned = BTreeSet::new();
        let mut worker_index = 0_u64;

        info!(
            workers = self.config.total_workers(),
            operations_per_worker = self.config.operations_per_worker,
            "starting workers"
        );
        let start = Instant::now();

        for session in &mut env.sessions {
            for (slot, handle) in session.workers.drain(..).enumerate() {
                let id = WorkerId::new(session.backend.id.clone(), slot as u16 + 1);
                let generator =
                    StatementGenerator::new(env.table.clone(), &id, worker_index, &self.config);
                let worker = Worker::new(id.clone(), handle, generator, &self.config);
                spawned.insert(id.clone());
                spawn_guarded(&mut set, id, worker.run());
                worker_index += 1;
            }
        }

        let (reports, worker_faults) = join_workers(set, spawned).await;
        let wall_clock = start.elapsed();

        let mut outcomes = Vec::new();
        for report in reports {
            outcomes.extend(report.outcomes);
            if let Some(session) = env
                .sessions
                .iter_mut()
                .find(|s| s.backend.id == report.worker.backend)
            {
                session.workers.push(report.handle);
            }
        }

        let expected_operations: BTreeMap<BackendId, u64> = self
            .config
            .backends
            .iter()
            .map(|b| (b.id.clone(), self.config.expected_operations_per_backend()))
            .collect();

        info!(
            outcomes = outcomes.len(),
            faults = worker_faults.len(),
            wall_clock_secs = wall_clock.as_secs_f64(),
            "all workers joined"
        );

        RunResult {
            run_id: env.run_id.clone(),
            table: env.table.clone(),
            outcomes,
            wall_clock,
            expected_operations,
            throughput_basis: self.config.throughput_basis(),
            worker_faults,
        }
    }

    /// Best-effort: failures are logged, never returned.
    pub async fn teardown(&self, mut env: Environment) {
        if self.config.drop_table_on_teardown {
            for session in env.sessions.iter_mut() {
                let drop = Statement::DropTable {
                    table: env.table.clone(),
                };
                match session.control.execute(&drop).await {
                    Ok(_) => info!(backend = %session.backend.id, table = %env.table, "table dropped"),
                    Err(e) => warn!(backend = %session.backend.id, error = %e, "could not drop table"),
                }
            }
        }
        self.close_sessions(env.sessions).await;
    }

    async fn close_sessions(&self, sessions: Vec<BackendSession>) {
        for session in sessions {
            let BackendSession {
                backend,
                control,
                workers,
            } = session;
            close_handles(&backend.id, std::iter::once(control).chain(workers)).await;
        }
    }
}

fn step_error(backend: &Backend, step: SetupStep) -> impl FnOnce(BackendError) -> SetupError {
    let backend = backend.id.clone();
    move |source| SetupError::Step {
        backend,
        step,
        source,
    }
}

async fn close_handles(
    backend: &BackendId,
    handles: impl IntoIterator<Item = Box<dyn BackendHandle>>,
) {
    for mut handle in handles {
        if let Err(e) = handle.close().await {
            warn!(backend = %backend, error = %e, "error closing backend handle");
        }
    }
    debug!(backend = %backend, "connections closed");
}

/// Spawns a worker future whose panic is converted into a [`WorkerFault`].
///
/// A panicking task unwinds with its backend handle, which is dropped without
/// `close()`; teardown only reaches handles returned in a [`WorkerReport`].
pub(crate) fn spawn_guarded<F>(set: &mut JoinSet<GuardedReport>, worker: WorkerId, run: F)
where
    F: Future<Output = WorkerReport> + Send + 'static,
{
    set.spawn(async move {
        AssertUnwindSafe(run)
            .catch_unwind()
            .await
            .map_err(|payload| WorkerFault {
                worker,
                message: panic_message(&*payload),
            })
    });
}

/// The single join barrier. Workers that never reported are turned into faults.
pub(crate) async fn join_workers(
    mut set: JoinSet<GuardedReport>,
    mut pending: BTreeSet<WorkerId>,
) -> (Vec<WorkerReport>, Vec<WorkerFault>) {
    let mut reports = Vec::with_capacity(pending.len());
    let mut faults = Vec::new();

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(Ok(report)) => {
                pending.remove(&report.worker);
                reports.push(report);
            }
            Ok(Err(fault)) => {
                error!(
                    harness_fault = true,
                    worker = %fault.worker,
                    message = %fault.message,
                    handle_closed = false,
                    "worker task failed, its outcomes are lost and its handle was dropped unclosed"
                );
                pending.remove(&fault.worker);
                faults.push(fault);
            }
            Err(join_error) => {
                error!(harness_fault = true, error = %join_error, "worker task could not be joined");
            }
        }
    }

    for worker in pending {
        error!(harness_fault = true, worker = %worker, "worker task ended without a report");
        faults.push(WorkerFault {
            worker,
            message: "worker task ended without a report".to_string(),
        });
    }

    (reports, faults)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OperationKind, OperationMix};
    use crate::worker::WorkerState;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Journal {
        statements: Mutex<Vec<(String, Statement)>>,
        closed: Mutex<usize>,
    }

    struct RecordingHandle {
        backend: String,
        journal: Arc<Journal>,
        fail_create_table: bool,
        fail_drop: bool,
    }

    #[async_trait]
    impl BackendHandle for RecordingHandle {
        async fn execute(&mut self, statement: &Statement) -> Result<u64, BackendError> {
            self.journal
                .statements
                .lock()
                .unwrap()
                .push((self.backend.clone(), statement.clone()));
            match statement {
                Statement::CreateTable { .. } if self.fail_create_table => {
                    Err(BackendError::QueryFailed("access denied".into()))
                }
                Statement::DropTable { .. } if self.fail_drop => {
                    Err(BackendError::QueryFailed("table does not exist".into()))
                }
                Statement::Insert { rows, .. } => Ok(rows.len() as u64),
                _ => Ok(1),
            }
        }

        async fn close(&mut self) -> Result<(), BackendError> {
            *self.journal.closed.lock().unwrap() += 1;
            Ok(())
        }
    }

    struct RecordingConnector {
        journal: Arc<Journal>,
        fail_create_table_on: Option<&'static str>,
        fail_drop: bool,
        refuse_connect_after: Option<usize>,
        connects: AtomicUsize,
    }

    impl RecordingConnector {
        fn new() -> Self {
            Self {
                journal: Arc::new(Journal::default()),
                fail_create_table_on: None,
                fail_drop: false,
                refuse_connect_after: None,
                connects: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl BackendConnector for RecordingConnector {
        async fn connect(&self, backend: &Backend) -> Result<Box<dyn BackendHandle>, BackendError> {
            let opened = self.connects.fetch_add(1, Ordering::SeqCst);
            if self.refuse_connect_after.is_some_and(|limit| opened >= limit) {
                return Err(BackendError::ConnectionFailed("too many clients".into()));
            }
            Ok(Box::new(RecordingHandle {
                backend: backend.id.to_string(),
                journal: Arc::clone(&self.journal),
                fail_create_table: self.fail_create_table_on == Some(backend.id.as_str()),
                fail_drop: self.fail_drop,
            }))
        }
    }

    fn config(ids: &[&str]) -> WorkloadConfig {
        let backends = ids
            .iter()
            .map(|id| Backend::named(BackendId::new(*id).unwrap()))
            .collect();
        let mut config = WorkloadConfig::new(backends, OperationMix::only(OperationKind::Update));
        config.workers_per_backend = 2;
        config.operations_per_worker = 3;
        config.seed = Some(1);
        config
    }

    fn statements_for(journal: &Journal, backend: &str) -> Vec<Statement> {
        journal
            .statements
            .lock()
            .unwrap()
            .iter()
            .filter(|(b, _)| b == backend)
            .map(|(_, s)| s.clone())
            .collect()
    }

    mod setup {
        use super::*;

        #[tokio::test]
        async fn runs_namespace_drop_create_in_order() {
            let connector = Arc::new(RecordingConnector::new());
            let journal = Arc::clone(&connector.journal);
            let coordinator = Coordinator::new(connector, config(&["A"]));

            let env = coordinator.setup().await.unwrap();

            let statements = statements_for(&journal, "A");
            assert!(matches!(statements[0], Statement::CreateNamespace { .. }));
            assert!(matches!(statements[1], Statement::DropTable { .. }));
            assert!(matches!(statements[2], Statement::CreateTable { .. }));
            assert_eq!(statements.len(), 3);
            assert!(env.table().name.starts_with("update_stress_"));
            assert_eq!(env.table().namespace, "stress_test");
        }

        #[tokio::test]
        async fn drop_failure_is_ignored() {
            let mut connector = RecordingConnector::new();
            connector.fail_drop = true;
            let coordinator = Coordinator::new(Arc::new(connector), config(&["A"]));

            assert!(coordinator.setup().await.is_ok());
        }

        #[tokio::test]
        async fn create_table_failure_is_fatal_and_closes_opened_handles() {
            let mut connector = RecordingConnector::new();
            connector.fail_create_table_on = Some("B");
            let journal = Arc::clone(&connector.journal);
            let coordinator = Coordinator::new(Arc::new(connector), config(&["A", "B"]));

            let err = coordinator.setup().await.err().unwrap();

            match err {
                SetupError::Step { backend, step, .. } => {
                    assert_eq!(backend.as_str(), "B");
                    assert_eq!(step, SetupStep::CreateTable);
                }
                other => panic!("unexpected error: {other}"),
            }
            // A's control and worker handles, then B's control handle.
            assert_eq!(*journal.closed.lock().unwrap(), 4);
        }

        #[tokio::test]
        async fn worker_connect_failure_closes_handles_opened_so_far() {
            let mut connector = RecordingConnector::new();
            // Control handle and first worker handle succeed, second worker is refused.
            connector.refuse_connect_after = Some(2);
            let journal = Arc::clone(&connector.journal);
            let coordinator = Coordinator::new(Arc::new(connector), config(&["A"]));

            let err = coordinator.setup().await.err().unwrap();

            assert!(matches!(
                err,
                SetupError::Step {
                    step: SetupStep::Connect,
                    ..
                }
            ));
            assert_eq!(*journal.closed.lock().unwrap(), 2);
        }

        #[tokio::test]
        async fn control_connect_failure_has_nothing_to_close() {
            let mut connector = RecordingConnector::new();
            connector.refuse_connect_after = Some(0);
            let journal = Arc::clone(&connector.journal);
            let coordinator = Coordinator::new(Arc::new(connector), config(&["A"]));

            assert!(coordinator.setup().await.is_err());
            assert_eq!(*journal.closed.lock().unwrap(), 0);
            assert!(journal.statements.lock().unwrap().is_empty());
        }

        #[tokio::test]
        async fn prepopulates_in_fixed_size_batches() {
            let connector = Arc::new(RecordingConnector::new());
            let journal = Arc::clone(&connector.journal);
            let mut config = config(&["A"]);
            config.prepopulate_rows = 2500;
            config.population_batch_size = 1000;
            let coordinator = Coordinator::new(connector, config);

            coordinator.setup().await.unwrap();

            let inserts = statements_for(&journal, "A")
                .into_iter()
                .filter(|s| matches!(s, Statement::Insert { .. }))
                .count();
            assert_eq!(inserts, 3);
        }

        #[tokio::test]
        async fn invalid_config_is_rejected_before_connecting() {
            let connector = Arc::new(RecordingConnector::new());
            let journal = Arc::clone(&connector.journal);
            let mut config = config(&["A"]);
            config.workers_per_backend = 0;
            let coordinator = Coordinator::new(connector, config);

            let err = coordinator.setup().await.err().unwrap();

            assert!(matches!(
                err,
                SetupError::InvalidConfig(WorkloadConfigError::NoWorkers)
            ));
            assert!(journal.statements.lock().unwrap().is_empty());
        }
    }

    mod run {
        use super::*;

        #[tokio::test]
        async fn collects_every_outcome_from_every_worker() {
            let connector = Arc::new(RecordingConnector::new());
            let coordinator = Coordinator::new(connector, config(&["A", "B"]));
            let mut env = coordinator.setup().await.unwrap();

            let result = coordinator.run(&mut env).await;

            assert_eq!(result.outcomes.len(), 12);
            assert!(result.worker_faults.is_empty());
            assert_eq!(result.expected_operations.values().sum::<u64>(), 12);
            for backend in ["A", "B"] {
                let workers: BTreeSet<_> = result
                    .outcomes
                    .iter()
                    .filter(|o| o.backend.as_str() == backend)
                    .map(|o| o.worker.slot)
                    .collect();
                assert_eq!(workers, BTreeSet::from([1, 2]));
            }
        }

        #[tokio::test]
        async fn teardown_closes_every_handle() {
            let connector = Arc::new(RecordingConnector::new());
            let journal = Arc::clone(&connector.journal);
            let coordinator = Coordinator::new(connector, config(&["A", "B"]));
            let mut env = coordinator.setup().await.unwrap();
            coordinator.run(&mut env).await;

            coordinator.teardown(env).await;

            // One control and two worker handles per backend.
            assert_eq!(*journal.closed.lock().unwrap(), 6);
        }

        #[tokio::test]
        async fn teardown_drops_table_when_configured() {
            let connector = Arc::new(RecordingConnector::new());
            let journal = Arc::clone(&connector.journal);
            let mut config = config(&["A"]);
            config.drop_table_on_teardown = true;
            let coordinator = Coordinator::new(connector, config);
            let env = coordinator.setup().await.unwrap();

            coordinator.teardown(env).await;

            let drops = statements_for(&journal, "A")
                .into_iter()
                .filter(|s| matches!(s, Statement::DropTable { .. }))
                .count();
            assert_eq!(drops, 2);
        }
    }

    mod join_workers {
        use super::*;

        struct NullHandle;

        #[async_trait]
        impl BackendHandle for NullHandle {
            async fn execute(&mut self, _statement: &Statement) -> Result<u64, BackendError> {
                Ok(0)
            }
        }

        async fn broken_worker() -> WorkerReport {
            panic!("corrupted worker state")
        }

        fn id(slot: u16) -> WorkerId {
            WorkerId::new(BackendId::new("A").unwrap(), slot)
        }

        #[tokio::test]
        async fn panicking_worker_becomes_fault_and_siblings_survive() {
            let mut set = JoinSet::new();
            let healthy = id(1);
            let broken = id(2);

            let report_id = healthy.clone();
            spawn_guarded(&mut set, healthy.clone(), async move {
                WorkerReport {
                    worker: report_id,
                    state: WorkerState::Completed,
                    outcomes: Vec::new(),
                    handle: Box::new(NullHandle),
                }
            });
            spawn_guarded(&mut set, broken.clone(), broken_worker());

            let (reports, faults) =
                join_workers(set, BTreeSet::from([healthy.clone(), broken.clone()])).await;

            assert_eq!(reports.len(), 1);
            assert_eq!(reports[0].worker, healthy);
            assert_eq!(faults.len(), 1);
            assert_eq!(faults[0].worker, broken);
            assert!(faults[0].message.contains("corrupted worker state"));
        }

        struct CountingHandle(Arc<AtomicUsize>);

        #[async_trait]
        impl BackendHandle for CountingHandle {
            async fn execute(&mut self, _statement: &Statement) -> Result<u64, BackendError> {
                Ok(0)
            }

            async fn close(&mut self) -> Result<(), BackendError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }

        async fn doomed_worker(mut handle: CountingHandle) -> WorkerReport {
            let _ = handle.execute(&Statement::Probe).await;
            panic!("lost with its handle")
        }

        #[tokio::test]
        async fn panicking_worker_drops_its_handle_without_closing() {
            let closed = Arc::new(AtomicUsize::new(0));
            let mut set = JoinSet::new();
            let handle = CountingHandle(Arc::clone(&closed));
            spawn_guarded(&mut set, id(1), doomed_worker(handle));

            let (reports, faults) = join_workers(set, BTreeSet::from([id(1)])).await;

            assert!(reports.is_empty());
            assert_eq!(faults.len(), 1);
            assert_eq!(closed.load(Ordering::SeqCst), 0);
        }

        #[tokio::test]
        async fn worker_without_report_is_flagged() {
            let set = JoinSet::new();

            let (reports, faults) = join_workers(set, BTreeSet::from([id(3)])).await;

            assert!(reports.is_empty());
            assert_eq!(faults.len(), 1);
            assert_eq!(faults[0].worker, id(3));
        }
    }
}
