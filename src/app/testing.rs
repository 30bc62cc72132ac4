//! In-memory backends for exercising the harness without a database.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{Backend, Statement};
use crate::ports::{BackendConnector, BackendError, BackendHandle};

/// How a fake backend answers workload statements. Setup statements always
/// succeed unless the backend is unreachable.
#[derive(Debug, Clone)]
pub struct FakeBehavior {
    latency: Duration,
    rows: u64,
    error: Option<String>,
    connect_error: Option<String>,
    panic_at: Option<u32>,
}

impl FakeBehavior {
    pub fn succeed(latency: Duration, rows: u64) -> Self {
        Self {
            latency,
            rows,
            error: None,
            connect_error: None,
            panic_at: None,
        }
    }

    pub fn fail(latency: Duration, message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::succeed(latency, 0)
        }
    }

    pub fn unreachable(message: impl Into<String>) -> Self {
        Self {
            connect_error: Some(message.into()),
            ..Self::succeed(Duration::ZERO, 0)
        }
    }

    /// Panics on the given zero-based workload call of each handle.
    pub fn panicking_at(mut self, call: u32) -> Self {
        self.panic_at = Some(call);
        self
    }
}

#[derive(Debug, Default)]
struct Counters {
    executed: Mutex<Vec<(String, Statement)>>,
    closed: AtomicUsize,
}

#[derive(Debug, Clone, Default)]
pub struct FakeConnector {
    behaviors: HashMap<String, FakeBehavior>,
    counters: Arc<Counters>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, backend: &str, behavior: FakeBehavior) -> Self {
        self.behaviors.insert(backend.to_string(), behavior);
        self
    }

    /// Statements executed against `backend`, setup included.
    pub fn executed(&self, backend: &str) -> Vec<Statement> {
        self.counters
            .executed
            .lock()
            .map(|log| {
                log.iter()
                    .filter(|(b, _)| b == backend)
                    .map(|(_, s)| s.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn closed_handles(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackendConnector for FakeConnector {
    async fn connect(&self, backend: &Backend) -> Result<Box<dyn BackendHandle>, BackendError> {
        let behavior = self
            .behaviors
            .get(backend.id.as_str())
            .cloned()
            .unwrap_or_else(|| FakeBehavior::succeed(Duration::ZERO, 1));
        if let Some(message) = &behavior.connect_error {
            return Err(BackendError::ConnectionFailed(message.clone()));
        }
        Ok(Box::new(FakeHandle {
            backend: backend.id.to_string(),
            behavior,
            calls: 0,
            counters: Arc::clone(&self.counters),
        }))
    }
}

struct FakeHandle {
    backend: String,
    behavior: FakeBehavior,
    calls: u32,
    counters: Arc<Counters>,
}

#[async_trait]
impl BackendHandle for FakeHandle {
    async fn execute(&mut self, statement: &Statement) -> Result<u64, BackendError> {
        if let Ok(mut log) = self.counters.executed.lock() {
            log.push((self.backend.clone(), statement.clone()));
        }
        if statement.kind().is_none() {
            return Ok(0);
        }

        let call = self.calls;
        self.calls += 1;
        if self.behavior.panic_at == Some(call) {
            panic!("fake backend {} panicked on call {}", self.backend, call);
        }
        if !self.behavior.latency.is_zero() {
            tokio::time::sleep(self.behavior.latency).await;
        }
        match &self.behavior.error {
            Some(message) => Err(BackendError::QueryFailed(message.clone())),
            None => Ok(self.behavior.rows),
        }
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
