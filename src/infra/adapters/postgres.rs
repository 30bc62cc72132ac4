use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::app::ports::{BackendConnector, BackendError, BackendHandle};
use crate::domain::{Backend, Statement};
use crate::process::{count_csv_records, run_cli};
use crate::sql::{SqlDialect, render};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresSettings {
    /// Path or name of the `psql` executable.
    pub psql: String,
    pub timeout: Duration,
}

impl Default for PostgresSettings {
    fn default() -> Self {
        Self {
            psql: "psql".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Backends are databases: `Backend::target` is the connection DSN.
pub struct PostgresConnector {
    settings: Arc<PostgresSettings>,
}

impl PostgresConnector {
    pub fn new(settings: PostgresSettings) -> Self {
        Self {
            settings: Arc::new(settings),
        }
    }
}

#[async_trait]
impl BackendConnector for PostgresConnector {
    async fn connect(&self, backend: &Backend) -> Result<Box<dyn BackendHandle>, BackendError> {
        if backend.target.trim().is_empty() {
            return Err(BackendError::ConnectionFailed(format!(
                "{}: no DSN configured",
                backend.id
            )));
        }
        Ok(Box::new(PostgresHandle {
            settings: Arc::clone(&self.settings),
            dsn: backend.target.clone(),
            database: extract_database_name(&backend.target),
        }))
    }
}

/// One `psql -c` per statement; each runs in its own autocommit transaction.
pub struct PostgresHandle {
    settings: Arc<PostgresSettings>,
    dsn: String,
    database: String,
}

impl PostgresHandle {
    fn args(&self, sql: String) -> Vec<String> {
        vec![
            self.dsn.clone(),
            "-X".to_string(), // Ignore .psqlrc to avoid unexpected output
            "-v".to_string(),
            "ON_ERROR_STOP=1".to_string(), // Exit with non-zero on SQL errors
            "--csv".to_string(),
            "-c".to_string(),
            sql,
        ]
    }

    fn parse_affected_rows(stdout: &str) -> Option<u64> {
        stdout.lines().rev().find_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            match parts.as_slice() {
                ["INSERT", _, count] | ["UPDATE", count] | ["DELETE", count] => {
                    count.parse::<u64>().ok()
                }
                _ => None,
            }
        })
    }
}

#[async_trait]
impl BackendHandle for PostgresHandle {
    async fn execute(&mut self, statement: &Statement) -> Result<u64, BackendError> {
        let sql = render(SqlDialect::Postgres, statement);
        debug!(database = %self.database, statement = %statement.describe(), "psql execute");
        let output = run_cli(&self.settings.psql, &self.args(sql), self.settings.timeout).await?;

        match statement {
            Statement::Select { .. } | Statement::Probe => count_csv_records(&output.stdout),
            Statement::Insert { .. } | Statement::Update { .. } | Statement::Delete { .. } => {
                Self::parse_affected_rows(&output.stdout).ok_or_else(|| {
                    BackendError::UnexpectedOutput("Failed to parse affected row count".to_string())
                })
            }
            Statement::CreateNamespace { .. }
            | Statement::DropTable { .. }
            | Statement::CreateTable { .. } => Ok(0),
        }
    }
}

/// Database name from a DSN, for logs that must not carry credentials.
/// Supports both URI format (postgres://host/dbname) and key=value format (dbname=mydb).
pub fn extract_database_name(dsn: &str) -> String {
    if dsn.contains("://") {
        let path = dsn.split('?').next().unwrap_or_default();
        if let Some(db) = path.rsplit('/').next().filter(|s| !s.is_empty() && !s.contains('@')) {
            return db.to_string();
        }
    }
    if let Some(start) = dsn.find("dbname=") {
        let rest = &dsn[start + 7..];
        let end = rest.find(|c: char| c.is_whitespace()).unwrap_or(rest.len());
        return rest[..end].to_string();
    }
    "unknown".to_string()
}
