use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::app::ports::{BackendConnector, BackendError, BackendHandle};
use crate::domain::{Backend, Statement};
use crate::process::{count_csv_records, run_cli};
use crate::sql::{SqlDialect, render};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrinoSettings {
    /// Path or name of the `trino` CLI executable.
    pub cli: String,
    pub server: String,
    pub user: String,
    /// Session schema; statements qualify their tables explicitly.
    pub schema: String,
    pub timeout: Duration,
}

impl Default for TrinoSettings {
    fn default() -> Self {
        Self {
            cli: "trino".to_string(),
            server: "localhost:8081".to_string(),
            user: "admin".to_string(),
            schema: "default".to_string(),
            timeout: Duration::from_secs(300),
        }
    }
}

/// Backends are Trino catalogs: `Backend::target` names the catalog.
pub struct TrinoConnector {
    settings: Arc<TrinoSettings>,
}

impl TrinoConnector {
    pub fn new(settings: TrinoSettings) -> Self {
        Self {
            settings: Arc::new(settings),
        }
    }
}

#[async_trait]
impl BackendConnector for TrinoConnector {
    async fn connect(&self, backend: &Backend) -> Result<Box<dyn BackendHandle>, BackendError> {
        if backend.target.trim().is_empty() {
            return Err(BackendError::ConnectionFailed(format!(
                "{}: no catalog configured",
                backend.id
            )));
        }
        Ok(Box::new(TrinoHandle {
            settings: Arc::clone(&self.settings),
            catalog: backend.target.clone(),
        }))
    }
}

/// One CLI invocation per statement. The CLI runs in autocommit mode and
/// returns only after the statement committed.
pub struct TrinoHandle {
    settings: Arc<TrinoSettings>,
    catalog: String,
}

impl TrinoHandle {
    fn args(&self, sql: String) -> Vec<String> {
        vec![
            "--server".to_string(),
            self.settings.server.clone(),
            "--user".to_string(),
            self.settings.user.clone(),
            "--catalog".to_string(),
            self.catalog.clone(),
            "--schema".to_string(),
            self.settings.schema.clone(),
            "--output-format".to_string(),
            "CSV_HEADER".to_string(),
            "--execute".to_string(),
            sql,
        ]
    }

    /// Update count the CLI prints for writes, e.g. `INSERT: 50 rows`.
    fn parse_update_count(output: &str) -> Option<u64> {
        output.lines().rev().find_map(|line| {
            let (verb, rest) = line.trim().split_once(':')?;
            if !matches!(verb, "INSERT" | "UPDATE" | "DELETE" | "MERGE") {
                return None;
            }
            let mut parts = rest.split_whitespace();
            let count = parts.next()?.parse::<u64>().ok()?;
            matches!(parts.next(), Some("row" | "rows")).then_some(count)
        })
    }
}

#[async_trait]
impl BackendHandle for TrinoHandle {
    async fn execute(&mut self, statement: &Statement) -> Result<u64, BackendError> {
        let sql = render(SqlDialect::Trino, statement);
        debug!(catalog = %self.catalog, statement = %statement.describe(), "trino execute");
        let output = run_cli(&self.settings.cli, &self.args(sql), self.settings.timeout).await?;

        match statement {
            Statement::Select { .. } | Statement::Probe => count_csv_records(&output.stdout),
            Statement::Insert { .. } | Statement::Update { .. } | Statement::Delete { .. } => {
                Self::parse_update_count(&output.stderr)
                    .or_else(|| Self::parse_update_count(&output.stdout))
                    .ok_or_else(|| {
                        BackendError::UnexpectedOutput(
                            "Failed to parse affected row count".to_string(),
                        )
                    })
            }
            Statement::CreateNamespace { .. }
            | Statement::DropTable { .. }
            | Statement::CreateTable { .. } => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BackendId;
    use rstest::rstest;

    mod update_count {
        use super::*;

        #[rstest]
        #[case("INSERT: 50 rows\n", Some(50))]
        #[case("UPDATE: 1 row\n", Some(1))]
        #[case("DELETE: 0 rows\n", Some(0))]
        #[case("WARNING: something\nINSERT: 1000 rows\n", Some(1000))]
        #[case("CREATE TABLE\n", None)]
        #[case("INSERT: many rows\n", None)]
        #[case("", None)]
        fn parses_cli_summary_line(#[case] output: &str, #[case] expected: Option<u64>) {
            assert_eq!(TrinoHandle::parse_update_count(output), expected);
        }
    }

    mod connect {
        use super::*;

        #[tokio::test]
        async fn target_is_the_catalog() {
            let connector = TrinoConnector::new(TrinoSettings::default());
            let backend = Backend::new(BackendId::new("polaris").unwrap(), "iceberg_polaris");

            assert!(connector.connect(&backend).await.is_ok());
        }

        #[tokio::test]
        async fn empty_catalog_is_rejected() {
            let connector = TrinoConnector::new(TrinoSettings::default());
            let backend = Backend::new(BackendId::new("polaris").unwrap(), " ");

            let err = connector.connect(&backend).await.err().unwrap();

            assert!(matches!(err, BackendError::ConnectionFailed(_)));
        }
    }

    #[test]
    fn args_pass_statement_last() {
        let handle = TrinoHandle {
            settings: Arc::new(TrinoSettings::default()),
            catalog: "iceberg_hms".to_string(),
        };

        let args = handle.args("SELECT 1".to_string());

        assert_eq!(args.last().map(String::as_str), Some("SELECT 1"));
        assert!(args.windows(2).any(|w| w[0] == "--catalog" && w[1] == "iceberg_hms"));
        assert!(args.windows(2).any(|w| w[0] == "--output-format" && w[1] == "CSV_HEADER"));
    }
}
