use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::OperationMix;

use super::ConfigError;
use super::presets::{Operation, Preset};

pub const CURRENT_VERSION: u32 = 1;

const CONFIG_DIR_NAME: &str = "tablestress";
const CONFIG_FILE_NAME: &str = "workload.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    #[default]
    Trino,
    Postgres,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    pub kind: EngineKind,
    pub server: Option<String>,
    pub user: Option<String>,
    pub schema: Option<String>,
    pub cli: Option<String>,
    pub dsn: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub password: Option<String>,
    pub database: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendEntry {
    pub id: String,
    /// Catalog for Trino, DSN for Postgres. Defaults to the id (Trino) or
    /// the engine DSN (Postgres).
    pub target: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadSection {
    pub operation: Option<Operation>,
    pub preset: Option<Preset>,
    pub workers_per_backend: Option<u16>,
    pub operations_per_worker: Option<u32>,
    pub rows_per_insert: Option<u32>,
    pub min_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub prepopulate_rows: Option<u64>,
    pub population_batch_size: Option<u32>,
    pub seed: Option<u64>,
    pub operation_timeout_ms: Option<u64>,
    pub namespace: Option<String>,
    pub drop_table_on_teardown: Option<bool>,
    pub mix: Option<OperationMix>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadFile {
    pub version: u32,
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub backends: Vec<BackendEntry>,
    #[serde(default)]
    pub workload: WorkloadSection,
}

impl Default for WorkloadFile {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            engine: EngineSection::default(),
            backends: Vec::new(),
            workload: WorkloadSection::default(),
        }
    }
}

impl WorkloadFile {
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let file: Self =
            toml::from_str(content).map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;

        if file.version != CURRENT_VERSION {
            return Err(ConfigError::VersionMismatch {
                found: file.version,
                expected: CURRENT_VERSION,
            });
        }

        Ok(file)
    }
}

pub struct WorkloadFileLoader {
    path: PathBuf,
    explicit: bool,
}

impl WorkloadFileLoader {
    /// Loader for the default location; a missing file there means defaults.
    pub fn new() -> Result<Self, ConfigError> {
        let config_base = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(Self {
            path: config_base.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME),
            explicit: false,
        })
    }

    /// Loader for a path the user named; the file must exist.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            explicit: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<WorkloadFile, ConfigError> {
        if !self.path.exists() {
            if self.explicit {
                return Err(ConfigError::NotFound(self.path.clone()));
            }
            return Ok(WorkloadFile::default());
        }

        let content = fs::read_to_string(&self.path).map_err(|e| ConfigError::Read {
            path: self.path.clone(),
            message: e.to_string(),
        })?;

        WorkloadFile::parse(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const FULL: &str = r#"
version = 1

[engine]
kind = "postgres"
host = "db.internal"
port = 5433
user = "bench"
password = "p@ss word"
database = "stress"
timeout_secs = 10

[[backends]]
id = "primary"

[[backends]]
id = "replica"
target = "postgres://bench@replica/stress"

[workload]
operation = "mixed"
preset = "heavy"
seed = 42
operation_timeout_ms = 2500

[workload.mix]
insert = 1
update = 1
delete = 0
select = 2
"#;

    mod load {
        use super::*;

        #[test]
        fn returns_defaults_when_default_file_is_missing() {
            let temp_dir = TempDir::new().unwrap();
            let loader = WorkloadFileLoader {
                path: temp_dir.path().join(CONFIG_FILE_NAME),
                explicit: false,
            };

            let file = loader.load().unwrap();

            assert_eq!(file, WorkloadFile::default());
        }

        #[test]
        fn explicit_path_must_exist() {
            let temp_dir = TempDir::new().unwrap();
            let loader = WorkloadFileLoader::with_path(temp_dir.path().join("missing.toml"));

            assert!(matches!(loader.load(), Err(ConfigError::NotFound(_))));
        }

        #[test]
        fn parses_every_section() {
            let temp_dir = TempDir::new().unwrap();
            let path = temp_dir.path().join(CONFIG_FILE_NAME);
            fs::write(&path, FULL).unwrap();

            let file = WorkloadFileLoader::with_path(&path).load().unwrap();

            assert_eq!(file.engine.kind, EngineKind::Postgres);
            assert_eq!(file.engine.port, Some(5433));
            assert_eq!(file.backends.len(), 2);
            assert_eq!(file.backends[0].target, None);
            assert_eq!(file.workload.operation, Some(Operation::Mixed));
            assert_eq!(file.workload.preset, Some(Preset::Heavy));
            assert_eq!(file.workload.mix.map(|m| m.select), Some(2));
        }

        #[test]
        fn returns_version_mismatch_for_old_version() {
            let temp_dir = TempDir::new().unwrap();
            let path = temp_dir.path().join(CONFIG_FILE_NAME);
            fs::write(&path, "version = 0\n").unwrap();

            let result = WorkloadFileLoader::with_path(&path).load();

            assert!(matches!(
                result,
                Err(ConfigError::VersionMismatch {
                    found: 0,
                    expected: 1
                })
            ));
        }

        #[test]
        fn returns_error_for_invalid_toml() {
            let temp_dir = TempDir::new().unwrap();
            let path = temp_dir.path().join(CONFIG_FILE_NAME);
            fs::write(&path, "invalid toml {{{{").unwrap();

            let result = WorkloadFileLoader::with_path(&path).load();

            assert!(matches!(result, Err(ConfigError::InvalidFormat(_))));
        }

        #[test]
        fn rejects_unknown_operation() {
            let result = WorkloadFile::parse("version = 1\n[workload]\noperation = \"merge\"\n");

            assert!(matches!(result, Err(ConfigError::InvalidFormat(_))));
        }
    }
}
