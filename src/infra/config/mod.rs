//! Workload configuration: TOML file, presets, and command-line overrides.

mod presets;
mod resolve;
mod workload_file;

use std::path::PathBuf;

use thiserror::Error;

use crate::domain::{BackendIdError, WorkloadConfigError};

pub use presets::{Operation, Preset, PresetValues};
pub use resolve::{DEFAULT_TRINO_CATALOGS, EngineConfig, Overrides, ResolvedConfig, resolve};
pub use workload_file::{
    BackendEntry, CURRENT_VERSION, EngineKind, EngineSection, WorkloadFile, WorkloadFileLoader,
    WorkloadSection,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not find config directory")]
    NoConfigDir,
    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Failed to read {}: {message}", .path.display())]
    Read { path: PathBuf, message: String },
    #[error("Invalid config format: {0}")]
    InvalidFormat(String),
    #[error("Config version mismatch: found {found}, expected {expected}")]
    VersionMismatch { found: u32, expected: u32 },
    #[error("Unknown preset '{0}' (expected light, medium or heavy)")]
    UnknownPreset(String),
    #[error("Unknown operation '{0}' (expected insert, update, delete, select or mixed)")]
    UnknownOperation(String),
    #[error("Invalid backend '{spec}': {source}")]
    InvalidBackend {
        spec: String,
        #[source]
        source: BackendIdError,
    },
    #[error("Postgres engine needs a dsn or a host and database")]
    MissingDsn,
    #[error(transparent)]
    Workload(#[from] WorkloadConfigError),
}
