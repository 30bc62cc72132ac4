use std::time::Duration;

use crate::adapters::{PostgresSettings, TrinoSettings};
use crate::domain::{Backend, BackendId, DelayRange, OperationMix, WorkloadConfig};

use super::ConfigError;
use super::presets::{Operation, Preset};
use super::workload_file::{BackendEntry, EngineKind, EngineSection, WorkloadFile};

/// Catalogs exercised when no backends are configured.
pub const DEFAULT_TRINO_CATALOGS: [&str; 3] = ["iceberg_polaris", "iceberg_hms", "iceberg_nessie"];

const DEFAULT_POSTGRES_BACKEND: &str = "postgres";
const DEFAULT_POSTGRES_PORT: u16 = 5432;

/// Values given on the command line. They win over the file and the preset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub preset: Option<Preset>,
    pub operation: Option<Operation>,
    pub workers_per_backend: Option<u16>,
    pub operations_per_worker: Option<u32>,
    pub rows_per_insert: Option<u32>,
    pub min_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub prepopulate_rows: Option<u64>,
    pub seed: Option<u64>,
    /// `id=target` or a bare `id`.
    pub backends: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineConfig {
    Trino(TrinoSettings),
    Postgres(PostgresSettings),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub engine: EngineConfig,
    pub preset: Preset,
    pub operation: Operation,
    pub workload: WorkloadConfig,
}

/// Layers built-in defaults, the preset, the file and the overrides, in that
/// order, and validates the result.
pub fn resolve(file: &WorkloadFile, overrides: &Overrides) -> Result<ResolvedConfig, ConfigError> {
    let section = &file.workload;
    let preset = overrides.preset.or(section.preset).unwrap_or_default();
    let operation = overrides
        .operation
        .or(section.operation)
        .unwrap_or_default();
    // An explicit operation on the command line replaces a configured mix.
    let mix = match (overrides.operation, section.mix) {
        (None, Some(mix)) => mix,
        _ => operation.mix(),
    };

    let (engine, default_target) = engine_config(&file.engine);
    let backends = backends(file, overrides, default_target.as_deref())?;

    let values = preset.values();
    let mut workload = WorkloadConfig::new(backends, mix);
    workload.workers_per_backend = overrides
        .workers_per_backend
        .or(section.workers_per_backend)
        .unwrap_or(values.workers_per_backend);
    workload.operations_per_worker = overrides
        .operations_per_worker
        .or(section.operations_per_worker)
        .unwrap_or(values.operations_per_worker);
    workload.rows_per_insert = overrides
        .rows_per_insert
        .or(section.rows_per_insert)
        .unwrap_or(values.rows_per_insert);
    workload.delay = DelayRange::from_millis(
        overrides
            .min_delay_ms
            .or(section.min_delay_ms)
            .unwrap_or(values.min_delay_ms),
        overrides
            .max_delay_ms
            .or(section.max_delay_ms)
            .unwrap_or(values.max_delay_ms),
    )?;
    workload.prepopulate_rows = overrides
        .prepopulate_rows
        .or(section.prepopulate_rows)
        .unwrap_or_else(|| default_prepopulation(&mix));
    if let Some(size) = section.population_batch_size {
        workload.population_batch_size = size;
    }
    workload.seed = overrides.seed.or(section.seed);
    workload.operation_timeout = section.operation_timeout_ms.map(Duration::from_millis);
    if let Some(namespace) = &section.namespace {
        workload.namespace = namespace.clone();
    }
    workload.drop_table_on_teardown = section.drop_table_on_teardown.unwrap_or(false);

    workload.validate()?;

    Ok(ResolvedConfig {
        engine,
        preset,
        operation,
        workload,
    })
}

/// Rows seeded before the timed phase when none are configured: updates and
/// deletes need rows to touch, reads need something to scan.
fn default_prepopulation(mix: &OperationMix) -> u64 {
    if mix.update > 0 || mix.delete > 0 {
        10_000
    } else if mix.select > 0 {
        5_000
    } else {
        0
    }
}

fn engine_config(engine: &EngineSection) -> (EngineConfig, Option<String>) {
    match engine.kind {
        EngineKind::Trino => {
            let defaults = TrinoSettings::default();
            let settings = TrinoSettings {
                cli: engine.cli.clone().unwrap_or(defaults.cli),
                server: engine.server.clone().unwrap_or(defaults.server),
                user: engine.user.clone().unwrap_or(defaults.user),
                schema: engine.schema.clone().unwrap_or(defaults.schema),
                timeout: engine
                    .timeout_secs
                    .map_or(defaults.timeout, Duration::from_secs),
            };
            (EngineConfig::Trino(settings), None)
        }
        EngineKind::Postgres => {
            let defaults = PostgresSettings::default();
            let settings = PostgresSettings {
                psql: engine.cli.clone().unwrap_or(defaults.psql),
                timeout: engine
                    .timeout_secs
                    .map_or(defaults.timeout, Duration::from_secs),
            };
            (EngineConfig::Postgres(settings), postgres_dsn(engine))
        }
    }
}

/// DSN from the engine section; the password is URL-encoded.
fn postgres_dsn(engine: &EngineSection) -> Option<String> {
    if let Some(dsn) = &engine.dsn {
        return Some(dsn.clone());
    }
    let host = engine.host.as_deref()?;
    let database = engine.database.as_deref()?;
    let port = engine.port.unwrap_or(DEFAULT_POSTGRES_PORT);
    let credentials = match (&engine.user, &engine.password) {
        (Some(user), Some(password)) => format!("{}:{}@", user, urlencoding::encode(password)),
        (Some(user), None) => format!("{}@", user),
        _ => String::new(),
    };
    Some(format!(
        "postgres://{}{}:{}/{}",
        credentials, host, port, database
    ))
}

fn backends(
    file: &WorkloadFile,
    overrides: &Overrides,
    default_target: Option<&str>,
) -> Result<Vec<Backend>, ConfigError> {
    let postgres = file.engine.kind == EngineKind::Postgres;
    let target_for = |id: &BackendId, target: Option<&str>| -> Result<String, ConfigError> {
        match target.filter(|t| !t.trim().is_empty()) {
            Some(t) => Ok(t.trim().to_string()),
            None if postgres => default_target.map(str::to_string).ok_or(ConfigError::MissingDsn),
            None => Ok(id.as_str().to_string()),
        }
    };
    let parse_id = |spec: &str, id: &str| {
        BackendId::new(id).map_err(|source| ConfigError::InvalidBackend {
            spec: spec.to_string(),
            source,
        })
    };

    if !overrides.backends.is_empty() {
        return overrides
            .backends
            .iter()
            .map(|spec| {
                let (id, target) = match spec.split_once('=') {
                    Some((id, target)) => (id, Some(target)),
                    None => (spec.as_str(), None),
                };
                let id = parse_id(spec, id)?;
                let target = target_for(&id, target)?;
                Ok(Backend::new(id, target))
            })
            .collect();
    }

    if !file.backends.is_empty() {
        return file
            .backends
            .iter()
            .map(|BackendEntry { id, target }| {
                let backend_id = parse_id(id.as_str(), id.as_str())?;
                let target = target_for(&backend_id, target.as_deref())?;
                Ok(Backend::new(backend_id, target))
            })
            .collect();
    }

    let ids: Vec<&str> = if postgres {
        vec![DEFAULT_POSTGRES_BACKEND]
    } else {
        DEFAULT_TRINO_CATALOGS.to_vec()
    };
    ids.into_iter()
        .map(|id| {
            let backend_id = parse_id(id, id)?;
            let target = target_for(&backend_id, None)?;
            Ok(Backend::new(backend_id, target))
        })
        .collect()
}
