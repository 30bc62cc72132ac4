use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Result, eyre};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tablestress::app::ports::BackendConnector;
use tablestress::app::{check_backends, run_harness};
use tablestress::error;
use tablestress::infra::adapters::{PostgresConnector, TrinoConnector};
use tablestress::infra::config::{
    EngineConfig, Operation, Overrides, Preset, ResolvedConfig, WorkloadFileLoader, resolve,
};
use tablestress::infra::report::{export_outcomes_csv, render_json, render_text};

const DEFAULT_TRACE_FILTER: &str = "tablestress=info";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Workload file (default: <config dir>/tablestress/workload.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Probe every configured backend with `SELECT 1`
    Check,
}

#[derive(clap::Args, Debug, Default)]
struct RunArgs {
    /// light, medium or heavy
    #[arg(long)]
    preset: Option<Preset>,
    /// insert, update, delete, select or mixed
    #[arg(long)]
    operation: Option<Operation>,
    /// Workers per backend
    #[arg(long)]
    workers: Option<u16>,
    /// Operations per worker
    #[arg(long)]
    operations: Option<u32>,
    #[arg(long)]
    rows_per_insert: Option<u32>,
    #[arg(long)]
    min_delay_ms: Option<u64>,
    #[arg(long)]
    max_delay_ms: Option<u64>,
    /// Rows inserted before the timed phase
    #[arg(long)]
    prepopulate: Option<u64>,
    /// Makes generated statements reproducible
    #[arg(long)]
    seed: Option<u64>,
    /// Backend as `id=target` (catalog or DSN); repeatable
    #[arg(long = "backend", value_name = "ID=TARGET")]
    backends: Vec<String>,
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,
    /// Write every raw outcome to this CSV file
    #[arg(long, value_name = "PATH")]
    outcomes_csv: Option<PathBuf>,
}

impl RunArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            preset: self.preset,
            operation: self.operation,
            workers_per_backend: self.workers,
            operations_per_worker: self.operations,
            rows_per_insert: self.rows_per_insert,
            min_delay_ms: self.min_delay_ms,
            max_delay_ms: self.max_delay_ms,
            prepopulate_rows: self.prepopulate,
            seed: self.seed,
            backends: self.backends.clone(),
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Format {
    #[default]
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    error::install_hooks()?;
    init_tracing();

    let args = Args::parse();
    let loader = match &args.config {
        Some(path) => WorkloadFileLoader::with_path(path),
        None => WorkloadFileLoader::new()?,
    };
    let file = loader.load()?;
    let resolved = resolve(&file, &args.run.overrides())?;
    let connector = connector(&resolved.engine);

    match args.command {
        Some(Command::Check) => check(connector.as_ref(), &resolved).await,
        None => run(connector, resolved, &args.run).await,
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_TRACE_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_thread_names(true)
        .try_init();
}

fn connector(engine: &EngineConfig) -> Arc<dyn BackendConnector> {
    match engine {
        EngineConfig::Trino(settings) => Arc::new(TrinoConnector::new(settings.clone())),
        EngineConfig::Postgres(settings) => Arc::new(PostgresConnector::new(settings.clone())),
    }
}

async fn check(connector: &dyn BackendConnector, resolved: &ResolvedConfig) -> Result<()> {
    let results = check_backends(connector, &resolved.workload.backends).await;

    let mut out = std::io::stdout().lock();
    for probe in &results {
        match &probe.outcome {
            Ok(elapsed) => writeln!(out, "ok      {}  ({:.2}s)", probe.backend, elapsed.as_secs_f64())?,
            Err(e) => writeln!(out, "failed  {}  {}", probe.backend, e)?,
        }
    }

    let failed = results.iter().filter(|p| !p.is_ok()).count();
    if failed > 0 {
        return Err(eyre!("{} of {} backends unreachable", failed, results.len()));
    }
    Ok(())
}

async fn run(
    connector: Arc<dyn BackendConnector>,
    resolved: ResolvedConfig,
    args: &RunArgs,
) -> Result<()> {
    let workload = &resolved.workload;
    info!(
        preset = %resolved.preset,
        operation = ?resolved.operation,
        backends = workload.backends.len(),
        workers_per_backend = workload.workers_per_backend,
        operations_per_worker = workload.operations_per_worker,
        rows_per_insert = workload.rows_per_insert,
        "starting workload"
    );

    let run = run_harness(connector, resolved.workload).await?;

    if let Some(path) = &args.outcomes_csv {
        export_outcomes_csv(&run.result, path)?;
        info!(path = %path.display(), "outcomes exported");
    }

    let rendered = match args.format {
        Format::Text => render_text(&run.report),
        Format::Json => render_json(&run.report)?,
    };
    let mut out = std::io::stdout().lock();
    out.write_all(rendered.as_bytes())?;
    out.flush()?;

    if !run.report.worker_faults.is_empty() {
        return Err(eyre!(
            "{} worker task(s) failed outside the operation loop; their outcomes are missing",
            run.report.worker_faults.len()
        ));
    }
    Ok(())
}
