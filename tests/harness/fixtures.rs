use tablestress::domain::{Backend, BackendId, OperationKind, OperationMix, WorkloadConfig};

pub fn backends(ids: &[&str]) -> Vec<Backend> {
    ids.iter()
        .map(|id| Backend::named(BackendId::new(*id).unwrap()))
        .collect()
}

/// Insert-only workload without delays or prepopulation.
pub fn insert_workload(ids: &[&str], workers: u16, operations: u32, rows: u32) -> WorkloadConfig {
    let mut config = WorkloadConfig::new(backends(ids), OperationMix::only(OperationKind::Insert));
    config.workers_per_backend = workers;
    config.operations_per_worker = operations;
    config.rows_per_insert = rows;
    config.seed = Some(7);
    config
}
