use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::domain::{Outcome, OutcomeStatus, RunResult};

use super::ReportError;

#[derive(Serialize)]
struct OutcomeRecord<'a> {
    run_id: &'a str,
    backend: &'a str,
    worker: String,
    sequence: u32,
    kind: &'static str,
    started_at_ms: u64,
    duration_secs: f64,
    success: bool,
    rows_affected: u64,
    failure_origin: &'static str,
    error: &'a str,
}

impl<'a> OutcomeRecord<'a> {
    fn new(run_id: &'a str, outcome: &'a Outcome) -> Self {
        let (failure_origin, error) = match &outcome.status {
            OutcomeStatus::Succeeded { .. } => ("", ""),
            OutcomeStatus::Failed(failure) => (failure.origin.as_str(), failure.message.as_str()),
        };
        let started_at_ms = outcome
            .started_at
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or_default();
        Self {
            run_id,
            backend: outcome.backend.as_str(),
            worker: outcome.worker.to_string(),
            sequence: outcome.sequence,
            kind: outcome.kind.as_str(),
            started_at_ms,
            duration_secs: outcome.duration.as_secs_f64(),
            success: outcome.is_success(),
            rows_affected: outcome.rows_affected(),
            failure_origin,
            error,
        }
    }
}

/// One CSV row per outcome, in start order.
pub fn write_outcomes_csv<W: Write>(result: &RunResult, writer: W) -> Result<(), ReportError> {
    let mut outcomes: Vec<&Outcome> = result.outcomes.iter().collect();
    outcomes.sort_by(|a, b| {
        a.started_at
            .cmp(&b.started_at)
            .then_with(|| a.worker.cmp(&b.worker))
            .then_with(|| a.sequence.cmp(&b.sequence))
    });

    let mut csv = csv::Writer::from_writer(writer);
    for outcome in outcomes {
        csv.serialize(OutcomeRecord::new(result.run_id.as_str(), outcome))?;
    }
    csv.flush()?;
    Ok(())
}

pub fn export_outcomes_csv(result: &RunResult, path: &Path) -> Result<(), ReportError> {
    let file = File::create(path)?;
    write_outcomes_csv(result, file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        BackendId, FailureOrigin, OperationKind, RunId, TableRef, ThroughputBasis, WorkerId,
    };
    use std::collections::BTreeMap;
    use std::time::Duration;
    use tempfile::TempDir;

    fn result() -> RunResult {
        let worker = WorkerId::new(BackendId::new("A").unwrap(), 1);
        RunResult {
            run_id: RunId::from_string("run-1"),
            table: TableRef::new("stress_test", "delete_stress_1"),
            outcomes: vec![
                Outcome::failed(
                    &worker,
                    OperationKind::Delete,
                    1,
                    UNIX_EPOCH + Duration::from_millis(2_000),
                    Duration::from_millis(250),
                    "Query failed: lock, \"retry\"",
                    FailureOrigin::Backend,
                ),
                Outcome::succeeded(
                    &worker,
                    OperationKind::Delete,
                    0,
                    UNIX_EPOCH + Duration::from_millis(1_000),
                    Duration::from_millis(500),
                    12,
                ),
            ],
            wall_clock: Duration::from_secs(1),
            expected_operations: BTreeMap::new(),
            throughput_basis: ThroughputBasis::Operations,
            worker_faults: Vec::new(),
        }
    }

    #[test]
    fn writes_header_and_rows_in_start_order() {
        let mut buf = Vec::new();

        write_outcomes_csv(&result(), &mut buf).unwrap();

        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "run_id,backend,worker,sequence,kind,started_at_ms,duration_secs,success,rows_affected,failure_origin,error"
        );
        assert_eq!(lines[1], "run-1,A,A-W1,0,delete,1000,0.5,true,12,,");
        assert_eq!(
            lines[2],
            "run-1,A,A-W1,1,delete,2000,0.25,false,0,backend,\"Query failed: lock, \"\"retry\"\"\""
        );
    }

    #[test]
    fn export_creates_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("outcomes.csv");

        export_outcomes_csv(&result(), &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 3);
    }
}
