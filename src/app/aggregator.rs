use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::domain::{
    BackendId, BackendStats, DurationStats, KindStats, OperationKind, Outcome, RankEntry,
    Rankings, RunReport, RunResult, ThroughputBasis,
};

/// Number of distinct failure messages kept for diagnostics.
pub const FAILURE_PREVIEW_LEN: usize = 3;

/// Summarizes a finished run. Pure: the same outcomes in any order give the
/// same report.
pub fn aggregate(result: &RunResult) -> RunReport {
    let mut partitions: BTreeMap<&BackendId, Vec<&Outcome>> = result
        .expected_operations
        .keys()
        .map(|id| (id, Vec::new()))
        .collect();
    for outcome in &result.outcomes {
        partitions.entry(&outcome.backend).or_default().push(outcome);
    }

    let wall_clock = result.wall_clock.as_secs_f64();
    let backends: Vec<BackendStats> = partitions
        .into_iter()
        .map(|(id, outcomes)| {
            let expected = result.expected_operations.get(id).copied().unwrap_or_default();
            backend_stats(id, expected, &outcomes, wall_clock, result.throughput_basis)
        })
        .collect();

    let total_operations = backends.iter().map(|b| b.total).sum();
    let succeeded = backends.iter().map(|b| b.succeeded).sum();
    let rankings = rank(&backends);

    RunReport {
        run_id: result.run_id.clone(),
        table: result.table.to_string(),
        wall_clock_secs: wall_clock,
        throughput_basis: result.throughput_basis,
        total_operations,
        succeeded,
        backends,
        rankings,
        worker_faults: result.worker_faults.clone(),
    }
}

fn backend_stats(
    id: &BackendId,
    expected_operations: u64,
    outcomes: &[&Outcome],
    wall_clock: f64,
    basis: ThroughputBasis,
) -> BackendStats {
    let total = outcomes.len() as u64;
    let successes: Vec<&Outcome> = outcomes.iter().copied().filter(|o| o.is_success()).collect();
    let succeeded = successes.len() as u64;
    let rows_affected = successes.iter().map(|o| o.rows_affected()).sum();

    let durations = duration_stats(&successes);

    let throughput = if wall_clock > 0.0 {
        let work = match basis {
            ThroughputBasis::Rows => rows_affected,
            ThroughputBasis::Operations => succeeded,
        };
        work as f64 / wall_clock
    } else {
        0.0
    };

    let (failure_preview, distinct_failures) = failure_preview(outcomes);

    BackendStats {
        backend: id.clone(),
        expected_operations,
        total,
        succeeded,
        failed: total - succeeded,
        success_rate: percentage(succeeded, total),
        rows_affected,
        durations,
        throughput,
        by_kind: kind_breakdown(outcomes),
        failure_preview,
        distinct_failures,
    }
}

fn duration_stats(successes: &[&Outcome]) -> Option<DurationStats> {
    let mut secs: Vec<f64> = successes.iter().map(|o| o.duration.as_secs_f64()).collect();
    if secs.is_empty() {
        return None;
    }
    secs.sort_by(f64::total_cmp);

    let n = secs.len();
    let mean = secs.iter().sum::<f64>() / n as f64;
    let median = if n % 2 == 1 {
        secs[n / 2]
    } else {
        (secs[n / 2 - 1] + secs[n / 2]) / 2.0
    };
    let std_dev = if n < 2 {
        0.0
    } else {
        let variance = secs.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        variance.sqrt()
    };

    Some(DurationStats {
        mean,
        median,
        min: secs[0],
        max: secs[n - 1],
        std_dev,
    })
}

fn kind_breakdown(outcomes: &[&Outcome]) -> Vec<KindStats> {
    OperationKind::ALL
        .iter()
        .filter_map(|&kind| {
            let of_kind: Vec<&Outcome> =
                outcomes.iter().copied().filter(|o| o.kind == kind).collect();
            if of_kind.is_empty() {
                return None;
            }
            let successes: Vec<&Outcome> =
                of_kind.iter().copied().filter(|o| o.is_success()).collect();
            Some(KindStats {
                kind,
                total: of_kind.len() as u64,
                succeeded: successes.len() as u64,
                mean_duration: duration_stats(&successes).map(|d| d.mean),
            })
        })
        .collect()
}

/// Distinct messages by earliest occurrence, capped, plus the distinct count.
fn failure_preview(outcomes: &[&Outcome]) -> (Vec<String>, usize) {
    let mut failures: Vec<&Outcome> = outcomes.iter().copied().filter(|o| !o.is_success()).collect();
    failures.sort_by(|a, b| {
        a.started_at
            .cmp(&b.started_at)
            .then_with(|| a.worker.cmp(&b.worker))
            .then_with(|| a.sequence.cmp(&b.sequence))
    });

    let mut distinct: Vec<&str> = Vec::new();
    for message in failures.iter().filter_map(|o| o.error()) {
        if !distinct.contains(&message) {
            distinct.push(message);
        }
    }
    let count = distinct.len();
    let preview = distinct
        .into_iter()
        .take(FAILURE_PREVIEW_LEN)
        .map(str::to_string)
        .collect();
    (preview, count)
}

fn rank(backends: &[BackendStats]) -> Rankings {
    let mut fastest: Vec<RankEntry> = backends
        .iter()
        .filter_map(|b| {
            b.durations.as_ref().map(|d| RankEntry {
                backend: b.backend.clone(),
                value: d.mean,
            })
        })
        .collect();
    fastest.sort_by(|a, b| by_value(a, b, Ordering::Less));

    let mut throughput: Vec<RankEntry> = backends
        .iter()
        .map(|b| RankEntry {
            backend: b.backend.clone(),
            value: b.throughput,
        })
        .collect();
    throughput.sort_by(|a, b| by_value(a, b, Ordering::Greater));

    let mut reliability: Vec<RankEntry> = backends
        .iter()
        .map(|b| RankEntry {
            backend: b.backend.clone(),
            value: b.success_rate,
        })
        .collect();
    reliability.sort_by(|a, b| by_value(a, b, Ordering::Greater));

    Rankings {
        fastest,
        throughput,
        reliability,
    }
}

/// `first` is the ordering of a smaller value: `Less` ranks ascending.
fn by_value(a: &RankEntry, b: &RankEntry, first: Ordering) -> Ordering {
    let ord = a.value.total_cmp(&b.value);
    let ord = if first == Ordering::Less { ord } else { ord.reverse() };
    ord.then_with(|| a.backend.cmp(&b.backend))
}

fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}
