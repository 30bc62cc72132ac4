use std::fmt;

use crate::domain::{BackendStats, RankEntry, RunReport};

/// Human-readable report for the terminal.
pub fn render_text(report: &RunReport) -> String {
    TextReport(report).to_string()
}

struct TextReport<'a>(&'a RunReport);

impl fmt::Display for TextReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;
        writeln!(f, "Run {}", report.run_id)?;
        writeln!(f, "Table: {}", report.table)?;
        writeln!(
            f,
            "Wall clock: {:.2}s, {} operations, {:.1}% successful",
            report.wall_clock_secs,
            report.total_operations,
            report.success_rate()
        )?;

        let unit = report.throughput_basis.unit();
        for stats in &report.backends {
            writeln!(f)?;
            write_backend(f, stats, unit)?;
        }

        let measured = report.backends.iter().filter(|b| b.total > 0).count();
        if measured > 1 {
            writeln!(f)?;
            writeln!(f, "Rankings")?;
            write_ranking(f, "Fastest (mean duration)", &report.rankings.fastest, |v| {
                format!("{:.3}s", v)
            })?;
            write_ranking(f, "Highest throughput", &report.rankings.throughput, |v| {
                format!("{:.2} {}", v, unit)
            })?;
            write_ranking(f, "Most reliable", &report.rankings.reliability, |v| {
                format!("{:.1}%", v)
            })?;
        }

        if !report.worker_faults.is_empty() {
            writeln!(f)?;
            writeln!(f, "Harness faults (outcomes lost)")?;
            for fault in &report.worker_faults {
                writeln!(f, "  {}: {}", fault.worker, fault.message)?;
            }
        }
        Ok(())
    }
}

fn write_backend(f: &mut fmt::Formatter<'_>, stats: &BackendStats, unit: &str) -> fmt::Result {
    writeln!(f, "[{}]", stats.backend)?;
    let completeness = if stats.is_complete() { "" } else { " (incomplete)" };
    writeln!(
        f,
        "  Operations:    {}/{}{}",
        stats.total, stats.expected_operations, completeness
    )?;
    writeln!(
        f,
        "  Successful:    {} ({:.1}%)",
        stats.succeeded, stats.success_rate
    )?;
    writeln!(
        f,
        "  Failed:        {} ({:.1}%)",
        stats.failed,
        stats.failure_rate()
    )?;
    writeln!(f, "  Rows affected: {}", stats.rows_affected)?;
    match &stats.durations {
        Some(d) => writeln!(
            f,
            "  Duration:      mean {:.3}s | median {:.3}s | min {:.3}s | max {:.3}s | std-dev {:.3}s",
            d.mean, d.median, d.min, d.max, d.std_dev
        )?,
        None => writeln!(f, "  Duration:      n/a")?,
    }
    writeln!(f, "  Throughput:    {:.2} {}", stats.throughput, unit)?;

    if stats.by_kind.len() > 1 {
        writeln!(f, "  By kind:")?;
        for kind in &stats.by_kind {
            let mean = kind
                .mean_duration
                .map_or_else(|| "n/a".to_string(), |m| format!("{:.3}s", m));
            writeln!(
                f,
                "    {:<7} {}/{}  mean {}",
                kind.kind.as_str(),
                kind.succeeded,
                kind.total,
                mean
            )?;
        }
    }

    if !stats.failure_preview.is_empty() {
        writeln!(f, "  Sample failures:")?;
        for message in &stats.failure_preview {
            writeln!(f, "    - {}", message)?;
        }
        let hidden = stats.distinct_failures - stats.failure_preview.len();
        if hidden > 0 {
            writeln!(f, "    ... and {} more", hidden)?;
        }
    }
    Ok(())
}

fn write_ranking(
    f: &mut fmt::Formatter<'_>,
    title: &str,
    entries: &[RankEntry],
    value: impl Fn(f64) -> String,
) -> fmt::Result {
    writeln!(f, "  {}:", title)?;
    for (position, entry) in entries.iter().enumerate() {
        writeln!(
            f,
            "    {}. {}  {}",
            position + 1,
            entry.backend,
            value(entry.value)
        )?;
    }
    Ok(())
}
