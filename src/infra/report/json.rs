use crate::domain::RunReport;

use super::ReportError;

pub fn render_json(report: &RunReport) -> Result<String, ReportError> {
    Ok(serde_json::to_string_pretty(report)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RunId, Rankings, ThroughputBasis};

    #[test]
    fn report_serializes_with_field_names() {
        let report = RunReport {
            run_id: RunId::from_string("run-1"),
            table: "stress_test.select_stress_1".to_string(),
            wall_clock_secs: 2.0,
            throughput_basis: ThroughputBasis::Operations,
            total_operations: 0,
            succeeded: 0,
            backends: Vec::new(),
            rankings: Rankings::default(),
            worker_faults: Vec::new(),
        };

        let json: serde_json::Value = serde_json::from_str(&render_json(&report).unwrap()).unwrap();

        assert_eq!(json["run_id"], "run-1");
        assert_eq!(json["table"], "stress_test.select_stress_1");
        assert_eq!(json["wall_clock_secs"], 2.0);
        assert!(json["rankings"]["fastest"].as_array().unwrap().is_empty());
    }
}
