//! Rendering of run reports and raw outcome export.

mod csv_export;
mod json;
mod text;

use thiserror::Error;

pub use csv_export::{export_outcomes_csv, write_outcomes_csv};
pub use json::render_json;
pub use text::render_text;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to write CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("Failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
}
