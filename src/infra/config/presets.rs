use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::{OperationKind, OperationMix};

use super::ConfigError;

/// Named intensity levels for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Light,
    #[default]
    Medium,
    Heavy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresetValues {
    pub workers_per_backend: u16,
    pub operations_per_worker: u32,
    pub rows_per_insert: u32,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Preset {
    pub fn values(self) -> PresetValues {
        match self {
            Self::Light => PresetValues {
                workers_per_backend: 2,
                operations_per_worker: 3,
                rows_per_insert: 30,
                min_delay_ms: 500,
                max_delay_ms: 1500,
            },
            Self::Medium => PresetValues {
                workers_per_backend: 3,
                operations_per_worker: 5,
                rows_per_insert: 50,
                min_delay_ms: 200,
                max_delay_ms: 1000,
            },
            Self::Heavy => PresetValues {
                workers_per_backend: 5,
                operations_per_worker: 8,
                rows_per_insert: 80,
                min_delay_ms: 100,
                max_delay_ms: 500,
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Medium => "medium",
            Self::Heavy => "heavy",
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Preset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Self::Light),
            "medium" => Ok(Self::Medium),
            "heavy" => Ok(Self::Heavy),
            other => Err(ConfigError::UnknownPreset(other.to_string())),
        }
    }
}

/// Which statements a run issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    #[default]
    Insert,
    Update,
    Delete,
    Select,
    /// Reads and writes interleaved.
    Mixed,
}

impl Operation {
    pub fn mix(self) -> OperationMix {
        match self {
            Self::Insert => OperationMix::only(OperationKind::Insert),
            Self::Update => OperationMix::only(OperationKind::Update),
            Self::Delete => OperationMix::only(OperationKind::Delete),
            Self::Select => OperationMix::only(OperationKind::Select),
            Self::Mixed => OperationMix::read_heavy(),
        }
    }
}

impl FromStr for Operation {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "insert" => Ok(Self::Insert),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            "select" | "read" => Ok(Self::Select),
            "mixed" => Ok(Self::Mixed),
            other => Err(ConfigError::UnknownOperation(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Preset::Light, 2, 3, 30)]
    #[case(Preset::Medium, 3, 5, 50)]
    #[case(Preset::Heavy, 5, 8, 80)]
    fn preset_sizes(
        #[case] preset: Preset,
        #[case] workers: u16,
        #[case] operations: u32,
        #[case] rows: u32,
    ) {
        let values = preset.values();

        assert_eq!(values.workers_per_backend, workers);
        assert_eq!(values.operations_per_worker, operations);
        assert_eq!(values.rows_per_insert, rows);
        assert!(values.min_delay_ms <= values.max_delay_ms);
    }

    #[rstest]
    #[case("HEAVY", Preset::Heavy)]
    #[case(" light ", Preset::Light)]
    fn preset_parses_case_insensitively(#[case] input: &str, #[case] expected: Preset) {
        assert_eq!(input.parse::<Preset>().unwrap(), expected);
    }

    #[test]
    fn unknown_preset_is_rejected() {
        assert!(matches!(
            "extreme".parse::<Preset>(),
            Err(ConfigError::UnknownPreset(_))
        ));
    }

    #[test]
    fn mixed_operation_is_read_heavy() {
        let mix = Operation::Mixed.mix();

        assert_eq!(mix, OperationMix::read_heavy());
        assert_eq!(mix.single_kind(), None);
    }

    #[test]
    fn read_is_an_alias_for_select() {
        assert_eq!("read".parse::<Operation>().unwrap(), Operation::Select);
    }
}
