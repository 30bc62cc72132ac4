use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Insert,
    Update,
    Delete,
    Select,
}

impl OperationKind {
    pub const ALL: [Self; 4] = [Self::Insert, Self::Update, Self::Delete, Self::Select];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Select => "select",
        }
    }

    pub fn is_mutating(self) -> bool {
        !matches!(self, Self::Select)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relative weights used to draw an operation kind for each iteration.
///
/// A zero weight disables the kind; a mix with only one non-zero weight is a
/// single-kind workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationMix {
    #[serde(default)]
    pub insert: u32,
    #[serde(default)]
    pub update: u32,
    #[serde(default)]
    pub delete: u32,
    #[serde(default)]
    pub select: u32,
}

impl OperationMix {
    pub fn only(kind: OperationKind) -> Self {
        let mut mix = Self {
            insert: 0,
            update: 0,
            delete: 0,
            select: 0,
        };
        *mix.weight_mut(kind) = 1;
        mix
    }

    /// 60% reads, 40% inserts.
    pub fn read_heavy() -> Self {
        Self {
            insert: 40,
            update: 0,
            delete: 0,
            select: 60,
        }
    }

    pub fn weight(&self, kind: OperationKind) -> u32 {
        match kind {
            OperationKind::Insert => self.insert,
            OperationKind::Update => self.update,
            OperationKind::Delete => self.delete,
            OperationKind::Select => self.select,
        }
    }

    fn weight_mut(&mut self, kind: OperationKind) -> &mut u32 {
        match kind {
            OperationKind::Insert => &mut self.insert,
            OperationKind::Update => &mut self.update,
            OperationKind::Delete => &mut self.delete,
            OperationKind::Select => &mut self.select,
        }
    }

    pub fn total_weight(&self) -> u32 {
        self.insert
            .saturating_add(self.update)
            .saturating_add(self.delete)
            .saturating_add(self.select)
    }

    /// The kind this mix always produces, if it produces exactly one.
    pub fn single_kind(&self) -> Option<OperationKind> {
        let mut enabled = OperationKind::ALL
            .into_iter()
            .filter(|kind| self.weight(*kind) > 0);
        let first = enabled.next()?;
        enabled.next().is_none().then_some(first)
    }

    /// Maps a point in `0..total_weight()` to the kind owning that slice.
    pub fn pick(&self, mut point: u32) -> Option<OperationKind> {
        for kind in OperationKind::ALL {
            let weight = self.weight(kind);
            if point < weight {
                return Some(kind);
            }
            point -= weight;
        }
        None
    }

    pub fn label(&self) -> &'static str {
        self.single_kind().map_or("mixed", OperationKind::as_str)
    }
}
