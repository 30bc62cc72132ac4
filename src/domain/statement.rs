//! Structured statements exchanged between the generator and the backends.
//!
//! Statements carry data, not SQL text: each backend adapter renders them in
//! its own dialect.

use std::fmt;

use super::operation::OperationKind;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub namespace: String,
    pub name: String,
}

impl TableRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    BigInt,
    Integer,
    Double,
    Varchar,
    Timestamp,
    Date,
}

/// Columns of the stress table, in insertion order.
pub const STRESS_COLUMNS: &[(&str, ColumnType)] = &[
    ("id", ColumnType::BigInt),
    ("batch_id", ColumnType::BigInt),
    ("worker", ColumnType::Varchar),
    ("category", ColumnType::Varchar),
    ("thread_group", ColumnType::Varchar),
    ("name", ColumnType::Varchar),
    ("value", ColumnType::Double),
    ("status", ColumnType::Varchar),
    ("priority", ColumnType::Integer),
    ("version", ColumnType::Integer),
    ("random_data", ColumnType::Varchar),
    ("created_at", ColumnType::Timestamp),
    ("last_updated", ColumnType::Timestamp),
    ("partition_date", ColumnType::Date),
];

/// Column the table is partitioned by, where the backend supports it.
pub const PARTITION_COLUMN: &str = "partition_date";

/// One synthetic row. Timestamp and date columns take the backend's clock.
#[derive(Debug, Clone, PartialEq)]
pub struct StressRow {
    pub id: i64,
    pub batch_id: i64,
    pub worker: String,
    pub category: String,
    pub thread_group: String,
    pub name: String,
    pub value: f64,
    pub status: String,
    pub priority: i32,
    pub version: i32,
    pub random_data: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Assignment {
    SetValue(f64),
    ScaleValue(f64),
    SetStatus(String),
    SetPriority(i32),
    SetCategory(String),
    BumpVersion,
    /// `last_updated` takes the backend's current timestamp.
    Touch,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    IdEquals(i64),
    IdBetween { low: i64, high: i64 },
    IdModulo { modulus: i64, remainder: i64 },
    CategoryIs(String),
    ThreadGroupIs(String),
    StatusIs(String),
    ValueBetween { low: f64, high: f64 },
    ValueAbove(f64),
    PriorityAbove(i32),
    PriorityAtMost(i32),
    VersionBelow(i32),
    All(Vec<Predicate>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectShape {
    Count,
    CountPerPartition,
    AvgValuePerPartition,
    Latest { limit: u32 },
    ValueExtremesPerName { limit: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Connectivity check (`SELECT 1`).
    Probe,
    CreateNamespace {
        namespace: String,
    },
    DropTable {
        table: TableRef,
    },
    CreateTable {
        table: TableRef,
    },
    Insert {
        table: TableRef,
        rows: Vec<StressRow>,
    },
    Update {
        table: TableRef,
        assignments: Vec<Assignment>,
        predicate: Predicate,
    },
    Delete {
        table: TableRef,
        predicate: Predicate,
    },
    Select {
        table: TableRef,
        shape: SelectShape,
        predicate: Option<Predicate>,
    },
}

impl Statement {
    /// Workload kind of the statement; `None` for probes and DDL.
    pub fn kind(&self) -> Option<OperationKind> {
        match self {
            Self::Insert { .. } => Some(OperationKind::Insert),
            Self::Update { .. } => Some(OperationKind::Update),
            Self::Delete { .. } => Some(OperationKind::Delete),
            Self::Select { .. } => Some(OperationKind::Select),
            Self::Probe
            | Self::CreateNamespace { .. }
            | Self::DropTable { .. }
            | Self::CreateTable { .. } => None,
        }
    }

    /// Short label for logs.
    pub fn describe(&self) -> String {
        match self {
            Self::Probe => "probe".to_string(),
            Self::CreateNamespace { namespace } => format!("create namespace {}", namespace),
            Self::DropTable { table } => format!("drop table {}", table),
            Self::CreateTable { table } => format!("create table {}", table),
            Self::Insert { table, rows } => format!("insert {} rows into {}", rows.len(), table),
            Self::Update { table, .. } => format!("update {}", table),
            Self::Delete { table, .. } => format!("delete from {}", table),
            Self::Select { table, shape, .. } => format!("select {:?} from {}", shape, table),
        }
    }
}
