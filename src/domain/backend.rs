use std::fmt;

use serde::{Deserialize, Serialize};

const MAX_LENGTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendIdError {
    Empty,
    TooLong { len: usize, max: usize },
    InvalidChar(char),
}

impl fmt::Display for BackendIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "Backend id cannot be empty"),
            Self::TooLong { len, max } => {
                write!(f, "Backend id too long: {} chars (max {})", len, max)
            }
            Self::InvalidChar(c) => write!(f, "Backend id contains invalid character {:?}", c),
        }
    }
}

impl std::error::Error for BackendIdError {}

/// Key identifying one storage backend for the lifetime of a run.
///
/// Ids double as worker name prefixes and report keys, so they are restricted
/// to ASCII alphanumerics plus `_`, `-` and `.`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BackendId(String);

impl BackendId {
    pub fn new(id: impl Into<String>) -> Result<Self, BackendIdError> {
        let id = id.into();
        let trimmed = id.trim();

        if trimmed.is_empty() {
            return Err(BackendIdError::Empty);
        }

        let char_count = trimmed.chars().count();
        if char_count > MAX_LENGTH {
            return Err(BackendIdError::TooLong {
                len: char_count,
                max: MAX_LENGTH,
            });
        }

        if let Some(c) = trimmed
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
        {
            return Err(BackendIdError::InvalidChar(c));
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for BackendId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for BackendId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        BackendId::new(s).map_err(serde::de::Error::custom)
    }
}

/// One interchangeable storage target.
///
/// `target` is interpreted by the connector: a catalog name for Trino, a DSN
/// for PostgreSQL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backend {
    pub id: BackendId,
    pub target: String,
}

impl Backend {
    pub fn new(id: BackendId, target: impl Into<String>) -> Self {
        Self {
            id,
            target: target.into(),
        }
    }

    /// Backend whose target is its own id (Trino catalogs are usually named this way).
    pub fn named(id: BackendId) -> Self {
        let target = id.as_str().to_string();
        Self { id, target }
    }
}
