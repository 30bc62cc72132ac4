use crate::domain::ColumnType;

/// Quote identifier for safe SQL representation.
/// Doubles any embedded double quotes and wraps in double quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Escape string literal for safe SQL interpolation.
/// Doubles any embedded single quotes and wraps in single quotes.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    /// Trino over Iceberg catalogs.
    Trino,
    Postgres,
}

impl SqlDialect {
    pub fn column_type(self, column: ColumnType) -> &'static str {
        match (self, column) {
            (_, ColumnType::BigInt) => "BIGINT",
            (_, ColumnType::Integer) => "INTEGER",
            (Self::Trino, ColumnType::Double) => "DOUBLE",
            (Self::Postgres, ColumnType::Double) => "DOUBLE PRECISION",
            (_, ColumnType::Varchar) => "VARCHAR",
            (_, ColumnType::Timestamp) => "TIMESTAMP",
            (_, ColumnType::Date) => "DATE",
        }
    }

    /// Table properties appended after the column list.
    pub fn partitioning_clause(self, column: &str) -> Option<String> {
        match self {
            Self::Trino => Some(format!(
                "WITH (partitioning = ARRAY[{}])",
                quote_literal(column)
            )),
            Self::Postgres => None,
        }
    }

    /// Float literal that always parses as a floating point value.
    pub fn float_literal(self, value: f64) -> String {
        match self {
            Self::Trino => format!("DOUBLE {}", quote_literal(&format!("{:?}", value))),
            Self::Postgres => format!("{:?}", value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn quote_ident_with_double_quote() {
        assert_eq!(quote_ident("user\"name"), "\"user\"\"name\"");
    }

    #[test]
    fn quote_literal_with_single_quote() {
        assert_eq!(quote_literal("it's"), "'it''s'");
    }

    #[test]
    fn quote_literal_empty() {
        assert_eq!(quote_literal(""), "''");
    }

    #[rstest]
    #[case(SqlDialect::Trino, "DOUBLE")]
    #[case(SqlDialect::Postgres, "DOUBLE PRECISION")]
    fn double_column_type(#[case] dialect: SqlDialect, #[case] expected: &str) {
        assert_eq!(dialect.column_type(ColumnType::Double), expected);
    }

    #[test]
    fn only_trino_partitions() {
        assert_eq!(
            SqlDialect::Trino.partitioning_clause("partition_date").as_deref(),
            Some("WITH (partitioning = ARRAY['partition_date'])")
        );
        assert_eq!(SqlDialect::Postgres.partitioning_clause("partition_date"), None);
    }

    #[rstest]
    #[case(SqlDialect::Trino, 100.0, "DOUBLE '100.0'")]
    #[case(SqlDialect::Postgres, 12.5, "12.5")]
    fn float_literal(#[case] dialect: SqlDialect, #[case] value: f64, #[case] expected: &str) {
        assert_eq!(dialect.float_literal(value), expected);
    }
}
