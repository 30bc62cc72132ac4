use crate::domain::{
    Assignment, PARTITION_COLUMN, Predicate, STRESS_COLUMNS, SelectShape, Statement, StressRow,
    TableRef,
};

use super::dialect::{SqlDialect, quote_ident, quote_literal};

pub fn render(dialect: SqlDialect, statement: &Statement) -> String {
    match statement {
        Statement::Probe => "SELECT 1".to_string(),
        Statement::CreateNamespace { namespace } => {
            format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(namespace))
        }
        Statement::DropTable { table } => format!("DROP TABLE IF EXISTS {}", qualified(table)),
        Statement::CreateTable { table } => create_table(dialect, table),
        Statement::Insert { table, rows } => insert(dialect, table, rows),
        Statement::Update {
            table,
            assignments,
            predicate,
        } => {
            let set = assignments
                .iter()
                .map(|a| assignment(dialect, a))
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "UPDATE {} SET {} WHERE {}",
                qualified(table),
                set,
                condition(dialect, predicate)
            )
        }
        Statement::Delete { table, predicate } => format!(
            "DELETE FROM {} WHERE {}",
            qualified(table),
            condition(dialect, predicate)
        ),
        Statement::Select {
            table,
            shape,
            predicate,
        } => select(dialect, table, *shape, predicate.as_ref()),
    }
}

fn qualified(table: &TableRef) -> String {
    format!("{}.{}", quote_ident(&table.namespace), quote_ident(&table.name))
}

fn create_table(dialect: SqlDialect, table: &TableRef) -> String {
    let columns = STRESS_COLUMNS
        .iter()
        .map(|(name, ty)| format!("{} {}", name, dialect.column_type(*ty)))
        .collect::<Vec<_>>()
        .join(", ");
    match dialect.partitioning_clause(PARTITION_COLUMN) {
        Some(clause) => format!("CREATE TABLE {} ({}) {}", qualified(table), columns, clause),
        None => format!("CREATE TABLE {} ({})", qualified(table), columns),
    }
}

fn insert(dialect: SqlDialect, table: &TableRef, rows: &[StressRow]) -> String {
    let columns = STRESS_COLUMNS
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ");
    let values = rows
        .iter()
        .map(|row| {
            format!(
                "({}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, LOCALTIMESTAMP, LOCALTIMESTAMP, CURRENT_DATE)",
                row.id,
                row.batch_id,
                quote_literal(&row.worker),
                quote_literal(&row.category),
                quote_literal(&row.thread_group),
                quote_literal(&row.name),
                dialect.float_literal(row.value),
                quote_literal(&row.status),
                row.priority,
                row.version,
                quote_literal(&row.random_data),
            )
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("INSERT INTO {} ({}) VALUES {}", qualified(table), columns, values)
}

fn assignment(dialect: SqlDialect, assignment: &Assignment) -> String {
    match assignment {
        Assignment::SetValue(v) => format!("value = {}", dialect.float_literal(*v)),
        Assignment::ScaleValue(factor) => {
            format!("value = value * {}", dialect.float_literal(*factor))
        }
        Assignment::SetStatus(s) => format!("status = {}", quote_literal(s)),
        Assignment::SetPriority(p) => format!("priority = {}", p),
        Assignment::SetCategory(c) => format!("category = {}", quote_literal(c)),
        Assignment::BumpVersion => "version = version + 1".to_string(),
        Assignment::Touch => "last_updated = LOCALTIMESTAMP".to_string(),
    }
}

fn condition(dialect: SqlDialect, predicate: &Predicate) -> String {
    match predicate {
        Predicate::IdEquals(id) => format!("id = {}", id),
        Predicate::IdBetween { low, high } => format!("id BETWEEN {} AND {}", low, high),
        Predicate::IdModulo { modulus, remainder } => {
            format!("id % {} = {}", modulus, remainder)
        }
        Predicate::CategoryIs(c) => format!("category = {}", quote_literal(c)),
        Predicate::ThreadGroupIs(g) => format!("thread_group = {}", quote_literal(g)),
        Predicate::StatusIs(s) => format!("status = {}", quote_literal(s)),
        Predicate::ValueBetween { low, high } => format!(
            "value BETWEEN {} AND {}",
            dialect.float_literal(*low),
            dialect.float_literal(*high)
        ),
        Predicate::ValueAbove(v) => format!("value > {}", dialect.float_literal(*v)),
        Predicate::PriorityAbove(p) => format!("priority > {}", p),
        Predicate::PriorityAtMost(p) => format!("priority <= {}", p),
        Predicate::VersionBelow(v) => format!("version < {}", v),
        Predicate::All(parts) => match parts.as_slice() {
            [] => "1 = 1".to_string(),
            [single] => condition(dialect, single),
            _ => parts
                .iter()
                .map(|p| format!("({})", condition(dialect, p)))
                .collect::<Vec<_>>()
                .join(" AND "),
        },
    }
}

fn select(
    dialect: SqlDialect,
    table: &TableRef,
    shape: SelectShape,
    predicate: Option<&Predicate>,
) -> String {
    let filter = predicate
        .map(|p| format!(" WHERE {}", condition(dialect, p)))
        .unwrap_or_default();
    let from = qualified(table);
    match shape {
        SelectShape::Count => format!("SELECT COUNT(*) AS row_count FROM {}{}", from, filter),
        SelectShape::CountPerPartition => format!(
            "SELECT partition_date, COUNT(*) AS row_count FROM {}{} GROUP BY partition_date ORDER BY partition_date",
            from, filter
        ),
        SelectShape::AvgValuePerPartition => format!(
            "SELECT partition_date, AVG(value) AS avg_value FROM {}{} GROUP BY partition_date ORDER BY partition_date",
            from, filter
        ),
        SelectShape::Latest { limit } => format!(
            "SELECT * FROM {}{} ORDER BY created_at DESC LIMIT {}",
            from, filter, limit
        ),
        SelectShape::ValueExtremesPerName { limit } => format!(
            "SELECT name, MIN(value) AS min_value, MAX(value) AS max_value FROM {}{} GROUP BY name ORDER BY name LIMIT {}",
            from, filter, limit
        ),
    }
}
