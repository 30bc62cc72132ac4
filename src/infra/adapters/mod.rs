pub mod postgres;
pub mod trino;

pub use postgres::{PostgresConnector, PostgresSettings};
pub use trino::{TrinoConnector, TrinoSettings};
