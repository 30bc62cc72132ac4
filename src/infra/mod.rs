// Infrastructure layer: concrete engines, configuration and report output.

pub(crate) use tablestress_app as app;
pub(crate) use tablestress_domain as domain;

pub mod adapters;
pub mod config;
pub mod process;
pub mod report;
pub mod sql;
