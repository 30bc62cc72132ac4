pub use tablestress_app as app;
pub use tablestress_domain as domain;
pub use tablestress_infra as infra;

pub mod error;
