pub mod backend;

pub use backend::{BackendConnector, BackendError, BackendHandle};

#[cfg(test)]
pub use backend::MockBackendHandle;
