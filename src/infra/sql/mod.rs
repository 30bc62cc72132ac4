//! Rendering of structured statements into engine-specific SQL text.

mod dialect;
mod render;

pub use dialect::{SqlDialect, quote_ident, quote_literal};
pub use render::render;
