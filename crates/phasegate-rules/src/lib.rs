//! Table-driven lexical detector for workflow bypass attempts.

pub mod detector;
pub mod rule;
pub mod tokenize;
pub mod types;

pub use detector::*;
pub use rule::*;
pub use tokenize::*;
pub use types::*;
