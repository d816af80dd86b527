pub mod probe;
pub mod types;

pub use probe::*;
pub use types::*;
