pub mod backoff;
pub mod binding;
pub mod errors;
pub mod ids;
pub mod model;
pub mod snapshot;
pub mod time;
pub mod transition;
pub mod types;

pub use backoff::*;
pub use binding::*;
pub use errors::*;
pub use ids::*;
pub use model::*;
pub use snapshot::*;
pub use time::*;
pub use transition::*;
pub use types::*;
