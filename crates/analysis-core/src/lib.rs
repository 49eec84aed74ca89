pub mod error;
pub mod metric;
pub mod stats;
pub mod types;

pub use error::*;
pub use metric::*;
pub use types::*;
