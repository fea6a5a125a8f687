pub mod error;
pub mod filters;
pub mod search;
pub mod traits;

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use error::*;
pub use filters::*;
pub use search::{SearchParseError, SearchQuery};
pub use traits::*;
