pub mod decisions;
pub mod queries;
pub mod summary;
pub mod types;

pub use types::*;
