pub mod error;
pub mod models;

pub use error::{JavarunError, Result};
pub use models::*;
