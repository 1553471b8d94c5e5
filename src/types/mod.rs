//! Types module
//!
//! Contains core data structures used throughout the crate:
//! - `value`: typed cell values and ordered attribute maps
//! - `context`: the context bag handed from readers to row models
//! - `error`: error types for csv-row-model

pub mod context;
pub mod error;
pub mod value;

pub use context::Context;
pub use error::RowModelError;
pub use value::{Attributes, Value};
