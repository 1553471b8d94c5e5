//! Mapper layer
//!
//! Derived attributes computed from row models:
//! - `attributes` - Mapper class definitions and their registry
//! - `model` - Mapper instances with dependency-aware errors

pub mod attributes;
pub mod model;

pub use attributes::{MapperAttributeOptions, MapperRegistry, MapperSchema};
pub use model::Mapper;
