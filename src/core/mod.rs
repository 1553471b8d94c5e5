//! Core row-model machinery
//!
//! This module contains the pieces every reader and mapper builds on:
//! - `registry` - Class hierarchy and inherited, cached class vars
//! - `columns` - Column options, the typed parse table and column tables
//! - `hooks` - Per-class formatting and skip/abort override points
//! - `validation` - Field rules and error maps
//! - `schema` - Class definition builder and frozen schemas
//! - `row_model` - Typed rows with defaults, children and validation
//! - `dynamic` - Trailing dynamic-column groups

pub mod columns;
pub mod dynamic;
pub mod hooks;
pub mod registry;
pub mod row_model;
pub mod schema;
pub mod validation;

pub use columns::{ColumnOptions, ColumnType, DefaultValue};
pub use hooks::{DefaultHooks, RowModelHooks};
pub use registry::{Capability, ClassId, ClassVar, ConfigRegistry};
pub use row_model::{DefaultChange, RowModel, RowOptions};
pub use schema::{ModelKind, ModelRegistry, Schema};
pub use validation::{Errors, Rule};
