//! CSV Row Model Library
//! # Overview
//!
//! This library maps CSV rows onto declared, typed row-model classes: each
//! row becomes a [`RowModel`] whose attributes are parsed, defaulted and
//! validated according to the columns its class declares.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (Value, Attributes, Context, RowModelError)
//! - [`cli`] - CLI arguments parsing
//! - [`core`] - Row-model machinery:
//!   - [`core::registry`] - Class hierarchy and inherited class vars
//!   - [`core::schema`] - Class definitions frozen into schemas
//!   - [`core::row_model`] - Typed, validated rows with children
//! - [`mapper`] - Derived attributes computed from row models
//! - [`io`] - Streaming file reader and CSV export
//! - [`pipeline`] - Read-validate-export orchestration
//!
//! # Reading
//!
//! A [`FileReader`] yields one row model per top-level CSV row. Rows that
//! a class's `has_many` relation accepts are attached to the previous
//! top-level row as children. Iteration honours two policies:
//!
//! - **skip**: the row is passed over (invalid rows by default)
//! - **abort**: reading stops (never by default, always after an open failure)
//!
//! # Export
//!
//! [`ExportRowModel`] lays any [`io::ExportSource`] out in a class's column
//! order, expanding a trailing dynamic column into one cell per value.

// Module declarations
pub mod cli;
pub mod core;
pub mod io;
pub mod mapper;
pub mod pipeline;
pub mod types;

pub use core::{ColumnOptions, ColumnType, ModelRegistry, RowModel, RowOptions, Rule, Schema};
pub use io::{write_csv, ExportRowModel, FileReader, ReaderConfig};
pub use mapper::{Mapper, MapperRegistry};
pub use pipeline::{ImportPipeline, ImportSummary};
pub use types::{Attributes, Context, RowModelError, Value};
