//! Error types for csv-row-model
//!
//! This module defines the errors that can escape the public API. Errors are
//! designed to be descriptive enough to print straight to a terminal.
//!
//! # Error Categories
//!
//! - **Definition Errors**: raised while declaring columns, attributes and
//!   class relationships. These are fatal and never recovered.
//! - **Lookup Errors**: asking a row model or mapper for a name it never declared.
//! - **File I/O Errors**: file not found, permission denied, etc.
//! - **CSV Parsing Errors**: a physical line the tokenizer could not split.
//!
//! Per-row failures and validation failures are *not* errors in this sense:
//! they are recorded on the row model that produced them and iteration goes on.

use thiserror::Error;

/// Main error type for csv-row-model
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RowModelError {
    /// An option key outside the recognised set was supplied
    #[error("Invalid option(s) for {owner}: {}", options.join(", "))]
    InvalidOption {
        /// Column or attribute the options were declared for
        owner: String,
        /// The unrecognised keys
        options: Vec<String>,
    },

    /// A column type outside the closed parsing table
    #[error("Unsupported column type '{type_name}', type must be one of: untyped, text, integer, float, date, boolean")]
    UnsupportedType {
        /// The type name that was requested
        type_name: String,
    },

    /// A class declared a second dynamic column
    #[error("{class} already declares dynamic column '{existing}', cannot add '{column}'")]
    DuplicateDynamicColumn {
        /// Class name
        class: String,
        /// Dynamic column already present
        existing: String,
        /// Dynamic column being declared
        column: String,
    },

    /// A dynamic column is followed by another column
    #[error("Dynamic column '{column}' of {class} must be the last declared column")]
    DynamicColumnNotLast {
        /// Class name
        class: String,
        /// Dynamic column name
        column: String,
    },

    /// Options were merged into a column that was never declared
    #[error("Column '{column}' is not declared on {class}")]
    UnknownColumn {
        /// Class name
        class: String,
        /// Column name
        column: String,
    },

    /// A class var was resolved on a class that never gained the capability
    #[error("{class} does not include capability '{capability}'")]
    CapabilityMissing {
        /// Class name
        class: String,
        /// Capability name
        capability: String,
    },

    /// A class id that does not belong to the registry
    #[error("Unknown class id {id}")]
    UnknownClass {
        /// The class id
        id: usize,
    },

    /// `maps_to` was called twice for the same mapper class
    #[error("Mapper {class} is already mapped to a row model, maps_to should only be called once")]
    AlreadyMapped {
        /// Mapper class name
        class: String,
    },

    /// A mapper class never called `maps_to`
    #[error("Mapper {class} does not map to a row model")]
    MissingRowModel {
        /// Mapper class name
        class: String,
    },

    /// `has_many` relationships loop back onto a class already being resolved
    #[error("Cyclic has_many relationship through {class}")]
    CyclicRelation {
        /// Class where the cycle was detected
        class: String,
    },

    /// Reading a column or attribute that is not declared
    #[error("Unknown attribute '{name}'")]
    UnknownAttribute {
        /// The attribute name
        name: String,
    },

    /// File not found at the specified path
    #[error("File not found: {path}")]
    FileNotFound {
        /// The path that was not found
        path: String,
    },

    /// I/O error occurred while reading or writing files
    #[error("I/O error: {message}")]
    IoError {
        /// Description of the I/O error
        message: String,
    },

    /// CSV parsing error occurred
    #[error("CSV parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    ParseError {
        /// Line number where the error occurred (if available)
        line: Option<u64>,
        /// Description of the parsing error
        message: String,
    },
}

// Conversion from io::Error to RowModelError
impl From<std::io::Error> for RowModelError {
    fn from(error: std::io::Error) -> Self {
        RowModelError::IoError {
            message: error.to_string(),
        }
    }
}

// Conversion from csv::Error to RowModelError
impl From<csv::Error> for RowModelError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        RowModelError::ParseError {
            line,
            message: error.to_string(),
        }
    }
}

// Helper functions for creating common errors

impl RowModelError {
    /// True for errors raised while defining classes
    pub fn is_definition(&self) -> bool {
        matches!(
            self,
            RowModelError::InvalidOption { .. }
                | RowModelError::UnsupportedType { .. }
                | RowModelError::DuplicateDynamicColumn { .. }
                | RowModelError::DynamicColumnNotLast { .. }
                | RowModelError::UnknownColumn { .. }
                | RowModelError::CapabilityMissing { .. }
                | RowModelError::UnknownClass { .. }
                | RowModelError::AlreadyMapped { .. }
                | RowModelError::MissingRowModel { .. }
                | RowModelError::CyclicRelation { .. }
        )
    }

    /// Create an InvalidOption error
    pub fn invalid_option<S: AsRef<str>>(owner: &str, options: &[S]) -> Self {
        RowModelError::InvalidOption {
            owner: owner.to_string(),
            options: options.iter().map(|o| o.as_ref().to_string()).collect(),
        }
    }

    /// Create an UnsupportedType error
    pub fn unsupported_type(type_name: &str) -> Self {
        RowModelError::UnsupportedType {
            type_name: type_name.to_string(),
        }
    }

    /// Create an UnknownColumn error
    pub fn unknown_column(class: &str, column: &str) -> Self {
        RowModelError::UnknownColumn {
            class: class.to_string(),
            column: column.to_string(),
        }
    }

    /// Create a CapabilityMissing error
    pub fn capability_missing(class: &str, capability: &str) -> Self {
        RowModelError::CapabilityMissing {
            class: class.to_string(),
            capability: capability.to_string(),
        }
    }

    /// Create an UnknownAttribute error
    pub fn unknown_attribute(name: &str) -> Self {
        RowModelError::UnknownAttribute {
            name: name.to_string(),
        }
    }

    /// Create a ParseError error
    pub fn parse_error(line: Option<u64>, message: &str) -> Self {
        RowModelError::ParseError {
            line,
            message: message.to_string(),
        }
    }
}
