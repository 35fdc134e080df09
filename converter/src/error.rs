//! Error types for the grant conversion pipeline.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`ConfigError`] - Mapping configuration loading and compilation errors
//! - [`InputError`] - Input file reading errors (CSV/JSON)
//! - [`RecordError`] - Failures while building a single grant
//! - [`XmlError`] - Output document serialization errors
//! - [`ValidationError`] - External schema validator errors
//! - [`ConvertError`] - Top-level orchestration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use std::path::PathBuf;

use thiserror::Error;

use crate::parser::CsvError;

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while loading or compiling a mapping configuration.
///
/// Always fatal: raised before any record is processed.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file does not exist.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Failed to read file.
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed YAML.
    #[error("Invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A required top-level section is absent.
    #[error("Missing required section: {0}")]
    MissingSection(&'static str),

    /// A field rule names a transform that does not exist.
    #[error("Unknown transform '{transform}' for field '{field}'")]
    UnknownTransform { field: String, transform: String },

    /// A field rule carries none of the recognised value sources.
    #[error("Field '{0}' has no static_value, transform, source_field or concatenate")]
    EmptyRule(String),

    /// A regex pattern failed to compile.
    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// A strftime format string is malformed.
    #[error("Invalid date format '{format}' for field '{field}'")]
    InvalidDateFormat { field: String, format: String },

    /// `_complex:<name>` refers to an undefined complex field.
    #[error("Complex field '{0}' is not defined in complex_fields")]
    UndefinedComplexField(String),

    /// Any other semantic problem in the configuration.
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

// =============================================================================
// Input Errors
// =============================================================================

/// Errors while reading input or related-works files.
#[derive(Debug, Error)]
pub enum InputError {
    /// Input file does not exist.
    #[error("Input file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Extension is neither `.csv` nor `.json`.
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid CSV content.
    #[error("Error reading CSV file: {0}")]
    Csv(#[from] CsvError),

    /// Invalid JSON content.
    #[error("Invalid JSON file: {0}")]
    Json(#[from] serde_json::Error),

    /// JSON root (after applying `json_root_path`) is not an array.
    #[error("JSON file must contain a list of grant records")]
    NotAList,
}

// =============================================================================
// Record Errors
// =============================================================================

/// Failure while building one grant. Recoverable: the record is skipped.
#[derive(Debug, Error)]
pub enum RecordError {
    /// Top-level record is not an object.
    #[error("Record is not an object (found {0})")]
    NotAnObject(&'static str),

    /// A complex-field member selected for output is not an object.
    #[error("Member {index} of '{field}' is not an object")]
    InvalidMember { field: String, index: usize },
}

// =============================================================================
// XML Errors
// =============================================================================

/// Errors while serializing the output document.
#[derive(Debug, Error)]
pub enum XmlError {
    /// IO error on the output sink.
    #[error("XML write error: {0}")]
    Io(#[from] std::io::Error),

    /// Writer-level error.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Serialized output was not UTF-8.
    #[error("XML output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Errors from the external schema validator (not validity failures).
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The validator program could not be launched.
    #[error("Cannot run validator '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A path handed to the validator does not exist.
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),
}

// =============================================================================
// Conversion Errors (top-level)
// =============================================================================

/// Top-level conversion errors.
///
/// This is the error type returned by [`crate::transform::pipeline::Converter::convert_file`].
/// Per-record and per-related-file failures never surface here; they are
/// logged and counted instead.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Input error.
    #[error("Input error: {0}")]
    Input(#[from] InputError),

    /// Output error.
    #[error("Output error: {0}")]
    Xml(#[from] XmlError),

    /// Validation error.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for input operations.
pub type InputResult<T> = Result<T, InputError>;

/// Result type for single-record operations.
pub type RecordResult<T> = Result<T, RecordError>;

/// Result type for conversion operations.
pub type ConvertResult<T> = Result<T, ConvertError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // ConfigError -> ConvertError
        let config_err = ConfigError::MissingSection("field_mappings");
        let convert_err: ConvertError = config_err.into();
        assert!(convert_err.to_string().contains("field_mappings"));

        // InputError -> ConvertError
        let input_err = InputError::UnsupportedFormat(".xlsx".into());
        let convert_err: ConvertError = input_err.into();
        assert!(convert_err.to_string().contains(".xlsx"));
    }

    #[test]
    fn test_unknown_transform_format() {
        let err = ConfigError::UnknownTransform {
            field: "award-start-date".into(),
            transform: "fromat_date".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("award-start-date"));
        assert!(msg.contains("fromat_date"));
    }

    #[test]
    fn test_record_error_format() {
        let err = RecordError::InvalidMember {
            field: "members".into(),
            index: 2,
        };
        assert_eq!(err.to_string(), "Member 2 of 'members' is not an object");
    }
}
