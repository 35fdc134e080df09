//! # Grantmap - grant records to Crossref Grant ID XML
//!
//! Grantmap converts grant records from CSV or JSON files into Crossref
//! Grant ID deposit XML, driven by a declarative YAML mapping.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  CSV / JSON │────▶│   Parser    │────▶│  Transform  │────▶│  Grant XML  │
//! │  (records)  │     │  (auto-enc) │     │ (YAML rules)│     │  (doi_batch)│
//! └─────────────┘     └─────────────┘     └──────▲──────┘     └─────────────┘
//!                                                │
//!                                        related works index
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use grantmap::Converter;
//! use std::path::Path;
//!
//! let mut converter = Converter::from_config_file("mapping.yaml")?;
//! let summary = converter.convert_file(Path::new("grants.csv"), Path::new("grants.xml"), &[])?;
//! println!("{} grants, {} skipped", summary.processed, summary.failed);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Input records and output document model
//! - [`config`] - YAML mapping configuration
//! - [`parser`] - CSV/JSON readers with auto-detection
//! - [`transform`] - Field rules, investigators, related works, pipeline
//! - [`xml`] - Grant ID XML writer
//! - [`validation`] - XSD validation via `xmllint`
//! - [`logging`] - `tracing` subscriber setup

// Core modules
pub mod error;
pub mod models;

// Configuration
pub mod config;

// Parsing
pub mod parser;

// Transformation
pub mod transform;

// Output
pub mod xml;

// Validation
pub mod validation;

// Logging
pub mod logging;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError, ConvertError, ConvertResult, InputError, RecordError, ValidationError, XmlError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    Affiliation, Document, Funder, Funding, Grant, Header, IdentifierType, Person, Project,
    Record, RelatedWork, Value,
};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::{MappingConfig, Namespaces, EXAMPLE_CONFIG};

// =============================================================================
// Re-exports - Parsing
// =============================================================================

pub use parser::{
    decode_content, detect_delimiter, detect_encoding, parse_bytes_auto, parse_csv_file_auto,
    parse_csv_str, parse_json_str, read_records, CsvError, ParseResult,
};

// =============================================================================
// Re-exports - Transform
// =============================================================================

pub use transform::{
    normalize_orcid, transforms_description, Conversion, ConversionSummary, Converter, FieldRule,
    GrantBuilder, RelatedWorksIndex, Transform,
};

// =============================================================================
// Re-exports - Output and validation
// =============================================================================

pub use validation::{SchemaValidator, ValidationReport, XmllintValidator};
pub use xml::{to_xml_string, write_document, write_document_file};
