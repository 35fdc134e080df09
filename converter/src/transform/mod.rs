//! Transformation module.
//!
//! - Rules: field rules and named transforms
//! - Complex: investigator resolution and ORCID normalization
//! - Related: related-works index and embedded extraction
//! - Builder: grant and header construction
//! - Pipeline: the [`Converter`] orchestrator

pub mod builder;
pub mod complex;
pub mod pipeline;
pub mod related;
pub mod rules;

pub use builder::{build_header, GrantBuilder};
pub use complex::{normalize_orcid, InvestigatorRule};
pub use pipeline::{Conversion, ConversionSummary, Converter};
pub use related::{RelatedWorksConfig, RelatedWorksIndex};
pub use rules::{transforms_description, FieldRule, Transform};
