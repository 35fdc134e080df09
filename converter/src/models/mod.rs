//! Domain models for the grant conversion pipeline.
//!
//! This module contains the core data structures used throughout the pipeline:
//!
//! - [`Record`] / [`Value`] - Normalized input records (CSV rows, JSON objects)
//! - [`Document`] - Complete output document (header + grants)
//! - [`Grant`] - One output unit per successfully converted record
//! - [`Person`] - Investigator with optional affiliation and ORCID
//! - [`RelatedWork`] - A relation from a grant to another work

mod record;

pub use record::{Record, Value};

// =============================================================================
// Document
// =============================================================================

/// A complete output document: header followed by grants in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub header: Header,
    pub grants: Vec<Grant>,
}

/// Batch header.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub batch_id: String,
    /// `YYYYmmddHHMMSS`.
    pub timestamp: String,
    pub depositor_name: String,
    pub depositor_email: String,
    pub registrant: String,
}

// =============================================================================
// Grant
// =============================================================================

/// One grant unit.
///
/// Field order mirrors the element order of the output schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Grant {
    pub project: Project,
    pub award_number: Option<String>,
    pub award_start_date: Option<String>,
    pub related_works: Vec<RelatedWork>,
    pub doi_data: DoiData,
}

/// Project block of a grant.
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub title: Option<String>,
    pub investigators: Vec<Person>,
    pub description: Option<String>,
    pub award_amount: Option<AwardAmount>,
    pub funding: Funding,
}

/// Award amount with optional ISO 4217 currency code.
#[derive(Debug, Clone, PartialEq)]
pub struct AwardAmount {
    pub amount: String,
    pub currency: Option<String>,
}

/// Funding block. Always emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct Funding {
    /// `funding-type` attribute (default `grant`).
    pub funding_type: String,
    pub funder: Option<Funder>,
    pub scheme: Option<String>,
}

/// Funder identification: a ROR id or a name/id pair, never both.
#[derive(Debug, Clone, PartialEq)]
pub enum Funder {
    Ror(String),
    Named {
        name: Option<String>,
        id: Option<String>,
    },
}

/// `doi_data` block. Always emitted.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DoiData {
    pub doi: Option<String>,
    pub resource: Option<String>,
}

// =============================================================================
// Person
// =============================================================================

/// Role attribute value used for every emitted investigator.
pub const LEAD_INVESTIGATOR: &str = "lead_investigator";

/// An investigator.
#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    pub role: String,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub affiliation: Option<Affiliation>,
    /// Normalized `https://orcid.org/NNNN-NNNN-NNNN-NNNN` form.
    pub orcid: Option<String>,
}

impl Person {
    /// Create a lead investigator with no fields set.
    pub fn lead() -> Self {
        Self {
            role: LEAD_INVESTIGATOR.to_string(),
            given_name: None,
            family_name: None,
            affiliation: None,
            orcid: None,
        }
    }
}

/// Institutional affiliation.
#[derive(Debug, Clone, PartialEq)]
pub struct Affiliation {
    pub institution: String,
    /// ISO 3166-1 alpha-2.
    pub country: Option<String>,
}

// =============================================================================
// Related Works
// =============================================================================

/// Identifier scheme of a related work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierType {
    Doi,
    Uri,
}

impl IdentifierType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentifierType::Doi => "doi",
            IdentifierType::Uri => "uri",
        }
    }
}

/// A relation from a grant to another work.
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedWork {
    pub identifier: String,
    pub identifier_type: IdentifierType,
    pub relationship_type: String,
}

// =============================================================================
// Tests
// =============================================================================
