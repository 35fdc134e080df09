//! Investigator resolution.
//!
//! Investigators come either from a single "Family, Given" column (simple)
//! or from a list of member objects inside the record (complex). A complex
//! field picks one member by role priority and maps its fields to a
//! [`Person`], normalizing the ORCID and cleaning up the organisation.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::{ComplexFieldSpec, RuleSpec, COMPLEX_PREFIX, LITERAL_PREFIX};
use crate::error::{ConfigError, ConfigResult, RecordError, RecordResult};
use crate::models::{Affiliation, Person, Record, Value};
use crate::transform::rules::SplitName;

/// Affiliation used when a simple investigator has no institution value.
pub const UNKNOWN_INSTITUTION: &str = "Unknown Institution";

const ORCID_PREFIX: &str = "https://orcid.org/";
const ORCID_HOST: &str = "orcid.org/";
const ORCID_PLACEHOLDER: &str = "https://orcid.org/-";

static ORCID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https://orcid\.org/[0-9]{4}-[0-9]{4}-[0-9]{4}-[0-9]{3}[0-9X]$")
        .expect("valid ORCID pattern")
});

fn default_role_field() -> String {
    "role".to_string()
}

fn default_organisation_separator() -> String {
    "||".to_string()
}

fn default_institution_field() -> String {
    "Institution-Établissement".to_string()
}

// =============================================================================
// Investigator Rule
// =============================================================================

/// How the lead investigator of a grant is resolved.
#[derive(Debug, Clone)]
pub enum InvestigatorRule {
    /// Selected from a member list.
    Complex(ComplexField),

    /// Built from a name column and an optional affiliation.
    Simple(SimpleInvestigator),
}

impl InvestigatorRule {
    /// Compile the `investigators` mapping.
    pub fn compile(
        spec: &RuleSpec,
        complex: &BTreeMap<String, ComplexFieldSpec>,
    ) -> ConfigResult<Self> {
        if let Some(name) = spec
            .source_field
            .as_deref()
            .and_then(|source| source.strip_prefix(COMPLEX_PREFIX))
        {
            return crate::config::complex_field(name, complex).map(InvestigatorRule::Complex);
        }

        let name_spec = spec
            .person_name
            .as_deref()
            .ok_or_else(|| ConfigError::EmptyRule("investigators".to_string()))?;

        Ok(InvestigatorRule::Simple(SimpleInvestigator {
            name: SplitName::compile("investigators.person_name", name_spec)?,
            affiliation: spec.affiliation.as_ref().map(|affiliation| AffiliationRule {
                institution_field: affiliation
                    .source_field
                    .clone()
                    .unwrap_or_else(default_institution_field),
                country_field: affiliation.country_field.clone(),
            }),
        }))
    }

    /// Resolve the lead investigator, if any.
    pub fn resolve(&self, record: &Record) -> RecordResult<Option<Person>> {
        match self {
            InvestigatorRule::Complex(field) => field.resolve(record),
            InvestigatorRule::Simple(simple) => Ok(Some(simple.resolve(record))),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            InvestigatorRule::Complex(field) => format!(
                "complex({}, roles [{}])",
                field.source,
                field.priority_roles.join(", ")
            ),
            InvestigatorRule::Simple(simple) => {
                format!("split_name({})", simple.name.source)
            }
        }
    }
}

/// Simple investigator: one name column plus affiliation columns.
#[derive(Debug, Clone)]
pub struct SimpleInvestigator {
    pub name: SplitName,
    pub affiliation: Option<AffiliationRule>,
}

#[derive(Debug, Clone)]
pub struct AffiliationRule {
    pub institution_field: String,
    pub country_field: Option<String>,
}

impl SimpleInvestigator {
    pub fn resolve(&self, record: &Record) -> Person {
        let name = self.name.apply(record);
        let mut person = Person::lead();
        person.given_name = name.given;
        person.family_name = Some(name.family);

        person.affiliation = self.affiliation.as_ref().map(|rule| Affiliation {
            institution: record
                .resolve_text(&rule.institution_field)
                .unwrap_or_else(|| UNKNOWN_INSTITUTION.to_string()),
            country: rule
                .country_field
                .as_deref()
                .and_then(|field| record.resolve_text(field))
                .and_then(|country| country_code(&country)),
        });

        person
    }
}

// =============================================================================
// Complex Field
// =============================================================================

/// Where a complex field's country comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum CountrySource {
    /// Fixed ISO code (`_literal:CA`).
    Literal(String),
    /// Member field holding a country name or code.
    Field(String),
}

/// A compiled `complex_fields` entry.
#[derive(Debug, Clone)]
pub struct ComplexField {
    pub name: String,
    /// Path of the member list inside a record.
    pub source: String,
    pub priority_roles: Vec<String>,
    pub role_field: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub organisation: Option<String>,
    pub orcid: Option<String>,
    pub country: Option<CountrySource>,
    pub organisation_separator: String,
}

impl ComplexField {
    pub fn compile(name: &str, spec: &ComplexFieldSpec) -> ConfigResult<Self> {
        if spec.source.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: format!("complex_fields.{name}"),
                message: "source must not be empty".to_string(),
            });
        }

        let country = spec.fields.country.as_deref().map(|country| {
            match country.strip_prefix(LITERAL_PREFIX) {
                Some(code) => CountrySource::Literal(code.to_string()),
                None => CountrySource::Field(country.to_string()),
            }
        });

        Ok(Self {
            name: name.to_string(),
            source: spec.source.clone(),
            priority_roles: spec.priority_roles.clone(),
            role_field: spec.role_field.clone().unwrap_or_else(default_role_field),
            first_name: spec.fields.first_name.clone(),
            last_name: spec.fields.last_name.clone(),
            organisation: spec.fields.organisation.clone(),
            orcid: spec.fields.orcid.clone(),
            country,
            organisation_separator: spec
                .organisation_separator
                .clone()
                .filter(|sep| !sep.is_empty())
                .unwrap_or_else(default_organisation_separator),
        })
    }

    /// Resolve the selected member of a record into a person.
    ///
    /// Returns `None` when the source is absent, not a list, or empty.
    pub fn resolve(&self, record: &Record) -> RecordResult<Option<Person>> {
        let Some(members) = record.resolve(&self.source).and_then(Value::as_list) else {
            return Ok(None);
        };
        let Some((index, member)) = self.select(members) else {
            return Ok(None);
        };

        let member = member.as_record().ok_or_else(|| RecordError::InvalidMember {
            field: self.source.clone(),
            index,
        })?;

        Ok(Some(self.person(member)))
    }

    /// Pick a member: the first with the highest-priority role, else the first.
    pub fn select<'a>(&self, members: &'a [Value]) -> Option<(usize, &'a Value)> {
        self.priority_roles
            .iter()
            .find_map(|role| {
                members
                    .iter()
                    .enumerate()
                    .find(|(_, member)| self.has_role(member, role))
            })
            .or_else(|| members.first().map(|member| (0, member)))
    }

    fn has_role(&self, member: &Value, role: &str) -> bool {
        member
            .as_record()
            .and_then(|record| record.resolve(&self.role_field))
            .and_then(Value::as_str)
            == Some(role)
    }

    fn person(&self, member: &Record) -> Person {
        let text = |field: &Option<String>| {
            field
                .as_deref()
                .and_then(|path| member.resolve_text(path))
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut person = Person::lead();
        person.given_name = text(&self.first_name);
        person.family_name = text(&self.last_name);
        person.orcid = text(&self.orcid).and_then(|raw| normalize_orcid(&raw));

        person.affiliation = text(&self.organisation)
            .and_then(|raw| first_segment(&raw, &self.organisation_separator))
            .map(|institution| Affiliation {
                institution,
                country: self.country(member),
            });

        person
    }

    fn country(&self, member: &Record) -> Option<String> {
        match self.country.as_ref()? {
            CountrySource::Literal(code) => Some(code.clone()),
            CountrySource::Field(field) => member
                .resolve_text(field)
                .and_then(|country| country_code(&country)),
        }
    }
}

/// First trimmed segment of a separator-joined list, if non-empty.
fn first_segment(raw: &str, separator: &str) -> Option<String> {
    raw.split(separator)
        .next()
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}

// =============================================================================
// ORCID
// =============================================================================

/// Normalize an ORCID to `https://orcid.org/NNNN-NNNN-NNNN-NNNC`.
///
/// Well-formed values pass through. Otherwise the part after the last
/// `orcid.org/` is stripped to digits and `X`; exactly sixteen characters
/// are regrouped in fours. Anything else, including the `https://orcid.org/-`
/// placeholder, is rejected.
pub fn normalize_orcid(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw == ORCID_PLACEHOLDER {
        return None;
    }
    if ORCID_PATTERN.is_match(raw) {
        return Some(raw.to_string());
    }

    let (_, suffix) = raw.rsplit_once(ORCID_HOST)?;
    let digits: String = suffix
        .to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == 'X')
        .collect();
    if digits.len() != 16 {
        return None;
    }

    let formatted = format!(
        "{ORCID_PREFIX}{}-{}-{}-{}",
        &digits[0..4],
        &digits[4..8],
        &digits[8..12],
        &digits[12..16]
    );
    ORCID_PATTERN.is_match(&formatted).then_some(formatted)
}

// =============================================================================
// Countries
// =============================================================================

const COUNTRY_CODES: &[(&str, &str)] = &[
    ("AUSTRALIA", "AU"),
    ("AUSTRIA", "AT"),
    ("BELGIUM", "BE"),
    ("BRAZIL", "BR"),
    ("CANADA", "CA"),
    ("CHINA", "CN"),
    ("DENMARK", "DK"),
    ("DEUTSCHLAND", "DE"),
    ("FINLAND", "FI"),
    ("FRANCE", "FR"),
    ("GERMANY", "DE"),
    ("GREAT BRITAIN", "GB"),
    ("INDIA", "IN"),
    ("IRELAND", "IE"),
    ("ITALY", "IT"),
    ("JAPAN", "JP"),
    ("MEXICO", "MX"),
    ("NEDERLAND", "NL"),
    ("NETHERLANDS", "NL"),
    ("NEW ZEALAND", "NZ"),
    ("NORWAY", "NO"),
    ("SPAIN", "ES"),
    ("SWEDEN", "SE"),
    ("SWITZERLAND", "CH"),
    ("THE NETHERLANDS", "NL"),
    ("U.K.", "GB"),
    ("U.S.", "US"),
    ("U.S.A.", "US"),
    ("UK", "GB"),
    ("UNITED KINGDOM", "GB"),
    ("UNITED STATES", "US"),
    ("UNITED STATES OF AMERICA", "US"),
    ("USA", "US"),
];

/// Map a country name (or ISO alpha-2 code) to an ISO alpha-2 code.
pub fn country_code(country: &str) -> Option<String> {
    let key = country.trim().to_uppercase();
    if let Some((_, code)) = COUNTRY_CODES.iter().find(|(name, _)| *name == key) {
        return Some((*code).to_string());
    }
    (key.len() == 2 && key.bytes().all(|b| b.is_ascii_alphabetic())).then_some(key)
}

// =============================================================================
// Tests
// =============================================================================
