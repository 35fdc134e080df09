//! Mapping configuration.
//!
//! The configuration is a YAML document that says how input records map onto
//! grant elements. It is loaded once, compiled into typed rules (patterns and
//! date formats are checked here, not per record) and never mutated after.
//!
//! ```yaml
//! header_static_values:
//!   depositor_name: Example Funder
//!   depositor_email: deposits@example.org
//! namespace_values:
//!   xmlns: http://www.crossref.org/grant_id/0.2.0
//! field_mappings:
//!   award-number:
//!     source_field: award_id
//!   award-start-date:
//!     transform: format_date
//!     source_field: start
//!     input_format: "%d/%m/%Y"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::transform::complex::{ComplexField, InvestigatorRule};
use crate::transform::related::RelatedWorksConfig;
use crate::transform::rules::FieldRule;

mod text;

/// Marker for a source field holding literal text instead of a path.
pub const LITERAL_PREFIX: &str = "_literal:";

/// Marker for a source field delegating to a `complex_fields` entry.
pub const COMPLEX_PREFIX: &str = "_complex:";

/// Default `funding-type` attribute.
pub const DEFAULT_FUNDING_TYPE: &str = "grant";

// =============================================================================
// Raw (deserialized) configuration
// =============================================================================

#[derive(Debug, Deserialize)]
struct RawConfig {
    header_static_values: Option<HeaderValues>,
    namespace_values: Option<BTreeMap<String, String>>,
    field_mappings: Option<BTreeMap<String, RuleSpec>>,
    #[serde(default)]
    options: Options,
    related_works_config: Option<RelatedWorksSpec>,
    #[serde(default)]
    complex_fields: BTreeMap<String, ComplexFieldSpec>,
}

/// Static values for the document header.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HeaderValues {
    #[serde(deserialize_with = "text::optional")]
    pub doi_batch_id: Option<String>,
    #[serde(deserialize_with = "text::optional")]
    pub depositor_name: Option<String>,
    #[serde(deserialize_with = "text::optional")]
    pub depositor_email: Option<String>,
    #[serde(deserialize_with = "text::optional")]
    pub registrant: Option<String>,
}

/// Reader options.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Dotted path to the record list inside a JSON document.
    pub json_root_path: Option<String>,
}

/// One entry of `field_mappings` as written in the file.
///
/// A rule may carry several shapes; [`FieldRule::compile`] picks one.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RuleSpec {
    #[serde(deserialize_with = "text::optional")]
    pub static_value: Option<String>,
    pub transform: Option<String>,
    pub source_field: Option<String>,
    pub concatenate: Option<Vec<String>>,
    #[serde(deserialize_with = "text::optional")]
    pub separator: Option<String>,
    #[serde(deserialize_with = "text::optional")]
    pub default: Option<String>,
    pub prefix: Option<String>,
    pub input_format: Option<String>,
    pub output_format: Option<String>,
    pub currency: Option<String>,
    /// Investigators only: name rule of the lead investigator.
    pub person_name: Option<Box<RuleSpec>>,
    /// Investigators only: affiliation of the lead investigator.
    pub affiliation: Option<AffiliationSpec>,
}

/// Affiliation of a simple (single-column) investigator.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AffiliationSpec {
    pub source_field: Option<String>,
    pub country_field: Option<String>,
}

/// `related_works_config` as written in the file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RelatedWorksSpec {
    pub join_key: Option<String>,
    pub grant_join_field: Option<String>,
    pub embedded_field: Option<String>,
    pub doi_field: Option<String>,
    pub filter_pattern: Option<String>,
    pub relationship_type: Option<String>,
    pub join_doi_field: Option<String>,
    pub join_uri_field: Option<String>,
}

/// One entry of `complex_fields`.
#[derive(Debug, Clone, Deserialize)]
pub struct ComplexFieldSpec {
    /// Path of the member list inside a record.
    pub source: String,
    #[serde(default)]
    pub priority_roles: Vec<String>,
    pub role_field: Option<String>,
    #[serde(default)]
    pub fields: ComplexFieldNames,
    pub organisation_separator: Option<String>,
}

/// Member field names of a complex field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ComplexFieldNames {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub organisation: Option<String>,
    pub orcid: Option<String>,
    /// `_literal:<code>` or a member field holding a country name.
    pub country: Option<String>,
}

// =============================================================================
// Namespaces
// =============================================================================

/// Namespace table handed to the XML writer.
#[derive(Debug, Clone, PartialEq)]
pub struct Namespaces {
    /// Default namespace of core elements.
    pub default: String,
    pub xsi: String,
    /// Namespace of `rel:` relation elements.
    pub rel: String,
    pub schema_location: String,
    /// `version` attribute of the root element.
    pub version: String,
}

impl Default for Namespaces {
    fn default() -> Self {
        Self {
            default: "http://www.crossref.org/grant_id/0.2.0".to_string(),
            xsi: "http://www.w3.org/2001/XMLSchema-instance".to_string(),
            rel: "http://www.crossref.org/relations.xsd".to_string(),
            schema_location: "http://www.crossref.org/grant_id/0.2.0 \
                              http://www.crossref.org/schemas/grant_id0.2.0.xsd"
                .to_string(),
            version: "0.2.0".to_string(),
        }
    }
}

impl Namespaces {
    /// Build from `namespace_values`, falling back to the 0.2.0 defaults.
    pub fn from_values(values: &BTreeMap<String, String>) -> Self {
        let defaults = Self::default();
        let pick = |key: &str, fallback: String| values.get(key).cloned().unwrap_or(fallback);
        Self {
            default: pick("xmlns", defaults.default),
            xsi: pick("xmlns:xsi", defaults.xsi),
            rel: pick("xmlns:rel", defaults.rel),
            schema_location: pick("xsi:schemaLocation", defaults.schema_location),
            version: pick("version", defaults.version),
        }
    }
}

// =============================================================================
// Compiled configuration
// =============================================================================

/// Award amount rule with its optional currency attribute.
#[derive(Debug, Clone)]
pub struct AmountRule {
    pub rule: FieldRule,
    pub currency: Option<String>,
}

/// Compiled `field_mappings`, one slot per output element.
#[derive(Debug, Clone, Default)]
pub struct FieldMappings {
    pub project_title: Option<FieldRule>,
    pub investigators: Option<InvestigatorRule>,
    pub description: Option<FieldRule>,
    pub award_amount: Option<AmountRule>,
    pub funding_type: String,
    pub funder_ror: Option<FieldRule>,
    pub funder_name: Option<FieldRule>,
    pub funder_id: Option<FieldRule>,
    pub funding_scheme: Option<FieldRule>,
    pub award_number: Option<FieldRule>,
    pub award_start_date: Option<FieldRule>,
    pub doi: Option<FieldRule>,
    pub resource: Option<FieldRule>,
}

impl FieldMappings {
    /// Compile raw field mappings. Unknown keys are ignored with a warning.
    fn compile(
        specs: &BTreeMap<String, RuleSpec>,
        complex: &BTreeMap<String, ComplexFieldSpec>,
    ) -> ConfigResult<Self> {
        let mut fields = FieldMappings {
            funding_type: DEFAULT_FUNDING_TYPE.to_string(),
            ..Default::default()
        };

        for (name, spec) in specs {
            let rule = || FieldRule::compile(name, spec);
            match name.as_str() {
                "project-title" => fields.project_title = Some(rule()?),
                "investigators" => {
                    fields.investigators = Some(InvestigatorRule::compile(spec, complex)?)
                }
                "description" => fields.description = Some(rule()?),
                "award_amount" => {
                    fields.award_amount = Some(AmountRule {
                        rule: rule()?,
                        currency: spec.currency.clone(),
                    })
                }
                "funding_type" => {
                    if let Some(value) = &spec.static_value {
                        fields.funding_type = value.clone();
                    }
                }
                "funder_ror" => fields.funder_ror = Some(rule()?),
                "funder_name" => fields.funder_name = Some(rule()?),
                "funder_id" => fields.funder_id = Some(rule()?),
                "funding_scheme" => fields.funding_scheme = Some(rule()?),
                "award-number" => fields.award_number = Some(rule()?),
                "award-start-date" => fields.award_start_date = Some(rule()?),
                "doi" => fields.doi = Some(rule()?),
                "resource" => fields.resource = Some(rule()?),
                other => warn!("Ignoring unknown field mapping '{}'", other),
            }
        }

        Ok(fields)
    }

    /// `(element, rule description)` pairs in output order, for display.
    pub fn describe(&self) -> Vec<(&'static str, String)> {
        let mut lines = Vec::new();
        let mut push = |name: &'static str, rule: Option<&FieldRule>| {
            if let Some(rule) = rule {
                lines.push((name, rule.describe()));
            }
        };
        push("project-title", self.project_title.as_ref());
        push("description", self.description.as_ref());
        push("award_amount", self.award_amount.as_ref().map(|a| &a.rule));
        push("funder_ror", self.funder_ror.as_ref());
        push("funder_name", self.funder_name.as_ref());
        push("funder_id", self.funder_id.as_ref());
        push("funding_scheme", self.funding_scheme.as_ref());
        push("award-number", self.award_number.as_ref());
        push("award-start-date", self.award_start_date.as_ref());
        push("doi", self.doi.as_ref());
        push("resource", self.resource.as_ref());

        if let Some(investigators) = &self.investigators {
            let at = usize::from(self.project_title.is_some());
            lines.insert(at, ("investigators", investigators.describe()));
        }
        lines
    }
}

/// A fully loaded and compiled mapping configuration.
#[derive(Debug, Clone)]
pub struct MappingConfig {
    pub header: HeaderValues,
    pub namespaces: Namespaces,
    pub fields: FieldMappings,
    pub options: Options,
    pub related_works: RelatedWorksConfig,
}

impl MappingConfig {
    /// Load and compile a YAML configuration file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&content)?;
        debug!("Loaded mapping configuration from {}", path.display());
        Ok(config)
    }

    /// Parse and compile a YAML configuration string.
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let raw: RawConfig = serde_yaml::from_str(yaml)?;

        let header = raw
            .header_static_values
            .ok_or(ConfigError::MissingSection("header_static_values"))?;
        let namespace_values = raw
            .namespace_values
            .ok_or(ConfigError::MissingSection("namespace_values"))?;
        let field_specs = raw
            .field_mappings
            .ok_or(ConfigError::MissingSection("field_mappings"))?;

        Ok(Self {
            header,
            namespaces: Namespaces::from_values(&namespace_values),
            fields: FieldMappings::compile(&field_specs, &raw.complex_fields)?,
            options: raw.options,
            related_works: RelatedWorksConfig::compile(raw.related_works_config.as_ref())?,
        })
    }

    /// `json_root_path` option, if set.
    pub fn json_root_path(&self) -> Option<&str> {
        self.options.json_root_path.as_deref()
    }
}

/// Compile a complex-field spec by name (used by investigators).
pub(crate) fn complex_field(
    name: &str,
    complex: &BTreeMap<String, ComplexFieldSpec>,
) -> ConfigResult<ComplexField> {
    let spec = complex
        .get(name)
        .ok_or_else(|| ConfigError::UndefinedComplexField(name.to_string()))?;
    ComplexField::compile(name, spec)
}

/// An example configuration for documentation and `example-config`.
pub const EXAMPLE_CONFIG: &str = r#"# Mapping configuration for grant records
header_static_values:
  depositor_name: Example Research Council
  depositor_email: deposits@example.org
  registrant: Example Research Council

namespace_values:
  xmlns: http://www.crossref.org/grant_id/0.2.0
  xsi:schemaLocation: http://www.crossref.org/grant_id/0.2.0 http://www.crossref.org/schemas/grant_id0.2.0.xsd

options:
  json_root_path: data.grants

field_mappings:
  project-title:
    source_field: title
  investigators:
    source_field: _complex:investigators
  description:
    concatenate: [summary, keywords]
    separator: " | "
  award_amount:
    source_field: amount
    currency: CAD
  funding_type:
    static_value: grant
  funder_ror:
    static_value: https://ror.org/01h531d29
  funding_scheme:
    source_field: program.name
    default: Discovery Grants
  award-number:
    source_field: award_id
  award-start-date:
    transform: format_date
    source_field: start_date
    input_format: "%d/%m/%Y"
  doi:
    transform: construct_doi
    source_field: award_id
    prefix: 10.99999/
  resource:
    transform: construct_url
    source_field: award_id
    prefix: https://grants.example.org/awards/

complex_fields:
  investigators:
    source: members
    priority_roles: [pi, co-pi]
    fields:
      first_name: first_name
      last_name: last_name
      organisation: organisation
      orcid: orcid
      country: _literal:CA

related_works_config:
  join_key: award_id
  embedded_field: publications
  doi_field: url_open_access
  filter_pattern: doi\.org
"#;
