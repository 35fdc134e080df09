//! Field rules and the transform engine.
//!
//! A [`FieldRule`] turns one record into one text value for one output
//! element. Rules are compiled from [`RuleSpec`]s at configuration load and
//! applied per record. Applying a rule never fails: absent sources give the
//! empty string, which callers treat as "do not emit".

use std::fmt::Write as _;

use chrono::format::{parse, Item, Parsed, StrftimeItems};
use chrono::NaiveTime;

use crate::config::{RuleSpec, COMPLEX_PREFIX, LITERAL_PREFIX};
use crate::error::{ConfigError, ConfigResult};
use crate::models::Record;

/// Family name used when a split name has an empty family part.
pub const UNKNOWN_FAMILY_NAME: &str = "Unknown";

fn default_doi_prefix() -> String {
    "10.5555/".to_string()
}

fn default_url_prefix() -> String {
    "https://example.org/".to_string()
}

fn default_output_format() -> String {
    "%Y-%m-%d".to_string()
}

fn default_name_separator() -> String {
    ",".to_string()
}

fn default_concat_separator() -> String {
    " ".to_string()
}

// =============================================================================
// Field Rule
// =============================================================================

/// How one output value is computed from a record.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldRule {
    /// Fixed text, independent of the record.
    StaticValue(String),

    /// Fixed text given as `source_field: "_literal:<text>"`.
    Literal(String),

    /// Dotted path into the record, with an optional fallback.
    SourceField {
        path: String,
        default: Option<String>,
    },

    /// Present values of several paths joined by a separator.
    Concatenate {
        paths: Vec<String>,
        separator: String,
    },

    /// A named transform.
    Transform(Transform),
}

impl FieldRule {
    /// Compile a raw rule.
    ///
    /// Shapes are tried in a fixed priority order: `static_value`,
    /// `transform`, `source_field`, `concatenate`.
    pub fn compile(field: &str, spec: &RuleSpec) -> ConfigResult<Self> {
        if let Some(value) = &spec.static_value {
            return Ok(FieldRule::StaticValue(value.clone()));
        }

        if let Some(kind) = &spec.transform {
            return Transform::compile(field, kind, spec).map(FieldRule::Transform);
        }

        if let Some(source) = &spec.source_field {
            if let Some(literal) = source.strip_prefix(LITERAL_PREFIX) {
                return Ok(FieldRule::Literal(literal.to_string()));
            }
            if source.starts_with(COMPLEX_PREFIX) {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: "complex fields are only supported for investigators".to_string(),
                });
            }
            return Ok(FieldRule::SourceField {
                path: source.clone(),
                default: spec.default.clone(),
            });
        }

        if let Some(paths) = &spec.concatenate {
            return Ok(FieldRule::Concatenate {
                paths: paths.clone(),
                separator: spec.separator.clone().unwrap_or_else(default_concat_separator),
            });
        }

        Err(ConfigError::EmptyRule(field.to_string()))
    }

    /// Compute the value for a record. Empty means absent.
    pub fn apply(&self, record: &Record) -> String {
        match self {
            FieldRule::StaticValue(value) | FieldRule::Literal(value) => value.clone(),
            FieldRule::SourceField { path, default } => record
                .resolve_text(path)
                .or_else(|| default.clone())
                .unwrap_or_default(),
            FieldRule::Concatenate { paths, separator } => paths
                .iter()
                .filter_map(|path| record.resolve_text(path))
                .collect::<Vec<_>>()
                .join(separator),
            FieldRule::Transform(transform) => transform.apply(record),
        }
    }

    /// Short human-readable form, e.g. `source_field(award_id)`.
    pub fn describe(&self) -> String {
        match self {
            FieldRule::StaticValue(value) => format!("static_value({value:?})"),
            FieldRule::Literal(value) => format!("literal({value:?})"),
            FieldRule::SourceField { path, default: None } => format!("source_field({path})"),
            FieldRule::SourceField {
                path,
                default: Some(default),
            } => format!("source_field({path}, default {default:?})"),
            FieldRule::Concatenate { paths, separator } => {
                format!("concatenate({}, separator {separator:?})", paths.join(", "))
            }
            FieldRule::Transform(transform) => transform.describe(),
        }
    }
}

// =============================================================================
// Transforms
// =============================================================================

/// Named transforms.
#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    /// Prefix a source value to form a DOI.
    ConstructDoi { source: String, prefix: String },

    /// Prefix a source value to form a URL.
    ConstructUrl { source: String, prefix: String },

    /// Reformat a date.
    FormatDate(FormatDate),

    /// Split a `Family<sep>Given` name.
    SplitName(SplitName),
}

impl Transform {
    /// Names accepted in `transform:`.
    pub const NAMES: [&'static str; 4] =
        ["construct_doi", "construct_url", "format_date", "split_name"];

    fn compile(field: &str, kind: &str, spec: &RuleSpec) -> ConfigResult<Self> {
        match kind {
            "construct_doi" => Ok(Transform::ConstructDoi {
                source: required_source(field, spec)?,
                prefix: spec.prefix.clone().unwrap_or_else(default_doi_prefix),
            }),
            "construct_url" => Ok(Transform::ConstructUrl {
                source: required_source(field, spec)?,
                prefix: spec.prefix.clone().unwrap_or_else(default_url_prefix),
            }),
            "format_date" => FormatDate::compile(field, spec).map(Transform::FormatDate),
            "split_name" => SplitName::compile(field, spec).map(Transform::SplitName),
            other => Err(ConfigError::UnknownTransform {
                field: field.to_string(),
                transform: other.to_string(),
            }),
        }
    }

    pub fn apply(&self, record: &Record) -> String {
        match self {
            Transform::ConstructDoi { source, prefix }
            | Transform::ConstructUrl { source, prefix } => record
                .resolve_text(source)
                .map(|value| format!("{prefix}{value}"))
                .unwrap_or_default(),
            Transform::FormatDate(format) => format.apply(record),
            Transform::SplitName(split) => split.apply(record).display_name(),
        }
    }

    fn describe(&self) -> String {
        match self {
            Transform::ConstructDoi { source, prefix } => {
                format!("construct_doi({source}, prefix {prefix:?})")
            }
            Transform::ConstructUrl { source, prefix } => {
                format!("construct_url({source}, prefix {prefix:?})")
            }
            Transform::FormatDate(format) => format!(
                "format_date({}, {} -> {})",
                format.source,
                format.input_format.as_deref().unwrap_or("year only"),
                format.output_format
            ),
            Transform::SplitName(split) => {
                format!("split_name({}, separator {:?})", split.source, split.separator)
            }
        }
    }
}

fn required_source(field: &str, spec: &RuleSpec) -> ConfigResult<String> {
    spec.source_field
        .clone()
        .filter(|source| !source.is_empty())
        .ok_or_else(|| ConfigError::InvalidValue {
            field: field.to_string(),
            message: "transform requires source_field".to_string(),
        })
}

// =============================================================================
// format_date
// =============================================================================

/// Date reformatting with a year-only fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatDate {
    pub source: String,
    pub input_format: Option<String>,
    pub output_format: String,
}

impl FormatDate {
    fn compile(field: &str, spec: &RuleSpec) -> ConfigResult<Self> {
        let output_format = spec.output_format.clone().unwrap_or_else(default_output_format);
        for format in spec.input_format.iter().chain([&output_format]) {
            if !is_valid_format(format) {
                return Err(ConfigError::InvalidDateFormat {
                    field: field.to_string(),
                    format: format.clone(),
                });
            }
        }

        Ok(Self {
            source: required_source(field, spec)?,
            input_format: spec.input_format.clone(),
            output_format,
        })
    }

    pub fn apply(&self, record: &Record) -> String {
        record
            .resolve_text(&self.source)
            .map(|raw| self.format(&raw))
            .unwrap_or_default()
    }

    /// Reformat one raw value.
    ///
    /// Tries the input format first, then a bare four-digit year (rendered
    /// as January 1st), then returns the raw value unchanged.
    pub fn format(&self, raw: &str) -> String {
        if let Some(input) = &self.input_format {
            if let Some(formatted) = reformat(raw, input, &self.output_format) {
                return formatted;
            }
        }

        match bare_year(raw) {
            Some(year) => format!("{year}-01-01"),
            None => raw.to_string(),
        }
    }
}

fn is_valid_format(format: &str) -> bool {
    !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}

fn reformat(raw: &str, input: &str, output: &str) -> Option<String> {
    let mut parsed = Parsed::new();
    parse(&mut parsed, raw.trim(), StrftimeItems::new(input)).ok()?;

    // Missing month or day default to the first, unless the date is given
    // as an ordinal or week date.
    let week_date = parsed.ordinal().is_some()
        || parsed.isoweek().is_some()
        || parsed.week_from_sun().is_some()
        || parsed.week_from_mon().is_some();
    if !week_date {
        if parsed.month().is_none() {
            parsed.set_month(1).ok()?;
        }
        if parsed.day().is_none() {
            parsed.set_day(1).ok()?;
        }
    }

    let date = parsed.to_naive_date().ok()?;
    let time = match parsed.hour_mod_12() {
        Some(_) => {
            if parsed.hour_div_12().is_none() {
                parsed.set_ampm(false).ok()?;
            }
            if parsed.minute().is_none() {
                parsed.set_minute(0).ok()?;
            }
            parsed.to_naive_time().ok()?
        }
        None => NaiveTime::MIN,
    };

    let mut formatted = String::new();
    write!(formatted, "{}", date.and_time(time).format(output)).ok()?;
    Some(formatted)
}

fn bare_year(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    (trimmed.len() == 4 && trimmed.bytes().all(|b| b.is_ascii_digit())).then_some(trimmed)
}

// =============================================================================
// split_name
// =============================================================================

/// A person name split into parts.
#[derive(Debug, Clone, PartialEq)]
pub struct PersonName {
    pub family: String,
    pub given: Option<String>,
}

impl PersonName {
    /// `Given Family`, or just the family name.
    pub fn display_name(&self) -> String {
        match &self.given {
            Some(given) => format!("{given} {}", self.family),
            None => self.family.clone(),
        }
    }
}

/// Split a `Family<sep>Given` source value.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitName {
    pub source: String,
    pub separator: String,
}

impl SplitName {
    /// Compile from a rule whose transform is `split_name` (or unset).
    pub fn compile(field: &str, spec: &RuleSpec) -> ConfigResult<Self> {
        if let Some(kind) = spec.transform.as_deref().filter(|kind| *kind != "split_name") {
            return Err(ConfigError::InvalidValue {
                field: field.to_string(),
                message: format!("expected split_name transform, found '{kind}'"),
            });
        }

        let separator = spec.separator.clone().unwrap_or_else(default_name_separator);
        if separator.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: field.to_string(),
                message: "name separator must not be empty".to_string(),
            });
        }

        Ok(Self {
            source: required_source(field, spec)?,
            separator,
        })
    }

    pub fn apply(&self, record: &Record) -> PersonName {
        let raw = record.resolve_text(&self.source).unwrap_or_default();
        split_name(&raw, &self.separator)
    }
}

/// Split at the first separator: family before it, given after it.
///
/// An empty given part is dropped; an empty family part becomes
/// [`UNKNOWN_FAMILY_NAME`].
pub fn split_name(full: &str, separator: &str) -> PersonName {
    let (family, given) = match full.split_once(separator) {
        Some((family, given)) => (family.trim(), Some(given.trim())),
        None => (full.trim(), None),
    };

    PersonName {
        family: if family.is_empty() {
            UNKNOWN_FAMILY_NAME.to_string()
        } else {
            family.to_string()
        },
        given: given.filter(|g| !g.is_empty()).map(str::to_string),
    }
}

/// Description of all transforms, for `grantmap transforms`.
pub fn transforms_description() -> String {
    r#"Field rule shapes (first match wins):

| Shape | Description | Parameters |
|-------|-------------|------------|
| static_value | Fixed text | static_value: text |
| transform | Named transform (see below) | transform: name, source_field: path |
| source_field | Value at a dotted path | source_field: path, default: fallback |
| source_field | Literal text | source_field: "_literal:<text>" |
| concatenate | Present values joined | concatenate: [paths], separator (default " ") |

Transforms:

| Transform | Description | Parameters |
|-----------|-------------|------------|
| construct_doi | Prefix + value | prefix (default "10.5555/") |
| construct_url | Prefix + value | prefix (default "https://example.org/") |
| format_date | Reformat a date; bare years become YYYY-01-01 | input_format, output_format (default "%Y-%m-%d") |
| split_name | "Family, Given" to "Given Family" | separator (default ",") |

Investigators accept either:
  source_field: "_complex:<name>"   (member list, see complex_fields)
  person_name: {transform: split_name, source_field: path}
  affiliation: {source_field: path, country_field: path}"#
        .to_string()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Value;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        match Value::from(value) {
            Value::Map(record) => record,
            other => panic!("expected object, got {}", other.kind()),
        }
    }

    fn spec(yaml: &str) -> RuleSpec {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn date(input: Option<&str>) -> FormatDate {
        FormatDate {
            source: "date".into(),
            input_format: input.map(String::from),
            output_format: default_output_format(),
        }
    }

    #[test]
    fn test_compile_priority() {
        let rule = FieldRule::compile(
            "f",
            &spec("static_value: fixed\nsource_field: ignored\ntransform: construct_doi"),
        )
        .unwrap();
        assert_eq!(rule, FieldRule::StaticValue("fixed".into()));

        let rule = FieldRule::compile("f", &spec("source_field: id\nconcatenate: [a, b]")).unwrap();
        assert!(matches!(rule, FieldRule::SourceField { .. }));
    }

    #[test]
    fn test_compile_literal() {
        let rule = FieldRule::compile("f", &spec("source_field: \"_literal:CA\"")).unwrap();
        assert_eq!(rule, FieldRule::Literal("CA".into()));
        assert_eq!(rule.apply(&Record::default()), "CA");
    }

    #[test]
    fn test_compile_errors() {
        let err = FieldRule::compile("f", &spec("default: x")).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyRule(_)));

        let err = FieldRule::compile("f", &spec("transform: construct_doi")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let err = FieldRule::compile("f", &spec("source_field: \"_complex:people\"")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let err = FieldRule::compile(
            "f",
            &spec("transform: format_date\nsource_field: d\ninput_format: \"%Q\""),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDateFormat { .. }));
    }

    #[test]
    fn test_source_field_default() {
        let rule = FieldRule::compile("f", &spec("source_field: program\ndefault: General")).unwrap();
        assert_eq!(rule.apply(&record(json!({}))), "General");
        assert_eq!(rule.apply(&record(json!({"program": ""}))), "General");
        assert_eq!(rule.apply(&record(json!({"program": "Alpha"}))), "Alpha");
    }

    #[test]
    fn test_source_field_nested_and_numeric() {
        let rule = FieldRule::compile("f", &spec("source_field: budget.total")).unwrap();
        assert_eq!(rule.apply(&record(json!({"budget": {"total": 5000}}))), "5000");
        assert_eq!(rule.apply(&record(json!({"budget": "flat"}))), "");
    }

    #[test]
    fn test_concatenate_skips_absent() {
        let rule = FieldRule::compile("f", &spec("concatenate: [a, b, c]\nseparator: \" - \"")).unwrap();
        assert_eq!(rule.apply(&record(json!({"a": "x", "b": "", "c": "z"}))), "x - z");
        assert_eq!(rule.apply(&record(json!({}))), "");

        let rule = FieldRule::compile("f", &spec("concatenate: [a, b]")).unwrap();
        assert_eq!(rule.apply(&record(json!({"a": "x", "b": "y"}))), "x y");
    }

    #[test]
    fn test_construct_doi_and_url() {
        let doi = FieldRule::compile("doi", &spec("transform: construct_doi\nsource_field: id")).unwrap();
        let url = FieldRule::compile(
            "resource",
            &spec("transform: construct_url\nsource_field: id\nprefix: https://grants.example.org/"),
        )
        .unwrap();
        let rec = record(json!({"id": "123"}));
        assert_eq!(doi.apply(&rec), "10.5555/123");
        assert_eq!(url.apply(&rec), "https://grants.example.org/123");
        assert_eq!(doi.apply(&record(json!({}))), "");
    }

    #[test]
    fn test_format_date_with_input_format() {
        let format = date(Some("%d/%m/%Y"));
        assert_eq!(format.format("15/03/2021"), "2021-03-15");
    }

    #[test]
    fn test_format_date_year_fallback() {
        assert_eq!(date(None).format("2020"), "2020-01-01");
        assert_eq!(date(Some("%d/%m/%Y")).format("2020"), "2020-01-01");
        assert_eq!(date(Some("%Y")).format("2020"), "2020-01-01");
    }

    #[test]
    fn test_format_date_unparseable_passes_through() {
        assert_eq!(date(Some("%d/%m/%Y")).format("Spring 2020"), "Spring 2020");
        assert_eq!(date(None).format("20201"), "20201");
    }

    #[test]
    fn test_format_date_custom_output() {
        let format = FormatDate {
            source: "date".into(),
            input_format: Some("%Y-%m-%d".into()),
            output_format: "%d %B %Y".into(),
        };
        assert_eq!(format.format("2021-03-15"), "15 March 2021");
    }

    #[test]
    fn test_format_date_ordinal_day() {
        assert_eq!(date(Some("%Y-%j")).format("2021-074"), "2021-03-15");
    }

    #[test]
    fn test_format_date_week_date() {
        assert_eq!(date(Some("%Y-%W-%u")).format("2021-11-1"), "2021-03-15");
    }

    #[test]
    fn test_format_date_keeps_parsed_hour() {
        let format = FormatDate {
            source: "date".into(),
            input_format: Some("%Y-%m-%d %H".into()),
            output_format: "%Y-%m-%d %H:%M".into(),
        };
        assert_eq!(format.format("2021-03-15 14"), "2021-03-15 14:00");
    }

    #[test]
    fn test_format_date_absent_source() {
        assert_eq!(date(Some("%Y")).apply(&record(json!({}))), "");
    }

    #[test]
    fn test_split_name() {
        assert_eq!(
            split_name("Doe, Jan", ","),
            PersonName {
                family: "Doe".into(),
                given: Some("Jan".into())
            }
        );
        assert_eq!(split_name("Doe", ",").given, None);
        assert_eq!(split_name("Doe, ", ",").given, None);
        assert_eq!(split_name(", Jan", ",").family, UNKNOWN_FAMILY_NAME);
        assert_eq!(split_name("", ",").family, UNKNOWN_FAMILY_NAME);
        // only the first separator splits
        assert_eq!(split_name("Doe, Jan, Jr.", ",").given.as_deref(), Some("Jan, Jr."));
    }

    #[test]
    fn test_split_name_as_field_rule() {
        let rule = FieldRule::compile("f", &spec("transform: split_name\nsource_field: pi")).unwrap();
        assert_eq!(rule.apply(&record(json!({"pi": "Doe, Jan"}))), "Jan Doe");
    }

    #[test]
    fn test_split_name_rejects_other_transform() {
        let err = SplitName::compile("person_name", &spec("transform: format_date\nsource_field: pi"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_transform_names_listed() {
        let description = transforms_description();
        for name in Transform::NAMES {
            assert!(description.contains(name));
        }
    }
}
