//! Grant and header construction.
//!
//! [`GrantBuilder`] applies the compiled field rules to one record and
//! assembles a [`Grant`] in output order. Values that resolve to the empty
//! string are left out; `project`, `funding` and `doi_data` are always
//! present.

use chrono::NaiveDateTime;

use crate::config::{FieldMappings, HeaderValues, MappingConfig};
use crate::error::{RecordError, RecordResult};
use crate::models::{
    AwardAmount, DoiData, Funder, Funding, Grant, Header, Project, Record, RelatedWork,
    Value,
};
use crate::transform::related::{embedded_works, RelatedWorksIndex};
use crate::transform::rules::FieldRule;

/// Header timestamp format.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Registrant used when neither registrant nor depositor name is configured.
pub const UNKNOWN_REGISTRANT: &str = "Unknown Registrant";

/// Build the batch header at `now`.
pub fn build_header(values: &HeaderValues, now: NaiveDateTime) -> Header {
    let timestamp = now.format(TIMESTAMP_FORMAT).to_string();
    let depositor_name = values.depositor_name.clone().unwrap_or_default();

    Header {
        batch_id: values
            .doi_batch_id
            .clone()
            .unwrap_or_else(|| format!("batch_{timestamp}")),
        registrant: values
            .registrant
            .clone()
            .or_else(|| Some(depositor_name.clone()).filter(|name| !name.is_empty()))
            .unwrap_or_else(|| UNKNOWN_REGISTRANT.to_string()),
        depositor_email: values.depositor_email.clone().unwrap_or_default(),
        depositor_name,
        timestamp,
    }
}

/// Builds grants from records using a configuration and a related-works index.
pub struct GrantBuilder<'a> {
    config: &'a MappingConfig,
    index: &'a RelatedWorksIndex,
}

impl<'a> GrantBuilder<'a> {
    pub fn new(config: &'a MappingConfig, index: &'a RelatedWorksIndex) -> Self {
        Self { config, index }
    }

    /// Build a grant from a top-level record value.
    pub fn build(&self, value: &Value) -> RecordResult<Grant> {
        let record = value
            .as_record()
            .ok_or_else(|| RecordError::NotAnObject(value.kind()))?;
        self.build_record(record)
    }

    /// Build a grant from a record.
    pub fn build_record(&self, record: &Record) -> RecordResult<Grant> {
        let fields = &self.config.fields;
        let award_number = resolve(&fields.award_number, record);

        let mut related_works = self.joined_works(record, award_number.as_deref());
        related_works.extend(embedded_works(record, &self.config.related_works));

        Ok(Grant {
            project: self.project(record)?,
            award_number,
            award_start_date: resolve(&fields.award_start_date, record),
            related_works,
            doi_data: DoiData {
                doi: resolve(&fields.doi, record),
                resource: resolve(&fields.resource, record),
            },
        })
    }

    fn project(&self, record: &Record) -> RecordResult<Project> {
        let fields = &self.config.fields;

        let investigators = match &fields.investigators {
            Some(rule) => rule.resolve(record)?.into_iter().collect(),
            None => Vec::new(),
        };

        let award_amount = fields.award_amount.as_ref().and_then(|amount| {
            non_empty(amount.rule.apply(record)).map(|value| AwardAmount {
                amount: value,
                currency: amount.currency.clone(),
            })
        });

        Ok(Project {
            title: resolve(&fields.project_title, record),
            investigators,
            description: resolve(&fields.description, record),
            award_amount,
            funding: funding(fields, record),
        })
    }

    /// Join-mode works for this record's join id.
    fn joined_works(&self, record: &Record, award_number: Option<&str>) -> Vec<RelatedWork> {
        let join_id = match &self.config.related_works.grant_join_field {
            Some(field) => record.resolve_text(field),
            None => award_number.map(str::to_string),
        };

        join_id
            .map(|id| self.index.get(&id).to_vec())
            .unwrap_or_default()
    }
}

/// Funding block. A configured ROR rule excludes funder name and id.
fn funding(fields: &FieldMappings, record: &Record) -> Funding {
    let funder = match &fields.funder_ror {
        Some(rule) => non_empty(rule.apply(record)).map(Funder::Ror),
        None => {
            let name = resolve(&fields.funder_name, record);
            let id = resolve(&fields.funder_id, record);
            (name.is_some() || id.is_some()).then_some(Funder::Named { name, id })
        }
    };

    Funding {
        funding_type: fields.funding_type.clone(),
        funder,
        scheme: resolve(&fields.funding_scheme, record),
    }
}

fn resolve(rule: &Option<FieldRule>, record: &Record) -> Option<String> {
    rule.as_ref().and_then(|rule| non_empty(rule.apply(record)))
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IdentifierType;
    use chrono::NaiveDate;
    use serde_json::json;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 17)
            .unwrap()
            .and_hms_opt(9, 30, 5)
            .unwrap()
    }

    fn config(yaml: &str) -> MappingConfig {
        MappingConfig::from_yaml_str(yaml).unwrap()
    }

    const BASIC: &str = r#"
header_static_values:
  depositor_name: Funder
namespace_values: {}
field_mappings:
  project-title:
    source_field: title
  investigators:
    person_name:
      transform: split_name
      source_field: pi_name
  award_amount:
    source_field: amount
    currency: CAD
  funder_name:
    static_value: Example Council
  award-number:
    source_field: award_id
  doi:
    transform: construct_doi
    source_field: award_id
"#;

    #[test]
    fn test_header_defaults() {
        let header = build_header(&HeaderValues::default(), now());
        assert_eq!(header.timestamp, "20240517093005");
        assert_eq!(header.batch_id, "batch_20240517093005");
        assert_eq!(header.depositor_name, "");
        assert_eq!(header.registrant, UNKNOWN_REGISTRANT);
    }

    #[test]
    fn test_header_registrant_falls_back_to_depositor() {
        let values = HeaderValues {
            depositor_name: Some("Funder".into()),
            doi_batch_id: Some("batch-1".into()),
            ..Default::default()
        };
        let header = build_header(&values, now());
        assert_eq!(header.registrant, "Funder");
        assert_eq!(header.batch_id, "batch-1");
    }

    #[test]
    fn test_basic_grant() {
        let config = config(BASIC);
        let index = RelatedWorksIndex::default();
        let builder = GrantBuilder::new(&config, &index);

        let grant = builder
            .build(&Value::from(json!({
                "award_id": "123",
                "pi_name": "Doe, Jan",
                "amount": "5000"
            })))
            .unwrap();

        assert_eq!(grant.award_number.as_deref(), Some("123"));
        assert_eq!(grant.doi_data.doi.as_deref(), Some("10.5555/123"));
        assert!(grant.doi_data.resource.is_none());
        assert!(grant.project.title.is_none());

        let person = &grant.project.investigators[0];
        assert_eq!(person.given_name.as_deref(), Some("Jan"));
        assert_eq!(person.family_name.as_deref(), Some("Doe"));

        let amount = grant.project.award_amount.unwrap();
        assert_eq!(amount.amount, "5000");
        assert_eq!(amount.currency.as_deref(), Some("CAD"));

        assert_eq!(grant.project.funding.funding_type, "grant");
        assert_eq!(
            grant.project.funding.funder,
            Some(Funder::Named {
                name: Some("Example Council".into()),
                id: None
            })
        );
    }

    #[test]
    fn test_non_object_record() {
        let config = config(BASIC);
        let index = RelatedWorksIndex::default();
        let builder = GrantBuilder::new(&config, &index);
        let err = builder.build(&Value::from("just text")).unwrap_err();
        assert!(matches!(err, RecordError::NotAnObject("string")));
    }

    #[test]
    fn test_ror_excludes_name_and_id() {
        let config = config(
            r#"
header_static_values: {}
namespace_values: {}
field_mappings:
  funder_ror:
    static_value: https://ror.org/01h531d29
  funder_name:
    static_value: Example Council
  funder_id:
    static_value: "100000001"
  funding_scheme:
    source_field: scheme
"#,
        );
        let index = RelatedWorksIndex::default();
        let grant = GrantBuilder::new(&config, &index)
            .build(&Value::from(json!({"scheme": "Discovery"})))
            .unwrap();
        let funding = grant.project.funding;
        assert_eq!(funding.funder, Some(Funder::Ror("https://ror.org/01h531d29".into())));
        assert_eq!(funding.scheme.as_deref(), Some("Discovery"));
    }

    #[test]
    fn test_empty_values_omitted() {
        let config = config(BASIC);
        let index = RelatedWorksIndex::default();
        let grant = GrantBuilder::new(&config, &index)
            .build(&Value::from(json!({"award_id": "", "amount": ""})))
            .unwrap();
        assert!(grant.award_number.is_none());
        assert!(grant.project.award_amount.is_none());
        assert!(grant.doi_data.doi.is_none());
    }

    #[test]
    fn test_joined_and_embedded_works() {
        let config = config(
            r#"
header_static_values: {}
namespace_values: {}
field_mappings:
  award-number:
    source_field: award_id
related_works_config:
  embedded_field: publications
"#,
        );
        let mut index = RelatedWorksIndex::default();
        let entries = match Value::from(json!([
            {"award_id": "123", "doi": "10.1/joined"}
        ])) {
            Value::List(items) => items,
            _ => unreachable!(),
        };
        index.insert_entries(&entries, &config.related_works);

        let grant = GrantBuilder::new(&config, &index)
            .build(&Value::from(json!({
                "award_id": "123",
                "publications": [{"url_open_access": "https://doi.org/10.1/embedded"}]
            })))
            .unwrap();

        assert_eq!(grant.related_works.len(), 2);
        assert_eq!(grant.related_works[0].identifier, "10.1/joined");
        assert_eq!(grant.related_works[0].relationship_type, "isFinancedBy");
        assert_eq!(grant.related_works[1].identifier, "10.1/embedded");
        assert_eq!(grant.related_works[1].identifier_type, IdentifierType::Doi);
        assert_eq!(grant.related_works[1].relationship_type, "finances");
    }

    #[test]
    fn test_grant_join_field() {
        let config = config(
            r#"
header_static_values: {}
namespace_values: {}
field_mappings:
  award-number:
    source_field: award_id
related_works_config:
  grant_join_field: legacy_id
"#,
        );
        let mut index = RelatedWorksIndex::default();
        let entries = match Value::from(json!([
            {"award_id": "L-9", "doi": "10.1/legacy"},
            {"award_id": "123", "doi": "10.1/wrong"}
        ])) {
            Value::List(items) => items,
            _ => unreachable!(),
        };
        index.insert_entries(&entries, &config.related_works);

        let grant = GrantBuilder::new(&config, &index)
            .build(&Value::from(json!({"award_id": "123", "legacy_id": "L-9"})))
            .unwrap();
        assert_eq!(grant.related_works.len(), 1);
        assert_eq!(grant.related_works[0].identifier, "10.1/legacy");
    }

    #[test]
    fn test_investigators_absent_when_unresolved() {
        let config = config(
            r#"
header_static_values: {}
namespace_values: {}
field_mappings:
  investigators:
    source_field: _complex:team
complex_fields:
  team:
    source: members
    fields:
      last_name: last
"#,
        );
        let index = RelatedWorksIndex::default();
        let grant = GrantBuilder::new(&config, &index)
            .build(&Value::from(json!({"members": []})))
            .unwrap();
        assert!(grant.project.investigators.is_empty());
    }
}
