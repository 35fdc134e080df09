//! Crossref Grant ID XML output.
//!
//! Serializes a [`Document`] as a `doi_batch` with a `head` and a `body` of
//! `grant` elements. Namespaces come from the configuration; element order
//! follows the grant schema.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::config::Namespaces;
use crate::error::XmlError;
use crate::models::{Document, Funder, Funding, Grant, Header, Person, Project, RelatedWork};

/// Result type for XML output.
pub type XmlResult<T> = Result<T, XmlError>;

/// Write a document to a file, creating parent directories as needed.
pub fn write_document_file(
    path: &Path,
    document: &Document,
    namespaces: &Namespaces,
) -> XmlResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut file = BufWriter::new(File::create(path)?);
    write_document(&mut file, document, namespaces)?;
    file.flush()?;
    Ok(())
}

/// Serialize a document to a string.
pub fn to_xml_string(document: &Document, namespaces: &Namespaces) -> XmlResult<String> {
    let mut buffer = Vec::new();
    write_document(&mut buffer, document, namespaces)?;
    Ok(String::from_utf8(buffer)?)
}

/// Serialize a document with an XML declaration and two-space indentation.
pub fn write_document<W: Write>(
    sink: W,
    document: &Document,
    namespaces: &Namespaces,
) -> XmlResult<()> {
    let mut xml = Writer::new_with_indent(sink, b' ', 2);
    xml.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut root = BytesStart::new("doi_batch");
    root.push_attribute(("xmlns", namespaces.default.as_str()));
    root.push_attribute(("xmlns:xsi", namespaces.xsi.as_str()));
    root.push_attribute(("xmlns:rel", namespaces.rel.as_str()));
    root.push_attribute(("version", namespaces.version.as_str()));
    root.push_attribute(("xsi:schemaLocation", namespaces.schema_location.as_str()));
    xml.write_event(Event::Start(root))?;

    write_head(&mut xml, &document.header)?;

    xml.write_event(Event::Start(BytesStart::new("body")))?;
    for grant in &document.grants {
        write_grant(&mut xml, grant)?;
    }
    xml.write_event(Event::End(BytesEnd::new("body")))?;

    xml.write_event(Event::End(BytesEnd::new("doi_batch")))?;
    xml.get_mut().write_all(b"\n")?;
    Ok(())
}

fn write_head<W: Write>(xml: &mut Writer<W>, header: &Header) -> XmlResult<()> {
    xml.write_event(Event::Start(BytesStart::new("head")))?;
    write_text_element(xml, "doi_batch_id", &header.batch_id)?;
    write_text_element(xml, "timestamp", &header.timestamp)?;

    xml.write_event(Event::Start(BytesStart::new("depositor")))?;
    write_text_element(xml, "depositor_name", &header.depositor_name)?;
    write_text_element(xml, "email_address", &header.depositor_email)?;
    xml.write_event(Event::End(BytesEnd::new("depositor")))?;

    write_text_element(xml, "registrant", &header.registrant)?;
    xml.write_event(Event::End(BytesEnd::new("head")))?;
    Ok(())
}

fn write_grant<W: Write>(xml: &mut Writer<W>, grant: &Grant) -> XmlResult<()> {
    xml.write_event(Event::Start(BytesStart::new("grant")))?;

    write_project(xml, &grant.project)?;
    write_optional(xml, "award-number", grant.award_number.as_deref())?;
    write_optional(xml, "award-start-date", grant.award_start_date.as_deref())?;

    if !grant.related_works.is_empty() {
        write_relations(xml, &grant.related_works)?;
    }

    xml.write_event(Event::Start(BytesStart::new("doi_data")))?;
    write_optional(xml, "doi", grant.doi_data.doi.as_deref())?;
    write_optional(xml, "resource", grant.doi_data.resource.as_deref())?;
    xml.write_event(Event::End(BytesEnd::new("doi_data")))?;

    xml.write_event(Event::End(BytesEnd::new("grant")))?;
    Ok(())
}

fn write_project<W: Write>(xml: &mut Writer<W>, project: &Project) -> XmlResult<()> {
    xml.write_event(Event::Start(BytesStart::new("project")))?;

    write_optional(xml, "project-title", project.title.as_deref())?;

    if !project.investigators.is_empty() {
        xml.write_event(Event::Start(BytesStart::new("investigators")))?;
        for person in &project.investigators {
            write_person(xml, person)?;
        }
        xml.write_event(Event::End(BytesEnd::new("investigators")))?;
    }

    write_optional(xml, "description", project.description.as_deref())?;

    if let Some(amount) = &project.award_amount {
        let mut element = BytesStart::new("award_amount");
        if let Some(currency) = &amount.currency {
            element.push_attribute(("currency", currency.as_str()));
        }
        xml.write_event(Event::Start(element))?;
        xml.write_event(Event::Text(BytesText::new(&amount.amount)))?;
        xml.write_event(Event::End(BytesEnd::new("award_amount")))?;
    }

    write_funding(xml, &project.funding)?;

    xml.write_event(Event::End(BytesEnd::new("project")))?;
    Ok(())
}

fn write_person<W: Write>(xml: &mut Writer<W>, person: &Person) -> XmlResult<()> {
    let mut element = BytesStart::new("person");
    element.push_attribute(("role", person.role.as_str()));
    xml.write_event(Event::Start(element))?;

    write_optional(xml, "givenName", person.given_name.as_deref())?;
    write_optional(xml, "familyName", person.family_name.as_deref())?;

    if let Some(affiliation) = &person.affiliation {
        xml.write_event(Event::Start(BytesStart::new("affiliation")))?;
        let mut institution = BytesStart::new("institution");
        if let Some(country) = &affiliation.country {
            institution.push_attribute(("country", country.as_str()));
        }
        xml.write_event(Event::Start(institution))?;
        xml.write_event(Event::Text(BytesText::new(&affiliation.institution)))?;
        xml.write_event(Event::End(BytesEnd::new("institution")))?;
        xml.write_event(Event::End(BytesEnd::new("affiliation")))?;
    }

    write_optional(xml, "ORCID", person.orcid.as_deref())?;

    xml.write_event(Event::End(BytesEnd::new("person")))?;
    Ok(())
}

fn write_funding<W: Write>(xml: &mut Writer<W>, funding: &Funding) -> XmlResult<()> {
    let mut element = BytesStart::new("funding");
    element.push_attribute(("funding-type", funding.funding_type.as_str()));

    if funding.funder.is_none() && funding.scheme.is_none() {
        xml.write_event(Event::Empty(element))?;
        return Ok(());
    }

    xml.write_event(Event::Start(element))?;
    match &funding.funder {
        Some(Funder::Ror(ror)) => write_text_element(xml, "ROR", ror)?,
        Some(Funder::Named { name, id }) => {
            write_optional(xml, "funder-name", name.as_deref())?;
            write_optional(xml, "funder-id", id.as_deref())?;
        }
        None => {}
    }
    write_optional(xml, "funding-scheme", funding.scheme.as_deref())?;
    xml.write_event(Event::End(BytesEnd::new("funding")))?;
    Ok(())
}

fn write_relations<W: Write>(xml: &mut Writer<W>, works: &[RelatedWork]) -> XmlResult<()> {
    let mut program = BytesStart::new("rel:program");
    program.push_attribute(("name", "relations"));
    xml.write_event(Event::Start(program))?;

    for work in works {
        xml.write_event(Event::Start(BytesStart::new("rel:related_item")))?;
        let mut relation = BytesStart::new("rel:inter_work_relation");
        relation.push_attribute(("relationship-type", work.relationship_type.as_str()));
        relation.push_attribute(("identifier-type", work.identifier_type.as_str()));
        xml.write_event(Event::Start(relation))?;
        xml.write_event(Event::Text(BytesText::new(&work.identifier)))?;
        xml.write_event(Event::End(BytesEnd::new("rel:inter_work_relation")))?;
        xml.write_event(Event::End(BytesEnd::new("rel:related_item")))?;
    }

    xml.write_event(Event::End(BytesEnd::new("rel:program")))?;
    Ok(())
}

fn write_text_element<W: Write>(xml: &mut Writer<W>, name: &str, text: &str) -> XmlResult<()> {
    xml.write_event(Event::Start(BytesStart::new(name)))?;
    xml.write_event(Event::Text(BytesText::new(text)))?;
    xml.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn write_optional<W: Write>(xml: &mut Writer<W>, name: &str, text: Option<&str>) -> XmlResult<()> {
    match text {
        Some(text) if !text.is_empty() => write_text_element(xml, name, text),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Affiliation, AwardAmount, DoiData, IdentifierType, LEAD_INVESTIGATOR,
    };

    fn header() -> Header {
        Header {
            batch_id: "batch_20240517093005".into(),
            timestamp: "20240517093005".into(),
            depositor_name: "Funder".into(),
            depositor_email: "deposits@example.org".into(),
            registrant: "Funder".into(),
        }
    }

    fn grant() -> Grant {
        Grant {
            project: Project {
                title: Some("Soil & water".into()),
                investigators: vec![Person {
                    role: LEAD_INVESTIGATOR.into(),
                    given_name: Some("Jan".into()),
                    family_name: Some("Doe".into()),
                    affiliation: Some(Affiliation {
                        institution: "Univ A".into(),
                        country: Some("CA".into()),
                    }),
                    orcid: Some("https://orcid.org/0000-0002-1694-233X".into()),
                }],
                description: None,
                award_amount: Some(AwardAmount {
                    amount: "5000".into(),
                    currency: Some("CAD".into()),
                }),
                funding: Funding {
                    funding_type: "grant".into(),
                    funder: Some(Funder::Ror("https://ror.org/01h531d29".into())),
                    scheme: Some("Discovery".into()),
                },
            },
            award_number: Some("123".into()),
            award_start_date: Some("2021-03-15".into()),
            related_works: vec![RelatedWork {
                identifier: "10.1/x".into(),
                identifier_type: IdentifierType::Doi,
                relationship_type: "isFinancedBy".into(),
            }],
            doi_data: DoiData {
                doi: Some("10.5555/123".into()),
                resource: Some("https://example.org/123".into()),
            },
        }
    }

    fn render(grants: Vec<Grant>) -> String {
        let document = Document {
            header: header(),
            grants,
        };
        to_xml_string(&document, &Namespaces::default()).unwrap()
    }

    fn position(xml: &str, needle: &str) -> usize {
        xml.find(needle)
            .unwrap_or_else(|| panic!("'{needle}' not found in:\n{xml}"))
    }

    #[test]
    fn test_root_and_head() {
        let xml = render(vec![]);
        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(xml.contains(r#"xmlns="http://www.crossref.org/grant_id/0.2.0""#));
        assert!(xml.contains(r#"xmlns:rel="http://www.crossref.org/relations.xsd""#));
        assert!(xml.contains(r#"version="0.2.0""#));
        assert!(xml.contains("<doi_batch_id>batch_20240517093005</doi_batch_id>"));
        assert!(xml.contains("<email_address>deposits@example.org</email_address>"));
        assert!(xml.contains("<body>"));
    }

    #[test]
    fn test_grant_element_order() {
        let xml = render(vec![grant()]);
        let order = [
            "<project>",
            "<project-title>",
            "<investigators>",
            "<award_amount",
            "<funding",
            "<award-number>",
            "<award-start-date>",
            "<rel:program",
            "<doi_data>",
        ];
        let positions: Vec<usize> = order.iter().map(|tag| position(&xml, tag)).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{xml}");
    }

    #[test]
    fn test_person_and_funding_content() {
        let xml = render(vec![grant()]);
        assert!(xml.contains(r#"<person role="lead_investigator">"#));
        assert!(xml.contains("<givenName>Jan</givenName>"));
        assert!(xml.contains(r#"<institution country="CA">Univ A</institution>"#));
        assert!(xml.contains("<ORCID>https://orcid.org/0000-0002-1694-233X</ORCID>"));
        assert!(xml.contains(r#"<award_amount currency="CAD">5000</award_amount>"#));
        assert!(xml.contains(r#"<funding funding-type="grant">"#));
        assert!(xml.contains("<ROR>https://ror.org/01h531d29</ROR>"));
        assert!(position(&xml, "<ROR>") < position(&xml, "<funding-scheme>"));
        assert!(!xml.contains("<funder-name>"));
    }

    #[test]
    fn test_relations() {
        let xml = render(vec![grant()]);
        assert!(xml.contains(r#"<rel:program name="relations">"#));
        assert!(xml.contains(
            r#"<rel:inter_work_relation relationship-type="isFinancedBy" identifier-type="doi">10.1/x</rel:inter_work_relation>"#
        ));
    }

    #[test]
    fn test_text_is_escaped() {
        let xml = render(vec![grant()]);
        assert!(xml.contains("<project-title>Soil &amp; water</project-title>"));
    }

    #[test]
    fn test_minimal_grant() {
        let minimal = Grant {
            project: Project {
                title: None,
                investigators: vec![],
                description: None,
                award_amount: None,
                funding: Funding {
                    funding_type: "grant".into(),
                    funder: None,
                    scheme: None,
                },
            },
            award_number: None,
            award_start_date: None,
            related_works: vec![],
            doi_data: DoiData::default(),
        };
        let xml = render(vec![minimal]);
        assert!(xml.contains(r#"<funding funding-type="grant"/>"#));
        assert!(xml.contains("<doi_data>"));
        assert!(!xml.contains("<investigators>"));
        assert!(!xml.contains("<rel:program"));
        assert!(!xml.contains("<award-number>"));
    }

    #[test]
    fn test_custom_namespaces() {
        let namespaces = Namespaces {
            default: "http://example.org/grants".into(),
            ..Namespaces::default()
        };
        let document = Document {
            header: header(),
            grants: vec![],
        };
        let xml = to_xml_string(&document, &namespaces).unwrap();
        assert!(xml.contains(r#"xmlns="http://example.org/grants""#));
    }

    #[test]
    fn test_write_document_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("grants.xml");
        let document = Document {
            header: header(),
            grants: vec![grant()],
        };
        write_document_file(&path, &document, &Namespaces::default()).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("<award-number>123</award-number>"));
    }
}
