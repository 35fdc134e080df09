//! XSD validation of generated documents.
//!
//! Validation is delegated to an external program behind the
//! [`SchemaValidator`] trait. The default implementation runs `xmllint`
//! and parses its diagnostics into `(line, message)` pairs.
//!
//! ```text
//! grants.xml:12: element award-number: Schemas validity error : Element 'award-number': This element is not expected.
//! grants.xml fails to validate
//! ```

use std::path::Path;
use std::process::Command;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::error::ValidationError;

/// Default program used by [`XmllintValidator`].
pub const XMLLINT: &str = "xmllint";

static DIAGNOSTIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^.+?:(\d+): (.*)$").expect("valid diagnostic pattern"));

/// One validation problem.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationIssue {
    /// 1-based line in the document, 0 when unknown.
    pub line: usize,
    pub message: String,
}

/// Outcome of validating one document.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn valid() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }
}

/// Validates a document against an XSD schema.
pub trait SchemaValidator {
    fn validate(&self, document: &Path, schema: &Path) -> Result<ValidationReport, ValidationError>;
}

/// Validator backed by `xmllint --noout --schema`.
#[derive(Debug, Clone)]
pub struct XmllintValidator {
    program: String,
}

impl Default for XmllintValidator {
    fn default() -> Self {
        Self::new(XMLLINT)
    }
}

impl XmllintValidator {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl SchemaValidator for XmllintValidator {
    fn validate(&self, document: &Path, schema: &Path) -> Result<ValidationReport, ValidationError> {
        for path in [document, schema] {
            if !path.exists() {
                return Err(ValidationError::NotFound(path.to_path_buf()));
            }
        }

        debug!(
            "Running {} on {} with schema {}",
            self.program,
            document.display(),
            schema.display()
        );

        let output = Command::new(&self.program)
            .arg("--noout")
            .arg("--schema")
            .arg(schema)
            .arg(document)
            .output()
            .map_err(|source| ValidationError::Launch {
                program: self.program.clone(),
                source,
            })?;

        if output.status.success() {
            return Ok(ValidationReport::valid());
        }

        let mut errors = parse_diagnostics(&String::from_utf8_lossy(&output.stderr));
        if errors.is_empty() {
            errors.push(ValidationIssue {
                line: 0,
                message: format!("{} exited with {}", self.program, output.status),
            });
        }

        Ok(ValidationReport {
            valid: false,
            errors,
        })
    }
}

/// Parse `xmllint` diagnostics.
///
/// Lines of the form `file:LINE: ... error : message` become issues;
/// source excerpts and the final verdict line are skipped. Schema compile
/// failures are reported with line 0.
pub fn parse_diagnostics(output: &str) -> Vec<ValidationIssue> {
    output
        .lines()
        .filter_map(|line| {
            if let Some(caps) = DIAGNOSTIC.captures(line) {
                let line_number = caps[1].parse().unwrap_or(0);
                let rest = &caps[2];
                let message = rest
                    .split_once(" error : ")
                    .map(|(_, message)| message)
                    .unwrap_or(rest);
                return Some(ValidationIssue {
                    line: line_number,
                    message: message.trim().to_string(),
                });
            }

            line.contains("failed to compile").then(|| ValidationIssue {
                line: 0,
                message: line.trim().to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_validity_errors() {
        let output = "\
grants.xml:12: element award-number: Schemas validity error : Element '{http://www.crossref.org/grant_id/0.2.0}award-number': This element is not expected.
grants.xml:30: element doi: Schemas validity error : Element 'doi': [facet 'pattern'] The value 'x' is not accepted.
grants.xml fails to validate
";
        let issues = parse_diagnostics(output);
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].line, 12);
        assert!(issues[0].message.starts_with("Element '{http://www.crossref.org"));
        assert!(issues[0].message.ends_with("This element is not expected."));
        assert_eq!(issues[1].line, 30);
    }

    #[test]
    fn test_parse_parser_errors_skip_excerpts() {
        let output = "\
grants.xml:5: parser error : Opening and ending tag mismatch: grant line 3 and body
</body>
       ^
";
        let issues = parse_diagnostics(output);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].line, 5);
        assert_eq!(
            issues[0].message,
            "Opening and ending tag mismatch: grant line 3 and body"
        );
    }

    #[test]
    fn test_parse_schema_compile_failure() {
        let issues = parse_diagnostics("WXS schema grant_id0.2.0.xsd failed to compile\n");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].line, 0);
    }

    #[test]
    fn test_parse_valid_output() {
        assert!(parse_diagnostics("grants.xml validates\n").is_empty());
    }

    #[test]
    fn test_missing_document() {
        let validator = XmllintValidator::default();
        let err = validator
            .validate(Path::new("/nonexistent/grants.xml"), Path::new("/nonexistent/schema.xsd"))
            .unwrap_err();
        assert!(matches!(err, ValidationError::NotFound(_)));
    }

    #[test]
    fn test_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let document = dir.path().join("grants.xml");
        let schema = dir.path().join("schema.xsd");
        std::fs::write(&document, "<doi_batch/>").unwrap();
        std::fs::write(&schema, "<xs:schema/>").unwrap();

        let validator = XmllintValidator::new("grantmap-no-such-validator");
        let err = validator.validate(&document, &schema).unwrap_err();
        assert!(matches!(err, ValidationError::Launch { .. }));
    }
}
