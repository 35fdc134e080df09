//! Related works.
//!
//! Two sources feed the relations of a grant:
//!
//! - **Join mode**: separate related-works files are indexed once by a join
//!   key; each grant looks up the entries for its own key.
//! - **Embedded mode**: a list inside the grant record itself, filtered by a
//!   URL pattern, from which DOIs are extracted.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::RelatedWorksSpec;
use crate::error::{ConfigError, ConfigResult, InputResult};
use crate::models::{IdentifierType, Record, RelatedWork, Value};

const JOIN_RELATIONSHIP: &str = "isFinancedBy";
const EMBEDDED_RELATIONSHIP: &str = "finances";

static DOI_RESOLVER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://(dx\.)?doi\.org/").expect("valid resolver pattern"));

static DOI_HOST: Lazy<Regex> =
    Lazy::new(|| Regex::new(&default_filter_pattern()).expect("valid filter pattern"));

static DOI_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"doi\.org/(.+)").expect("valid DOI pattern"));

fn default_join_key() -> String {
    "award_id".to_string()
}

fn default_doi_field() -> String {
    "url_open_access".to_string()
}

fn default_filter_pattern() -> String {
    r"doi\.org".to_string()
}

fn default_join_doi_field() -> String {
    "doi".to_string()
}

fn default_join_uri_field() -> String {
    "openalex_work_id".to_string()
}

// =============================================================================
// Configuration
// =============================================================================

/// Compiled `related_works_config`.
#[derive(Debug, Clone)]
pub struct RelatedWorksConfig {
    /// Key of related-works entries used for indexing.
    pub join_key: String,
    /// Grant field holding the join id; the award number is used when unset.
    pub grant_join_field: Option<String>,
    /// Path of the embedded list inside a grant record.
    pub embedded_field: Option<String>,
    /// Field of an embedded entry holding a URL.
    pub doi_field: String,
    pub filter_pattern: Regex,
    pub relationship_type: Option<String>,
    pub join_doi_field: String,
    pub join_uri_field: String,
}

impl Default for RelatedWorksConfig {
    fn default() -> Self {
        Self {
            join_key: default_join_key(),
            grant_join_field: None,
            embedded_field: None,
            doi_field: default_doi_field(),
            filter_pattern: DOI_HOST.clone(),
            relationship_type: None,
            join_doi_field: default_join_doi_field(),
            join_uri_field: default_join_uri_field(),
        }
    }
}

impl RelatedWorksConfig {
    /// Compile the optional config section, checking the filter pattern.
    pub fn compile(spec: Option<&RelatedWorksSpec>) -> ConfigResult<Self> {
        let Some(spec) = spec else {
            return Ok(Self::default());
        };

        let filter_pattern = match &spec.filter_pattern {
            Some(pattern) => Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?,
            None => DOI_HOST.clone(),
        };

        Ok(Self {
            join_key: spec.join_key.clone().unwrap_or_else(default_join_key),
            grant_join_field: spec.grant_join_field.clone(),
            embedded_field: spec.embedded_field.clone(),
            doi_field: spec.doi_field.clone().unwrap_or_else(default_doi_field),
            filter_pattern,
            relationship_type: spec.relationship_type.clone(),
            join_doi_field: spec.join_doi_field.clone().unwrap_or_else(default_join_doi_field),
            join_uri_field: spec.join_uri_field.clone().unwrap_or_else(default_join_uri_field),
        })
    }

    pub fn join_relationship(&self) -> &str {
        self.relationship_type.as_deref().unwrap_or(JOIN_RELATIONSHIP)
    }

    pub fn embedded_relationship(&self) -> &str {
        self.relationship_type.as_deref().unwrap_or(EMBEDDED_RELATIONSHIP)
    }
}

// =============================================================================
// Join Index
// =============================================================================

/// Related works keyed by join id.
///
/// Built once before any grant is converted and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct RelatedWorksIndex {
    entries: HashMap<String, Vec<RelatedWork>>,
}

impl RelatedWorksIndex {
    /// Build an index from files, reading each with `read`.
    pub fn build<F>(files: &[PathBuf], config: &RelatedWorksConfig, read: F) -> Self
    where
        F: Fn(&Path) -> InputResult<Vec<Value>>,
    {
        let mut index = Self::default();
        index.load_files(files, config, read);
        index
    }

    /// Add the entries of each file to the index.
    ///
    /// A file that fails to read is logged and skipped.
    pub fn load_files<F>(&mut self, files: &[PathBuf], config: &RelatedWorksConfig, read: F)
    where
        F: Fn(&Path) -> InputResult<Vec<Value>>,
    {
        for path in files {
            match read(path) {
                Ok(entries) => {
                    let added = self.insert_entries(&entries, config);
                    info!("Loaded {} related works from {}", added, path.display());
                }
                Err(e) => warn!(
                    "Failed to load related works from {}: {}",
                    path.display(),
                    e
                ),
            }
        }
    }

    /// Append entries, returning how many were indexed.
    ///
    /// Entries without a join key or without any identifier are skipped.
    pub fn insert_entries(&mut self, entries: &[Value], config: &RelatedWorksConfig) -> usize {
        let mut added = 0;
        for entry in entries {
            let Some(entry) = entry.as_record() else {
                debug!("Skipping related work of type {}", entry.kind());
                continue;
            };
            let Some(key) = entry.resolve_text(&config.join_key) else {
                continue;
            };
            let Some(work) = work_from_entry(entry, config) else {
                continue;
            };
            self.entries.entry(key).or_default().push(work);
            added += 1;
        }
        added
    }

    /// Works indexed under `key`, in load order.
    pub fn get(&self, key: &str) -> &[RelatedWork] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    /// Number of distinct join keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of indexed works.
    pub fn work_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

/// Convert one related-works entry: DOI if present, else URI.
pub fn work_from_entry(entry: &Record, config: &RelatedWorksConfig) -> Option<RelatedWork> {
    if let Some(doi) = entry.resolve_text(&config.join_doi_field) {
        let doi = strip_doi_resolver(doi.trim());
        if !doi.is_empty() {
            return Some(RelatedWork {
                identifier: doi.to_string(),
                identifier_type: IdentifierType::Doi,
                relationship_type: config.join_relationship().to_string(),
            });
        }
    }

    entry
        .resolve_text(&config.join_uri_field)
        .map(|uri| RelatedWork {
            identifier: uri,
            identifier_type: IdentifierType::Uri,
            relationship_type: config.join_relationship().to_string(),
        })
}

/// Strip an `http(s)://doi.org/` resolver prefix.
pub fn strip_doi_resolver(doi: &str) -> &str {
    match DOI_RESOLVER.find(doi) {
        Some(m) => &doi[m.end()..],
        None => doi,
    }
}

// =============================================================================
// Embedded Mode
// =============================================================================

/// Extract related works embedded in a grant record.
///
/// Non-object entries and entries with no matching DOI URL are skipped.
pub fn embedded_works(record: &Record, config: &RelatedWorksConfig) -> Vec<RelatedWork> {
    let Some(path) = config.embedded_field.as_deref() else {
        return Vec::new();
    };
    let Some(items) = record.resolve(path).and_then(Value::as_list) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(Value::as_record)
        .filter_map(|work| work.resolve_text(&config.doi_field))
        .filter(|url| config.filter_pattern.is_match(url))
        .filter_map(|url| extract_doi(&url))
        .map(|doi| RelatedWork {
            identifier: doi,
            identifier_type: IdentifierType::Doi,
            relationship_type: config.embedded_relationship().to_string(),
        })
        .collect()
}

/// Text after `doi.org/` in a URL.
pub fn extract_doi(url: &str) -> Option<String> {
    DOI_SUFFIX
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|doi| !doi.is_empty())
}

// =============================================================================
// Tests
// =============================================================================
