//! High-level conversion API.
//!
//! [`Converter`] ties the stages together: related-works indexing, input
//! reading, per-record grant building and XML output. Each record is
//! converted inside its own failure boundary; a failing record is logged,
//! counted and skipped.
//!
//! # Example
//!
//! ```rust,ignore
//! use grantmap::transform::pipeline::Converter;
//! use std::path::Path;
//!
//! let mut converter = Converter::from_config_file("mapping.yaml")?;
//! let summary = converter.convert_file(
//!     Path::new("grants.csv"),
//!     Path::new("grants.xml"),
//!     &[],
//! )?;
//! println!("{} grants written", summary.processed);
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use tracing::{debug, info, warn};

use crate::config::MappingConfig;
use crate::error::{ConfigResult, ConvertResult};
use crate::models::{Document, Value};
use crate::parser::read_records;
use crate::transform::builder::{build_header, GrantBuilder};
use crate::transform::related::RelatedWorksIndex;
use crate::xml::write_document_file;

/// Result of converting one batch of records.
#[derive(Debug, Clone)]
pub struct Conversion {
    pub document: Document,
    /// Records converted in this call.
    pub processed: usize,
    /// Records skipped in this call.
    pub failed: usize,
}

/// Summary of a file conversion.
#[derive(Debug, Clone)]
pub struct ConversionSummary {
    pub output: PathBuf,
    pub processed: usize,
    pub failed: usize,
    pub related_works: usize,
}

/// Converts grant records to documents under one mapping configuration.
///
/// Counters accumulate across calls.
#[derive(Debug)]
pub struct Converter {
    config: MappingConfig,
    related_works: RelatedWorksIndex,
    loaded_files: HashSet<PathBuf>,
    records_processed: usize,
    records_failed: usize,
}

impl Converter {
    pub fn new(config: MappingConfig) -> Self {
        for (field, rule) in config.fields.describe() {
            debug!("{} <- {}", field, rule);
        }
        Self {
            config,
            related_works: RelatedWorksIndex::default(),
            loaded_files: HashSet::new(),
            records_processed: 0,
            records_failed: 0,
        }
    }

    /// Load a YAML configuration and create a converter.
    pub fn from_config_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        MappingConfig::load(path).map(Self::new)
    }

    pub fn config(&self) -> &MappingConfig {
        &self.config
    }

    pub fn related_works(&self) -> &RelatedWorksIndex {
        &self.related_works
    }

    /// Total records converted so far.
    pub fn records_processed(&self) -> usize {
        self.records_processed
    }

    /// Total records skipped so far.
    pub fn records_failed(&self) -> usize {
        self.records_failed
    }

    /// Add related-works files to the join index.
    ///
    /// Unreadable files are logged and skipped. Files already loaded by this
    /// converter are not read again.
    pub fn load_related_works(&mut self, files: &[PathBuf]) {
        let files: Vec<PathBuf> = files
            .iter()
            .filter(|path| self.loaded_files.insert((*path).clone()))
            .cloned()
            .collect();
        if files.is_empty() {
            return;
        }
        let json_root = self.config.json_root_path().map(str::to_string);
        self.related_works
            .load_files(&files, &self.config.related_works, |path| {
                read_records(path, json_root.as_deref())
            });
        info!(
            "Related works index: {} works under {} keys",
            self.related_works.work_count(),
            self.related_works.len()
        );
    }

    /// Convert records, loading `related_works_files` first.
    pub fn convert(&mut self, records: &[Value], related_works_files: &[PathBuf]) -> Conversion {
        self.load_related_works(related_works_files);
        self.convert_at(records, Local::now().naive_local())
    }

    /// Convert records with an explicit header time.
    pub fn convert_at(&mut self, records: &[Value], now: NaiveDateTime) -> Conversion {
        let builder = GrantBuilder::new(&self.config, &self.related_works);
        let mut grants = Vec::with_capacity(records.len());
        let mut failed = 0;

        for (index, record) in records.iter().enumerate() {
            match builder.build(record) {
                Ok(grant) => grants.push(grant),
                Err(e) => {
                    warn!(record = index, "Failed to process record: {}", e);
                    failed += 1;
                }
            }
        }

        let processed = grants.len();
        self.records_processed += processed;
        self.records_failed += failed;

        Conversion {
            document: Document {
                header: build_header(&self.config.header, now),
                grants,
            },
            processed,
            failed,
        }
    }

    /// Read `input`, convert it and write the document to `output`.
    pub fn convert_file(
        &mut self,
        input: &Path,
        output: &Path,
        related_works_files: &[PathBuf],
    ) -> ConvertResult<ConversionSummary> {
        self.load_related_works(related_works_files);

        let records = read_records(input, self.config.json_root_path())?;
        let conversion = self.convert_at(&records, Local::now().naive_local());

        write_document_file(output, &conversion.document, &self.config.namespaces)?;

        info!("Successfully processed: {}", conversion.processed);
        info!("Failed: {}", conversion.failed);
        info!("Output written to: {}", output.display());

        Ok(ConversionSummary {
            output: output.to_path_buf(),
            processed: conversion.processed,
            failed: conversion.failed,
            related_works: self.related_works.work_count(),
        })
    }
}
