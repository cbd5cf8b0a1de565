//! Import batches and the self-describing document they are parsed from.
//!
//! A document names its entity kind and schema version next to the record
//! list:
//!
//! ```json
//! {"kind": "foods", "schemaVersion": 1, "records": [{"name": "kumquat"}]}
//! ```
//!
//! Parsing is the only place record shape ambiguity is tolerated. Once a
//! [`Batch`] exists every alias is a plain string and every field the kind
//! does not carry has been cleared.

use crate::{error::Result, EntityKind, Error, ImportRecord, SchemaVersion};
use serde::Deserialize;

/// Schema version of the batch documents this engine understands.
pub const SCHEMA_VERSION: SchemaVersion = 1;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Document {
    kind: String,
    schema_version: SchemaVersion,
    #[serde(default)]
    records: Vec<serde_json::Value>,
}

/// An ordered set of import records from one source (typically one file).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Label used in diagnostics, usually the file name
    pub source: String,
    pub kind: EntityKind,
    pub records: Vec<ImportRecord>,
}

impl Batch {
    /// Build a batch from already typed records.
    pub fn new(source: impl Into<String>, kind: EntityKind, records: Vec<ImportRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|mut record| {
                record.fields.restrict_to(kind);
                record
            })
            .collect();

        Self {
            source: source.into(),
            kind,
            records,
        }
    }

    /// Parse a batch document from JSON text.
    pub fn from_json(source: impl Into<String>, json: &str) -> Result<Self> {
        let source = source.into();
        let value = serde_json::from_str(json).map_err(|e| Error::MalformedDocument {
            batch: source.clone(),
            reason: e.to_string(),
        })?;
        Self::from_value(source, value)
    }

    /// Parse a batch document from a JSON value.
    pub fn from_value(source: impl Into<String>, value: serde_json::Value) -> Result<Self> {
        let source = source.into();
        let document: Document =
            serde_json::from_value(value).map_err(|e| Error::MalformedDocument {
                batch: source.clone(),
                reason: e.to_string(),
            })?;

        let kind: EntityKind = document.kind.parse()?;
        if document.schema_version != SCHEMA_VERSION {
            return Err(Error::UnsupportedSchemaVersion {
                batch: source,
                expected: SCHEMA_VERSION,
                actual: document.schema_version,
            });
        }

        let mut records = Vec::with_capacity(document.records.len());
        for (i, raw) in document.records.into_iter().enumerate() {
            let position = i + 1;
            let record: ImportRecord =
                serde_json::from_value(raw).map_err(|e| Error::InvalidRecord {
                    batch: source.clone(),
                    position,
                    reason: e.to_string(),
                })?;

            if record.fields.name.trim().is_empty() {
                return Err(Error::MissingName {
                    batch: source,
                    position,
                });
            }
            records.push(record);
        }

        Ok(Self::new(source, kind, records))
    }

    /// Reject the batch unless it holds `kind`.
    pub fn expect_kind(self, kind: EntityKind) -> Result<Self> {
        if self.kind == kind {
            Ok(self)
        } else {
            Err(Error::KindMismatch {
                batch: self.source,
                expected: kind,
                actual: self.kind,
            })
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
