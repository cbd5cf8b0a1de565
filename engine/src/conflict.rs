//! Pre-flight key conflict detection across import batches.
//!
//! Every normalized value a record can be found by (name, plural name,
//! alias, and for units the abbreviations) is collected into one multi-map.
//! A value claimed by two or more distinct records is a conflict: importing
//! it would let the matcher merge two real-world entities. One record
//! repeating a value (`name == pluralName`) is fine.
//!
//! This runs before any store traffic. A single conflict aborts the whole
//! batch set.

use crate::{error::Result, normalize::key, Batch, EntityKind, Error, KeyField};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Whether the colliding records came from one batch or several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictScope {
    WithinFile,
    CrossFile,
}

impl fmt::Display for ConflictScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictScope::WithinFile => f.write_str("within file"),
            ConflictScope::CrossFile => f.write_str("cross file"),
        }
    }
}

/// One place a conflicting value appeared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Occurrence {
    /// Source label of the batch
    pub batch: String,
    pub batch_index: usize,
    /// 1-based position of the record within its batch
    pub position: usize,
    pub record_name: String,
    pub field: KeyField,
    /// Literal value as written in the record
    pub value: String,
}

impl Occurrence {
    fn record_identity(&self) -> (usize, usize) {
        (self.batch_index, self.position)
    }
}

impl fmt::Display for Occurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} '{}' of record #{} '{}' in {}",
            self.field, self.value, self.position, self.record_name, self.batch
        )
    }
}

/// A normalized value claimed by more than one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyConflict {
    pub key: String,
    pub scope: ConflictScope,
    pub occurrences: Vec<Occurrence>,
}

impl KeyConflict {
    /// Number of distinct records claiming the key.
    pub fn claimants(&self) -> usize {
        self.occurrences
            .iter()
            .map(Occurrence::record_identity)
            .collect::<BTreeSet<_>>()
            .len()
    }
}

impl fmt::Display for KeyConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' ({}): ", self.key, self.scope)?;
        for (i, occurrence) in self.occurrences.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", occurrence)?;
        }
        Ok(())
    }
}

/// Find every key claimed by two or more records of `kind`, sorted by key.
///
/// Batches of another kind are ignored; callers validate kinds first.
pub fn find_conflicts(batches: &[Batch], kind: EntityKind) -> Vec<KeyConflict> {
    let mut claims: BTreeMap<String, Vec<Occurrence>> = BTreeMap::new();

    for (batch_index, batch) in batches.iter().enumerate() {
        if batch.kind != kind {
            continue;
        }
        for (i, record) in batch.records.iter().enumerate() {
            for (field, value) in record.fields.key_values(kind) {
                let Some(key) = key(value) else { continue };
                claims.entry(key).or_default().push(Occurrence {
                    batch: batch.source.clone(),
                    batch_index,
                    position: i + 1,
                    record_name: record.fields.name.trim().to_string(),
                    field,
                    value: value.trim().to_string(),
                });
            }
        }
    }

    claims
        .into_iter()
        .filter_map(|(key, occurrences)| {
            let records: BTreeSet<_> = occurrences.iter().map(Occurrence::record_identity).collect();
            if records.len() < 2 {
                return None;
            }
            let batches: BTreeSet<_> = occurrences.iter().map(|o| o.batch_index).collect();
            let scope = if batches.len() == 1 {
                ConflictScope::WithinFile
            } else {
                ConflictScope::CrossFile
            };
            Some(KeyConflict {
                key,
                scope,
                occurrences,
            })
        })
        .collect()
}

/// Fail with [`Error::Conflicts`] if any key is claimed twice.
pub fn ensure_no_conflicts(batches: &[Batch], kind: EntityKind) -> Result<()> {
    let conflicts = find_conflicts(batches, kind);
    if conflicts.is_empty() {
        Ok(())
    } else {
        Err(Error::Conflicts(conflicts))
    }
}
