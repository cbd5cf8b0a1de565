//! Field-level change detection and alias merging.
//!
//! Scalars are compared ordinally after trimming, so a casing or accent edit
//! counts as a change. Alias sets are compared by normalized value: order and
//! casing do not matter, but the casing of the first occurrence is what gets
//! written.
//!
//! An incoming scalar that is absent or blank never clears the stored value.
//! Unit flags are the exception: an absent flag means its default
//! (`useAbbreviation = false`, `fraction = true`).

use crate::{
    normalize::{key, same_text, trimmed},
    Entity, EntityFields, ImportRecord,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Default for `useAbbreviation` when a unit omits it.
pub const DEFAULT_USE_ABBREVIATION: bool = false;

/// Default for `fraction` when a unit omits it.
pub const DEFAULT_FRACTION: bool = true;

/// How incoming aliases combine with the stored ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AliasMode {
    /// Union of stored and incoming aliases; stored casing wins
    #[default]
    Merge,
    /// Incoming aliases only
    Replace,
}

/// The changed, non-null fields of an update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plural_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abbreviation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plural_abbreviation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_abbreviation: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fraction: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aliases: Option<Vec<String>>,
}

impl EntityPatch {
    /// Compute the update that turns `existing` into `incoming`.
    ///
    /// `merged` is the alias set the entity should end up with, as returned
    /// by [`merge_aliases`].
    pub fn between(existing: &EntityFields, incoming: &EntityFields, merged: &[String]) -> Self {
        Self {
            name: changed_text(Some(existing.name.as_str()), Some(incoming.name.as_str())),
            plural_name: changed_text(
                existing.plural_name.as_deref(),
                incoming.plural_name.as_deref(),
            ),
            description: changed_text(
                existing.description.as_deref(),
                incoming.description.as_deref(),
            ),
            abbreviation: changed_text(
                existing.abbreviation.as_deref(),
                incoming.abbreviation.as_deref(),
            ),
            plural_abbreviation: changed_text(
                existing.plural_abbreviation.as_deref(),
                incoming.plural_abbreviation.as_deref(),
            ),
            use_abbreviation: changed_flag(
                existing.use_abbreviation,
                incoming.use_abbreviation,
                DEFAULT_USE_ABBREVIATION,
            ),
            fraction: changed_flag(existing.fraction, incoming.fraction, DEFAULT_FRACTION),
            label: changed_text(existing.label.as_deref(), incoming.label.as_deref()),
            aliases: if same_aliases(&existing.aliases, merged) {
                None
            } else {
                Some(merged.to_vec())
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Names of the fields this patch touches, in wire form.
    pub fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        let mut note = |present: bool, name: &'static str| {
            if present {
                fields.push(name);
            }
        };
        note(self.name.is_some(), "name");
        note(self.plural_name.is_some(), "pluralName");
        note(self.description.is_some(), "description");
        note(self.abbreviation.is_some(), "abbreviation");
        note(self.plural_abbreviation.is_some(), "pluralAbbreviation");
        note(self.use_abbreviation.is_some(), "useAbbreviation");
        note(self.fraction.is_some(), "fraction");
        note(self.label.is_some(), "label");
        note(self.aliases.is_some(), "aliases");
        fields
    }

    /// Apply the patch to stored fields.
    pub fn apply_to(&self, fields: &mut EntityFields) {
        if let Some(name) = &self.name {
            fields.name = name.clone();
        }
        if let Some(plural) = &self.plural_name {
            fields.plural_name = Some(plural.clone());
        }
        if let Some(description) = &self.description {
            fields.description = Some(description.clone());
        }
        if let Some(abbreviation) = &self.abbreviation {
            fields.abbreviation = Some(abbreviation.clone());
        }
        if let Some(abbreviation) = &self.plural_abbreviation {
            fields.plural_abbreviation = Some(abbreviation.clone());
        }
        if let Some(flag) = self.use_abbreviation {
            fields.use_abbreviation = Some(flag);
        }
        if let Some(flag) = self.fraction {
            fields.fraction = Some(flag);
        }
        if let Some(label) = &self.label {
            fields.label = Some(label.clone());
        }
        if let Some(aliases) = &self.aliases {
            fields.aliases = aliases.clone();
        }
    }
}

/// Whether applying `incoming` with alias set `merged` would change `existing`.
pub fn has_changed(existing: &EntityFields, incoming: &EntityFields, merged: &[String]) -> bool {
    !EntityPatch::between(existing, incoming, merged).is_empty()
}

/// The alias set an update of `existing` from `incoming` should write.
///
/// Aliases equal to the resulting name or plural name are dropped.
pub fn merge_aliases(existing: &Entity, incoming: &ImportRecord, mode: AliasMode) -> Vec<String> {
    let name =
        trimmed(Some(incoming.fields.name.as_str())).unwrap_or(existing.fields.name.as_str());
    let plural = trimmed(incoming.fields.plural_name.as_deref())
        .or(existing.fields.plural_name.as_deref());

    let candidates: Vec<&str> = match mode {
        AliasMode::Merge => existing
            .fields
            .aliases
            .iter()
            .chain(&incoming.fields.aliases)
            .map(String::as_str)
            .collect(),
        AliasMode::Replace => incoming.fields.aliases.iter().map(String::as_str).collect(),
    };
    dedupe_aliases(candidates, name, plural)
}

/// The alias set a newly created entity should carry.
pub fn clean_aliases(fields: &EntityFields) -> Vec<String> {
    dedupe_aliases(
        fields.aliases.iter().map(String::as_str),
        &fields.name,
        fields.plural_name.as_deref(),
    )
}

fn dedupe_aliases<'a>(
    candidates: impl IntoIterator<Item = &'a str>,
    name: &str,
    plural: Option<&str>,
) -> Vec<String> {
    let mut seen: HashSet<String> = [key(name), plural.and_then(key)]
        .into_iter()
        .flatten()
        .collect();

    candidates
        .into_iter()
        .filter_map(|alias| {
            let k = key(alias)?;
            seen.insert(k).then(|| alias.trim().to_string())
        })
        .collect()
}

/// Alias sets are equal when their normalized, sorted, deduplicated keys are.
pub fn same_aliases(a: &[String], b: &[String]) -> bool {
    alias_keys(a) == alias_keys(b)
}

fn alias_keys(aliases: &[String]) -> Vec<String> {
    let mut keys: Vec<String> = aliases.iter().filter_map(|a| key(a)).collect();
    keys.sort();
    keys.dedup();
    keys
}

fn changed_text(existing: Option<&str>, incoming: Option<&str>) -> Option<String> {
    let incoming = trimmed(incoming)?;
    if same_text(existing, Some(incoming)) {
        None
    } else {
        Some(incoming.to_string())
    }
}

fn changed_flag(existing: Option<bool>, incoming: Option<bool>, default: bool) -> Option<bool> {
    let incoming = incoming.unwrap_or(default);
    if existing.unwrap_or(default) == incoming {
        None
    } else {
        Some(incoming)
    }
}
