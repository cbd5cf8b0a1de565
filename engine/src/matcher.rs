//! Resolves an import record to at most one existing entity.
//!
//! Key spaces are tried in a fixed order and the first hit wins:
//!
//! 1. `id` against the id map (exact)
//! 2. `name` against the name map
//! 3. `pluralName` against the name map, then the alias map
//! 4. units only: `abbreviation`, then `pluralAbbreviation`, against the name map
//! 5. `name` against the alias map
//! 6. each alias in input order against the name map, then the alias map
//!
//! An id always wins, even when the names have since diverged. The later
//! steps are ordered by how likely they are to be a coincidence; an alias
//! that happens to equal somebody else's name is the weakest signal.

use crate::{normalize::key, Entity, EntityId, ImportRecord, LookupIndex};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a record was matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchMethod {
    Id,
    Name,
    PluralName,
    /// Incoming plural name equals an existing alias
    PluralNameAlias,
    Abbreviation,
    PluralAbbreviation,
    /// Incoming name equals an existing alias
    NameAlias,
    /// Incoming alias equals an existing name
    AliasName,
    AliasAlias,
}

impl fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MatchMethod::Id => "id",
            MatchMethod::Name => "name",
            MatchMethod::PluralName => "pluralName",
            MatchMethod::PluralNameAlias => "pluralName->alias",
            MatchMethod::Abbreviation => "abbreviation",
            MatchMethod::PluralAbbreviation => "pluralAbbreviation",
            MatchMethod::NameAlias => "name->alias",
            MatchMethod::AliasName => "alias->name",
            MatchMethod::AliasAlias => "alias->alias",
        };
        f.write_str(s)
    }
}

/// A resolved record, with the literal values on both sides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub entity_id: EntityId,
    pub method: MatchMethod,
    /// Value taken from the import record
    pub incoming: String,
    /// Value on the existing entity it matched
    pub existing: String,
}

impl fmt::Display for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' matched '{}' by {} ({})",
            self.incoming, self.existing, self.method, self.entity_id
        )
    }
}

/// Resolve `record` against `index`. `None` means the record is new.
pub fn resolve(record: &ImportRecord, index: &LookupIndex) -> Option<Match> {
    let fields = &record.fields;

    if let Some(id) = record.id.as_deref() {
        if let Some(entity) = index.get(id) {
            return Some(Match {
                entity_id: entity.id.clone(),
                method: MatchMethod::Id,
                incoming: id.to_string(),
                existing: entity.id.clone(),
            });
        }
    }

    if let Some(m) = by_name(index, &fields.name, MatchMethod::Name) {
        return Some(m);
    }

    if let Some(plural) = fields.plural_name.as_deref() {
        if let Some(m) = by_name(index, plural, MatchMethod::PluralName)
            .or_else(|| by_alias(index, plural, MatchMethod::PluralNameAlias))
        {
            return Some(m);
        }
    }

    if index.kind().has_abbreviations() {
        let abbreviations = [
            (fields.abbreviation.as_deref(), MatchMethod::Abbreviation),
            (
                fields.plural_abbreviation.as_deref(),
                MatchMethod::PluralAbbreviation,
            ),
        ];
        for (value, method) in abbreviations {
            if let Some(m) = value.and_then(|v| by_name(index, v, method)) {
                return Some(m);
            }
        }
    }

    if let Some(m) = by_alias(index, &fields.name, MatchMethod::NameAlias) {
        return Some(m);
    }

    fields.aliases.iter().find_map(|alias| {
        by_name(index, alias, MatchMethod::AliasName)
            .or_else(|| by_alias(index, alias, MatchMethod::AliasAlias))
    })
}

fn by_name(index: &LookupIndex, value: &str, method: MatchMethod) -> Option<Match> {
    let entity = index.by_name(value)?;
    Some(found(entity, value, method, name_literal(entity, value)))
}

fn by_alias(index: &LookupIndex, value: &str, method: MatchMethod) -> Option<Match> {
    let entity = index.by_alias(value)?;
    Some(found(entity, value, method, alias_literal(entity, value)))
}

fn found(entity: &Entity, incoming: &str, method: MatchMethod, existing: Option<&str>) -> Match {
    Match {
        entity_id: entity.id.clone(),
        method,
        incoming: incoming.trim().to_string(),
        existing: existing.unwrap_or(incoming).trim().to_string(),
    }
}

/// The entity field whose key produced a name-map hit.
fn name_literal<'a>(entity: &'a Entity, value: &str) -> Option<&'a str> {
    let wanted = key(value)?;
    let fields = &entity.fields;
    [
        Some(fields.name.as_str()),
        fields.plural_name.as_deref(),
        fields.abbreviation.as_deref(),
        fields.plural_abbreviation.as_deref(),
    ]
    .into_iter()
    .flatten()
    .find(|candidate| key(candidate).as_deref() == Some(wanted.as_str()))
}

fn alias_literal<'a>(entity: &'a Entity, value: &str) -> Option<&'a str> {
    let wanted = key(value)?;
    entity
        .fields
        .aliases
        .iter()
        .map(String::as_str)
        .find(|alias| key(alias).as_deref() == Some(wanted.as_str()))
}
