//! Entity and import record types.

use crate::{normalize::trimmed, EntityId, Error};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of catalog entity held by a batch or a store collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    #[serde(rename = "foods")]
    Food,
    #[serde(rename = "units")]
    Unit,
    #[serde(rename = "categories")]
    Category,
    #[serde(rename = "tags")]
    Tag,
    #[serde(rename = "tools")]
    Tool,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Food,
        EntityKind::Unit,
        EntityKind::Category,
        EntityKind::Tag,
        EntityKind::Tool,
    ];

    /// Wire name, also used as the store collection name.
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Food => "foods",
            EntityKind::Unit => "units",
            EntityKind::Category => "categories",
            EntityKind::Tag => "tags",
            EntityKind::Tool => "tools",
        }
    }

    /// Units are also addressed by abbreviation.
    pub fn has_abbreviations(self) -> bool {
        match self {
            EntityKind::Unit => true,
            EntityKind::Food | EntityKind::Category | EntityKind::Tag | EntityKind::Tool => false,
        }
    }

    /// Plural names, descriptions and aliases.
    pub fn has_aliases(self) -> bool {
        match self {
            EntityKind::Food | EntityKind::Unit => true,
            EntityKind::Category | EntityKind::Tag | EntityKind::Tool => false,
        }
    }

    pub fn has_label(self) -> bool {
        match self {
            EntityKind::Food => true,
            EntityKind::Unit | EntityKind::Category | EntityKind::Tag | EntityKind::Tool => false,
        }
    }

    pub fn is_household_scoped(self) -> bool {
        match self {
            EntityKind::Food | EntityKind::Tool => true,
            EntityKind::Unit | EntityKind::Category | EntityKind::Tag => false,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| Error::UnknownKind(s.to_string()))
    }
}

/// Which field of a record produced a lookup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyField {
    Name,
    PluralName,
    Abbreviation,
    PluralAbbreviation,
    Alias,
}

impl fmt::Display for KeyField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KeyField::Name => "name",
            KeyField::PluralName => "pluralName",
            KeyField::Abbreviation => "abbreviation",
            KeyField::PluralAbbreviation => "pluralAbbreviation",
            KeyField::Alias => "alias",
        };
        f.write_str(s)
    }
}

/// Observable fields shared by stored entities and import records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityFields {
    /// Canonical singular name
    #[serde(default)]
    pub name: String,
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
    /// Alternate names, always plain strings once parsed
    #[serde(
        default,
        deserialize_with = "deserialize_aliases",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub aliases: Vec<String>,
    /// Label name; the store resolves it to a reference on write
    #[serde(
        default,
        deserialize_with = "deserialize_label",
        skip_serializing_if = "Option::is_none"
    )]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub household: Option<String>,
}

impl EntityFields {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Clear every field the given kind does not carry.
    pub fn restrict_to(&mut self, kind: EntityKind) {
        if !kind.has_aliases() {
            self.plural_name = None;
            self.description = None;
            self.aliases.clear();
        }
        if !kind.has_abbreviations() {
            self.abbreviation = None;
            self.plural_abbreviation = None;
            self.use_abbreviation = None;
            self.fraction = None;
        }
        if !kind.has_label() {
            self.label = None;
        }
        if !kind.is_household_scoped() {
            self.household = None;
        }
    }

    /// Every non-blank value that can identify this entity, in matching order.
    pub fn key_values(&self, kind: EntityKind) -> Vec<(KeyField, &str)> {
        let mut values = Vec::with_capacity(4 + self.aliases.len());
        values.push((KeyField::Name, self.name.as_str()));
        if let Some(plural) = self.plural_name.as_deref() {
            values.push((KeyField::PluralName, plural));
        }
        if kind.has_abbreviations() {
            if let Some(abbr) = self.abbreviation.as_deref() {
                values.push((KeyField::Abbreviation, abbr));
            }
            if let Some(abbr) = self.plural_abbreviation.as_deref() {
                values.push((KeyField::PluralAbbreviation, abbr));
            }
        }
        values.extend(self.aliases.iter().map(|a| (KeyField::Alias, a.as_str())));
        values.retain(|(_, v)| !v.trim().is_empty());
        values
    }
}

/// An entity held by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// Store-assigned identifier
    pub id: EntityId,
    #[serde(flatten)]
    pub fields: EntityFields,
    /// Placeholder registered during a dry run, never persisted
    #[serde(skip)]
    pub simulated: bool,
}

impl Entity {
    pub fn new(id: impl Into<EntityId>, fields: EntityFields) -> Self {
        Self {
            id: id.into(),
            fields,
            simulated: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.fields.name
    }
}

/// An incoming, not yet persisted description of an entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRecord {
    /// Only used for direct id matching
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    #[serde(flatten)]
    pub fields: EntityFields,
}

impl ImportRecord {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: None,
            fields: EntityFields::named(name),
        }
    }

    pub fn with_id(mut self, id: impl Into<EntityId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_plural(mut self, plural: impl Into<String>) -> Self {
        self.fields.plural_name = Some(plural.into());
        self
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_abbreviation(mut self, abbreviation: impl Into<String>) -> Self {
        self.fields.abbreviation = Some(abbreviation.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.fields.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.fields.name
    }
}

impl From<&Entity> for ImportRecord {
    fn from(entity: &Entity) -> Self {
        Self {
            id: Some(entity.id.clone()),
            fields: entity.fields.clone(),
        }
    }
}

/// Aliases and labels arrive either as bare strings or as `{"name": ...}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum NameOrObject {
    Plain(String),
    Named {
        #[serde(default)]
        name: Option<String>,
    },
}

impl NameOrObject {
    fn into_name(self) -> Option<String> {
        let raw = match self {
            NameOrObject::Plain(name) => Some(name),
            NameOrObject::Named { name } => name,
        };
        trimmed(raw.as_deref()).map(str::to_string)
    }
}

fn deserialize_aliases<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries: Option<Vec<NameOrObject>> = Option::deserialize(deserializer)?;
    Ok(entries
        .unwrap_or_default()
        .into_iter()
        .filter_map(NameOrObject::into_name)
        .collect())
}

fn deserialize_label<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let label: Option<NameOrObject> = Option::deserialize(deserializer)?;
    Ok(label.and_then(NameOrObject::into_name))
}
