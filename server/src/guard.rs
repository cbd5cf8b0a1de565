//! Usage guard for mirror deletions.
//!
//! Before an orphan is deleted the store is asked how many records still
//! refer to it. Anything in use is blocked and reported, never retried.

use larder_engine::{Entity, EntityKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::store::EntityStore;

/// What to do when the usage query itself fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GuardPolicy {
    /// Treat the entity as unused and delete it
    #[default]
    FailOpen,
    /// Treat the entity as in use and keep it
    FailClosed,
}

impl fmt::Display for GuardPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardPolicy::FailOpen => f.write_str("fail-open"),
            GuardPolicy::FailClosed => f.write_str("fail-closed"),
        }
    }
}

impl FromStr for GuardPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail-open" | "open" => Ok(GuardPolicy::FailOpen),
            "fail-closed" | "closed" => Ok(GuardPolicy::FailClosed),
            other => Err(other.to_string()),
        }
    }
}

/// An orphan the guard kept.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedEntity {
    pub entity: Entity,
    /// `None` when the usage query failed under [`GuardPolicy::FailClosed`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_count: Option<u64>,
}

/// Result of guarding a set of deletion candidates.
#[derive(Debug, Default)]
pub struct GuardVerdict {
    pub blocked: Vec<BlockedEntity>,
    /// Safe to delete
    pub clear: Vec<Entity>,
    pub warnings: Vec<String>,
}

pub struct UsageGuard<'a> {
    store: &'a dyn EntityStore,
    policy: GuardPolicy,
}

impl<'a> UsageGuard<'a> {
    pub fn new(store: &'a dyn EntityStore, policy: GuardPolicy) -> Self {
        Self { store, policy }
    }

    /// Split candidates into blocked and clear, querying usage one at a time.
    pub async fn partition(&self, kind: EntityKind, candidates: Vec<Entity>) -> GuardVerdict {
        let mut verdict = GuardVerdict::default();

        for entity in candidates {
            match self.store.usage_count(kind, &entity.id).await {
                Ok(0) => verdict.clear.push(entity),
                Ok(count) => {
                    tracing::info!(
                        kind = %kind,
                        id = %entity.id,
                        usage = count,
                        "Keeping '{}': still referenced",
                        entity.name()
                    );
                    verdict.blocked.push(BlockedEntity {
                        entity,
                        usage_count: Some(count),
                    });
                }
                Err(e) => {
                    let warning = format!(
                        "usage check failed for {} '{}' ({}): {}; {}",
                        kind,
                        entity.name(),
                        entity.id,
                        e,
                        match self.policy {
                            GuardPolicy::FailOpen => "treating as unused",
                            GuardPolicy::FailClosed => "keeping it",
                        }
                    );
                    tracing::warn!("{}", warning);
                    verdict.warnings.push(warning);

                    match self.policy {
                        GuardPolicy::FailOpen => verdict.clear.push(entity),
                        GuardPolicy::FailClosed => verdict.blocked.push(BlockedEntity {
                            entity,
                            usage_count: None,
                        }),
                    }
                }
            }
        }

        verdict
    }
}
