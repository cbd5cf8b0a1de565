//! Import handler - reconciles incoming batches against the entity store.
//!
//! A run goes through these stages, and nothing reaches the store until the
//! first three have passed:
//!
//! 1. parse every batch document and check its kind
//! 2. reject the request if any key is claimed by two records
//! 3. load the current catalog and build the lookup index
//! 4. classify and apply records one at a time, throttled
//! 5. mirror only: guard and delete orphans

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use larder_engine::{
    ensure_no_conflicts, Action, AliasMode, Batch, Decision, Entity, EntityKind, ImportRecord,
    LookupIndex, ReconcileOptions, Reconciler, RunStats, SyncMode,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::guard::{BlockedEntity, GuardPolicy, UsageGuard};
use crate::store::{fetch_all, EntityStore};

/// Request body for an import run.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    #[serde(default)]
    pub mode: SyncMode,
    #[serde(default)]
    pub dry_run: bool,
    /// Defaults to `false` for imports and `true` for mirrors
    #[serde(default)]
    pub update_existing: Option<bool>,
    #[serde(default)]
    pub alias_mode: AliasMode,
    pub batches: Vec<BatchInput>,
}

/// One batch document and the label used for it in diagnostics.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchInput {
    pub source: String,
    pub document: serde_json::Value,
}

impl ImportRequest {
    pub fn options(&self) -> ReconcileOptions {
        ReconcileOptions {
            mode: self.mode,
            dry_run: self.dry_run,
            update_existing: self
                .update_existing
                .unwrap_or(self.mode == SyncMode::Mirror),
            alias_mode: self.alias_mode,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RunOutcome {
    Success,
    /// Some records failed; the rest were applied
    PartialFailure,
}

/// A store call that failed for one record or orphan.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordFailure {
    /// Record position; absent for orphan deletions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
    pub name: String,
    pub action: &'static str,
    pub error: String,
}

/// Response for an import run.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    pub run_id: String,
    pub kind: EntityKind,
    pub mode: SyncMode,
    pub dry_run: bool,
    pub outcome: RunOutcome,
    pub stats: RunStats,
    pub decisions: Vec<Decision>,
    pub failures: Vec<RecordFailure>,
    pub deleted: Vec<Entity>,
    pub blocked: Vec<BlockedEntity>,
    /// Orphans a live run would delete (dry runs only)
    pub pending_deletions: Vec<Entity>,
    pub warnings: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Everything a run needs besides its input.
#[derive(Clone)]
pub struct RunContext {
    pub store: Arc<dyn EntityStore>,
    pub throttle: Duration,
    pub page_size: u32,
    pub guard_policy: GuardPolicy,
    pub household: Option<String>,
}

impl RunContext {
    pub fn new(store: Arc<dyn EntityStore>, config: &Config) -> Self {
        Self {
            store,
            throttle: config.throttle,
            page_size: config.page_size,
            guard_policy: config.usage_guard,
            household: config.household.clone(),
        }
    }

    async fn pause(&self) {
        if !self.throttle.is_zero() {
            tokio::time::sleep(self.throttle).await;
        }
    }

    /// Fill in the default household for household-scoped kinds.
    fn scoped<'r>(&self, kind: EntityKind, record: &'r ImportRecord) -> Cow<'r, ImportRecord> {
        match &self.household {
            Some(household) if kind.is_household_scoped() && record.fields.household.is_none() => {
                let mut record = record.clone();
                record.fields.household = Some(household.clone());
                Cow::Owned(record)
            }
            _ => Cow::Borrowed(record),
        }
    }
}

/// Run one import request for `kind`.
pub async fn handle_import(
    ctx: &RunContext,
    kind: EntityKind,
    request: ImportRequest,
) -> Result<ImportResponse> {
    let started_at = Utc::now();
    let run_id = Uuid::new_v4().to_string();
    let options = request.options();

    if request.batches.is_empty() {
        return Err(AppError::BadRequest(
            "At least one batch is required".to_string(),
        ));
    }

    let batches = request
        .batches
        .into_iter()
        .map(|input| Batch::from_value(input.source, input.document)?.expect_kind(kind))
        .collect::<larder_engine::Result<Vec<_>>>()?;
    ensure_no_conflicts(&batches, kind)?;

    let total: usize = batches.iter().map(Batch::len).sum();
    tracing::info!(
        run = %run_id,
        kind = %kind,
        mode = ?options.mode,
        dry_run = options.dry_run,
        batches = batches.len(),
        records = total,
        "Starting import"
    );

    let store = ctx.store.as_ref();
    let index = LookupIndex::build(kind, fetch_all(store, kind, ctx.page_size).await?);

    let mut warnings = Vec::new();
    for collision in index.collisions() {
        let warning = format!(
            "{} key '{}' is claimed by both {} and {}; using {}",
            kind, collision.key, collision.kept, collision.ignored, collision.kept
        );
        tracing::warn!("{}", warning);
        warnings.push(warning);
    }

    let mut reconciler = Reconciler::new(index, options);
    let mut stats = RunStats::default();
    let mut decisions = Vec::with_capacity(total);
    let mut failures = Vec::new();

    let records = batches.iter().flat_map(|batch| batch.records.iter());
    for (i, record) in records.enumerate() {
        let position = i + 1;
        let decision = reconciler.classify(position, record);

        match &decision.action {
            Action::Create { record } if !options.dry_run => {
                match store.create(kind, &ctx.scoped(kind, record)).await {
                    Ok(entity) => {
                        tracing::info!(
                            "[{}/{}] Created {} '{}' ({})",
                            position,
                            total,
                            kind,
                            entity.name(),
                            entity.id
                        );
                        reconciler.confirm_created(position, entity);
                        stats.record(&decision.action);
                    }
                    Err(e) => {
                        tracing::error!("[{}/{}] Failed to create '{}': {}", position, total, decision.name, e);
                        stats.record_error();
                        failures.push(RecordFailure {
                            position: Some(position),
                            name: decision.name.clone(),
                            action: "create",
                            error: e.to_string(),
                        });
                    }
                }
                ctx.pause().await;
            }
            Action::Update { entity_id, patch } if !options.dry_run => {
                match store.update(kind, entity_id, patch).await {
                    Ok(_) => {
                        tracing::info!(
                            "[{}/{}] Updated {} '{}' ({})",
                            position,
                            total,
                            kind,
                            decision.name,
                            patch.changed_fields().join(", ")
                        );
                        stats.record(&decision.action);
                    }
                    Err(e) => {
                        tracing::error!("[{}/{}] Failed to update '{}': {}", position, total, decision.name, e);
                        stats.record_error();
                        failures.push(RecordFailure {
                            position: Some(position),
                            name: decision.name.clone(),
                            action: "update",
                            error: e.to_string(),
                        });
                    }
                }
                ctx.pause().await;
            }
            Action::Conflict { claimed_by, .. } => {
                let detail = decision
                    .matched
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default();
                tracing::warn!(
                    "[{}/{}] Conflict: '{}' resolves to the entity record #{} already claimed: {}",
                    position,
                    total,
                    decision.name,
                    claimed_by,
                    detail
                );
                stats.record(&decision.action);
            }
            action => {
                tracing::debug!(
                    "[{}/{}] {} '{}'",
                    position,
                    total,
                    action.name(),
                    decision.name
                );
                stats.record(action);
            }
        }

        decisions.push(decision);
    }

    let mut deleted = Vec::new();
    let mut blocked = Vec::new();
    let mut pending_deletions = Vec::new();

    if options.mode == SyncMode::Mirror {
        let orphans = reconciler.orphans();
        tracing::info!("Found {} orphaned {}", orphans.len(), kind);

        let verdict = UsageGuard::new(store, ctx.guard_policy)
            .partition(kind, orphans)
            .await;
        stats.blocked = verdict.blocked.len();
        blocked = verdict.blocked;
        warnings.extend(verdict.warnings);

        if options.dry_run {
            pending_deletions = verdict.clear;
        } else {
            for entity in verdict.clear {
                match store.delete(kind, &entity.id).await {
                    Ok(()) => {
                        tracing::info!("Deleted {} '{}' ({})", kind, entity.name(), entity.id);
                        stats.deleted += 1;
                        deleted.push(entity);
                    }
                    Err(e) => {
                        tracing::error!("Failed to delete '{}': {}", entity.name(), e);
                        stats.record_error();
                        failures.push(RecordFailure {
                            position: None,
                            name: entity.name().to_string(),
                            action: "delete",
                            error: e.to_string(),
                        });
                    }
                }
                ctx.pause().await;
            }
        }
    }

    if options.dry_run {
        let writes = decisions
            .iter()
            .filter(|d| d.action.is_mutation())
            .count();
        tracing::info!(
            "Dry run: {} write(s) and {} deletion(s) planned, nothing applied",
            writes,
            pending_deletions.len()
        );
    }

    let outcome = if stats.has_errors() {
        RunOutcome::PartialFailure
    } else {
        RunOutcome::Success
    };

    tracing::info!(
        run = %run_id,
        created = stats.created,
        updated = stats.updated,
        unchanged = stats.unchanged,
        skipped = stats.skipped,
        conflicts = stats.conflicts,
        errors = stats.errors,
        deleted = stats.deleted,
        blocked = stats.blocked,
        "Import finished: {:?}",
        outcome
    );

    Ok(ImportResponse {
        run_id,
        kind,
        mode: options.mode,
        dry_run: options.dry_run,
        outcome,
        stats,
        decisions,
        failures,
        deleted,
        blocked,
        pending_deletions,
        warnings,
        started_at,
        finished_at: Utc::now(),
    })
}
