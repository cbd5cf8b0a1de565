//! End-to-end reconciliation scenarios for larder-engine
//!
//! Each test drives the full pipeline: parse documents, gate on conflicts,
//! index the store, plan.

use larder_engine::{
    ensure_no_conflicts, resolve, Action, Batch, ConflictScope, Entity, EntityFields, EntityKind,
    EntityPatch, Error, ImportRecord, KeyField, LookupIndex, MatchMethod, ReconcileOptions,
    Reconciler,
};
use serde_json::json;

fn document(kind: &str, records: serde_json::Value) -> serde_json::Value {
    json!({"kind": kind, "schemaVersion": 1, "records": records})
}

fn foods(source: &str, records: serde_json::Value) -> Batch {
    Batch::from_value(source, document("foods", records)).unwrap()
}

fn stored(id: &str, name: &str, aliases: &[&str]) -> Entity {
    let mut fields = EntityFields::named(name);
    fields.aliases = aliases.iter().map(|a| a.to_string()).collect();
    Entity::new(id, fields)
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn scenario_create_into_empty_store() {
    let batch = foods("foods.json", json!([{"name": "kumquat"}]));
    ensure_no_conflicts(std::slice::from_ref(&batch), EntityKind::Food).unwrap();

    let index = LookupIndex::build(EntityKind::Food, vec![]);
    let plan = Reconciler::new(index, ReconcileOptions::import()).plan(&batch.records);

    assert_eq!(plan.stats.created, 1);
    assert_eq!(plan.stats.updated, 0);
    assert_eq!(plan.stats.conflicts, 0);
}

#[test]
fn scenario_update_merges_aliases() {
    let batch = foods(
        "foods.json",
        json!([{"name": "potato", "aliases": [{"name": "spuds"}]}]),
    );
    let index = LookupIndex::build(EntityKind::Food, vec![stored("f-1", "potato", &["spud"])]);

    let plan = Reconciler::new(index, ReconcileOptions::import().with_updates())
        .plan(&batch.records);
    assert_eq!(plan.stats.updated, 1);

    let Action::Update { entity_id, patch } = &plan.decisions[0].action else {
        panic!("expected update, got {:?}", plan.decisions[0].action);
    };
    assert_eq!(entity_id, "f-1");

    let mut entity = stored("f-1", "potato", &["spud"]);
    patch.apply_to(&mut entity.fields);
    assert_eq!(entity.fields.aliases, vec!["spud", "spuds"]);
}

#[test]
fn scenario_within_file_conflict() {
    let batch = foods("foods.json", json!([{"name": "tomato"}, {"name": "Tomato"}]));

    let Err(Error::Conflicts(conflicts)) = ensure_no_conflicts(&[batch], EntityKind::Food) else {
        panic!("expected conflicts");
    };
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].scope, ConflictScope::WithinFile);
    assert!(conflicts[0]
        .occurrences
        .iter()
        .all(|o| o.field == KeyField::Name));
}

#[test]
fn scenario_cross_file_alias_collision() {
    let first = foods(
        "a.json",
        json!([{"name": "chives", "aliases": ["scallion"]}]),
    );
    let second = foods("b.json", json!([{"name": "leek", "aliases": ["chives"]}]));

    let Err(Error::Conflicts(conflicts)) =
        ensure_no_conflicts(&[first, second], EntityKind::Food)
    else {
        panic!("expected conflicts");
    };
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].key, "chives");
    assert_eq!(conflicts[0].scope, ConflictScope::CrossFile);
}

#[test]
fn mirror_plan_lists_orphans() {
    let batch = foods("foods.json", json!([{"name": "potato"}, {"name": "leek"}]));
    let index = LookupIndex::build(
        EntityKind::Food,
        vec![
            stored("f-1", "potato", &[]),
            stored("f-2", "parsnip", &[]),
            stored("f-3", "kale", &[]),
        ],
    );

    let plan = Reconciler::new(index, ReconcileOptions::mirror()).plan(&batch.records);
    assert_eq!(plan.stats.unchanged, 1);
    assert_eq!(plan.stats.created, 1);

    let orphans: Vec<_> = plan.orphans.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(orphans, vec!["f-3", "f-2"]);
}

// ============================================================================
// Round Trips
// ============================================================================

#[test]
fn created_entities_resolve_to_themselves() {
    let records = vec![
        ImportRecord::named("kumquat")
            .with_plural("kumquats")
            .with_aliases(["cumquat"]),
        ImportRecord::named("yuzu"),
    ];

    let mut reconciler = Reconciler::new(
        LookupIndex::new(EntityKind::Food),
        ReconcileOptions::import(),
    );
    for (i, record) in records.iter().enumerate() {
        let decision = reconciler.classify(i + 1, record);
        let Action::Create { record: created } = decision.action else {
            panic!("expected create");
        };
        reconciler.confirm_created(i + 1, Entity::new(format!("f-{}", i + 1), created.fields));
    }

    for (i, record) in records.iter().enumerate() {
        let m = resolve(record, reconciler.index()).unwrap();
        assert_eq!(m.entity_id, format!("f-{}", i + 1));
        assert_eq!(m.method, MatchMethod::Name);
    }
}

#[test]
fn export_then_reimport_is_unchanged() {
    let entities = vec![
        stored("f-1", "potato", &["spud"]),
        stored("f-2", "leek", &[]),
    ];
    let records: Vec<ImportRecord> = entities.iter().map(ImportRecord::from).collect();
    let index = LookupIndex::build(EntityKind::Food, entities);

    let plan = Reconciler::new(index, ReconcileOptions::mirror()).plan(&records);
    assert_eq!(plan.stats.unchanged, 2);
    assert!(plan.orphans.is_empty());
    assert!(plan
        .decisions
        .iter()
        .all(|d| d.matched.as_ref().map(|m| m.method) == Some(MatchMethod::Id)));
}

#[test]
fn rename_by_id_is_an_update() {
    let index = LookupIndex::build(EntityKind::Food, vec![stored("f-1", "spring onion", &[])]);
    let records = vec![ImportRecord::named("Scallion").with_id("f-1")];

    let plan = Reconciler::new(index, ReconcileOptions::mirror()).plan(&records);
    let Action::Update { patch, .. } = &plan.decisions[0].action else {
        panic!("expected update");
    };
    assert_eq!(
        patch,
        &EntityPatch {
            name: Some("Scallion".into()),
            ..EntityPatch::default()
        }
    );
    assert!(plan.orphans.is_empty());
}

// ============================================================================
// Units
// ============================================================================

#[test]
fn unit_batch_matches_on_abbreviation() {
    let batch = Batch::from_value(
        "units.json",
        document(
            "units",
            json!([{"name": "Tablespoon (US)", "abbreviation": "TBSP", "fraction": true}]),
        ),
    )
    .unwrap();

    let mut fields = EntityFields::named("tablespoon");
    fields.abbreviation = Some("tbsp".into());
    let index = LookupIndex::build(EntityKind::Unit, vec![Entity::new("u-1", fields)]);

    let plan = Reconciler::new(index, ReconcileOptions::import().with_updates())
        .plan(&batch.records);
    let decision = &plan.decisions[0];
    assert_eq!(
        decision.matched.as_ref().unwrap().method,
        MatchMethod::Abbreviation
    );

    // fraction=true is the default, so only the name and abbreviation casing moved
    let Action::Update { patch, .. } = &decision.action else {
        panic!("expected update");
    };
    assert_eq!(patch.changed_fields(), vec!["name", "abbreviation"]);
}
