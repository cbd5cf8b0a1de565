//! Wire format tests for the import protocol.
//!
//! The server returns engine types verbatim, so their JSON shape is the
//! contract clients parse.

use larder_engine::{
    find_conflicts, Batch, EntityKind, Entity, EntityFields, ImportRecord, LookupIndex,
    ReconcileOptions, Reconciler,
};
use serde_json::{json, Value};

fn store() -> LookupIndex {
    let mut potato = EntityFields::named("potato");
    potato.aliases = vec!["spud".into()];
    LookupIndex::build(
        EntityKind::Food,
        vec![
            Entity::new("f-1", potato),
            Entity::new("f-2", EntityFields::named("turnip")),
        ],
    )
}

// ============================================================================
// Batch documents
// ============================================================================

#[cfg(test)]
mod document_tests {
    use super::*;

    #[test]
    fn test_export_shaped_document_parses() {
        let document = json!({
            "kind": "foods",
            "schemaVersion": 1,
            "records": [{
                "id": "f-1",
                "name": "potato",
                "pluralName": "potatoes",
                "aliases": [{"name": "spud"}, "tater", {"name": null}],
                "label": {"id": "l-1", "name": "Produce"},
                "onHand": true
            }]
        });

        let batch = Batch::from_value("export.json", document).unwrap();
        let record = &batch.records[0];

        assert_eq!(batch.kind, EntityKind::Food);
        assert_eq!(record.id.as_deref(), Some("f-1"));
        assert_eq!(record.fields.aliases, vec!["spud", "tater"]);
        assert_eq!(record.fields.label.as_deref(), Some("Produce"));
    }

    #[test]
    fn test_document_errors_name_the_batch() {
        let err = Batch::from_value(
            "broken.json",
            json!({"kind": "foods", "schemaVersion": 1, "records": [{"name": "ok"}, {"name": " "}]}),
        )
        .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("broken.json"), "{}", message);
        assert!(message.contains('2'), "{}", message);
    }
}

// ============================================================================
// Decisions
// ============================================================================

#[cfg(test)]
mod decision_tests {
    use super::*;

    fn decide(records: Vec<ImportRecord>, options: ReconcileOptions) -> Vec<Value> {
        let plan = Reconciler::new(store(), options).plan(&records);
        plan.decisions
            .iter()
            .map(|d| serde_json::to_value(d).unwrap())
            .collect()
    }

    #[test]
    fn test_create_decision_shape() {
        let decisions = decide(
            vec![ImportRecord::named("kumquat").with_id("stale-id")],
            ReconcileOptions::import(),
        );

        assert_eq!(decisions[0]["action"], "create");
        assert_eq!(decisions[0]["position"], 1);
        assert_eq!(decisions[0]["record"]["name"], "kumquat");
        assert!(decisions[0]["record"].get("id").is_none());
        assert!(decisions[0].get("match").is_none());
    }

    #[test]
    fn test_update_decision_carries_patch_and_match() {
        let decisions = decide(
            vec![ImportRecord::named(" potato ").with_description("starchy")],
            ReconcileOptions::mirror(),
        );

        let decision = &decisions[0];
        assert_eq!(decision["action"], "update");
        assert_eq!(decision["entityId"], "f-1");
        assert_eq!(decision["match"]["method"], "name");
        assert_eq!(decision["match"]["incoming"], "potato");
        assert_eq!(decision["patch"]["description"], "starchy");
        assert!(decision["patch"].get("name").is_none());
    }

    #[test]
    fn test_conflict_decision_names_the_claimant() {
        let decisions = decide(
            vec![ImportRecord::named("potato"), ImportRecord::named("spud")],
            ReconcileOptions::import(),
        );

        assert_eq!(decisions[0]["action"], "skip");
        assert_eq!(decisions[1]["action"], "conflict");
        assert_eq!(decisions[1]["claimedBy"], 1);
    }
}

// ============================================================================
// Conflict reports
// ============================================================================

#[cfg(test)]
mod conflict_tests {
    use super::*;

    #[test]
    fn test_conflict_report_shape() {
        let a = Batch::new(
            "a.json",
            EntityKind::Food,
            vec![ImportRecord::named("chives")],
        );
        let b = Batch::new(
            "b.json",
            EntityKind::Food,
            vec![ImportRecord::named("leek").with_aliases(["Chives"])],
        );

        let conflicts = find_conflicts(&[a, b], EntityKind::Food);
        let value = serde_json::to_value(&conflicts).unwrap();

        assert_eq!(value[0]["key"], "chives");
        assert_eq!(value[0]["scope"], "crossFile");
        assert_eq!(value[0]["occurrences"][1]["batch"], "b.json");
        assert_eq!(value[0]["occurrences"][1]["field"], "alias");
        assert_eq!(value[0]["occurrences"][1]["value"], "Chives");
    }
}
