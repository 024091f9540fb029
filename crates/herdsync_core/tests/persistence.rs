//! File-backed store tests: state survives closing and reopening.

use herdsync_core::{CoreError, KeySource, StoreConfig, SyncContext};
use herdsync_protocol::{
    ConflictRecord, ConflictResolution, Cow, EntityType, MilkProduction, OperationKind,
};
use serde_json::json;
use tempfile::tempdir;

fn milk(cow_id: &str) -> MilkProduction {
    MilkProduction {
        cow_id: cow_id.to_string(),
        date: "2024-04-01".into(),
        morning_liters: 11.5,
        evening_liters: 9.25,
        notes: None,
    }
}

#[test]
fn bessie_lifecycle_queues_three_changes() {
    let ctx = SyncContext::in_memory();
    let cows = ctx.repository::<Cow>();

    let bessie = cows.create(Cow::new("Bessie", "C001")).unwrap();
    let patch = json!({ "name": "Bessie II" });
    let updated = cows.update(&bessie.meta.id, patch.as_object().unwrap()).unwrap().unwrap();
    assert_eq!(updated.meta.version, 2);
    assert!(cows.delete(&bessie.meta.id));

    let kinds: Vec<OperationKind> = ctx.queue().snapshot().iter().map(|c| c.kind).collect();
    assert_eq!(
        kinds,
        vec![OperationKind::Create, OperationKind::Update, OperationKind::Delete]
    );
    assert!(cows.get_by_id(&bessie.meta.id).is_none());
}

#[test]
fn state_survives_reopen() {
    let dir = tempdir().unwrap();
    let config = StoreConfig::new().directory(dir.path().join("store"));

    let (cow_id, milk_id) = {
        let ctx = SyncContext::open_with(&config).unwrap();
        let cow = ctx.repository::<Cow>().create(Cow::new("Bessie", "C001")).unwrap();
        let record = ctx.repository::<MilkProduction>().create(milk(&cow.meta.id)).unwrap();
        ctx.conflicts().record(ConflictRecord::new(
            record.meta.id.clone(),
            EntityType::MilkProduction,
            None,
            None,
            7,
        ));
        (cow.meta.id, record.meta.id)
    };

    let ctx = SyncContext::open_with(&config).unwrap();
    assert_eq!(ctx.queue().pending_changes_count(), 2);
    assert!(ctx.conflicts().contains(&milk_id));
    let stored = ctx.repository::<MilkProduction>().get_by_id(&milk_id).unwrap();
    assert_eq!(stored.fields.cow_id, cow_id);
    assert_eq!(stored.fields.total_liters(), 20.75);

    ctx.resolve_conflict(&milk_id, ConflictResolution::KeepLocal)
        .unwrap();
    drop(ctx);

    let ctx = SyncContext::open_with(&config).unwrap();
    assert!(ctx.conflicts().is_empty());
    assert!(ctx.queue().pending_for(&milk_id)[0].force);
}

#[test]
fn non_finite_fields_are_rejected_without_damaging_the_store() {
    let dir = tempdir().unwrap();
    let config = StoreConfig::new().directory(dir.path().join("store"));

    let good_id = {
        let ctx = SyncContext::open_with(&config).unwrap();
        let records = ctx.repository::<MilkProduction>();
        let good = records.create(milk("c1")).unwrap();

        let bad = MilkProduction {
            morning_liters: f64::NAN,
            ..milk("c1")
        };
        assert!(matches!(
            records.create(bad),
            Err(CoreError::InvalidFields {
                entity_type: EntityType::MilkProduction,
                ..
            })
        ));
        ctx.repository::<Cow>().create(Cow::new("Bessie", "C001")).unwrap();

        assert_eq!(records.get_all().len(), 1);
        assert!(records.get_by_id(&good.meta.id).is_some());
        assert_eq!(ctx.queue().pending_changes_count(), 2);
        good.meta.id
    };

    let ctx = SyncContext::open_with(&config).unwrap();
    assert_eq!(ctx.queue().pending_changes_count(), 2);
    assert!(ctx.repository::<MilkProduction>().get_by_id(&good_id).is_some());
    assert_eq!(ctx.repository::<Cow>().count(), 1);
}

#[test]
fn second_open_is_locked_out() {
    let dir = tempdir().unwrap();
    let config = StoreConfig::new().directory(dir.path());

    let _first = SyncContext::open_with(&config).unwrap();
    let second = SyncContext::open_with(&config);
    assert!(matches!(second, Err(CoreError::Storage(_))));
}

#[test]
fn missing_directory_without_create() {
    let dir = tempdir().unwrap();
    let config = StoreConfig::new()
        .directory(dir.path().join("absent"))
        .create_if_missing(false);

    assert!(matches!(
        SyncContext::open_with(&config),
        Err(CoreError::StoreNotFound(_))
    ));
}

#[test]
fn wrong_key_reads_as_empty() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store");

    {
        let ctx = SyncContext::open_with(&StoreConfig::new().directory(&path)).unwrap();
        ctx.repository::<Cow>().create(Cow::new("Bessie", "C001")).unwrap();
    }

    let config = StoreConfig::new()
        .directory(&path)
        .key(KeySource::Password("not the embedded key".into()));
    let ctx = SyncContext::open_with(&config).unwrap();
    assert_eq!(ctx.repository::<Cow>().count(), 0);
    assert_eq!(ctx.queue().pending_changes_count(), 0);
}
