//! Resolve command implementation.

use herdsync_core::SyncContext;
use herdsync_protocol::ConflictResolution;

/// Runs the resolve command.
pub fn run(ctx: &SyncContext, id: &str, accept_local: bool) -> Result<(), Box<dyn std::error::Error>> {
    let resolution = ConflictResolution::from_accept_local(accept_local);
    match ctx.resolve_conflict(id, resolution)? {
        Some(record) => {
            println!(
                "Resolved {} {} ({})",
                record.entity_type.tag(),
                record.id,
                if accept_local { "kept local" } else { "accepted remote" }
            );
            println!("Pending changes: {}", ctx.queue().pending_changes_count());
            Ok(())
        }
        None => Err(format!("No conflict for {id}").into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herdsync_core::now_millis;
    use herdsync_protocol::{ConflictRecord, Cow, EntityFields, EntityType};

    fn conflicted() -> (SyncContext, String) {
        let ctx = SyncContext::in_memory();
        let bessie = ctx.repository::<Cow>().create(Cow::new("Bessie", "C001")).unwrap();
        let mut remote = bessie.clone();
        remote.fields.name = "Bess".into();
        ctx.conflicts().record(ConflictRecord::new(
            bessie.meta.id.clone(),
            EntityType::Cow,
            Some(Cow::into_payload(bessie.clone())),
            Some(Cow::into_payload(remote)),
            now_millis(),
        ));
        (ctx, bessie.meta.id)
    }

    #[test]
    fn keep_local_forces_queued_change() {
        let (ctx, id) = conflicted();
        run(&ctx, &id, true).unwrap();
        assert!(ctx.conflicts().is_empty());
        assert!(ctx.queue().pending_for(&id)[0].force);
    }

    #[test]
    fn accept_remote_overwrites_local() {
        let (ctx, id) = conflicted();
        run(&ctx, &id, false).unwrap();
        assert_eq!(ctx.queue().pending_changes_count(), 0);
        assert_eq!(
            ctx.repository::<Cow>().get_by_id(&id).map(|c| c.fields.name),
            Some("Bess".to_string())
        );
    }

    #[test]
    fn unknown_id_is_error() {
        let ctx = SyncContext::in_memory();
        assert!(run(&ctx, "cow_missing", true).is_err());
    }
}
