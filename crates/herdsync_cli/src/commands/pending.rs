//! Pending command implementation.

use herdsync_core::SyncContext;
use herdsync_protocol::PendingChange;

/// Runs the pending command.
pub fn run(ctx: &SyncContext, limit: Option<usize>, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let changes = select(ctx, limit);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&changes)?);
        }
        _ => {
            println!("Pending changes: {}", ctx.queue().pending_changes_count());
            for change in &changes {
                println!(
                    "  #{:<6} {:<7} {:<16} {}{}",
                    change.seq,
                    change.kind,
                    change.entity_type.tag(),
                    change.id,
                    if change.force { " (forced)" } else { "" }
                );
            }
        }
    }

    Ok(())
}

fn select(ctx: &SyncContext, limit: Option<usize>) -> Vec<PendingChange> {
    let mut changes = ctx.queue().snapshot();
    if let Some(limit) = limit {
        changes.truncate(limit);
    }
    changes
}
