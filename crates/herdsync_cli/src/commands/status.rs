//! Status command implementation.

use herdsync_core::SyncContext;
use herdsync_protocol::EntityType;
use serde::Serialize;
use std::path::Path;

/// Store status.
#[derive(Debug, Serialize)]
pub struct StatusResult {
    /// Store path.
    pub path: String,
    /// Entity counts per type.
    pub entities: Vec<EntityCount>,
    /// Changes waiting for the backend.
    pub pending_changes: usize,
    /// Unresolved conflicts.
    pub conflicts: usize,
    /// Keys present in the store.
    pub keys: Vec<String>,
}

/// Number of entities of one type.
#[derive(Debug, Serialize)]
pub struct EntityCount {
    /// Entity type tag.
    pub entity_type: EntityType,
    /// Number of entities.
    pub count: usize,
}

impl StatusResult {
    /// Gathers the status of `ctx`.
    pub fn collect(ctx: &SyncContext, path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let mut keys = ctx.store().keys()?;
        keys.sort();
        Ok(Self {
            path: path.display().to_string(),
            entities: EntityType::ALL
                .into_iter()
                .map(|entity_type| EntityCount {
                    entity_type,
                    count: ctx.list_payloads(entity_type).len(),
                })
                .collect(),
            pending_changes: ctx.queue().pending_changes_count(),
            conflicts: ctx.conflicts().len(),
            keys,
        })
    }
}

/// Runs the status command.
pub fn run(ctx: &SyncContext, path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = StatusResult::collect(ctx, path)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn print_text_output(result: &StatusResult) {
    println!("HerdSync Store: {}", result.path);
    println!();
    println!("Entities:");
    for entry in &result.entities {
        println!("  {:<16} {}", entry.entity_type.tag(), entry.count);
    }
    println!();
    println!("Pending changes: {}", result.pending_changes);
    println!("Conflicts:       {}", result.conflicts);
    println!("Stored keys:     {}", result.keys.join(", "));
}

#[cfg(test)]
mod tests {
    use super::*;
    use herdsync_protocol::Cow;

    #[test]
    fn counts_entities_and_queue() {
        let ctx = SyncContext::in_memory();
        let cows = ctx.repository::<Cow>();
        cows.create(Cow::new("Bessie", "C001")).unwrap();
        let daisy = cows.create(Cow::new("Daisy", "C002")).unwrap();
        cows.delete(&daisy.meta.id);

        let result = StatusResult::collect(&ctx, Path::new("/tmp/farm")).unwrap();
        assert_eq!(result.entities.len(), 4);
        assert_eq!(result.entities[0].count, 1);
        assert_eq!(result.pending_changes, 3);
        assert_eq!(result.conflicts, 0);
        assert!(result.keys.contains(&"data_cow".to_string()));
        assert!(result.keys.contains(&"pendingChanges".to_string()));

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["entities"][0]["entity_type"], "cow");
    }
}
