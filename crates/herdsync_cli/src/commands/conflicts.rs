//! Conflicts command implementation.

use herdsync_core::SyncContext;

use super::list::describe;

/// Runs the conflicts command.
pub fn run(ctx: &SyncContext, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let conflicts = ctx.conflicts().conflicts();

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&conflicts)?);
        }
        _ => {
            if conflicts.is_empty() {
                println!("No conflicts");
            }
            for conflict in &conflicts {
                println!("{} {}", conflict.entity_type.tag(), conflict.id);
                match &conflict.local {
                    Some(local) => println!("  local:  {}", describe(local)),
                    None => println!("  local:  deleted"),
                }
                match &conflict.remote {
                    Some(remote) => println!("  remote: {}", describe(remote)),
                    None => println!("  remote: deleted"),
                }
            }
        }
    }

    Ok(())
}
