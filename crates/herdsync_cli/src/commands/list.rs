//! List command implementation.

use herdsync_core::SyncContext;
use herdsync_protocol::{EntityPayload, EntityType};

/// Runs the list command.
pub fn run(ctx: &SyncContext, entity_type: &str, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let entity_type: EntityType = entity_type.parse()?;
    let entities = ctx.list_payloads(entity_type);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&entities)?);
        }
        _ => {
            if entities.is_empty() {
                println!("No {} entities", entity_type.tag());
            }
            for entity in &entities {
                println!("{}", describe(entity));
            }
        }
    }

    Ok(())
}

/// One-line summary of an entity.
pub fn describe(entity: &EntityPayload) -> String {
    let meta = entity.meta();
    let summary = match entity {
        EntityPayload::Cow(r) => format!("{} ({})", r.fields.name, r.fields.tag_number),
        EntityPayload::MilkProduction(r) => format!(
            "cow {} on {}: {:.1} L",
            r.fields.cow_id,
            r.fields.date,
            r.fields.total_liters()
        ),
        EntityPayload::Feed(r) => format!(
            "{} on {}: {:.1} kg",
            r.fields.feed_type, r.fields.date, r.fields.quantity_kg
        ),
        EntityPayload::VetVisit(r) => format!(
            "cow {} on {} with {}",
            r.fields.cow_id, r.fields.date, r.fields.veterinarian
        ),
    };
    format!("{:<32} v{:<4} {}", meta.id, meta.version, summary)
}
