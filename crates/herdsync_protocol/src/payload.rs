//! Domain record shapes and the payload union over them.

use crate::entity::{EntityFields, EntityMeta, EntityType, Record};
use serde::{Deserialize, Serialize};

/// An animal in the herd.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cow {
    /// Display name.
    pub name: String,
    /// Ear tag number.
    pub tag_number: String,
    /// Breed, if known.
    #[serde(default)]
    pub breed: Option<String>,
    /// Birth date as `YYYY-MM-DD`.
    #[serde(default)]
    pub birth_date: Option<String>,
    /// Herd status such as `active`, `dry` or `sold`.
    #[serde(default)]
    pub status: Option<String>,
}

impl Cow {
    /// A cow with only the required fields set.
    pub fn new(name: impl Into<String>, tag_number: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag_number: tag_number.into(),
            breed: None,
            birth_date: None,
            status: None,
        }
    }
}

/// One day's milk yield for one cow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MilkProduction {
    /// Id of the cow milked.
    pub cow_id: String,
    /// Day as `YYYY-MM-DD`.
    pub date: String,
    /// Morning yield in liters.
    pub morning_liters: f64,
    /// Evening yield in liters.
    pub evening_liters: f64,
    /// Free-form remarks.
    #[serde(default)]
    pub notes: Option<String>,
}

impl MilkProduction {
    /// Total liters for the day.
    pub fn total_liters(&self) -> f64 {
        self.morning_liters + self.evening_liters
    }
}

/// A feed purchase or allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedRecord {
    /// Day as `YYYY-MM-DD`.
    pub date: String,
    /// Kind of feed, e.g. `silage`.
    pub feed_type: String,
    /// Quantity in kilograms.
    pub quantity_kg: f64,
    /// Price per kilogram, if known.
    #[serde(default)]
    pub cost_per_kg: Option<f64>,
    /// Free-form remarks.
    #[serde(default)]
    pub notes: Option<String>,
}

impl FeedRecord {
    /// Total cost, when a unit price is recorded.
    pub fn total_cost(&self) -> Option<f64> {
        self.cost_per_kg.map(|price| price * self.quantity_kg)
    }
}

/// A veterinary visit for one cow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VetVisit {
    /// Id of the cow examined.
    pub cow_id: String,
    /// Day as `YYYY-MM-DD`.
    pub date: String,
    /// Attending veterinarian.
    pub veterinarian: String,
    /// Findings, if any.
    #[serde(default)]
    pub diagnosis: Option<String>,
    /// Treatment given.
    #[serde(default)]
    pub treatment: Option<String>,
    /// Billed amount.
    #[serde(default)]
    pub cost: Option<f64>,
}

/// A full entity snapshot of any entity type.
///
/// Serialized as `{"entityType": "<tag>", "record": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entityType", content = "record", rename_all = "snake_case")]
pub enum EntityPayload {
    /// A cow.
    Cow(Record<Cow>),
    /// A milk production record.
    MilkProduction(Record<MilkProduction>),
    /// A feed record.
    Feed(Record<FeedRecord>),
    /// A vet visit.
    VetVisit(Record<VetVisit>),
}

impl EntityPayload {
    /// Returns the entity type of the wrapped record.
    pub fn entity_type(&self) -> EntityType {
        match self {
            EntityPayload::Cow(_) => EntityType::Cow,
            EntityPayload::MilkProduction(_) => EntityType::MilkProduction,
            EntityPayload::Feed(_) => EntityType::Feed,
            EntityPayload::VetVisit(_) => EntityType::VetVisit,
        }
    }

    /// Returns the wrapped record's metadata.
    pub fn meta(&self) -> &EntityMeta {
        match self {
            EntityPayload::Cow(r) => &r.meta,
            EntityPayload::MilkProduction(r) => &r.meta,
            EntityPayload::Feed(r) => &r.meta,
            EntityPayload::VetVisit(r) => &r.meta,
        }
    }

    /// Returns the entity id.
    pub fn id(&self) -> &str {
        &self.meta().id
    }

    /// Returns the entity version.
    pub fn version(&self) -> u64 {
        self.meta().version
    }
}

impl EntityFields for Cow {
    const ENTITY_TYPE: EntityType = EntityType::Cow;

    fn into_payload(record: Record<Self>) -> EntityPayload {
        EntityPayload::Cow(record)
    }

    fn from_payload(payload: EntityPayload) -> Option<Record<Self>> {
        match payload {
            EntityPayload::Cow(r) => Some(r),
            _ => None,
        }
    }
}

impl EntityFields for MilkProduction {
    const ENTITY_TYPE: EntityType = EntityType::MilkProduction;

    fn into_payload(record: Record<Self>) -> EntityPayload {
        EntityPayload::MilkProduction(record)
    }

    fn from_payload(payload: EntityPayload) -> Option<Record<Self>> {
        match payload {
            EntityPayload::MilkProduction(r) => Some(r),
            _ => None,
        }
    }
}

impl EntityFields for FeedRecord {
    const ENTITY_TYPE: EntityType = EntityType::Feed;

    fn into_payload(record: Record<Self>) -> EntityPayload {
        EntityPayload::Feed(record)
    }

    fn from_payload(payload: EntityPayload) -> Option<Record<Self>> {
        match payload {
            EntityPayload::Feed(r) => Some(r),
            _ => None,
        }
    }
}

impl EntityFields for VetVisit {
    const ENTITY_TYPE: EntityType = EntityType::VetVisit;

    fn into_payload(record: Record<Self>) -> EntityPayload {
        EntityPayload::VetVisit(record)
    }

    fn from_payload(payload: EntityPayload) -> Option<Record<Self>> {
        match payload {
            EntityPayload::VetVisit(r) => Some(r),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bessie() -> Record<Cow> {
        Record {
            meta: EntityMeta::new("cow_1700000000000_abc123xyz", 1_700_000_000_000),
            fields: Cow::new("Bessie", "C001"),
        }
    }

    #[test]
    fn record_serializes_flat() {
        let value = serde_json::to_value(bessie()).unwrap();
        assert_eq!(value["id"], "cow_1700000000000_abc123xyz");
        assert_eq!(value["version"], 1);
        assert_eq!(value["name"], "Bessie");
        assert_eq!(value["tagNumber"], "C001");
    }

    #[test]
    fn record_accepts_missing_optional_fields() {
        let value = json!({
            "id": "cow_1",
            "createdAt": 10,
            "updatedAt": 12,
            "version": 2,
            "name": "Daisy",
            "tagNumber": "C002"
        });
        let record: Record<Cow> = serde_json::from_value(value).unwrap();
        assert_eq!(record.fields.name, "Daisy");
        assert_eq!(record.fields.breed, None);
        assert_eq!(record.meta.version, 2);
    }

    #[test]
    fn payload_is_tagged_by_entity_type() {
        let payload = Cow::into_payload(bessie());
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["entityType"], "cow");
        assert_eq!(value["record"]["name"], "Bessie");

        let back: EntityPayload = serde_json::from_value(value).unwrap();
        assert_eq!(back, payload);
        assert_eq!(back.entity_type(), EntityType::Cow);
        assert_eq!(back.id(), "cow_1700000000000_abc123xyz");
    }

    #[test]
    fn from_payload_rejects_other_variants() {
        let payload = Cow::into_payload(bessie());
        assert!(VetVisit::from_payload(payload.clone()).is_none());
        assert_eq!(Cow::from_payload(payload), Some(bessie()));
    }

    #[test]
    fn derived_totals() {
        let milk = MilkProduction {
            cow_id: "cow_1".into(),
            date: "2024-03-01".into(),
            morning_liters: 12.5,
            evening_liters: 10.0,
            notes: None,
        };
        assert_eq!(milk.total_liters(), 22.5);

        let feed = FeedRecord {
            date: "2024-03-01".into(),
            feed_type: "silage".into(),
            quantity_kg: 200.0,
            cost_per_kg: Some(0.25),
            notes: None,
        };
        assert_eq!(feed.total_cost(), Some(50.0));
    }
}
