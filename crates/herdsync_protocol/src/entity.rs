//! Entity envelope and the closed set of entity types.

use crate::error::ProtocolError;
use crate::payload::EntityPayload;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A synchronized collection.
///
/// Each variant maps at compile time to its storage key and to the record
/// shape carried in [`EntityPayload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// Animals in the herd.
    Cow,
    /// Daily milk yield per cow.
    MilkProduction,
    /// Feed purchases and usage.
    Feed,
    /// Veterinary visits.
    VetVisit,
}

impl EntityType {
    /// Every entity type, in a stable order.
    pub const ALL: [EntityType; 4] = [
        EntityType::Cow,
        EntityType::MilkProduction,
        EntityType::Feed,
        EntityType::VetVisit,
    ];

    /// Returns the tag used in ids and storage keys.
    pub const fn tag(self) -> &'static str {
        match self {
            EntityType::Cow => "cow",
            EntityType::MilkProduction => "milk_production",
            EntityType::Feed => "feed",
            EntityType::VetVisit => "vet_visit",
        }
    }

    /// Returns the local store key holding this collection.
    pub const fn storage_key(self) -> &'static str {
        match self {
            EntityType::Cow => "data_cow",
            EntityType::MilkProduction => "data_milk_production",
            EntityType::Feed => "data_feed",
            EntityType::VetVisit => "data_vet_visit",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for EntityType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityType::ALL
            .into_iter()
            .find(|t| t.tag() == s)
            .ok_or_else(|| ProtocolError::UnknownEntityType(s.to_string()))
    }
}

/// Fields every entity carries, owned by the repository.
///
/// # Invariants
///
/// - `updated_at >= created_at`
/// - `version` starts at 1 and grows by exactly 1 per update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityMeta {
    /// Identifier, unique within the entity type.
    pub id: String,
    /// Creation time, epoch milliseconds.
    pub created_at: u64,
    /// Last update time, epoch milliseconds.
    pub updated_at: u64,
    /// Version counter.
    pub version: u64,
}

impl EntityMeta {
    /// Metadata for a freshly created entity.
    pub fn new(id: impl Into<String>, now: u64) -> Self {
        Self {
            id: id.into(),
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    /// Advances the metadata for an update at `now`.
    ///
    /// A clock that moved backwards never makes `updated_at` decrease.
    pub fn touch(&mut self, now: u64) {
        self.updated_at = now.max(self.updated_at);
        self.version += 1;
    }

    /// Names of the JSON keys owned by the metadata.
    pub const KEYS: [&'static str; 4] = ["id", "createdAt", "updatedAt", "version"];
}

/// A versioned entity: repository-owned metadata plus domain fields.
///
/// Serialized flat, so a cow reads as
/// `{"id":..,"createdAt":..,"updatedAt":..,"version":..,"name":..,"tagNumber":..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record<F> {
    /// Repository-owned metadata.
    #[serde(flatten)]
    pub meta: EntityMeta,
    /// Caller-supplied domain fields.
    #[serde(flatten)]
    pub fields: F,
}

impl<F> Record<F> {
    /// Returns the entity id.
    pub fn id(&self) -> &str {
        &self.meta.id
    }

    /// Returns the entity version.
    pub fn version(&self) -> u64 {
        self.meta.version
    }
}

/// Domain fields of one entity type.
///
/// Links a field struct to its [`EntityType`] and to its variant of
/// [`EntityPayload`].
pub trait EntityFields:
    Serialize + DeserializeOwned + Clone + PartialEq + fmt::Debug + Send + Sync + 'static
{
    /// The collection these fields belong to.
    const ENTITY_TYPE: EntityType;

    /// Wraps a record into the payload union.
    fn into_payload(record: Record<Self>) -> EntityPayload;

    /// Unwraps a payload of this type; `None` for any other variant.
    fn from_payload(payload: EntityPayload) -> Option<Record<Self>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_type_tags_and_keys() {
        assert_eq!(EntityType::Cow.tag(), "cow");
        assert_eq!(EntityType::Cow.storage_key(), "data_cow");
        assert_eq!(
            EntityType::MilkProduction.storage_key(),
            "data_milk_production"
        );

        for t in EntityType::ALL {
            assert_eq!(t.storage_key(), format!("data_{}", t.tag()));
            assert_eq!(t.tag().parse::<EntityType>().unwrap(), t);
        }
    }

    #[test]
    fn entity_type_parse_unknown() {
        assert!(matches!(
            "horse".parse::<EntityType>(),
            Err(ProtocolError::UnknownEntityType(_))
        ));
    }

    #[test]
    fn entity_type_serde_matches_tag() {
        for t in EntityType::ALL {
            let json = serde_json::to_string(&t).unwrap();
            assert_eq!(json, format!("\"{}\"", t.tag()));
        }
    }

    #[test]
    fn meta_touch_never_goes_back() {
        let mut meta = EntityMeta::new("cow_1", 1_000);
        meta.touch(500);
        assert_eq!(meta.updated_at, 1_000);
        assert_eq!(meta.version, 2);

        meta.touch(2_000);
        assert_eq!(meta.updated_at, 2_000);
        assert_eq!(meta.created_at, 1_000);
        assert_eq!(meta.version, 3);
    }

    #[test]
    fn meta_serializes_camel_case() {
        let meta = EntityMeta::new("cow_1", 42);
        let value = serde_json::to_value(&meta).unwrap();
        for key in EntityMeta::KEYS {
            assert!(value.get(key).is_some(), "missing {key}");
        }
    }
}
