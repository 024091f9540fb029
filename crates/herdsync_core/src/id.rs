//! Entity id generation and wall-clock time.

use herdsync_protocol::EntityType;
use rand::Rng;
use std::time::{SystemTime, UNIX_EPOCH};

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Length of the random id suffix.
pub const ID_SUFFIX_LEN: usize = 9;

/// Current time in milliseconds since the Unix epoch.
///
/// Returns 0 if the system clock is set before the epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Generates an id of the form `<tag>_<millis>_<9 base36 chars>`.
///
/// The random suffix makes collisions within one millisecond negligible.
pub fn generate_id(entity_type: EntityType, now: u64) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| char::from(BASE36[rng.gen_range(0..BASE36.len())]))
        .collect();
    format!("{}_{}_{}", entity_type.tag(), now, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn id_format() {
        let id = generate_id(EntityType::MilkProduction, 1_700_000_000_123);
        let suffix = id
            .strip_prefix("milk_production_1700000000123_")
            .unwrap();
        assert_eq!(suffix.len(), ID_SUFFIX_LEN);
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn ids_are_unique_within_a_millisecond() {
        let ids: HashSet<String> = (0..1000)
            .map(|_| generate_id(EntityType::Cow, 42))
            .collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn clock_is_after_2020() {
        assert!(now_millis() > 1_577_836_800_000);
    }
}
