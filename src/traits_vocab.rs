//! The recognized `TraitKey` controlled vocabulary.
//!
//! Unknown trait keys are permitted on ingestion but emit a warning rather
//! than an error (spec §3.1, §4.3 step 2c).

use once_cell::sync::Lazy;
use std::collections::HashSet;

/// The ~60 recognized trait keys. Unknown keys are still accepted; this list
/// only gates whether ingestion emits a warning.
pub const RECOGNIZED_TRAIT_KEYS: &[&str] = &[
    "christology",
    "eschatology",
    "soteriology",
    "pneumatology",
    "ecclesiology",
    "mission_focus",
    "teaching_emphasis",
    "ministry_location",
    "ministry_duration",
    "ministry_recipients",
    "miracles",
    "signs",
    "healings",
    "exorcisms",
    "nature_miracles",
    "conflicts",
    "opponents",
    "trial_details",
    "accusations",
    "death_resurrection",
    "passion_narrative",
    "crucifixion_details",
    "resurrection_details",
    "post_resurrection_appearances",
    "torah_stance",
    "halakha_interpretation",
    "purity_laws",
    "sabbath_observance",
    "temple_attitude",
    "messianic_claims",
    "divine_sonship",
    "prophetic_identity",
    "authority_claims",
    "discipleship_model",
    "family_relations",
    "gender_inclusivity",
    "social_justice",
    "parables",
    "apocalyptic_discourse",
    "wisdom_sayings",
    "pronouncement_stories",
    "controversy_stories",
    "jewish_context",
    "greco_roman_context",
    "political_stance",
    "economic_teaching",
    "portrayal",
    "character_development",
    "emotions",
    "virtues",
    "vices",
    "kingdom_of_god",
    "future_hope",
    "judgment_themes",
    "imminent_expectation",
    "realized_eschatology",
    "spirit_activity",
    "angelic_encounters",
    "demonic_opposition",
    "visions",
    "revelations",
    "ethical_teaching",
    "community_formation",
    "ritual_practices",
    "prayer_life",
    "table_fellowship",
];

static RECOGNIZED_SET: Lazy<HashSet<&'static str>> =
    Lazy::new(|| RECOGNIZED_TRAIT_KEYS.iter().copied().collect());

pub fn is_recognized(key: &str) -> bool {
    RECOGNIZED_SET.contains(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_known_keys() {
        assert!(is_recognized("christology"));
        assert!(is_recognized("table_fellowship"));
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(!is_recognized("made_up_trait"));
    }

    #[test]
    fn has_roughly_sixty_entries() {
        assert!(RECOGNIZED_TRAIT_KEYS.len() >= 55 && RECOGNIZED_TRAIT_KEYS.len() <= 70);
    }
}
