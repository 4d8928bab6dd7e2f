//! Query & Index Layer (spec §4.4): tag/role/source/participant indexes
//! built eagerly after ingestion and rebuilt on any write.

use std::collections::{BTreeMap, BTreeSet};

use crate::ids::{EntityId, SourceId};
use crate::snapshot::Snapshot;

/// In-memory indexes over a [`Snapshot`]. Entirely derived data: never
/// mutated in place, only rebuilt wholesale from a fresh snapshot.
#[derive(Debug, Clone, Default)]
pub struct Index {
    by_tag_characters: BTreeMap<String, BTreeSet<EntityId>>,
    by_tag_events: BTreeMap<String, BTreeSet<EntityId>>,
    by_role: BTreeMap<String, BTreeSet<EntityId>>,
    by_source_characters: BTreeMap<SourceId, BTreeSet<EntityId>>,
    by_source_events: BTreeMap<SourceId, BTreeSet<EntityId>>,
    by_participant: BTreeMap<EntityId, BTreeSet<EntityId>>,
    character_ids_sorted: Vec<EntityId>,
    event_ids_sorted: Vec<EntityId>,
}

fn normalize_tag(tag: &str) -> String {
    tag.trim().to_lowercase()
}

impl Index {
    /// Build every index from scratch against a snapshot.
    pub fn build(snapshot: &Snapshot) -> Self {
        let mut index = Index::default();

        for (id, character) in &snapshot.characters {
            index.character_ids_sorted.push(id.clone());
            for tag in &character.tags {
                let key = normalize_tag(tag);
                if key.is_empty() {
                    continue;
                }
                index
                    .by_tag_characters
                    .entry(key)
                    .or_default()
                    .insert(id.clone());
            }
            for role in &character.roles {
                index
                    .by_role
                    .entry(role.clone())
                    .or_default()
                    .insert(id.clone());
            }
            for profile in &character.source_profiles {
                index
                    .by_source_characters
                    .entry(profile.source_id.clone())
                    .or_default()
                    .insert(id.clone());
            }
        }
        index.character_ids_sorted.sort();

        for (id, event) in &snapshot.events {
            index.event_ids_sorted.push(id.clone());
            for tag in &event.tags {
                let key = normalize_tag(tag);
                if key.is_empty() {
                    continue;
                }
                index
                    .by_tag_events
                    .entry(key)
                    .or_default()
                    .insert(id.clone());
            }
            for account in &event.accounts {
                index
                    .by_source_events
                    .entry(account.source_id.clone())
                    .or_default()
                    .insert(id.clone());
            }
            for participant in &event.participants {
                index
                    .by_participant
                    .entry(participant.clone())
                    .or_default()
                    .insert(id.clone());
            }
        }
        index.event_ids_sorted.sort();

        index
    }

    pub fn list_characters_with_tag(&self, tag: &str) -> Vec<EntityId> {
        self.by_tag_characters
            .get(&normalize_tag(tag))
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn list_events_with_tag(&self, tag: &str) -> Vec<EntityId> {
        self.by_tag_events
            .get(&normalize_tag(tag))
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn list_characters_with_role(&self, role: &str) -> Vec<EntityId> {
        self.by_role
            .get(role)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn list_characters_for_source(&self, source_id: &SourceId) -> Vec<EntityId> {
        self.by_source_characters
            .get(source_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn list_events_for_source(&self, source_id: &SourceId) -> Vec<EntityId> {
        self.by_source_events
            .get(source_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn list_events_for_character(&self, character_id: &EntityId) -> Vec<EntityId> {
        self.by_participant
            .get(character_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn iter_characters(&self) -> impl Iterator<Item = &EntityId> {
        self.character_ids_sorted.iter()
    }

    pub fn iter_events(&self) -> impl Iterator<Item = &EntityId> {
        self.event_ids_sorted.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Character, Event, EventAccount, SourceProfile};
    use std::collections::BTreeMap;

    fn snapshot_with_tagged_character() -> Snapshot {
        let character = Character {
            id: EntityId::parse("peter").unwrap(),
            canonical_name: "Peter".to_string(),
            source_profiles: vec![SourceProfile {
                source_id: "mark".into(),
                traits: BTreeMap::new(),
                references: vec![],
                variants: vec![],
                citations: vec![],
            }],
            aliases: vec![],
            roles: vec!["apostle".to_string()],
            tags: vec!["Apocalyptic".to_string()],
            relationships: vec![],
            citations: vec![],
        };
        let mut snapshot = Snapshot::default();
        snapshot.characters.insert(character.id.clone(), character);
        snapshot
    }

    #[test]
    fn tag_lookup_is_case_insensitive() {
        let snapshot = snapshot_with_tagged_character();
        let index = Index::build(&snapshot);
        assert_eq!(
            index.list_characters_with_tag("apocalyptic"),
            vec![EntityId::parse("peter").unwrap()]
        );
        assert_eq!(
            index.list_characters_with_tag("APOCALYPTIC"),
            vec![EntityId::parse("peter").unwrap()]
        );
    }

    #[test]
    fn role_and_source_indexes_resolve() {
        let snapshot = snapshot_with_tagged_character();
        let index = Index::build(&snapshot);
        assert_eq!(
            index.list_characters_with_role("apostle"),
            vec![EntityId::parse("peter").unwrap()]
        );
        assert_eq!(
            index.list_characters_for_source(&"mark".into()),
            vec![EntityId::parse("peter").unwrap()]
        );
    }

    #[test]
    fn participant_index_links_events_to_characters() {
        let mut snapshot = snapshot_with_tagged_character();
        let event = Event {
            id: EntityId::parse("crucifixion").unwrap(),
            label: "Crucifixion".to_string(),
            participants: vec![EntityId::parse("peter").unwrap()],
            accounts: vec![EventAccount {
                source_id: "mark".into(),
                reference: "Mark 15".to_string(),
                summary: "...".to_string(),
                notes: None,
                variants: vec![],
            }],
            parallels: vec![],
            tags: vec![],
            citations: vec![],
            textual_variants: vec![],
        };
        snapshot.events.insert(event.id.clone(), event);
        let index = Index::build(&snapshot);
        assert_eq!(
            index.list_events_for_character(&EntityId::parse("peter").unwrap()),
            vec![EntityId::parse("crucifixion").unwrap()]
        );
        assert_eq!(
            index.iter_characters().collect::<Vec<_>>(),
            vec![&EntityId::parse("peter").unwrap()]
        );
    }
}
