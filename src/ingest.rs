//! Ingestion / Validation Gate (spec §4.3): the single entry point that
//! turns raw documents into a typed [`Snapshot`], enforcing the
//! cross-reference invariants I1–I7 and rejecting the legacy grouped
//! relationships shape outright.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{BceError, Result, ValidationError, Warning};
use crate::hooks::{HookContext, HookPoint, HookRegistry};
use crate::ids::EntityId;
use crate::snapshot::Snapshot;
use crate::source_registry::SourceRegistry;
use crate::storage::{RawDocument, StorageBackend};
use crate::traits_vocab;
use crate::types::{Character, Event};

static MISSING_FIELD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"missing field `([a-zA-Z0-9_]+)`").unwrap());
static INVALID_TYPE_FIELD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"unknown field `([a-zA-Z0-9_]+)`").unwrap());

/// Best-effort extraction of the offending field name from a serde_json
/// decode error, so validation errors stay keyed by `(entity_id, field_path)`
/// even though the underlying decode is a single generic deserialize call.
fn field_path_from_json_error(err: &serde_json::Error) -> String {
    let msg = err.to_string();
    if let Some(caps) = MISSING_FIELD_RE.captures(&msg) {
        return caps[1].to_string();
    }
    if let Some(caps) = INVALID_TYPE_FIELD_RE.captures(&msg) {
        return caps[1].to_string();
    }
    "<root>".to_string()
}

fn decode_entity<T: for<'de> serde::Deserialize<'de>>(
    raw: &RawDocument,
    entity_id: &str,
) -> std::result::Result<T, ValidationError> {
    serde_json::from_value(raw.to_json()).map_err(|e| {
        ValidationError::new(entity_id, field_path_from_json_error(&e), e.to_string())
    })
}

/// Reject the legacy grouped-relationships shape (`{category: [..]}`) before
/// attempting a typed decode, since that shape would otherwise silently fail
/// typed decode with an unhelpful message.
fn check_relationships_shape(
    raw: &RawDocument,
    entity_id: &str,
) -> std::result::Result<(), ValidationError> {
    match raw.get("relationships") {
        Some(value) if value.is_map() => Err(ValidationError::new(
            entity_id,
            "relationships",
            "grouped relationships shape (map of category -> list) is no longer accepted; \
             use a flat list of {character_id, type, sources, references}",
        )),
        _ => Ok(()),
    }
}

fn ingest_characters(
    storage: &dyn StorageBackend,
    errors: &mut Vec<ValidationError>,
    warnings: &mut Vec<Warning>,
) -> Result<Vec<Character>> {
    let ids = storage.list_character_ids()?;
    let mut characters = Vec::new();
    for storage_key in ids {
        let raw = match storage.load_character_raw(&storage_key) {
            Ok(raw) => raw,
            Err(e) => {
                errors.push(ValidationError::new(
                    storage_key.as_str(),
                    "<document>",
                    format!("failed to load: {e}"),
                ));
                continue;
            }
        };
        if let Err(e) = check_relationships_shape(&raw, storage_key.as_str()) {
            errors.push(e);
            continue;
        }
        let character: Character = match decode_entity(&raw, storage_key.as_str()) {
            Ok(c) => c,
            Err(e) => {
                errors.push(e);
                continue;
            }
        };
        if character.id != storage_key {
            errors.push(ValidationError::new(
                storage_key.as_str(),
                "id",
                format!(
                    "document key {storage_key} does not match entity id {}",
                    character.id
                ),
            ));
            continue;
        }
        for profile in &character.source_profiles {
            for key in profile.traits.keys() {
                if !traits_vocab::is_recognized(key) {
                    warnings.push(Warning::new(
                        Some(character.id.to_string()),
                        format!("unrecognized trait key: {key}"),
                    ));
                }
            }
        }
        characters.push(character);
    }
    Ok(characters)
}

fn ingest_events(
    storage: &dyn StorageBackend,
    errors: &mut Vec<ValidationError>,
) -> Result<Vec<Event>> {
    let ids = storage.list_event_ids()?;
    let mut events = Vec::new();
    for storage_key in ids {
        let raw = match storage.load_event_raw(&storage_key) {
            Ok(raw) => raw,
            Err(e) => {
                errors.push(ValidationError::new(
                    storage_key.as_str(),
                    "<document>",
                    format!("failed to load: {e}"),
                ));
                continue;
            }
        };
        let event: Event = match decode_entity(&raw, storage_key.as_str()) {
            Ok(e) => e,
            Err(e) => {
                errors.push(e);
                continue;
            }
        };
        if event.id != storage_key {
            errors.push(ValidationError::new(
                storage_key.as_str(),
                "id",
                format!(
                    "document key {storage_key} does not match entity id {}",
                    event.id
                ),
            ));
            continue;
        }
        events.push(event);
    }
    Ok(events)
}

/// Cross-reference pass enforcing invariants I1–I7. Every violation is
/// appended to `errors`; the pass never stops at the first failure.
fn check_cross_references(
    characters: &[Character],
    events: &[Event],
    sources: &SourceRegistry,
    errors: &mut Vec<ValidationError>,
) {
    let character_ids: BTreeSet<&EntityId> = characters.iter().map(|c| &c.id).collect();

    for character in characters {
        for profile in &character.source_profiles {
            if !sources.contains(&profile.source_id) {
                // I1 / I7
                errors.push(ValidationError::new(
                    character.id.as_str(),
                    "source_profiles[].source_id",
                    format!("unknown source id {}", profile.source_id),
                ));
            }
        }
        for rel in &character.relationships {
            if !character_ids.contains(&rel.character_id) {
                // I2
                errors.push(ValidationError::new(
                    character.id.as_str(),
                    "relationships[].character_id",
                    format!("relationship references unknown character {}", rel.character_id),
                ));
            }
            for source_id in &rel.sources {
                if !sources.contains(source_id) {
                    // I7
                    errors.push(ValidationError::new(
                        character.id.as_str(),
                        "relationships[].sources",
                        format!("relationship references unknown source {source_id}"),
                    ));
                }
            }
        }
    }

    for event in events {
        for participant in &event.participants {
            if !character_ids.contains(participant) {
                // I3
                errors.push(ValidationError::new(
                    event.id.as_str(),
                    "participants",
                    format!("event references unknown character {participant}"),
                ));
            }
        }
        for account in &event.accounts {
            if !sources.contains(&account.source_id) {
                // I4 / I7
                errors.push(ValidationError::new(
                    event.id.as_str(),
                    "accounts[].source_id",
                    format!("unknown source id {}", account.source_id),
                ));
            }
        }
        for parallel in &event.parallels {
            for source_id in &parallel.sources {
                if !sources.contains(source_id) {
                    // I7
                    errors.push(ValidationError::new(
                        event.id.as_str(),
                        "parallels[].sources",
                        format!("parallel references unknown source {source_id}"),
                    ));
                }
            }
        }
    }
}

/// The single entry point: enumerate source documents, decode every
/// character/event, enforce cross-references, and produce a [`Snapshot`] or
/// the full list of validation errors.
pub fn load_all(storage: &dyn StorageBackend, hooks: &HookRegistry) -> Result<Snapshot> {
    let source_entries = storage.load_sources()?;
    if source_entries.is_empty() {
        return Err(BceError::Validation(vec![ValidationError::new(
            "<registry>",
            "sources",
            "source registry is missing or empty",
        )]));
    }
    let registry = SourceRegistry::from_entries(source_entries);

    let before = hooks.dispatch(HookContext::new(HookPoint::BeforeValidation));
    if before.abort {
        return Ok(Snapshot {
            sources: registry,
            warnings: vec![Warning::new(None, "validation aborted by hook")],
            ..Default::default()
        });
    }

    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let characters = ingest_characters(storage, &mut errors, &mut warnings)?;
    let events = ingest_events(storage, &mut errors)?;
    check_cross_references(&characters, &events, &registry, &mut errors);

    if !errors.is_empty() {
        let mut ctx = HookContext::new(HookPoint::ValidationError);
        ctx.data = serde_json::json!({ "errors": errors });
        hooks.dispatch(ctx);
        return Err(BceError::Validation(errors));
    }

    hooks.dispatch(HookContext::new(HookPoint::AfterValidation));

    Ok(Snapshot {
        characters: characters.into_iter().map(|c| (c.id.clone(), c)).collect(),
        events: events.into_iter().map(|e| (e.id.clone(), e)).collect(),
        sources: registry,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;
    use crate::types::SourceMeta;
    use std::collections::BTreeMap;

    fn storage_with_andrew() -> InMemoryStorage {
        let store = InMemoryStorage::with_sources(vec![SourceMeta {
            source_id: "mark".into(),
            ..Default::default()
        }]);
        let mut profile = BTreeMap::new();
        profile.insert(
            "source_id".to_string(),
            RawDocument::Scalar("mark".to_string()),
        );
        let mut traits = BTreeMap::new();
        traits.insert("role".to_string(), RawDocument::Scalar("apostle".to_string()));
        profile.insert("traits".to_string(), RawDocument::Map(traits));
        profile.insert(
            "references".to_string(),
            RawDocument::List(vec![RawDocument::Scalar("Mark 1:16-18".to_string())]),
        );

        let mut doc = BTreeMap::new();
        doc.insert("id".to_string(), RawDocument::Scalar("andrew".to_string()));
        doc.insert(
            "canonical_name".to_string(),
            RawDocument::Scalar("Andrew".to_string()),
        );
        doc.insert(
            "source_profiles".to_string(),
            RawDocument::List(vec![RawDocument::Map(profile)]),
        );
        store.seed_character(EntityId::parse("andrew").unwrap(), RawDocument::Map(doc));
        store
    }

    #[test]
    fn minimal_character_loads_cleanly() {
        let store = storage_with_andrew();
        let hooks = HookRegistry::new();
        let snapshot = load_all(&store, &hooks).unwrap();
        assert_eq!(snapshot.characters.len(), 1);
        assert!(snapshot.warnings.is_empty());
    }

    #[test]
    fn missing_source_registry_is_fatal() {
        let store = InMemoryStorage::new();
        let hooks = HookRegistry::new();
        let err = load_all(&store, &hooks).unwrap_err();
        assert_eq!(err.kind(), "Validation");
    }

    #[test]
    fn legacy_grouped_relationships_shape_is_rejected() {
        let store = storage_with_andrew();
        let mut doc_map = BTreeMap::new();
        doc_map.insert("id".to_string(), RawDocument::Scalar("andrew".to_string()));
        doc_map.insert(
            "canonical_name".to_string(),
            RawDocument::Scalar("Andrew".to_string()),
        );
        doc_map.insert(
            "source_profiles".to_string(),
            RawDocument::List(vec![]),
        );
        let mut grouped = BTreeMap::new();
        grouped.insert(
            "family".to_string(),
            RawDocument::List(vec![RawDocument::Scalar("peter".to_string())]),
        );
        doc_map.insert("relationships".to_string(), RawDocument::Map(grouped));
        store.seed_character(
            EntityId::parse("andrew").unwrap(),
            RawDocument::Map(doc_map),
        );

        let hooks = HookRegistry::new();
        let err = load_all(&store, &hooks).unwrap_err();
        match err {
            BceError::Validation(violations) => {
                assert!(violations
                    .iter()
                    .any(|v| v.entity_id == "andrew" && v.field_path == "relationships"));
            }
            _ => panic!("expected Validation error"),
        }
    }

    #[test]
    fn cross_reference_violation_is_reported() {
        let store = InMemoryStorage::with_sources(vec![SourceMeta {
            source_id: "mark".into(),
            ..Default::default()
        }]);
        let mut doc = BTreeMap::new();
        doc.insert("id".to_string(), RawDocument::Scalar("peter".to_string()));
        doc.insert(
            "canonical_name".to_string(),
            RawDocument::Scalar("Peter".to_string()),
        );
        let mut profile = BTreeMap::new();
        profile.insert(
            "source_id".to_string(),
            RawDocument::Scalar("unknown_source".to_string()),
        );
        profile.insert("traits".to_string(), RawDocument::Map(BTreeMap::new()));
        profile.insert("references".to_string(), RawDocument::List(vec![]));
        doc.insert(
            "source_profiles".to_string(),
            RawDocument::List(vec![RawDocument::Map(profile)]),
        );
        store.seed_character(EntityId::parse("peter").unwrap(), RawDocument::Map(doc));

        let hooks = HookRegistry::new();
        let err = load_all(&store, &hooks).unwrap_err();
        match err {
            BceError::Validation(violations) => {
                assert!(violations.iter().any(|v| v.message.contains("unknown_source")));
            }
            _ => panic!("expected Validation error"),
        }
    }
}
