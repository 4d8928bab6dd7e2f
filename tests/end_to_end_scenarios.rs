//! Black-box coverage of the six concrete end-to-end scenarios in the
//! engine's design notes: minimal dossier, two-source theology conflict,
//! critical-severity predicate, event account conflict, hook abort on save,
//! and tag case-insensitivity.

use std::collections::BTreeMap;

use bce_core::dossier::DossierOutcome;
use bce_core::engine::Engine;
use bce_core::config::EngineConfig;
use bce_core::hooks::HookPoint;
use bce_core::ids::EntityId;
use bce_core::storage::{InMemoryStorage, RawDocument};
use bce_core::types::SourceMeta;

fn scalar(s: &str) -> RawDocument {
    RawDocument::Scalar(s.to_string())
}

fn source_profile(source_id: &str, traits: &[(&str, &str)], references: &[&str]) -> RawDocument {
    let mut map = BTreeMap::new();
    map.insert("source_id".to_string(), scalar(source_id));
    let mut trait_map = BTreeMap::new();
    for (k, v) in traits {
        trait_map.insert(k.to_string(), scalar(v));
    }
    map.insert("traits".to_string(), RawDocument::Map(trait_map));
    map.insert(
        "references".to_string(),
        RawDocument::List(references.iter().map(|r| scalar(r)).collect()),
    );
    RawDocument::Map(map)
}

fn character_doc(id: &str, name: &str, profiles: Vec<RawDocument>) -> RawDocument {
    let mut map = BTreeMap::new();
    map.insert("id".to_string(), scalar(id));
    map.insert("canonical_name".to_string(), scalar(name));
    map.insert("source_profiles".to_string(), RawDocument::List(profiles));
    RawDocument::Map(map)
}

fn sources(ids: &[&str]) -> Vec<SourceMeta> {
    ids.iter()
        .map(|id| SourceMeta {
            source_id: (*id).into(),
            ..Default::default()
        })
        .collect()
}

#[test]
fn minimal_character_dossier_has_one_claim_and_no_conflicts() {
    let store = InMemoryStorage::with_sources(sources(&["mark"]));
    store.seed_character(
        EntityId::parse("andrew").unwrap(),
        character_doc(
            "andrew",
            "Andrew",
            vec![source_profile("mark", &[("role", "apostle")], &["Mark 1:16-18"])],
        ),
    );
    let engine = Engine::open(Box::new(store), EngineConfig::default()).unwrap();

    let id = EntityId::parse("andrew").unwrap();
    let dossier = match engine.build_character_dossier(&id).unwrap() {
        DossierOutcome::Built(d) => d,
        DossierOutcome::Aborted(_) => panic!("should not abort"),
    };
    assert!(dossier.trait_conflicts.is_empty());
    assert_eq!(dossier.claim_graph.claims.len(), 1);
    let claim = &dossier.claim_graph.claims[0];
    assert_eq!(claim.subject_id.as_str(), "andrew");
    assert_eq!(claim.predicate, "role");
    assert_eq!(claim.source_id.as_str(), "mark");
}

#[test]
fn two_source_theology_conflict_breaks_tie_lexicographically() {
    let store = InMemoryStorage::with_sources(sources(&["mark", "john"]));
    store.seed_character(
        EntityId::parse("jesus").unwrap(),
        character_doc(
            "jesus",
            "Jesus",
            vec![
                source_profile(
                    "mark",
                    &[(
                        "messianic_self_understanding",
                        "Avoids messianic titles publicly",
                    )],
                    &["Mark 8:30"],
                ),
                source_profile(
                    "john",
                    &[("messianic_self_understanding", "Explicitly claims divinity")],
                    &["John 10:30"],
                ),
            ],
        ),
    );
    let engine = Engine::open(Box::new(store), EngineConfig::default()).unwrap();
    let id = EntityId::parse("jesus").unwrap();
    let dossier = match engine.build_character_dossier(&id).unwrap() {
        DossierOutcome::Built(d) => d,
        DossierOutcome::Aborted(_) => panic!("should not abort"),
    };
    let summary = dossier
        .trait_conflict_summaries
        .get("messianic_self_understanding")
        .unwrap();
    assert_eq!(summary.claim_type.as_str(), "theology");
    assert_eq!(summary.severity.as_str(), "high");
    assert_eq!(
        summary.dominant_value.as_deref(),
        Some("Explicitly claims divinity")
    );
}

#[test]
fn resurrection_predicate_is_critical_regardless_of_value_count() {
    let store = InMemoryStorage::with_sources(sources(&["mark", "john"]));
    store.seed_character(
        EntityId::parse("jesus").unwrap(),
        character_doc(
            "jesus",
            "Jesus",
            vec![
                source_profile(
                    "mark",
                    &[("resurrection_details", "empty tomb, no appearance")],
                    &["Mark 16:1-8"],
                ),
                source_profile(
                    "john",
                    &[("resurrection_details", "multiple appearances")],
                    &["John 20"],
                ),
            ],
        ),
    );
    let engine = Engine::open(Box::new(store), EngineConfig::default()).unwrap();
    let id = EntityId::parse("jesus").unwrap();
    let dossier = match engine.build_character_dossier(&id).unwrap() {
        DossierOutcome::Built(d) => d,
        DossierOutcome::Aborted(_) => panic!("should not abort"),
    };
    assert_eq!(
        dossier
            .trait_conflict_summaries
            .get("resurrection_details")
            .unwrap()
            .severity
            .as_str(),
        "critical"
    );
}

#[test]
fn event_account_conflict_isolated_to_summary_field() {
    let store = InMemoryStorage::with_sources(sources(&["mark", "john"]));
    let mut account_mark = BTreeMap::new();
    account_mark.insert("source_id".to_string(), scalar("mark"));
    account_mark.insert("reference".to_string(), scalar("Mark 15:22-41"));
    account_mark.insert("summary".to_string(), scalar("Jesus is crucified at Golgotha"));

    let mut account_john = BTreeMap::new();
    account_john.insert("source_id".to_string(), scalar("john"));
    account_john.insert("reference".to_string(), scalar("Mark 15:22-41"));
    account_john.insert(
        "summary".to_string(),
        scalar("Jesus carries his own cross to Golgotha"),
    );

    let mut event = BTreeMap::new();
    event.insert("id".to_string(), scalar("crucifixion"));
    event.insert("label".to_string(), scalar("Crucifixion"));
    event.insert(
        "accounts".to_string(),
        RawDocument::List(vec![RawDocument::Map(account_mark), RawDocument::Map(account_john)]),
    );
    store.seed_event(EntityId::parse("crucifixion").unwrap(), RawDocument::Map(event));

    let engine = Engine::open(Box::new(store), EngineConfig::default()).unwrap();
    let id = EntityId::parse("crucifixion").unwrap();
    let dossier = match engine.build_event_dossier(&id).unwrap() {
        DossierOutcome::Built(d) => d,
        DossierOutcome::Aborted(_) => panic!("should not abort"),
    };
    assert_eq!(dossier.account_conflicts.len(), 1);
    assert!(dossier.account_conflicts.contains_key("summary"));
    assert_eq!(
        dossier
            .account_conflict_summaries
            .get("summary")
            .unwrap()
            .distinct_values
            .len(),
        2
    );
}

#[test]
fn hook_abort_on_save_leaves_prior_state_visible() {
    let store = InMemoryStorage::with_sources(sources(&["mark"]));
    store.seed_character(
        EntityId::parse("andrew").unwrap(),
        character_doc(
            "andrew",
            "Andrew",
            vec![source_profile("mark", &[("role", "apostle")], &["Mark 1:16-18"])],
        ),
    );
    let engine = Engine::open(Box::new(store), EngineConfig::default()).unwrap();
    engine
        .hooks()
        .register(HookPoint::BeforeCharacterSave, 0, |mut ctx| {
            ctx.abort = true;
            ctx
        });

    let id = EntityId::parse("andrew").unwrap();
    let mut character = engine.get_character(&id).unwrap();
    character.canonical_name = "Someone Else".to_string();
    let err = engine.save_character(&character).unwrap_err();
    assert_eq!(err.kind(), "Storage");

    let reloaded = engine.get_character(&id).unwrap();
    assert_eq!(reloaded.canonical_name, "Andrew");
}

#[test]
fn tag_search_is_case_insensitive() {
    let store = InMemoryStorage::with_sources(sources(&["mark"]));
    let mut doc = character_doc(
        "andrew",
        "Andrew",
        vec![source_profile("mark", &[("role", "apostle")], &["Mark 1:16-18"])],
    );
    if let RawDocument::Map(map) = &mut doc {
        map.insert(
            "tags".to_string(),
            RawDocument::List(vec![scalar("Apocalyptic")]),
        );
    }
    store.seed_character(EntityId::parse("andrew").unwrap(), doc);
    let engine = Engine::open(Box::new(store), EngineConfig::default()).unwrap();

    let lower = engine.list_characters_with_tag("apocalyptic");
    let upper = engine.list_characters_with_tag("APOCALYPTIC");
    assert_eq!(lower, vec![EntityId::parse("andrew").unwrap()]);
    assert_eq!(upper, lower);
}
