//! Dossier Builder (spec §4.7): composes per-entity aggregate views from the
//! claim graph and conflict detector. Pure functions of a [`Snapshot`];
//! never call the storage port directly.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::claims::{self, Claim};
use crate::conflict::{self, ConflictSummary};
use crate::error::{BceError, Result};
use crate::hooks::{HookContext, HookPoint, HookRegistry};
use crate::ids::EntityId;
use crate::snapshot::Snapshot;
use crate::types::{Parallel, Relationship, SourceMeta};

const SCHEMA_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimGraph {
    pub claims: Vec<Claim>,
    pub conflicts: Vec<ConflictSummary>,
}

/// A minimal placeholder emitted when `before_dossier_build` aborts (spec §7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbortedDossier {
    pub id: String,
    pub schema_version: String,
    pub aborted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterDossier {
    pub id: EntityId,
    pub canonical_name: String,
    pub aliases: Vec<String>,
    pub roles: Vec<String>,
    pub source_ids: Vec<String>,
    pub source_metadata: BTreeMap<String, SourceMeta>,
    pub traits_by_source: BTreeMap<String, BTreeMap<String, String>>,
    pub references_by_source: BTreeMap<String, Vec<String>>,
    pub variants_by_source: BTreeMap<String, Vec<crate::types::TextualVariant>>,
    pub citations_by_source: BTreeMap<String, Vec<String>>,
    pub trait_comparison: BTreeMap<String, BTreeMap<String, String>>,
    pub trait_conflicts: BTreeMap<String, BTreeMap<String, String>>,
    pub trait_conflict_summaries: BTreeMap<String, ConflictSummary>,
    pub claim_graph: ClaimGraph,
    pub relationships: Vec<Relationship>,
    pub parallels: Vec<Parallel>,
    pub schema_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDossier {
    pub id: EntityId,
    pub label: String,
    pub participants: Vec<EntityId>,
    pub accounts: Vec<crate::types::EventAccount>,
    pub account_conflicts: BTreeMap<String, BTreeMap<String, String>>,
    pub account_conflict_summaries: BTreeMap<String, ConflictSummary>,
    pub claim_graph: ClaimGraph,
    pub parallels: Vec<Parallel>,
    pub citations: Vec<String>,
    pub textual_variants: Vec<crate::types::EventVariant>,
    pub schema_version: String,
}

pub enum DossierOutcome<T> {
    Built(T),
    Aborted(AbortedDossier),
}

fn trait_comparison_for(snapshot: &Snapshot, character_id: &EntityId) -> BTreeMap<String, BTreeMap<String, String>> {
    let character = snapshot.character(character_id);
    let mut comparison: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
    if let Some(character) = character {
        for profile in &character.source_profiles {
            for (trait_name, value) in &profile.traits {
                comparison
                    .entry(trait_name.clone())
                    .or_default()
                    .insert(profile.source_id.to_string(), value.clone());
            }
        }
    }
    comparison
}

fn trait_conflicts_from(comparison: &BTreeMap<String, BTreeMap<String, String>>) -> BTreeMap<String, BTreeMap<String, String>> {
    comparison
        .iter()
        .filter(|(_, by_source)| {
            let distinct: std::collections::BTreeSet<String> = by_source
                .values()
                .filter(|v| !v.trim().is_empty())
                .map(|v| v.trim().to_lowercase())
                .collect();
            distinct.len() > 1
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Build a [`CharacterDossier`], or the abort placeholder if
/// `before_dossier_build` aborts.
pub fn build_character_dossier(
    snapshot: &Snapshot,
    character_id: &EntityId,
    hooks: &HookRegistry,
) -> Result<DossierOutcome<CharacterDossier>> {
    let before = hooks.dispatch(
        HookContext::new(HookPoint::BeforeDossierBuild).with_metadata(serde_json::json!({
            "id": character_id.to_string(),
            "kind": "character",
        })),
    );
    if before.abort {
        return Ok(DossierOutcome::Aborted(AbortedDossier {
            id: character_id.to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            aborted: true,
        }));
    }

    let character = snapshot
        .character(character_id)
        .ok_or_else(|| BceError::DataNotFound(format!("character {character_id}")))?;

    let mut source_metadata = BTreeMap::new();
    let mut traits_by_source = BTreeMap::new();
    let mut references_by_source = BTreeMap::new();
    let mut variants_by_source = BTreeMap::new();
    let mut citations_by_source = BTreeMap::new();
    let mut source_ids = Vec::new();

    for profile in &character.source_profiles {
        let key = profile.source_id.to_string();
        source_ids.push(key.clone());
        if let Some(meta) = snapshot.sources.get(&profile.source_id) {
            source_metadata.insert(key.clone(), meta);
        }
        traits_by_source.insert(key.clone(), profile.traits.clone());
        references_by_source.insert(key.clone(), profile.references.clone());
        variants_by_source.insert(key.clone(), profile.variants.clone());
        citations_by_source.insert(key.clone(), profile.citations.clone());
    }
    source_ids.sort();
    source_ids.dedup();

    let trait_comparison = trait_comparison_for(snapshot, character_id);
    let trait_conflicts = trait_conflicts_from(&trait_comparison);

    let entity_claims = claims::claims_for_character(character);
    let trait_conflict_summaries =
        conflict::detect_conflicts_for_subject(&entity_claims, character_id, hooks);

    let mut ctx = HookContext::new(HookPoint::DossierEnrich).with_metadata(serde_json::json!({
        "id": character_id.to_string(),
        "kind": "character",
    }));
    ctx.data = serde_json::json!({ "claim_count": entity_claims.len() });
    hooks.dispatch(ctx);

    let conflicts: Vec<ConflictSummary> = trait_conflict_summaries.values().cloned().collect();
    let dossier = CharacterDossier {
        id: character.id.clone(),
        canonical_name: character.canonical_name.clone(),
        aliases: character.aliases.clone(),
        roles: character.roles.clone(),
        source_ids,
        source_metadata,
        traits_by_source,
        references_by_source,
        variants_by_source,
        citations_by_source,
        trait_comparison,
        trait_conflicts,
        trait_conflict_summaries,
        claim_graph: ClaimGraph {
            claims: entity_claims,
            conflicts,
        },
        relationships: character.relationships.clone(),
        parallels: Vec::new(),
        schema_version: SCHEMA_VERSION.to_string(),
    };

    hooks.dispatch(
        HookContext::new(HookPoint::AfterDossierBuild).with_metadata(serde_json::json!({
            "id": character_id.to_string(),
            "kind": "character",
        })),
    );

    Ok(DossierOutcome::Built(dossier))
}

fn account_conflicts_for(event: &crate::types::Event) -> BTreeMap<String, BTreeMap<String, String>> {
    let fields = ["summary", "reference", "notes"];
    let mut out = BTreeMap::new();
    for field in fields {
        let mut by_source = BTreeMap::new();
        for account in &event.accounts {
            let value = match field {
                "summary" => Some(account.summary.clone()),
                "reference" => Some(account.reference.clone()),
                "notes" => account.notes.clone(),
                _ => None,
            };
            if let Some(value) = value {
                by_source.insert(account.source_id.to_string(), value);
            }
        }
        let distinct: std::collections::BTreeSet<String> = by_source
            .values()
            .filter(|v| !v.trim().is_empty())
            .map(|v| v.trim().to_lowercase())
            .collect();
        if distinct.len() > 1 {
            out.insert(field.to_string(), by_source);
        }
    }
    out
}

/// Build an [`EventDossier`], or the abort placeholder if
/// `before_dossier_build` aborts.
pub fn build_event_dossier(
    snapshot: &Snapshot,
    event_id: &EntityId,
    hooks: &HookRegistry,
) -> Result<DossierOutcome<EventDossier>> {
    let before = hooks.dispatch(
        HookContext::new(HookPoint::BeforeDossierBuild).with_metadata(serde_json::json!({
            "id": event_id.to_string(),
            "kind": "event",
        })),
    );
    if before.abort {
        return Ok(DossierOutcome::Aborted(AbortedDossier {
            id: event_id.to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            aborted: true,
        }));
    }

    let event = snapshot
        .event(event_id)
        .ok_or_else(|| BceError::DataNotFound(format!("event {event_id}")))?;

    let account_conflicts = account_conflicts_for(event);
    let entity_claims = claims::claims_for_event(event);
    let account_conflict_summaries =
        conflict::detect_conflicts_for_subject(&entity_claims, event_id, hooks);

    let mut ctx = HookContext::new(HookPoint::DossierEnrich).with_metadata(serde_json::json!({
        "id": event_id.to_string(),
        "kind": "event",
    }));
    ctx.data = serde_json::json!({ "claim_count": entity_claims.len() });
    hooks.dispatch(ctx);

    let conflicts: Vec<ConflictSummary> = account_conflict_summaries.values().cloned().collect();
    let dossier = EventDossier {
        id: event.id.clone(),
        label: event.label.clone(),
        participants: event.participants.clone(),
        accounts: event.accounts.clone(),
        account_conflicts,
        account_conflict_summaries,
        claim_graph: ClaimGraph {
            claims: entity_claims,
            conflicts,
        },
        parallels: event.parallels.clone(),
        citations: event.citations.clone(),
        textual_variants: event.textual_variants.clone(),
        schema_version: SCHEMA_VERSION.to_string(),
    };

    hooks.dispatch(
        HookContext::new(HookPoint::AfterDossierBuild).with_metadata(serde_json::json!({
            "id": event_id.to_string(),
            "kind": "event",
        })),
    );

    Ok(DossierOutcome::Built(dossier))
}
