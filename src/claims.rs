//! Claim-Graph Builder (spec §4.5): folds a `Character` or `Event` into a
//! sequence of attributed claims. Pure function of a snapshot; no hidden
//! state.

use sha2::{Digest, Sha256};

use crate::ids::{EntityId, SourceId};
use crate::snapshot::Snapshot;
use crate::types::{Character, ClaimValue, Event, SubjectKind};

/// One attributed assertion `(subject, predicate, object, source)`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Claim {
    pub claim_id: String,
    pub subject_id: EntityId,
    pub subject_kind: SubjectKind,
    pub predicate: String,
    pub object: ClaimValue,
    pub source_id: SourceId,
    pub reference: Option<String>,
    pub variant_id: Option<String>,
    /// 0..1. Direct source claims are fully confident (`1.0`); claims derived
    /// from a manuscript variant carry a lower confidence since they record
    /// a textual alternative rather than the source's primary assertion.
    pub confidence: f64,
    pub note: Option<String>,
}

const DIRECT_CONFIDENCE: f64 = 1.0;
const VARIANT_CONFIDENCE: f64 = 0.7;

/// Deterministic fingerprint so rebuilding the claim graph reproduces stable
/// ids: `sha256(subject || predicate || source || object)`, hex-encoded and
/// truncated to 16 characters.
fn fingerprint(subject: &str, predicate: &str, source: &str, object: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(subject.as_bytes());
    hasher.update([0x01]);
    hasher.update(predicate.as_bytes());
    hasher.update([0x01]);
    hasher.update(source.as_bytes());
    hasher.update([0x01]);
    hasher.update(object.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)[..16].to_string()
}

fn make_claim(
    subject_id: &EntityId,
    subject_kind: SubjectKind,
    predicate: impl Into<String>,
    object: ClaimValue,
    source_id: &SourceId,
    reference: Option<String>,
    variant_id: Option<String>,
    confidence: f64,
    note: Option<String>,
) -> Claim {
    let predicate = predicate.into();
    let claim_id = fingerprint(
        subject_id.as_str(),
        &predicate,
        source_id.as_str(),
        &object.normalized(),
    );
    Claim {
        claim_id,
        subject_id: subject_id.clone(),
        subject_kind,
        predicate,
        object,
        source_id: source_id.clone(),
        reference,
        variant_id,
        confidence,
        note,
    }
}

/// Every claim derivable from a single character: one per trait, one per
/// relationship-source pair, one per textual variant.
pub fn claims_for_character(character: &Character) -> Vec<Claim> {
    let mut claims = Vec::new();

    for profile in &character.source_profiles {
        for (key, value) in &profile.traits {
            claims.push(make_claim(
                &character.id,
                SubjectKind::Character,
                key.clone(),
                ClaimValue::Scalar(value.clone()),
                &profile.source_id,
                profile.first_reference().map(|s| s.to_string()),
                None,
                DIRECT_CONFIDENCE,
                None,
            ));
        }
        for variant in &profile.variants {
            let predicate = format!("variant:{}:reading", variant.manuscript_family);
            claims.push(make_claim(
                &character.id,
                SubjectKind::Character,
                predicate,
                ClaimValue::Scalar(variant.reading.clone()),
                &profile.source_id,
                profile.first_reference().map(|s| s.to_string()),
                Some(format!("{}:{}", profile.source_id, variant.manuscript_family)),
                VARIANT_CONFIDENCE,
                Some(variant.significance.clone()),
            ));
        }
    }

    for relationship in &character.relationships {
        let predicate = format!("relationship:{}", relationship.kind);
        for source_id in &relationship.sources {
            claims.push(make_claim(
                &character.id,
                SubjectKind::Character,
                predicate.clone(),
                ClaimValue::Ref(relationship.character_id.clone()),
                source_id,
                relationship.references.first().cloned(),
                None,
                DIRECT_CONFIDENCE,
                relationship.notes.clone(),
            ));
        }
    }

    claims
}

/// Every claim derivable from a single event: one per canonical account
/// field (`summary`, `reference`, notes when present), one per variant.
pub fn claims_for_event(event: &Event) -> Vec<Claim> {
    let mut claims = Vec::new();

    for account in &event.accounts {
        claims.push(make_claim(
            &event.id,
            SubjectKind::Event,
            "summary",
            ClaimValue::Scalar(account.summary.clone()),
            &account.source_id,
            Some(account.reference.clone()),
            None,
            DIRECT_CONFIDENCE,
            None,
        ));
        claims.push(make_claim(
            &event.id,
            SubjectKind::Event,
            "reference",
            ClaimValue::Scalar(account.reference.clone()),
            &account.source_id,
            Some(account.reference.clone()),
            None,
            DIRECT_CONFIDENCE,
            None,
        ));
        if let Some(notes) = &account.notes {
            if !notes.trim().is_empty() {
                claims.push(make_claim(
                    &event.id,
                    SubjectKind::Event,
                    "notes",
                    ClaimValue::Scalar(notes.clone()),
                    &account.source_id,
                    Some(account.reference.clone()),
                    None,
                    DIRECT_CONFIDENCE,
                    None,
                ));
            }
        }
        for variant in &account.variants {
            let predicate = format!("variant:{}:reading", variant.manuscript_family);
            claims.push(make_claim(
                &event.id,
                SubjectKind::Event,
                predicate,
                ClaimValue::Scalar(variant.reading.clone()),
                &account.source_id,
                Some(account.reference.clone()),
                Some(format!("{}:{}", account.source_id, variant.manuscript_family)),
                VARIANT_CONFIDENCE,
                Some(variant.significance.clone()),
            ));
        }
    }

    claims
}

/// Every claim in a snapshot, in sorted-key order for deterministic
/// downstream iteration.
pub fn all_claims(snapshot: &Snapshot) -> Vec<Claim> {
    let mut claims = Vec::new();
    for character in snapshot.characters.values() {
        claims.extend(claims_for_character(character));
    }
    for event in snapshot.events.values() {
        claims.extend(claims_for_event(event));
    }
    claims
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceProfile;
    use std::collections::BTreeMap;

    fn andrew() -> Character {
        let mut traits = BTreeMap::new();
        traits.insert("role".to_string(), "apostle".to_string());
        Character {
            id: EntityId::parse("andrew").unwrap(),
            canonical_name: "Andrew".to_string(),
            source_profiles: vec![SourceProfile {
                source_id: "mark".into(),
                traits,
                references: vec!["Mark 1:16-18".to_string()],
                variants: vec![],
                citations: vec![],
            }],
            aliases: vec![],
            roles: vec![],
            tags: vec![],
            relationships: vec![],
            citations: vec![],
        }
    }

    #[test]
    fn minimal_character_yields_exactly_one_claim() {
        let claims = claims_for_character(&andrew());
        assert_eq!(claims.len(), 1);
        let claim = &claims[0];
        assert_eq!(claim.subject_id.as_str(), "andrew");
        assert_eq!(claim.predicate, "role");
        assert_eq!(claim.object, ClaimValue::Scalar("apostle".to_string()));
        assert_eq!(claim.source_id.as_str(), "mark");
    }

    #[test]
    fn claim_id_is_stable_across_rebuilds() {
        let claims_a = claims_for_character(&andrew());
        let claims_b = claims_for_character(&andrew());
        assert_eq!(claims_a[0].claim_id, claims_b[0].claim_id);
        assert_eq!(claims_a[0].claim_id.len(), 16);
    }

    #[test]
    fn differing_object_changes_claim_id() {
        let mut other = andrew();
        other.source_profiles[0]
            .traits
            .insert("role".to_string(), "fisherman".to_string());
        let claims = claims_for_character(&other);
        let base = claims_for_character(&andrew());
        assert_ne!(claims[0].claim_id, base[0].claim_id);
    }
}
