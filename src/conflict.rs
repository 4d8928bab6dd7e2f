//! Conflict Detector (spec §4.6): groups claims by `(subject_id, predicate)`,
//! decides agreement, classifies, scores severity, and proposes
//! harmonization hints. Every output is a deterministic function of the
//! input claims and the fixed classification tables below.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::claims::Claim;
use crate::hooks::{HookContext, HookPoint, HookRegistry};
use crate::ids::{EntityId, SourceId};
use crate::types::SubjectKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimType {
    Chronology,
    Theology,
    Geography,
    Narrative,
    Identity,
    Textual,
}

impl ClaimType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimType::Chronology => "chronology",
            ClaimType::Theology => "theology",
            ClaimType::Geography => "geography",
            ClaimType::Narrative => "narrative",
            ClaimType::Identity => "identity",
            ClaimType::Textual => "textual",
        }
    }
}

impl std::fmt::Display for ClaimType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarmonizationMove {
    #[serde(rename = "move")]
    pub move_name: String,
    pub description: String,
}

/// One conflict summary record, one per disagreeing `(subject, predicate)`
/// group (spec §4.6.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictSummary {
    pub field: String,
    pub severity: Severity,
    pub category: String,
    pub claim_type: ClaimType,
    pub conflict_type: String,
    pub sources: BTreeMap<SourceId, String>,
    pub distinct_values: Vec<String>,
    pub dominant_value: Option<String>,
    pub harmonization_moves: Vec<HarmonizationMove>,
    pub notes: Option<String>,
    pub rationale: String,
}

fn predicate_matches(predicate: &str, keywords: &[&str]) -> bool {
    let lower = predicate.to_lowercase();
    keywords.iter().any(|kw| lower.contains(kw))
}

fn classify_claim_type(predicate: &str) -> ClaimType {
    if predicate.starts_with("relationship:") {
        return ClaimType::Identity;
    }
    if predicate_matches(
        predicate,
        &["date", "when", "time", "before", "after", "sequence"],
    ) {
        return ClaimType::Chronology;
    }
    if predicate_matches(
        predicate,
        &[
            "divinity", "nature", "mission", "authority", "messianic", "divine", "christ", "son",
        ],
    ) {
        return ClaimType::Theology;
    }
    if predicate_matches(predicate, &["location", "where", "place", "city"]) {
        return ClaimType::Geography;
    }
    if predicate_matches(predicate, &["manuscript", "variant", "reading"]) {
        return ClaimType::Textual;
    }
    ClaimType::Narrative
}

fn classify_shape(predicate: &str) -> &'static str {
    let lower = predicate.to_lowercase();
    if lower.contains("sequence") || lower.contains("order") {
        "sequence"
    } else if lower.contains("date") || lower.contains("when") || lower.contains("time") {
        "dating"
    } else if lower.contains("emphasis") || lower.contains("focus") {
        "emphasis"
    } else if predicate.starts_with("relationship:") || lower.contains("identity") {
        "identity"
    } else {
        "value"
    }
}

fn harmonization_moves_for(conflict_type: &str) -> Vec<HarmonizationMove> {
    match conflict_type {
        "chronology_sequence" => vec![HarmonizationMove {
            move_name: "anchor_by_range".to_string(),
            description: "anchor disagreeing orderings to a shared date range rather than a point in time".to_string(),
        }],
        "chronology_dating" => vec![HarmonizationMove {
            move_name: "anchor_by_range".to_string(),
            description: "treat each source's date as a range bound, not an exact point".to_string(),
        }],
        "theology_emphasis" => vec![HarmonizationMove {
            move_name: "attribute_to_audience".to_string(),
            description: "attribute differing theological emphasis to each source's intended audience".to_string(),
        }],
        "geography_value" => vec![HarmonizationMove {
            move_name: "attribute_to_itinerary".to_string(),
            description: "treat differing locations as stages of an itinerary rather than a single site".to_string(),
        }],
        "identity_value" | "identity_identity" => vec![HarmonizationMove {
            move_name: "attribute_to_naming_convention".to_string(),
            description: "treat differing identifications as alternate names or roles for the same referent".to_string(),
        }],
        "textual_value" => vec![HarmonizationMove {
            move_name: "cite_manuscript_tradition".to_string(),
            description: "cite the manuscript tradition each reading descends from rather than picking one as original".to_string(),
        }],
        _ => Vec::new(),
    }
}

fn severity_from_rule_table(predicate: &str, distinct_non_absent: usize, contributing_sources: usize) -> Severity {
    let lower = predicate.to_lowercase();
    if lower.contains("resurrection") || lower.contains("divinity") || lower.contains("existence") {
        return Severity::Critical;
    }
    if lower.contains("date") || lower.contains("location") || lower.contains("order") {
        return Severity::Medium;
    }
    if lower.contains("wording") {
        return Severity::Low;
    }
    if distinct_non_absent == contributing_sources {
        Severity::High
    } else if distinct_non_absent == 2 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

struct Group<'a> {
    subject_id: EntityId,
    predicate: String,
    claims: Vec<&'a Claim>,
}

fn group_claims(claims: &[Claim]) -> Vec<Group<'_>> {
    let mut groups: BTreeMap<(EntityId, String), Vec<&Claim>> = BTreeMap::new();
    for claim in claims {
        groups
            .entry((claim.subject_id.clone(), claim.predicate.clone()))
            .or_default()
            .push(claim);
    }
    groups
        .into_iter()
        .map(|((subject_id, predicate), claims)| Group {
            subject_id,
            predicate,
            claims,
        })
        .collect()
}

/// Decide whether a candidate group is a conflict, and if so build its
/// summary. Returns `None` for groups with fewer than two distinct sources
/// or that fully agree.
fn summarize_group(group: &Group, hooks: &HookRegistry) -> Option<ConflictSummary> {
    let distinct_sources: std::collections::BTreeSet<&SourceId> =
        group.claims.iter().map(|c| &c.source_id).collect();
    if distinct_sources.len() < 2 {
        return None;
    }

    let mut sources = BTreeMap::new();
    for claim in &group.claims {
        sources.insert(claim.source_id.clone(), claim.object.display());
    }

    let normalized: BTreeMap<&SourceId, String> = group
        .claims
        .iter()
        .map(|c| (&c.source_id, c.object.normalized()))
        .collect();
    let distinct_normalized: std::collections::BTreeSet<&str> =
        normalized.values().map(|s| s.as_str()).collect();
    if distinct_normalized.len() < 2 {
        return None;
    }

    let non_absent_claims: Vec<&&Claim> = group.claims.iter().filter(|c| !c.object.is_absent()).collect();
    let mut value_counts: BTreeMap<String, Vec<&SourceId>> = BTreeMap::new();
    for claim in &non_absent_claims {
        value_counts
            .entry(claim.object.normalized())
            .or_default()
            .push(&claim.source_id);
    }

    let distinct_values: Vec<String> = group
        .claims
        .iter()
        .map(|c| c.object.display())
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect();

    let dominant_value = value_counts
        .iter()
        .map(|(value, sources)| {
            let min_source = sources.iter().min().cloned();
            (sources.len(), min_source, value.clone())
        })
        .max_by(|a, b| {
            a.0.cmp(&b.0)
                .then_with(|| b.1.cmp(&a.1))
        })
        .map(|(_, _, value)| {
            group
                .claims
                .iter()
                .find(|c| c.object.normalized() == value)
                .map(|c| c.object.display())
                .unwrap_or(value)
        });

    let claim_type = classify_claim_type(&group.predicate);
    let shape = classify_shape(&group.predicate);
    let conflict_type = format!("{}_{}", claim_type, shape);

    let contributing_sources: std::collections::BTreeSet<&SourceId> = non_absent_claims
        .iter()
        .map(|c| &c.source_id)
        .collect();
    let mut severity = severity_from_rule_table(
        &group.predicate,
        value_counts.len(),
        contributing_sources.len(),
    );

    let mut score_ctx =
        HookContext::new(HookPoint::ConflictSeverityScore).with_metadata(serde_json::json!({
            "subject_id": group.subject_id.to_string(),
            "predicate": group.predicate,
        }));
    score_ctx.data = serde_json::json!({ "severity": severity.as_str() });
    let score_ctx = hooks.dispatch(score_ctx);
    if let Some(overridden) = score_ctx.data.get("severity").and_then(|v| v.as_str()) {
        severity = match overridden {
            "low" => Severity::Low,
            "medium" => Severity::Medium,
            "high" => Severity::High,
            "critical" => Severity::Critical,
            _ => severity,
        };
    }

    let harmonization_moves = harmonization_moves_for(&conflict_type);

    let rationale = format!(
        "{} distinct value(s) across {} source(s) for predicate '{}'",
        value_counts.len(),
        distinct_sources.len(),
        group.predicate
    );

    Some(ConflictSummary {
        field: group.predicate.clone(),
        severity,
        category: claim_type.to_string(),
        claim_type,
        conflict_type,
        sources,
        distinct_values,
        dominant_value,
        harmonization_moves,
        notes: None,
        rationale,
    })
}

/// Every conflict summary across a set of claims, sorted by `(subject_id,
/// field)` for deterministic iteration.
pub fn detect_conflicts(claims: &[Claim], hooks: &HookRegistry) -> Vec<ConflictSummary> {
    let before = hooks.dispatch(HookContext::new(HookPoint::BeforeConflictDetection));
    if before.abort {
        return Vec::new();
    }

    let groups = group_claims(claims);
    let mut summaries: Vec<ConflictSummary> = groups
        .iter()
        .filter_map(|g| summarize_group(g, hooks))
        .collect();
    summaries.sort_by(|a, b| a.field.cmp(&b.field));

    hooks.dispatch(HookContext::new(HookPoint::AfterConflictDetection));
    summaries
}

/// Conflicts restricted to a single subject, keyed by field name — the
/// shape `trait_conflict_summaries` / `account_conflict_summaries` need.
pub fn detect_conflicts_for_subject(
    claims: &[Claim],
    subject_id: &EntityId,
    hooks: &HookRegistry,
) -> BTreeMap<String, ConflictSummary> {
    let subject_claims: Vec<Claim> = claims
        .iter()
        .filter(|c| &c.subject_id == subject_id)
        .cloned()
        .collect();
    detect_conflicts(&subject_claims, hooks)
        .into_iter()
        .map(|s| (s.field.clone(), s))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClaimValue;

    fn claim(subject: &str, predicate: &str, source: &str, value: &str) -> Claim {
        Claim {
            claim_id: format!("{subject}-{predicate}-{source}"),
            subject_id: EntityId::parse(subject).unwrap(),
            subject_kind: SubjectKind::Character,
            predicate: predicate.to_string(),
            object: ClaimValue::Scalar(value.to_string()),
            source_id: source.into(),
            reference: None,
            variant_id: None,
            confidence: 1.0,
            note: None,
        }
    }

    #[test]
    fn two_source_theology_conflict_ties_break_lexicographically() {
        let claims = vec![
            claim(
                "jesus",
                "messianic_self_understanding",
                "mark",
                "Avoids messianic titles publicly",
            ),
            claim(
                "jesus",
                "messianic_self_understanding",
                "john",
                "Explicitly claims divinity",
            ),
        ];
        let hooks = HookRegistry::new();
        let summaries = detect_conflicts(&claims, &hooks);
        assert_eq!(summaries.len(), 1);
        let summary = &summaries[0];
        assert_eq!(summary.claim_type.as_str(), "theology");
        assert_eq!(summary.severity, Severity::High);
        assert_eq!(
            summary.dominant_value.as_deref(),
            Some("Explicitly claims divinity")
        );
    }

    #[test]
    fn resurrection_predicate_is_always_critical() {
        let claims = vec![
            claim(
                "jesus",
                "resurrection_details",
                "mark",
                "empty tomb, no appearance",
            ),
            claim(
                "jesus",
                "resurrection_details",
                "john",
                "multiple appearances",
            ),
        ];
        let hooks = HookRegistry::new();
        let summaries = detect_conflicts(&claims, &hooks);
        assert_eq!(summaries[0].severity, Severity::Critical);
    }

    #[test]
    fn agreeing_claims_produce_no_conflict() {
        let claims = vec![
            claim("andrew", "role", "mark", "apostle"),
            claim("andrew", "role", "luke", " Apostle "),
        ];
        let hooks = HookRegistry::new();
        assert!(detect_conflicts(&claims, &hooks).is_empty());
    }

    #[test]
    fn single_source_is_not_a_candidate_group() {
        let claims = vec![claim("andrew", "role", "mark", "apostle")];
        let hooks = HookRegistry::new();
        assert!(detect_conflicts(&claims, &hooks).is_empty());
    }

    #[test]
    fn before_conflict_detection_abort_yields_empty_result() {
        let claims = vec![
            claim("andrew", "role", "mark", "apostle"),
            claim("andrew", "role", "luke", "fisherman"),
        ];
        let hooks = HookRegistry::new();
        hooks.register(HookPoint::BeforeConflictDetection, 0, |mut ctx| {
            ctx.abort = true;
            ctx
        });
        assert!(detect_conflicts(&claims, &hooks).is_empty());
    }
}
