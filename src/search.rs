//! Search Operation (spec §4.9): orchestrates the index, a linear substring
//! scan, and hook filters/ranks to answer a query.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::hooks::{HookContext, HookPoint, HookRegistry};
use crate::ids::EntityId;
use crate::index::Index;
use crate::snapshot::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchScope {
    Characters,
    Events,
    Both,
}

impl Default for SearchScope {
    fn default() -> Self {
        SearchScope::Both
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    Character,
    Event,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchSite {
    Traits,
    References,
    Accounts,
    Notes,
    Tags,
}

impl MatchSite {
    fn as_str(&self) -> &'static str {
        match self {
            MatchSite::Traits => "traits",
            MatchSite::References => "references",
            MatchSite::Accounts => "accounts",
            MatchSite::Notes => "notes",
            MatchSite::Tags => "tags",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub id: EntityId,
    pub match_in: MatchSite,
    pub snippet: String,
}

fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

fn scan_characters(
    snapshot: &Snapshot,
    needle_lower: &str,
    results: &mut Vec<SearchResult>,
) {
    for (id, character) in &snapshot.characters {
        for profile in &character.source_profiles {
            for (key, value) in &profile.traits {
                if contains_ci(key, needle_lower) || contains_ci(value, needle_lower) {
                    results.push(SearchResult {
                        kind: EntityKind::Character,
                        id: id.clone(),
                        match_in: MatchSite::Traits,
                        snippet: format!("{key}: {value}"),
                    });
                }
            }
            for reference in &profile.references {
                if contains_ci(reference, needle_lower) {
                    results.push(SearchResult {
                        kind: EntityKind::Character,
                        id: id.clone(),
                        match_in: MatchSite::References,
                        snippet: reference.clone(),
                    });
                }
            }
        }
        for tag in &character.tags {
            if contains_ci(tag, needle_lower) {
                results.push(SearchResult {
                    kind: EntityKind::Character,
                    id: id.clone(),
                    match_in: MatchSite::Tags,
                    snippet: tag.clone(),
                });
            }
        }
    }
}

fn scan_events(snapshot: &Snapshot, needle_lower: &str, results: &mut Vec<SearchResult>) {
    for (id, event) in &snapshot.events {
        for account in &event.accounts {
            if contains_ci(&account.summary, needle_lower) {
                results.push(SearchResult {
                    kind: EntityKind::Event,
                    id: id.clone(),
                    match_in: MatchSite::Accounts,
                    snippet: account.summary.clone(),
                });
            }
            if let Some(notes) = &account.notes {
                if contains_ci(notes, needle_lower) {
                    results.push(SearchResult {
                        kind: EntityKind::Event,
                        id: id.clone(),
                        match_in: MatchSite::Notes,
                        snippet: notes.clone(),
                    });
                }
            }
        }
        for tag in &event.tags {
            if contains_ci(tag, needle_lower) {
                results.push(SearchResult {
                    kind: EntityKind::Event,
                    id: id.clone(),
                    match_in: MatchSite::Tags,
                    snippet: tag.clone(),
                });
            }
        }
    }
}

/// `search_all(query, scope)`: fires `before_search`/`after_search`, seeds
/// from the tag index when the query is itself a known tag, scans
/// everything else linearly, and runs filter/rank hooks over the result set.
pub fn search_all(
    snapshot: &Snapshot,
    index: &Index,
    query: &str,
    scope: SearchScope,
    hooks: &HookRegistry,
) -> Result<Vec<SearchResult>> {
    let before = hooks.dispatch(
        HookContext::new(HookPoint::BeforeSearch)
            .with_metadata(serde_json::json!({ "query": query })),
    );
    if before.abort {
        return Ok(Vec::new());
    }

    let needle_lower = query.trim().to_lowercase();
    let mut results = Vec::new();

    if matches!(scope, SearchScope::Characters | SearchScope::Both) {
        for id in index.list_characters_with_tag(&needle_lower) {
            results.push(SearchResult {
                kind: EntityKind::Character,
                id,
                match_in: MatchSite::Tags,
                snippet: query.to_string(),
            });
        }
        scan_characters(snapshot, &needle_lower, &mut results);
    }
    if matches!(scope, SearchScope::Events | SearchScope::Both) {
        for id in index.list_events_with_tag(&needle_lower) {
            results.push(SearchResult {
                kind: EntityKind::Event,
                id,
                match_in: MatchSite::Tags,
                snippet: query.to_string(),
            });
        }
        scan_events(snapshot, &needle_lower, &mut results);
    }

    results.dedup_by(|a, b| {
        a.kind == b.kind && a.id == b.id && a.match_in == b.match_in && a.snippet == b.snippet
    });

    let mut filtered = Vec::with_capacity(results.len());
    for result in results {
        let ctx = hooks.dispatch(
            HookContext::new(HookPoint::SearchResultFilter).with_metadata(serde_json::json!({
                "id": result.id.to_string(),
            })),
        );
        if !ctx.abort {
            filtered.push(result);
        }
    }

    hooks.dispatch(HookContext::new(HookPoint::SearchResultRank));
    filtered.sort_by(|a, b| {
        (format!("{:?}", a.kind), a.id.to_string(), a.match_in.as_str())
            .cmp(&(format!("{:?}", b.kind), b.id.to_string(), b.match_in.as_str()))
    });

    hooks.dispatch(HookContext::new(HookPoint::AfterSearch));
    Ok(filtered)
}
