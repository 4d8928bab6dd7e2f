//! The typed entity model (spec §3): characters, sources, events, and the
//! derived claim value union.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::{EntityId, SourceId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextualVariant {
    pub manuscript_family: String,
    pub reading: String,
    pub significance: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceProfile {
    pub source_id: SourceId,
    pub traits: BTreeMap<String, String>,
    pub references: Vec<String>,
    #[serde(default)]
    pub variants: Vec<TextualVariant>,
    #[serde(default)]
    pub citations: Vec<String>,
}

impl SourceProfile {
    pub fn first_reference(&self) -> Option<&str> {
        self.references.first().map(|s| s.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub character_id: EntityId,
    #[serde(rename = "type")]
    pub kind: String,
    pub sources: Vec<SourceId>,
    pub references: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub id: EntityId,
    pub canonical_name: String,
    pub source_profiles: Vec<SourceProfile>,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    #[serde(default)]
    pub citations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAccount {
    pub source_id: SourceId,
    pub reference: String,
    pub summary: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub variants: Vec<TextualVariant>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parallel {
    pub sources: Vec<SourceId>,
    pub relationship: String,
    #[serde(default)]
    pub references: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventVariant {
    pub manuscript_family: String,
    pub reading: String,
    pub significance: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EntityId,
    pub label: String,
    #[serde(default)]
    pub participants: Vec<EntityId>,
    #[serde(default)]
    pub accounts: Vec<EventAccount>,
    #[serde(default)]
    pub parallels: Vec<Parallel>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub citations: Vec<String>,
    #[serde(default)]
    pub textual_variants: Vec<EventVariant>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SourceMeta {
    #[serde(default)]
    pub source_id: SourceId,
    #[serde(default)]
    pub date_range: Option<String>,
    #[serde(default)]
    pub provenance: Option<String>,
    #[serde(default)]
    pub audience: Option<String>,
    #[serde(default)]
    pub depends_on: Vec<SourceId>,
}

/// Tagged union for the object half of a [`crate::claims::Claim`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum ClaimValue {
    Scalar(String),
    Ref(EntityId),
    Range(String),
}

impl ClaimValue {
    /// String form used by conflict normalization (trim + casefold for
    /// Scalar/Range, id-equality for Ref).
    pub fn normalized(&self) -> String {
        match self {
            ClaimValue::Scalar(s) | ClaimValue::Range(s) => s.trim().to_lowercase(),
            ClaimValue::Ref(id) => id.as_str().to_lowercase(),
        }
    }

    pub fn is_absent(&self) -> bool {
        match self {
            ClaimValue::Scalar(s) | ClaimValue::Range(s) => {
                let n = s.trim().to_lowercase();
                n.is_empty() || n == "none" || n == "n/a"
            }
            ClaimValue::Ref(_) => false,
        }
    }

    pub fn display(&self) -> String {
        match self {
            ClaimValue::Scalar(s) | ClaimValue::Range(s) => s.clone(),
            ClaimValue::Ref(id) => id.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SubjectKind {
    Character,
    Event,
}

impl std::fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubjectKind::Character => write!(f, "character"),
            SubjectKind::Event => write!(f, "event"),
        }
    }
}
