//! Storage Backend Port (spec §4.2): abstract list/get/put for raw documents,
//! independent of persistence layout. The core never parses
//! persistence-specific syntax itself; it consumes [`RawDocument`].

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{BceError, Result};
use crate::ids::EntityId;
use crate::types::SourceMeta;

/// A self-describing document tree: string-keyed map with scalar, list, or
/// nested-map leaves. This is the only shape the core understands when
/// decoding a raw document into a typed entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawDocument {
    Null,
    Scalar(String),
    List(Vec<RawDocument>),
    Map(BTreeMap<String, RawDocument>),
}

impl RawDocument {
    pub fn as_map(&self) -> Option<&BTreeMap<String, RawDocument>> {
        match self {
            RawDocument::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[RawDocument]> {
        match self {
            RawDocument::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&RawDocument> {
        self.as_map().and_then(|m| m.get(key))
    }

    pub fn is_map(&self) -> bool {
        matches!(self, RawDocument::Map(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self, RawDocument::List(_))
    }

    /// Convert to a [`serde_json::Value`] so typed entities can be decoded
    /// with ordinary `serde::Deserialize`, regardless of which concrete
    /// on-disk format (TOML, JSON, ...) produced this tree.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            RawDocument::Null => serde_json::Value::Null,
            RawDocument::Scalar(s) => serde_json::Value::String(s.clone()),
            RawDocument::List(items) => {
                serde_json::Value::Array(items.iter().map(RawDocument::to_json).collect())
            }
            RawDocument::Map(m) => serde_json::Value::Object(
                m.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    pub fn from_toml(value: &toml::Value) -> RawDocument {
        match value {
            toml::Value::String(s) => RawDocument::Scalar(s.clone()),
            toml::Value::Integer(i) => RawDocument::Scalar(i.to_string()),
            toml::Value::Float(f) => RawDocument::Scalar(f.to_string()),
            toml::Value::Boolean(b) => RawDocument::Scalar(b.to_string()),
            toml::Value::Datetime(d) => RawDocument::Scalar(d.to_string()),
            toml::Value::Array(items) => {
                RawDocument::List(items.iter().map(RawDocument::from_toml).collect())
            }
            toml::Value::Table(t) => RawDocument::Map(
                t.iter()
                    .map(|(k, v)| (k.clone(), RawDocument::from_toml(v)))
                    .collect(),
            ),
        }
    }

    pub fn to_toml(&self) -> toml::Value {
        match self {
            RawDocument::Null => toml::Value::String(String::new()),
            RawDocument::Scalar(s) => toml::Value::String(s.clone()),
            RawDocument::List(items) => {
                toml::Value::Array(items.iter().map(RawDocument::to_toml).collect())
            }
            RawDocument::Map(m) => {
                let mut table = toml::value::Table::new();
                for (k, v) in m {
                    table.insert(k.clone(), v.to_toml());
                }
                toml::Value::Table(table)
            }
        }
    }

    /// Decode into a typed entity via its `Deserialize` impl.
    pub fn decode<T: for<'de> Deserialize<'de>>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.to_json())?)
    }

    pub fn encode<T: Serialize>(value: &T) -> Result<RawDocument> {
        let json = serde_json::to_value(value)?;
        Ok(RawDocument::from_json(&json))
    }

    fn from_json(value: &serde_json::Value) -> RawDocument {
        match value {
            serde_json::Value::Null => RawDocument::Null,
            serde_json::Value::Bool(b) => RawDocument::Scalar(b.to_string()),
            serde_json::Value::Number(n) => RawDocument::Scalar(n.to_string()),
            serde_json::Value::String(s) => RawDocument::Scalar(s.clone()),
            serde_json::Value::Array(items) => {
                RawDocument::List(items.iter().map(RawDocument::from_json).collect())
            }
            serde_json::Value::Object(m) => RawDocument::Map(
                m.iter()
                    .map(|(k, v)| (k.clone(), RawDocument::from_json(v)))
                    .collect(),
            ),
        }
    }
}

/// Abstract list/get/put for raw documents (spec §4.2).
pub trait StorageBackend: Send + Sync {
    fn list_character_ids(&self) -> Result<Vec<EntityId>>;
    fn list_event_ids(&self) -> Result<Vec<EntityId>>;
    fn load_character_raw(&self, id: &EntityId) -> Result<RawDocument>;
    fn load_event_raw(&self, id: &EntityId) -> Result<RawDocument>;
    fn save_character_raw(&self, id: &EntityId, doc: RawDocument) -> Result<()>;
    fn save_event_raw(&self, id: &EntityId, doc: RawDocument) -> Result<()>;
    fn load_sources(&self) -> Result<Vec<SourceMeta>>;
}

/// Default in-memory adapter: one document per entity, keyed by id.
#[derive(Default)]
pub struct InMemoryStorage {
    characters: RwLock<BTreeMap<EntityId, RawDocument>>,
    events: RwLock<BTreeMap<EntityId, RawDocument>>,
    sources: RwLock<Vec<SourceMeta>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sources(sources: Vec<SourceMeta>) -> Self {
        InMemoryStorage {
            sources: RwLock::new(sources),
            ..Default::default()
        }
    }

    pub fn seed_character(&self, id: EntityId, doc: RawDocument) {
        self.characters.write().insert(id, doc);
    }

    pub fn seed_event(&self, id: EntityId, doc: RawDocument) {
        self.events.write().insert(id, doc);
    }
}

impl StorageBackend for InMemoryStorage {
    fn list_character_ids(&self) -> Result<Vec<EntityId>> {
        Ok(self.characters.read().keys().cloned().collect())
    }

    fn list_event_ids(&self) -> Result<Vec<EntityId>> {
        Ok(self.events.read().keys().cloned().collect())
    }

    fn load_character_raw(&self, id: &EntityId) -> Result<RawDocument> {
        self.characters
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| BceError::DataNotFound(format!("character {id}")))
    }

    fn load_event_raw(&self, id: &EntityId) -> Result<RawDocument> {
        self.events
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| BceError::DataNotFound(format!("event {id}")))
    }

    fn save_character_raw(&self, id: &EntityId, doc: RawDocument) -> Result<()> {
        self.characters.write().insert(id.clone(), doc);
        Ok(())
    }

    fn save_event_raw(&self, id: &EntityId, doc: RawDocument) -> Result<()> {
        self.events.write().insert(id.clone(), doc);
        Ok(())
    }

    fn load_sources(&self) -> Result<Vec<SourceMeta>> {
        Ok(self.sources.read().clone())
    }
}

/// File-tree adapter: `<root>/characters/<id>.toml`, `<root>/events/<id>.toml`,
/// `<root>/sources.toml`.
pub struct FileTreeStorage {
    root: PathBuf,
}

impl FileTreeStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileTreeStorage { root: root.into() }
    }

    fn characters_dir(&self) -> PathBuf {
        self.root.join("characters")
    }

    fn events_dir(&self) -> PathBuf {
        self.root.join("events")
    }

    fn sources_file(&self) -> PathBuf {
        self.root.join("sources.toml")
    }

    fn list_ids(dir: &Path) -> Result<Vec<EntityId>> {
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in walkdir::WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
        {
            let entry = entry.map_err(|e| BceError::Storage(format!("{e}")))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(stem) = entry.path().file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if entry.path().extension().and_then(|e| e.to_str()) != Some("toml") {
                continue;
            }
            match EntityId::parse(stem) {
                Ok(id) => ids.push(id),
                Err(msg) => tracing::warn!("skipping non-conforming file name {stem:?}: {msg}"),
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn load_raw(path: &Path) -> Result<RawDocument> {
        if !path.exists() {
            return Err(BceError::DataNotFound(format!("{}", path.display())));
        }
        let content = fs::read_to_string(path)?;
        let value: toml::Value = toml::from_str(&content)?;
        Ok(RawDocument::from_toml(&value))
    }

    fn save_raw(path: &Path, doc: &RawDocument) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let value = doc.to_toml();
        let text = toml::to_string_pretty(&value)?;
        fs::write(path, text)?;
        Ok(())
    }
}

impl StorageBackend for FileTreeStorage {
    fn list_character_ids(&self) -> Result<Vec<EntityId>> {
        Self::list_ids(&self.characters_dir())
    }

    fn list_event_ids(&self) -> Result<Vec<EntityId>> {
        Self::list_ids(&self.events_dir())
    }

    fn load_character_raw(&self, id: &EntityId) -> Result<RawDocument> {
        Self::load_raw(&self.characters_dir().join(format!("{id}.toml")))
    }

    fn load_event_raw(&self, id: &EntityId) -> Result<RawDocument> {
        Self::load_raw(&self.events_dir().join(format!("{id}.toml")))
    }

    fn save_character_raw(&self, id: &EntityId, doc: RawDocument) -> Result<()> {
        Self::save_raw(&self.characters_dir().join(format!("{id}.toml")), &doc)
    }

    fn save_event_raw(&self, id: &EntityId, doc: RawDocument) -> Result<()> {
        Self::save_raw(&self.events_dir().join(format!("{id}.toml")), &doc)
    }

    fn load_sources(&self) -> Result<Vec<SourceMeta>> {
        let path = self.sources_file();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path)?;
        let table: BTreeMap<String, SourceMeta> = toml::from_str(&content)?;
        Ok(table
            .into_iter()
            .map(|(id, mut meta)| {
                meta.source_id = id.into();
                meta
            })
            .collect())
    }
}
