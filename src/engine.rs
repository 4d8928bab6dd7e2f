//! Top-level coordinator: owns the storage backend, the current snapshot,
//! the index, and the hook/cache registries, and exposes the public
//! operation surface described across §4.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::cache::CacheRegistry;
use crate::claims::{self, Claim};
use crate::conflict::{self, ConflictSummary};
use crate::config::EngineConfig;
use crate::dossier::{self, CharacterDossier, DossierOutcome, EventDossier};
use crate::error::{BceError, Result};
use crate::hooks::{HookContext, HookPoint, HookRegistry};
use crate::ids::{EntityId, SourceId};
use crate::index::Index;
use crate::ingest;
use crate::search::{self, SearchResult, SearchScope};
use crate::snapshot::Snapshot;
use crate::storage::{RawDocument, StorageBackend};
use crate::types::{Character, Event};

/// The engine: one storage backend, one live snapshot + index pair behind a
/// lock, one hook registry, one cache registry. Readers take a shared
/// reference to the current snapshot for the duration of their operation;
/// writers publish a new snapshot and invalidate caches (spec §5).
pub struct Engine {
    storage: Box<dyn StorageBackend>,
    state: RwLock<Arc<(Snapshot, Index)>>,
    hooks: HookRegistry,
    cache: CacheRegistry,
    config: EngineConfig,
}

impl Engine {
    /// Construct an engine and perform the initial `load_all()`.
    pub fn open(storage: Box<dyn StorageBackend>, config: EngineConfig) -> Result<Self> {
        let hooks = HookRegistry::new();
        hooks.set_enabled(config.hooks_enabled);
        let engine = Engine {
            storage,
            state: RwLock::new(Arc::new((Snapshot::default(), Index::default()))),
            hooks,
            cache: CacheRegistry::new(),
            config,
        };
        engine.load_all()?;
        engine.hooks.dispatch(HookContext::new(HookPoint::Startup));
        Ok(engine)
    }

    /// Re-run ingestion against the storage backend and publish a fresh
    /// snapshot + index pair.
    pub fn load_all(&self) -> Result<()> {
        let snapshot = ingest::load_all(self.storage.as_ref(), &self.hooks)?;
        let index = Index::build(&snapshot);
        *self.state.write() = Arc::new((snapshot, index));
        self.cache.invalidate_all();
        Ok(())
    }

    fn current(&self) -> Arc<(Snapshot, Index)> {
        self.state.read().clone()
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    pub fn cache(&self) -> &CacheRegistry {
        &self.cache
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Administrative reload: re-fetch the source registry and rebuild the
    /// snapshot, atomically replacing both.
    pub fn reload_sources(&self) -> Result<()> {
        self.load_all()?;
        self.hooks
            .dispatch(HookContext::new(HookPoint::ConfigChange));
        Ok(())
    }

    pub fn get_character(&self, id: &EntityId) -> Result<Character> {
        let before = self.hooks.dispatch(
            HookContext::new(HookPoint::BeforeCharacterLoad)
                .with_metadata(serde_json::json!({ "id": id.to_string() })),
        );
        if before.abort {
            return Err(BceError::aborted_by_hook(HookPoint::BeforeCharacterLoad.as_str()));
        }
        let state = self.current();
        let character = state
            .0
            .character(id)
            .cloned()
            .ok_or_else(|| BceError::DataNotFound(format!("character {id}")))?;
        self.hooks
            .dispatch(HookContext::new(HookPoint::AfterCharacterLoad));
        Ok(character)
    }

    pub fn get_event(&self, id: &EntityId) -> Result<Event> {
        let before = self.hooks.dispatch(
            HookContext::new(HookPoint::BeforeEventLoad)
                .with_metadata(serde_json::json!({ "id": id.to_string() })),
        );
        if before.abort {
            return Err(BceError::aborted_by_hook(HookPoint::BeforeEventLoad.as_str()));
        }
        let state = self.current();
        let event = state
            .0
            .event(id)
            .cloned()
            .ok_or_else(|| BceError::DataNotFound(format!("event {id}")))?;
        self.hooks
            .dispatch(HookContext::new(HookPoint::AfterEventLoad));
        Ok(event)
    }

    /// Save a character through the storage port. An abort on
    /// `before_character_save` leaves the store untouched (spec §7, P8
    /// scenario 5): the subsequent load returns the pre-save state.
    pub fn save_character(&self, character: &Character) -> Result<()> {
        let before = self.hooks.dispatch(
            HookContext::new(HookPoint::BeforeCharacterSave)
                .with_metadata(serde_json::json!({ "id": character.id.to_string() })),
        );
        if before.abort {
            return Err(BceError::save_aborted_by_hook(
                HookPoint::BeforeCharacterSave.as_str(),
            ));
        }
        let doc = RawDocument::encode(character)?;
        self.storage.save_character_raw(&character.id, doc)?;
        self.load_all()?;
        self.hooks
            .dispatch(HookContext::new(HookPoint::AfterCharacterSave));
        Ok(())
    }

    pub fn save_event(&self, event: &Event) -> Result<()> {
        let before = self.hooks.dispatch(
            HookContext::new(HookPoint::BeforeEventSave)
                .with_metadata(serde_json::json!({ "id": event.id.to_string() })),
        );
        if before.abort {
            return Err(BceError::save_aborted_by_hook(
                HookPoint::BeforeEventSave.as_str(),
            ));
        }
        let doc = RawDocument::encode(event)?;
        self.storage.save_event_raw(&event.id, doc)?;
        self.load_all()?;
        self.hooks
            .dispatch(HookContext::new(HookPoint::AfterEventSave));
        Ok(())
    }

    pub fn list_characters_with_tag(&self, tag: &str) -> Vec<EntityId> {
        self.current().1.list_characters_with_tag(tag)
    }

    pub fn list_events_with_tag(&self, tag: &str) -> Vec<EntityId> {
        self.current().1.list_events_with_tag(tag)
    }

    pub fn list_characters_with_role(&self, role: &str) -> Vec<EntityId> {
        self.current().1.list_characters_with_role(role)
    }

    pub fn list_characters_for_source(&self, source_id: &SourceId) -> Vec<EntityId> {
        self.current().1.list_characters_for_source(source_id)
    }

    pub fn list_events_for_character(&self, character_id: &EntityId) -> Vec<EntityId> {
        self.current().1.list_events_for_character(character_id)
    }

    pub fn iter_character_ids(&self) -> Vec<EntityId> {
        self.current().1.iter_characters().cloned().collect()
    }

    pub fn iter_event_ids(&self) -> Vec<EntityId> {
        self.current().1.iter_events().cloned().collect()
    }

    pub fn search_all(&self, query: &str, scope: SearchScope) -> Result<Vec<SearchResult>> {
        let state = self.current();
        search::search_all(&state.0, &state.1, query, scope, &self.hooks)
    }

    pub fn build_character_dossier(
        &self,
        id: &EntityId,
    ) -> Result<DossierOutcome<CharacterDossier>> {
        let state = self.current();
        dossier::build_character_dossier(&state.0, id, &self.hooks)
    }

    pub fn build_event_dossier(&self, id: &EntityId) -> Result<DossierOutcome<EventDossier>> {
        let state = self.current();
        dossier::build_event_dossier(&state.0, id, &self.hooks)
    }

    pub fn all_claims(&self) -> Vec<Claim> {
        claims::all_claims(&self.current().0)
    }

    pub fn detect_all_conflicts(&self) -> Vec<ConflictSummary> {
        let claims = self.all_claims();
        conflict::detect_conflicts(&claims, &self.hooks)
    }

    pub fn shutdown(&self) {
        self.hooks.dispatch(HookContext::new(HookPoint::Shutdown));
    }
}
