//! Hook Runtime (spec §4.8): priority-ordered interposition at the canonical
//! lifecycle boundaries, with abort semantics and handler-exception
//! isolation. Pattern follows the teacher's registry modules: a registration
//! call into a read-biased `RwLock`-guarded table, no trait objects beyond
//! the handler closure itself.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// The ~30 canonical interposition points named by the spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HookPoint {
    BeforeCharacterLoad,
    AfterCharacterLoad,
    BeforeCharacterSave,
    AfterCharacterSave,
    BeforeEventLoad,
    AfterEventLoad,
    BeforeEventSave,
    AfterEventSave,
    BeforeValidation,
    AfterValidation,
    ValidationError,
    BeforeQuery,
    AfterQuery,
    CacheHit,
    CacheMiss,
    BeforeSearch,
    AfterSearch,
    SearchResultFilter,
    SearchResultRank,
    BeforeDossierBuild,
    DossierEnrich,
    AfterDossierBuild,
    BeforeExport,
    AfterExport,
    ExportFormatResolve,
    BeforeConflictDetection,
    AfterConflictDetection,
    ConflictSeverityScore,
    Startup,
    Shutdown,
    ConfigChange,
}

impl HookPoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookPoint::BeforeCharacterLoad => "before_character_load",
            HookPoint::AfterCharacterLoad => "after_character_load",
            HookPoint::BeforeCharacterSave => "before_character_save",
            HookPoint::AfterCharacterSave => "after_character_save",
            HookPoint::BeforeEventLoad => "before_event_load",
            HookPoint::AfterEventLoad => "after_event_load",
            HookPoint::BeforeEventSave => "before_event_save",
            HookPoint::AfterEventSave => "after_event_save",
            HookPoint::BeforeValidation => "before_validation",
            HookPoint::AfterValidation => "after_validation",
            HookPoint::ValidationError => "validation_error",
            HookPoint::BeforeQuery => "before_query",
            HookPoint::AfterQuery => "after_query",
            HookPoint::CacheHit => "cache_hit",
            HookPoint::CacheMiss => "cache_miss",
            HookPoint::BeforeSearch => "before_search",
            HookPoint::AfterSearch => "after_search",
            HookPoint::SearchResultFilter => "search_result_filter",
            HookPoint::SearchResultRank => "search_result_rank",
            HookPoint::BeforeDossierBuild => "before_dossier_build",
            HookPoint::DossierEnrich => "dossier_enrich",
            HookPoint::AfterDossierBuild => "after_dossier_build",
            HookPoint::BeforeExport => "before_export",
            HookPoint::AfterExport => "after_export",
            HookPoint::ExportFormatResolve => "export_format_resolve",
            HookPoint::BeforeConflictDetection => "before_conflict_detection",
            HookPoint::AfterConflictDetection => "after_conflict_detection",
            HookPoint::ConflictSeverityScore => "conflict_severity_score",
            HookPoint::Startup => "startup",
            HookPoint::Shutdown => "shutdown",
            HookPoint::ConfigChange => "config_change",
        }
    }
}

impl std::fmt::Display for HookPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The mutable/read-only payload threaded through a dispatch. `data` is
/// mutable scratch space handlers can rewrite; `metadata` is read-only
/// context about the call site.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub hook_point: HookPoint,
    pub data: serde_json::Value,
    pub metadata: serde_json::Value,
    pub abort: bool,
}

impl HookContext {
    pub fn new(hook_point: HookPoint) -> Self {
        HookContext {
            hook_point,
            data: serde_json::Value::Null,
            metadata: serde_json::Value::Null,
            abort: false,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

type Handler = dyn Fn(HookContext) -> HookContext + Send + Sync;

struct Registration {
    priority: i32,
    sequence: usize,
    handler: Arc<Handler>,
}

/// Priority-ordered dispatch table, one entry per [`HookPoint`]. A
/// process-wide `enabled` toggle short-circuits dispatch to the identity
/// function at zero cost when the hook runtime is turned off.
pub struct HookRegistry {
    enabled: AtomicBool,
    next_sequence: AtomicUsize,
    handlers: RwLock<std::collections::HashMap<HookPoint, Vec<Registration>>>,
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HookRegistry {
    /// Hooks are enabled by default (spec's `hooks_enabled` default is `true`).
    pub fn new() -> Self {
        HookRegistry {
            enabled: AtomicBool::new(true),
            next_sequence: AtomicUsize::new(0),
            handlers: RwLock::new(std::collections::HashMap::new()),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Register a handler at `priority` (lower runs first; ties broken by
    /// registration order).
    pub fn register(
        &self,
        hook_point: HookPoint,
        priority: i32,
        handler: impl Fn(HookContext) -> HookContext + Send + Sync + 'static,
    ) {
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        let mut table = self.handlers.write();
        let entries = table.entry(hook_point).or_default();
        entries.push(Registration {
            priority,
            sequence,
            handler: Arc::new(handler),
        });
        entries.sort_by_key(|r| (r.priority, r.sequence));
    }

    /// Run every handler registered at `context.hook_point` in priority
    /// order. A handler that panics is treated as a handler exception: it is
    /// logged and the original context for that step is carried forward
    /// unchanged. A handler that sets `abort` stops the chain immediately.
    pub fn dispatch(&self, context: HookContext) -> HookContext {
        if !self.is_enabled() {
            return context;
        }
        let point = context.hook_point;
        let registrations: Vec<Arc<Handler>> = {
            let table = self.handlers.read();
            match table.get(&point) {
                Some(entries) => entries.iter().map(|r| r.handler.clone()).collect(),
                None => return context,
            }
        };

        let mut current = context;
        for handler in registrations {
            let before = current.clone();
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                handler(before.clone())
            }));
            current = match outcome {
                Ok(next) => next,
                Err(_) => {
                    tracing::warn!(hook_point = %point, "hook handler panicked; isolated");
                    before
                }
            };
            if current.abort {
                break;
            }
        }
        current
    }

    pub fn len_for(&self, hook_point: HookPoint) -> usize {
        self.handlers
            .read()
            .get(&hook_point)
            .map(|v| v.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn handlers_run_in_priority_order() {
        let registry = HookRegistry::new();
        let order = Arc::new(RwLock::new(Vec::new()));
        {
            let order = order.clone();
            registry.register(HookPoint::BeforeSearch, 10, move |ctx| {
                order.write().push("second");
                ctx
            });
        }
        {
            let order = order.clone();
            registry.register(HookPoint::BeforeSearch, 1, move |ctx| {
                order.write().push("first");
                ctx
            });
        }
        registry.dispatch(HookContext::new(HookPoint::BeforeSearch));
        assert_eq!(*order.read(), vec!["first", "second"]);
    }

    #[test]
    fn abort_stops_the_chain() {
        let registry = HookRegistry::new();
        let calls = Arc::new(AtomicU32::new(0));
        registry.register(HookPoint::BeforeSearch, 0, |mut ctx| {
            ctx.abort = true;
            ctx
        });
        {
            let calls = calls.clone();
            registry.register(HookPoint::BeforeSearch, 1, move |ctx| {
                calls.fetch_add(1, Ordering::SeqCst);
                ctx
            });
        }
        let result = registry.dispatch(HookContext::new(HookPoint::BeforeSearch));
        assert!(result.abort);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn panicking_handler_is_isolated() {
        let registry = HookRegistry::new();
        registry.register(HookPoint::BeforeSearch, 0, |_ctx| {
            panic!("boom");
        });
        let calls = Arc::new(AtomicU32::new(0));
        {
            let calls = calls.clone();
            registry.register(HookPoint::BeforeSearch, 1, move |ctx| {
                calls.fetch_add(1, Ordering::SeqCst);
                ctx
            });
        }
        let result = registry.dispatch(HookContext::new(HookPoint::BeforeSearch));
        assert!(!result.abort);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn disabled_registry_is_a_no_op() {
        let registry = HookRegistry::new();
        registry.set_enabled(false);
        let calls = Arc::new(AtomicU32::new(0));
        {
            let calls = calls.clone();
            registry.register(HookPoint::Startup, 0, move |ctx| {
                calls.fetch_add(1, Ordering::SeqCst);
                ctx
            });
        }
        registry.dispatch(HookContext::new(HookPoint::Startup));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
