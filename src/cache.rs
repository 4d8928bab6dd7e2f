//! The `CacheRegistry` (spec §4.4, §5): components register invalidators;
//! the storage port calls `invalidate_all()` on any successful write or
//! reconfiguration.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{BceError, Result};

/// A registry of zero-argument invalidation callbacks. Rarely mutated
/// (configuration time), so a read-biased `RwLock` is appropriate.
#[derive(Clone, Default)]
pub struct CacheRegistry {
    next_id: Arc<AtomicUsize>,
    invalidators: Arc<RwLock<BTreeMap<usize, Arc<dyn Fn() + Send + Sync>>>>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an invalidation callback, returning a token that can later be
    /// used to deregister it or to target a single invalidation.
    pub fn register(&self, callback: impl Fn() + Send + Sync + 'static) -> usize {
        let token = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.invalidators.write().insert(token, Arc::new(callback));
        token
    }

    pub fn deregister(&self, token: usize) {
        self.invalidators.write().remove(&token);
    }

    /// Invoke every registered invalidator. Never fails: an invalidator
    /// should itself be infallible.
    pub fn invalidate_all(&self) {
        let callbacks: Vec<_> = self.invalidators.read().values().cloned().collect();
        for cb in callbacks {
            cb();
        }
    }

    /// Invoke a single invalidator by token. A reference to an unregistered
    /// token is a `Cache` error: logged, never fatal to the caller.
    pub fn invalidate_one(&self, token: usize) -> Result<()> {
        match self.invalidators.read().get(&token) {
            Some(cb) => {
                cb();
                Ok(())
            }
            None => {
                let msg = format!("unknown cache invalidator token {token}");
                tracing::warn!("{msg}");
                Err(BceError::Cache(msg))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.invalidators.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
