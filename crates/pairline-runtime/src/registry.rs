//! Session registry: id → session handle.
//!
//! A plain key/value store. It does not enforce the state machine; the
//! per-session actors do. One coarse lock guards the map, which is enough for
//! operator-driven request volume. Deleted ids are remembered so they can
//! never be inserted again.

use std::collections::{HashMap, HashSet};

use pairline_core::SessionId;
use parking_lot::RwLock;

use crate::errors::RegistryError;
use crate::handle::SessionHandle;

#[derive(Debug, Default)]
struct Inner {
    sessions: HashMap<SessionId, SessionHandle>,
    retired: HashSet<SessionId>,
}

/// Index of live sessions.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    inner: RwLock<Inner>,
}

impl SessionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a session. Fails if the id is present or was ever deleted.
    pub fn create(&self, handle: SessionHandle) -> Result<(), RegistryError> {
        let mut inner = self.inner.write();
        let id = handle.id().clone();
        if inner.sessions.contains_key(&id) || inner.retired.contains(&id) {
            return Err(RegistryError::AlreadyExists(id));
        }
        let _ = inner.sessions.insert(id, handle);
        Ok(())
    }

    /// Look up a session.
    pub fn get(&self, id: &str) -> Result<SessionHandle, RegistryError> {
        self.inner
            .read()
            .sessions
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(SessionId::from(id)))
    }

    /// Remove a session and retire its id.
    pub fn delete(&self, id: &str) -> Result<SessionHandle, RegistryError> {
        let mut inner = self.inner.write();
        let (id, handle) = inner
            .sessions
            .remove_entry(id)
            .ok_or_else(|| RegistryError::NotFound(SessionId::from(id)))?;
        let _ = inner.retired.insert(id);
        Ok(handle)
    }

    /// Whether `id` is live.
    pub fn contains(&self, id: &str) -> bool {
        self.inner.read().sessions.contains_key(id)
    }

    /// Whether `id` belonged to a deleted session.
    pub fn is_retired(&self, id: &str) -> bool {
        self.inner.read().retired.contains(id)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.inner.read().sessions.len()
    }

    /// Whether there are no live sessions.
    pub fn is_empty(&self) -> bool {
        self.inner.read().sessions.is_empty()
    }

    /// Live ids, oldest first (ids are time-ordered).
    pub fn ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.inner.read().sessions.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Live handles, oldest first.
    pub fn list(&self) -> Vec<SessionHandle> {
        let mut handles: Vec<SessionHandle> =
            self.inner.read().sessions.values().cloned().collect();
        handles.sort_by(|a, b| a.id().cmp(b.id()));
        handles
    }
}
