//! Thread-safe map from [`HandleId`] to host-side objects.
//!
//! One `std::sync::Mutex` guards the map; every operation is a single short
//! critical section and nothing user-supplied runs under the lock.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use hostbridge_types::HandleId;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HandleError {
    #[error("handle {0} is not registered")]
    NotFound(HandleId),
    #[error("handle {0} is one-shot and cannot be released explicitly")]
    NotPersistent(HandleId),
    #[error("handle {0} holds an object of a different type")]
    WrongType(HandleId),
}

/// How long a registration lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    /// Survives lookups until [`HandleTable::release`].
    Persistent,
    /// Removed by the first consuming lookup.
    Once,
}

struct Entry<T> {
    lifetime: Lifetime,
    object: T,
}

pub struct HandleTable<T> {
    entries: Mutex<HashMap<HandleId, Entry<T>>>,
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HandleTable<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<HandleId, Entry<T>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, object: T, lifetime: Lifetime) -> HandleId {
        let id = HandleId::next();
        self.entries().insert(id, Entry { lifetime, object });
        debug!(handle = %id, ?lifetime, "registered handle");
        id
    }

    pub fn register_persistent(&self, object: T) -> HandleId {
        self.register(object, Lifetime::Persistent)
    }

    pub fn register_once(&self, object: T) -> HandleId {
        self.register(object, Lifetime::Once)
    }

    /// Remove `id` regardless of its lifetime.
    pub fn lookup_and_consume(&self, id: HandleId) -> Result<T, HandleError> {
        self.entries()
            .remove(&id)
            .map(|entry| entry.object)
            .ok_or(HandleError::NotFound(id))
    }

    /// Remove a persistent handle. A one-shot handle stays registered.
    pub fn release(&self, id: HandleId) -> Result<T, HandleError> {
        let object = self.remove_if(id, |lifetime, _| match lifetime {
            Lifetime::Persistent => Ok(()),
            Lifetime::Once => Err(HandleError::NotPersistent(id)),
        })?;
        debug!(handle = %id, "released handle");
        Ok(object)
    }

    /// Remove `id` if `accept` approves the entry, all under one lock.
    /// A refused entry stays registered and its error is returned.
    pub fn remove_if<F>(&self, id: HandleId, accept: F) -> Result<T, HandleError>
    where
        F: FnOnce(Lifetime, &T) -> Result<(), HandleError>,
    {
        let mut entries = self.entries();
        let entry = entries.get(&id).ok_or(HandleError::NotFound(id))?;
        accept(entry.lifetime, &entry.object)?;
        entries
            .remove(&id)
            .map(|entry| entry.object)
            .ok_or(HandleError::NotFound(id))
    }

    #[must_use]
    pub fn lifetime(&self, id: HandleId) -> Option<Lifetime> {
        self.entries().get(&id).map(|entry| entry.lifetime)
    }

    #[must_use]
    pub fn contains(&self, id: HandleId) -> bool {
        self.entries().contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Remove everything, returning the entries in id order.
    pub fn drain(&self) -> Vec<(HandleId, T)> {
        let mut drained: Vec<_> = self
            .entries()
            .drain()
            .map(|(id, entry)| (id, entry.object))
            .collect();
        drained.sort_unstable_by_key(|(id, _)| *id);
        drained
    }
}

impl<T: Clone> HandleTable<T> {
    /// Read without removing, for either lifetime.
    pub fn lookup(&self, id: HandleId) -> Result<T, HandleError> {
        self.entries()
            .get(&id)
            .map(|entry| entry.object.clone())
            .ok_or(HandleError::NotFound(id))
    }

    /// Completion-time lookup in one critical section.
    ///
    /// The entry is removed when `complete` is set or the handle is one-shot,
    /// and cloned otherwise.
    pub fn resolve(&self, id: HandleId, complete: bool) -> Result<T, HandleError> {
        let mut entries = self.entries();
        let consume = match entries.get(&id) {
            None => return Err(HandleError::NotFound(id)),
            Some(entry) => complete || entry.lifetime == Lifetime::Once,
        };
        let object = if consume {
            entries.remove(&id).map(|entry| entry.object)
        } else {
            entries.get(&id).map(|entry| entry.object.clone())
        };
        drop(entries);
        debug!(handle = %id, consumed = consume, "resolved handle");
        object.ok_or(HandleError::NotFound(id))
    }
}
