//! Typed registry for long-lived objects the native side refers to by id.

use std::any::Any;
use std::sync::{Arc, OnceLock};

use hostbridge_types::HandleId;

use crate::handle_table::{HandleError, HandleTable, Lifetime};

pub type SharedObject = Arc<dyn Any + Send + Sync>;

/// A [`HandleTable`] of type-erased objects with downcasting accessors.
#[derive(Default)]
pub struct ObjectRegistry {
    table: HandleTable<SharedObject>,
}

impl ObjectRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> &'static ObjectRegistry {
        static GLOBAL: OnceLock<ObjectRegistry> = OnceLock::new();
        GLOBAL.get_or_init(ObjectRegistry::new)
    }

    pub fn register_persistent<T: Any + Send + Sync>(&self, object: Arc<T>) -> HandleId {
        self.table.register_persistent(object)
    }

    pub fn register_once<T: Any + Send + Sync>(&self, object: Arc<T>) -> HandleId {
        self.table.register_once(object)
    }

    /// Look up `id` and downcast it to `T` without removing it.
    pub fn get<T: Any + Send + Sync>(&self, id: HandleId) -> Result<Arc<T>, HandleError> {
        self.table
            .lookup(id)?
            .downcast::<T>()
            .map_err(|_| HandleError::WrongType(id))
    }

    /// Look up and remove a one-shot or persistent entry, checking its type
    /// first. A type mismatch leaves the entry registered.
    pub fn take<T: Any + Send + Sync>(&self, id: HandleId) -> Result<Arc<T>, HandleError> {
        self.table
            .remove_if(id, |_, object| expect_type::<T>(id, object))?
            .downcast::<T>()
            .map_err(|_| HandleError::WrongType(id))
    }

    /// Release a persistent entry after checking its type.
    pub fn release<T: Any + Send + Sync>(&self, id: HandleId) -> Result<Arc<T>, HandleError> {
        self.table
            .remove_if(id, |lifetime, object| {
                expect_type::<T>(id, object)?;
                match lifetime {
                    Lifetime::Persistent => Ok(()),
                    Lifetime::Once => Err(HandleError::NotPersistent(id)),
                }
            })?
            .downcast::<T>()
            .map_err(|_| HandleError::WrongType(id))
    }

    #[must_use]
    pub fn contains(&self, id: HandleId) -> bool {
        self.table.contains(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

fn expect_type<T: Any>(id: HandleId, object: &SharedObject) -> Result<(), HandleError> {
    if (**object).is::<T>() {
        Ok(())
    } else {
        Err(HandleError::WrongType(id))
    }
}
