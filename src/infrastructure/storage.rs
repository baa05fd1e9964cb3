//! Key/value persistence for drawings and the drawing mode.

use crate::domain::errors::{ChartResult, StorageError};
use std::cell::RefCell;
use std::collections::HashMap;

/// String-valued store. Values are written as-is so entries stay readable
/// by other consumers of the same keys.
pub trait DrawingStore {
    fn load(&self, key: &str) -> Option<String>;
    fn save(&self, key: &str, value: &str) -> ChartResult<()>;
    fn remove(&self, key: &str);
}

/// `window.localStorage`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalStorageDrawingStore;

impl LocalStorageDrawingStore {
    fn storage() -> ChartResult<web_sys::Storage> {
        let window = web_sys::window().ok_or_else(|| StorageError::Unavailable("no window".into()))?;
        window
            .local_storage()
            .map_err(|e| StorageError::Unavailable(format!("{e:?}")))?
            .ok_or_else(|| StorageError::Unavailable("localStorage disabled".into()).into())
    }
}

impl DrawingStore for LocalStorageDrawingStore {
    fn load(&self, key: &str) -> Option<String> {
        Self::storage().ok()?.get_item(key).ok().flatten()
    }

    fn save(&self, key: &str, value: &str) -> ChartResult<()> {
        Self::storage()?
            .set_item(key, value)
            .map_err(|e| StorageError::Unavailable(format!("{e:?}")).into())
    }

    fn remove(&self, key: &str) {
        if let Ok(storage) = Self::storage() {
            let _ = storage.remove_item(key);
        }
    }
}

/// In-memory store for tests and hosts without web storage.
#[derive(Debug, Default)]
pub struct MemoryDrawingStore {
    entries: RefCell<HashMap<String, String>>,
}

impl MemoryDrawingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl DrawingStore for MemoryDrawingStore {
    fn load(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn save(&self, key: &str, value: &str) -> ChartResult<()> {
        self.entries.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) {
        self.entries.borrow_mut().remove(key);
    }
}
