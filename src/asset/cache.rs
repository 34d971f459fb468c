use std::collections::HashMap;

use super::Handle;

/// Append-only asset storage with optional name lookup.
pub struct AssetCache<T> {
    items: Vec<T>,
    names: HashMap<String, usize>,
}

impl<T> AssetCache<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            names: HashMap::new(),
        }
    }

    pub fn insert(&mut self, item: T) -> Handle<T> {
        let index = self.items.len();
        self.items.push(item);
        Handle::new(index)
    }

    /// Inserts under `name`; a later insert with the same name wins the lookup.
    pub fn insert_named(&mut self, name: impl Into<String>, item: T) -> Handle<T> {
        let handle = self.insert(item);
        let name = name.into();
        if self.names.insert(name.clone(), handle.index()).is_some() {
            log::warn!("Asset name '{}' registered twice, keeping the latest", name);
        }
        handle
    }

    pub fn find(&self, name: &str) -> Option<Handle<T>> {
        self.names.get(name).copied().map(Handle::new)
    }

    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        self.items.get(handle.index())
    }

    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        self.items.get_mut(handle.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.items
            .iter()
            .enumerate()
            .map(|(index, item)| (Handle::new(index), item))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> Default for AssetCache<T> {
    fn default() -> Self {
        Self::new()
    }
}
