//! Keyed collection of records addressed by 16-bit id.
//!
//! Used for both the registry's object entries and each object's instances.
//! Lookup is a linear scan; tables hold a handful of entries and iteration
//! follows insertion order.

/// A record stored in an object's instance table.
pub trait ObjectInstance {
    /// Instance id, unique within its object.
    fn instance_id(&self) -> u16;
}

/// Keyed collection with linear lookup by id.
#[derive(Debug, Clone)]
pub struct ObjectTable<T> {
    entries: Vec<(u16, T)>,
}

impl<T> ObjectTable<T> {
    /// Create a new empty table.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Insert a record under `id`.
    ///
    /// Returns `false` and leaves the table unchanged if the id is taken.
    pub fn insert(&mut self, id: u16, item: T) -> bool {
        if self.contains(id) {
            return false;
        }
        self.entries.push((id, item));
        true
    }

    /// Get a record by id.
    pub fn get(&self, id: u16) -> Option<&T> {
        self.entries
            .iter()
            .find(|(key, _)| *key == id)
            .map(|(_, item)| item)
    }

    /// Get a mutable record by id.
    pub fn get_mut(&mut self, id: u16) -> Option<&mut T> {
        self.entries
            .iter_mut()
            .find(|(key, _)| *key == id)
            .map(|(_, item)| item)
    }

    /// Remove and return a record.
    pub fn remove(&mut self, id: u16) -> Option<T> {
        let index = self.entries.iter().position(|(key, _)| *key == id)?;
        Some(self.entries.remove(index).1)
    }

    /// Check if an id is present.
    pub fn contains(&self, id: u16) -> bool {
        self.entries.iter().any(|(key, _)| *key == id)
    }

    /// Ids in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = u16> + '_ {
        self.entries.iter().map(|(key, _)| *key)
    }

    /// Records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &T)> {
        self.entries.iter().map(|(key, item)| (*key, item))
    }

    /// Mutable records in insertion order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (u16, &mut T)> {
        self.entries.iter_mut().map(|(key, item)| (*key, item))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<T: ObjectInstance> ObjectTable<T> {
    /// Insert an instance under its own id.
    pub fn insert_instance(&mut self, instance: T) -> bool {
        let id = instance.instance_id();
        self.insert(id, instance)
    }
}

impl<T> Default for ObjectTable<T> {
    fn default() -> Self {
        Self::new()
    }
}
