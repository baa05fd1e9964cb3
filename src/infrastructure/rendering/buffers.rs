use std::collections::HashMap;
use std::collections::hash_map::Entry;

/// Smallest capacity handed out for a new key.
const MIN_CAPACITY: usize = 64;

/// Capacity needed to hold `required` elements, growing by powers of two.
/// `None` when `current` already fits.
pub fn grow_capacity(current: usize, required: usize) -> Option<usize> {
    if required <= current && current > 0 {
        return None;
    }
    Some(required.max(MIN_CAPACITY).next_power_of_two())
}

/// Storage behind one key together with what it can hold and what it holds now.
#[derive(Debug)]
pub struct BufferSlot<T> {
    /// `None` only between creation of the entry and its first allocation.
    pub storage: Option<T>,
    pub vertex_capacity: usize,
    pub index_capacity: usize,
    pub vertex_count: usize,
    pub index_count: usize,
}

/// Named buffer slots owned by one backend instance.
///
/// A slot is created on the first upload under its key, reused while the data
/// fits, and re-created with power-of-two capacities when it has to grow.
#[derive(Debug)]
pub struct BufferRegistry<T> {
    slots: HashMap<String, BufferSlot<T>>,
    allocations: usize,
}

impl<T> Default for BufferRegistry<T> {
    fn default() -> Self {
        Self { slots: HashMap::new(), allocations: 0 }
    }
}

impl<T> BufferRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure `key` can hold the given counts. `allocate` receives the
    /// vertex and index capacities when storage has to be (re)built.
    /// Returns the slot and whether it was freshly allocated.
    pub fn ensure(
        &mut self,
        key: &str,
        vertices: usize,
        indices: usize,
        allocate: impl FnOnce(usize, usize) -> T,
    ) -> (&mut BufferSlot<T>, bool) {
        let slot = match self.slots.entry(key.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(BufferSlot {
                storage: None,
                vertex_capacity: 0,
                index_capacity: 0,
                vertex_count: 0,
                index_count: 0,
            }),
        };
        let vertex_growth = grow_capacity(slot.vertex_capacity, vertices);
        let index_growth = if indices == 0 { None } else { grow_capacity(slot.index_capacity, indices) };

        let fresh = slot.storage.is_none() || vertex_growth.is_some() || index_growth.is_some();
        if fresh {
            slot.vertex_capacity = vertex_growth.unwrap_or(slot.vertex_capacity);
            slot.index_capacity = index_growth.unwrap_or(slot.index_capacity);
            slot.storage = Some(allocate(slot.vertex_capacity, slot.index_capacity));
            self.allocations += 1;
        }
        slot.vertex_count = vertices;
        slot.index_count = indices;
        (slot, fresh)
    }

    pub fn get(&self, key: &str) -> Option<&BufferSlot<T>> {
        self.slots.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of times storage has been built, across all keys.
    pub fn allocations(&self) -> usize {
        self.allocations
    }

    /// Drop every slot. `release` sees each storage before it goes.
    pub fn clear(&mut self, mut release: impl FnMut(&str, T)) {
        for (key, slot) in self.slots.drain() {
            if let Some(storage) = slot.storage {
                release(&key, storage);
            }
        }
    }
}
