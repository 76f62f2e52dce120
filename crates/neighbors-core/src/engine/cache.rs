use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use tracing::trace;

/// A bounded memo map that evicts its oldest insertion once full.
#[derive(Debug, Clone)]
pub struct MemoCache<K, V> {
    label: &'static str,
    capacity: usize,
    order: VecDeque<K>,
    data: HashMap<K, V>,
}

impl<K, V> MemoCache<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new(label: &'static str, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            label,
            capacity,
            order: VecDeque::with_capacity(capacity),
            data: HashMap::with_capacity(capacity),
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.data.get(key)
    }

    pub fn insert(&mut self, key: K, value: V) {
        if self.data.insert(key.clone(), value).is_some() {
            return;
        }
        self.order.push_back(key);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.data.remove(&oldest);
                trace!(cache = self.label, "Evicted oldest memo entry.");
            }
        }
    }

    /// Returns the cached value for `key`, computing and storing it on a miss.
    pub fn get_or_insert_with(&mut self, key: K, compute: impl FnOnce() -> V) -> &V {
        if !self.data.contains_key(&key) {
            let value = compute();
            self.insert(key.clone(), value);
        }
        &self.data[&key]
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let value = self.data.remove(key)?;
        self.order.retain(|k| k != key);
        Some(value)
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.data.clear();
    }
}
