use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicy {
    /// Only writes that change the stored value mark the map dirty.
    CompareValues,
    /// Every write marks the map dirty.
    AlwaysDirty,
}

type Listener = Arc<dyn Fn() + Send + Sync>;

/// Key/value map remembering whether it changed since the consumer last
/// cleared it.
pub struct DirtyMap<K, V> {
    entries: Mutex<HashMap<K, V>>,
    dirty: AtomicBool,
    policy: WritePolicy,
    listeners: Mutex<Vec<Listener>>,
}

impl<K, V> DirtyMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + PartialEq,
{
    pub fn new() -> Self {
        Self::with_policy(WritePolicy::CompareValues)
    }

    pub fn always_dirty() -> Self {
        Self::with_policy(WritePolicy::AlwaysDirty)
    }

    pub fn with_policy(policy: WritePolicy) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            dirty: AtomicBool::new(false),
            policy,
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn policy(&self) -> WritePolicy {
        self.policy
    }

    /// Stores `value`, returning whether the write dirtied the map.
    pub fn set(&self, key: K, value: V) -> bool {
        let changed = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            let changed = entries.get(&key) != Some(&value);
            entries.insert(key, value);
            changed
        };

        let dirties = changed || self.policy == WritePolicy::AlwaysDirty;
        if dirties {
            self.mark_dirty();
        }
        dirties
    }

    /// Applies `f` to the stored value (or `V::default()`) and stores the result.
    pub fn update<F>(&self, key: K, f: F) -> bool
    where
        V: Default,
        F: FnOnce(V) -> V,
    {
        let changed = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            let current = entries.get(&key).cloned();
            let next = f(current.clone().unwrap_or_default());
            let changed = current.as_ref() != Some(&next);
            entries.insert(key, next);
            changed
        };

        let dirties = changed || self.policy == WritePolicy::AlwaysDirty;
        if dirties {
            self.mark_dirty();
        }
        dirties
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        let removed = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        if removed.is_some() {
            self.mark_dirty();
        }
        removed
    }

    /// Replaces all contents and leaves the map clean.
    pub fn initialize<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let mut current = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        *current = entries.into_iter().collect();
        self.dirty.store(false, Ordering::Release);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    pub fn clear_dirty(&self) {
        self.dirty.store(false, Ordering::Release);
    }

    /// Returns whether the map was dirty and clears the flag in one step.
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    /// Registers a callback run each time the map goes from clean to dirty.
    pub fn on_became_dirty<F>(&self, listener: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(listener));
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> HashMap<K, V> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn mark_dirty(&self) {
        if self.dirty.swap(true, Ordering::AcqRel) {
            return;
        }
        // Listeners may register further listeners.
        let listeners = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            listener();
        }
    }
}

impl<K, V> Default for DirtyMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + PartialEq,
{
    fn default() -> Self {
        Self::new()
    }
}
