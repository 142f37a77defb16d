//! Optimistic mutations with exact rollback.
//!
//! [`OptimisticController::apply`] changes the visible value immediately and
//! hands back a [`Pending`] that remembers what the value was before. A
//! rollback restores that snapshot; it never tries to invert the mutation,
//! so repeated failures cannot drift the visible state.

use std::collections::HashMap;
use std::hash::Hash;

use tokio::sync::watch;

/// A mutation that has been shown but not yet confirmed.
#[must_use = "an optimistic mutation must be committed or rolled back"]
#[derive(Debug)]
pub struct Pending<K, V> {
    key: K,
    prior: Option<V>,
}

impl<K, V> Pending<K, V> {
    pub fn key(&self) -> &K {
        &self.key
    }
}

/// Keyed visible state published through a `watch` channel.
pub struct OptimisticController<K, V> {
    state: watch::Sender<HashMap<K, V>>,
}

impl<K, V> Default for OptimisticController<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> OptimisticController<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + Default,
{
    pub fn new() -> Self {
        let (state, _) = watch::channel(HashMap::new());
        Self { state }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.state.borrow().get(key).cloned()
    }

    /// Replace the confirmed value for `key`.
    pub fn upsert(&self, key: K, value: V) {
        self.state.send_modify(|map| {
            map.insert(key, value);
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<HashMap<K, V>> {
        self.state.subscribe()
    }

    /// Show `mutate` applied to the current value (or the default when the key
    /// is unknown) and return the handle needed to undo it.
    pub fn apply<F>(&self, key: K, mutate: F) -> Pending<K, V>
    where
        F: FnOnce(&mut V),
    {
        let mut prior = None;
        self.state.send_modify(|map| {
            prior = map.get(&key).cloned();
            let mut next = prior.clone().unwrap_or_default();
            mutate(&mut next);
            map.insert(key.clone(), next);
        });
        Pending { key, prior }
    }

    /// Keep the optimistic value.
    pub fn commit(&self, pending: Pending<K, V>) {
        drop(pending);
    }

    /// Restore the value captured by `apply`.
    pub fn rollback(&self, pending: Pending<K, V>) {
        let Pending { key, prior } = pending;
        self.state.send_modify(|map| match prior {
            Some(value) => {
                map.insert(key, value);
            }
            None => {
                map.remove(&key);
            }
        });
    }
}
