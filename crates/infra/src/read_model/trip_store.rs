use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use tripsplit_core::TripId;

/// Trip-isolated key/value store abstraction for disposable read models.
pub trait TripStore<K, V>: Send + Sync {
    fn get(&self, trip_id: TripId, key: &K) -> Option<V>;
    fn upsert(&self, trip_id: TripId, key: K, value: V);
    fn list(&self, trip_id: TripId) -> Vec<V>;
    /// Clear all read-model records for a trip (rebuild support).
    fn clear_trip(&self, trip_id: TripId);
}

impl<K, V, S> TripStore<K, V> for Arc<S>
where
    S: TripStore<K, V> + ?Sized,
{
    fn get(&self, trip_id: TripId, key: &K) -> Option<V> {
        (**self).get(trip_id, key)
    }

    fn upsert(&self, trip_id: TripId, key: K, value: V) {
        (**self).upsert(trip_id, key, value)
    }

    fn list(&self, trip_id: TripId) -> Vec<V> {
        (**self).list(trip_id)
    }

    fn clear_trip(&self, trip_id: TripId) {
        (**self).clear_trip(trip_id)
    }
}

/// In-memory trip-isolated store for tests/dev.
#[derive(Debug)]
pub struct InMemoryTripStore<K, V> {
    inner: RwLock<HashMap<(TripId, K), V>>,
}

impl<K, V> InMemoryTripStore<K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for InMemoryTripStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> TripStore<K, V> for InMemoryTripStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, trip_id: TripId, key: &K) -> Option<V> {
        let map = self.inner.read().ok()?;
        map.get(&(trip_id, key.clone())).cloned()
    }

    fn upsert(&self, trip_id: TripId, key: K, value: V) {
        if let Ok(mut map) = self.inner.write() {
            map.insert((trip_id, key), value);
        }
    }

    fn list(&self, trip_id: TripId) -> Vec<V> {
        let map = match self.inner.read() {
            Ok(m) => m,
            Err(_) => return vec![],
        };

        map.iter()
            .filter_map(|((t, _k), v)| if *t == trip_id { Some(v.clone()) } else { None })
            .collect()
    }

    fn clear_trip(&self, trip_id: TripId) {
        if let Ok(mut map) = self.inner.write() {
            map.retain(|(t, _k), _v| *t != trip_id);
        }
    }
}
