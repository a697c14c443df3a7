use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;
use uuid::Uuid;

/// Process-local store of loaded entities, keyed by id.
///
/// Stores hand a shared handle to this around instead of reaching for a global;
/// they refresh entries on save and evict them on delete or when an update
/// finds the row gone.
#[async_trait::async_trait]
pub trait EntityCache<T>: Send + Sync {
    async fn get(&self, id: &Uuid) -> Option<T>;
    async fn put(&self, id: Uuid, entity: T);
    async fn remove(&self, id: &Uuid);
    async fn clear(&self);
}

pub type SharedCache<T> = Arc<dyn EntityCache<T>>;

#[derive(Debug)]
struct Entry<T> {
    value: T,
    stored_at: Instant,
}

#[derive(Debug)]
pub struct InMemoryEntityCache<T> {
    max_entries: usize,
    entries: Mutex<HashMap<Uuid, Entry<T>>>,
}

impl<T> InMemoryEntityCache<T> {
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries: max_entries.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn contains(&self, id: &Uuid) -> bool {
        self.entries.lock().await.contains_key(id)
    }
}

#[async_trait::async_trait]
impl<T> EntityCache<T> for InMemoryEntityCache<T>
where
    T: Clone + Send + Sync,
{
    async fn get(&self, id: &Uuid) -> Option<T> {
        self.entries.lock().await.get(id).map(|entry| entry.value.clone())
    }

    async fn put(&self, id: Uuid, entity: T) {
        let mut entries = self.entries.lock().await;

        if entries.len() >= self.max_entries && !entries.contains_key(&id) {
            // Oldest entry goes first.
            if let Some(victim) = entries.iter().min_by_key(|(_, entry)| entry.stored_at).map(|(key, _)| *key) {
                entries.remove(&victim);
            }
        }

        entries.insert(
            id,
            Entry {
                value: entity,
                stored_at: Instant::now(),
            },
        );
    }

    async fn remove(&self, id: &Uuid) {
        self.entries.lock().await.remove(id);
    }

    async fn clear(&self) {
        self.entries.lock().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_remove() {
        let cache = InMemoryEntityCache::<String>::new(4);
        let id = Uuid::new_v4();

        cache.put(id, "ticket".to_string()).await;
        assert_eq!(cache.get(&id).await.as_deref(), Some("ticket"));

        cache.remove(&id).await;
        assert!(cache.get(&id).await.is_none());
    }

    #[tokio::test]
    async fn evicts_oldest_when_full() {
        let cache = InMemoryEntityCache::<u32>::new(2);
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let third = Uuid::new_v4();

        cache.put(first, 1).await;
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        cache.put(second, 2).await;
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        cache.put(third, 3).await;

        assert_eq!(cache.len().await, 2);
        assert!(!cache.contains(&first).await);
        assert!(cache.contains(&second).await);
        assert!(cache.contains(&third).await);
    }

    #[tokio::test]
    async fn replacing_an_entry_does_not_evict() {
        let cache = InMemoryEntityCache::<u32>::new(1);
        let id = Uuid::new_v4();

        cache.put(id, 1).await;
        cache.put(id, 2).await;

        assert_eq!(cache.get(&id).await, Some(2));
    }

    #[tokio::test]
    async fn clear_empties_the_cache() {
        let cache = InMemoryEntityCache::<u32>::new(8);
        cache.put(Uuid::new_v4(), 1).await;
        cache.put(Uuid::new_v4(), 2).await;
        cache.clear().await;
        assert_eq!(cache.len().await, 0);
    }
}
