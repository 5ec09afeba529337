use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

type LockKey = (&'static str, i64);

/// Keyed async locks serializing mutations of a single entity, so that its
/// audit entries land in the order the writes committed.
///
/// Creation has no id to lock until the row exists, so each entity type also
/// carries a creation barrier: [`EntityLocks::lock_new`] excludes every
/// per-id lock of that type until the CREATE entry is recorded. A caller must
/// hold at most one guard at a time.
#[derive(Clone, Default)]
pub struct EntityLocks {
    locks: Arc<DashMap<LockKey, Arc<Mutex<()>>>>,
    barriers: Arc<DashMap<&'static str, Arc<RwLock<()>>>>,
}

pub struct EntityLockGuard {
    key: LockKey,
    locks: Arc<DashMap<LockKey, Arc<Mutex<()>>>>,
    guard: Option<OwnedMutexGuard<()>>,
    _barrier: OwnedRwLockReadGuard<()>,
}

/// Held while a new entity is inserted and its CREATE entry recorded.
pub struct CreationGuard {
    _barrier: OwnedRwLockWriteGuard<()>,
}

impl EntityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn barrier(&self, entity: &'static str) -> Arc<RwLock<()>> {
        self.barriers.entry(entity).or_default().clone()
    }

    pub async fn lock(&self, entity: &'static str, id: i64) -> EntityLockGuard {
        let barrier = self.barrier(entity).read_owned().await;
        let key = (entity, id);
        let mutex = self.locks.entry(key).or_default().clone();
        let guard = mutex.lock_owned().await;
        EntityLockGuard {
            key,
            locks: self.locks.clone(),
            guard: Some(guard),
            _barrier: barrier,
        }
    }

    pub async fn lock_new(&self, entity: &'static str) -> CreationGuard {
        CreationGuard {
            _barrier: self.barrier(entity).write_owned().await,
        }
    }

    pub fn held(&self) -> usize {
        self.locks.len()
    }
}

impl Drop for EntityLockGuard {
    fn drop(&mut self) {
        self.guard.take();
        // Only the map still points at the mutex: nobody holds or awaits it.
        self.locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn released_locks_are_dropped_from_the_map() {
        let locks = EntityLocks::new();
        {
            let _a = locks.lock("Task", 1).await;
            let _b = locks.lock("Task", 2).await;
            assert_eq!(locks.held(), 2);
        }
        assert_eq!(locks.held(), 0);
    }

    #[tokio::test]
    async fn same_entity_waits_for_holder() {
        let locks = EntityLocks::new();
        let first = locks.lock("Task", 1).await;

        let contender = locks.clone();
        let waiter = tokio::spawn(async move {
            let _guard = contender.lock("Task", 1).await;
        });

        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());
        drop(first);
        waiter.await.unwrap();
        assert_eq!(locks.held(), 0);
    }

    #[tokio::test]
    async fn creation_blocks_mutations_of_the_same_type_only() {
        let locks = EntityLocks::new();
        let creating = locks.lock_new("Task").await;

        // Other entity types are unaffected.
        let _project = locks.lock("Project", 1).await;

        let contender = locks.clone();
        let waiter = tokio::spawn(async move {
            let _guard = contender.lock("Task", 1).await;
        });

        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());
        drop(creating);
        waiter.await.unwrap();
    }
}
