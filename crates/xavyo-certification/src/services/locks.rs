//! Per-campaign and per-case locking.
//!
//! Stage transitions hold a campaign's lock exclusively. Decisions hold it
//! shared plus the lock of the case they touch, so decisions on different
//! cases run in parallel while a transition waits for them to drain.
//!
//! Table entries exist only while someone holds or waits for the lock; the
//! last guard to drop removes its entry.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard as StdMutexGuard, PoisonError};

use tokio::sync::{Mutex, OwnedMutexGuard, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

use crate::types::{CampaignId, CaseId};

type LockTable<K, L> = Arc<StdMutex<HashMap<K, Arc<L>>>>;

/// Exclusive access to a campaign.
pub type CampaignWriteGuard = LockGuard<CampaignId, RwLock<()>, OwnedRwLockWriteGuard<()>>;
/// Shared access to a campaign.
pub type CampaignReadGuard = LockGuard<CampaignId, RwLock<()>, OwnedRwLockReadGuard<()>>;
/// Exclusive access to a case.
pub type CaseGuard = LockGuard<CaseId, Mutex<()>, OwnedMutexGuard<()>>;

/// A held lock. Dropping the last guard for a key evicts the key's entry.
#[derive(Debug)]
pub struct LockGuard<K, L, G>
where
    K: Eq + Hash,
{
    guard: Option<G>,
    lock: Option<Arc<L>>,
    key: K,
    table: LockTable<K, L>,
}

impl<K, L, G> Drop for LockGuard<K, L, G>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        // Release the lock itself first; owned guards keep their own Arc.
        self.guard.take();
        let Some(lock) = self.lock.take() else {
            return;
        };
        let mut table = lock_table(&self.table);
        // Only the table and this guard still own the lock.
        if Arc::strong_count(&lock) == 2 {
            table.remove(&self.key);
        }
        drop(lock);
    }
}

/// Registry of campaign and case locks.
#[derive(Debug, Default)]
pub struct CampaignLocks {
    campaigns: LockTable<CampaignId, RwLock<()>>,
    cases: LockTable<CaseId, Mutex<()>>,
}

impl CampaignLocks {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Exclusive access to a campaign.
    pub async fn write(&self, campaign_id: CampaignId) -> CampaignWriteGuard {
        let lock = checkout(&self.campaigns, campaign_id);
        let guard = lock.clone().write_owned().await;
        held(guard, lock, campaign_id, &self.campaigns)
    }

    /// Shared access to a campaign.
    pub async fn read(&self, campaign_id: CampaignId) -> CampaignReadGuard {
        let lock = checkout(&self.campaigns, campaign_id);
        let guard = lock.clone().read_owned().await;
        held(guard, lock, campaign_id, &self.campaigns)
    }

    /// Exclusive access to one case. Callers must already hold the
    /// campaign lock in shared mode.
    pub async fn case(&self, case_id: CaseId) -> CaseGuard {
        let lock = checkout(&self.cases, case_id);
        let guard = lock.clone().lock_owned().await;
        held(guard, lock, case_id, &self.cases)
    }

    #[cfg(test)]
    fn tracked(&self) -> (usize, usize) {
        (
            lock_table(&self.campaigns).len(),
            lock_table(&self.cases).len(),
        )
    }
}

fn lock_table<K, L>(table: &LockTable<K, L>) -> StdMutexGuard<'_, HashMap<K, Arc<L>>> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

fn checkout<K, L>(table: &LockTable<K, L>, key: K) -> Arc<L>
where
    K: Eq + Hash,
    L: Default,
{
    lock_table(table).entry(key).or_default().clone()
}

fn held<K, L, G>(guard: G, lock: Arc<L>, key: K, table: &LockTable<K, L>) -> LockGuard<K, L, G>
where
    K: Eq + Hash,
{
    LockGuard {
        guard: Some(guard),
        lock: Some(lock),
        key,
        table: table.clone(),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_readers_share_writer_excludes() {
        let locks = Arc::new(CampaignLocks::new());
        let id = CampaignId::new();

        let first = locks.read(id).await;
        let second = locks.read(id).await;

        let writer = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.write(id).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!writer.is_finished());

        drop(first);
        drop(second);
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_campaigns_are_independent() {
        let locks = CampaignLocks::new();
        let _a = locks.write(CampaignId::new()).await;
        let _b = locks.write(CampaignId::new()).await;
        assert_eq!(locks.tracked(), (2, 0));
    }

    #[tokio::test]
    async fn test_case_lock_is_exclusive() {
        let locks = Arc::new(CampaignLocks::new());
        let case_id = CaseId::new();
        let guard = locks.case(case_id).await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.case(case_id).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
        assert_eq!(locks.tracked(), (0, 0));
    }

    #[tokio::test]
    async fn test_entries_are_evicted_after_last_guard() {
        let locks = CampaignLocks::new();
        let campaign_id = CampaignId::new();

        for _ in 0..10 {
            let _campaign = locks.read(campaign_id).await;
            let _case = locks.case(CaseId::new()).await;
        }
        assert_eq!(locks.tracked(), (0, 0));

        let first = locks.read(campaign_id).await;
        let second = locks.read(campaign_id).await;
        drop(first);
        assert_eq!(locks.tracked(), (1, 0));
        drop(second);
        assert_eq!(locks.tracked(), (0, 0));

        drop(locks.write(campaign_id).await);
        assert_eq!(locks.tracked(), (0, 0));
    }

    #[tokio::test]
    async fn test_waiter_keeps_entry_alive() {
        let locks = Arc::new(CampaignLocks::new());
        let case_id = CaseId::new();
        let guard = locks.case(case_id).await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.case(case_id).await;
                tokio::time::sleep(Duration::from_millis(20)).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(guard);
        assert_eq!(locks.tracked(), (0, 1));

        waiter.await.unwrap();
        assert_eq!(locks.tracked(), (0, 0));
    }
}
