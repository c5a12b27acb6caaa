use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use lesson_core::model::{BankId, LessonNumber};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, OwnedRwLockReadGuard, RwLock, TryLockError};

/// Per-bank and per-lesson write coordination.
///
/// Whole-bank rewrites (generation, finalize) take the bank lock exclusively.
/// Attempts take it shared without waiting, then queue on the lesson mutex,
/// so two attempts on one lesson never interleave their read-modify-write.
///
/// Entries nobody holds or awaits are pruned on every lookup, so the maps only
/// hold locks that are in use plus those released since the last lookup.
#[derive(Default)]
pub struct BankLocks {
    banks: Mutex<HashMap<BankId, Arc<RwLock<()>>>>,
    lessons: Mutex<HashMap<(BankId, LessonNumber), Arc<AsyncMutex<()>>>>,
}

impl BankLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The bank's lock, created on first use.
    #[must_use]
    pub fn bank(&self, bank_id: BankId) -> Arc<RwLock<()>> {
        let mut banks = self.banks.lock().unwrap_or_else(PoisonError::into_inner);
        prune(&mut banks);
        Arc::clone(banks.entry(bank_id).or_default())
    }

    /// Shared bank access, failing instead of waiting when a writer holds or
    /// awaits the lock.
    ///
    /// # Errors
    ///
    /// Returns `TryLockError` while a whole-bank rewrite is pending.
    pub fn try_share_bank(
        &self,
        bank_id: BankId,
    ) -> Result<OwnedRwLockReadGuard<()>, TryLockError> {
        self.bank(bank_id).try_read_owned()
    }

    /// Waits for exclusive access to one lesson.
    pub async fn lock_lesson(&self, bank_id: BankId, number: LessonNumber) -> OwnedMutexGuard<()> {
        let lesson = {
            let mut lessons = self.lessons.lock().unwrap_or_else(PoisonError::into_inner);
            prune(&mut lessons);
            Arc::clone(lessons.entry((bank_id, number)).or_default())
        };
        lesson.lock_owned().await
    }
}

/// Drops entries whose only reference is the map itself.
fn prune<K, L>(map: &mut HashMap<K, Arc<L>>) {
    map.retain(|_, lock| Arc::strong_count(lock) > 1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shared_access_fails_while_bank_is_written() {
        let locks = BankLocks::new();
        let bank = BankId::new(7);

        let writer = locks.bank(bank).write_owned().await;
        assert!(locks.try_share_bank(bank).is_err());
        drop(writer);
        assert!(locks.try_share_bank(bank).is_ok());
    }

    fn tracked(locks: &BankLocks) -> (usize, usize) {
        let banks = locks.banks.lock().unwrap().len();
        let lessons = locks.lessons.lock().unwrap().len();
        (banks, lessons)
    }

    #[tokio::test]
    async fn released_locks_are_pruned() {
        let locks = BankLocks::new();
        for raw in 0..50 {
            let bank = BankId::new(raw);
            let _shared = locks.try_share_bank(bank).unwrap();
            let _lesson = locks.lock_lesson(bank, LessonNumber::DIAGNOSTIC).await;
        }

        let held = locks.lock_lesson(BankId::new(99), LessonNumber::new(2)).await;
        let _writer = locks.bank(BankId::new(99)).write_owned().await;
        assert_eq!(tracked(&locks), (1, 1));

        // a held lock survives pruning
        let _other = locks.try_share_bank(BankId::new(100));
        let _next = locks.lock_lesson(BankId::new(100), LessonNumber::DIAGNOSTIC).await;
        assert_eq!(tracked(&locks), (2, 2));
        drop(held);
    }

    #[tokio::test]
    async fn banks_are_independent() {
        let locks = BankLocks::new();
        let _writer = locks.bank(BankId::new(1)).write_owned().await;
        assert!(locks.try_share_bank(BankId::new(2)).is_ok());
    }

    #[tokio::test]
    async fn lesson_lock_is_exclusive() {
        let locks = Arc::new(BankLocks::new());
        let bank = BankId::new(3);
        let guard = locks.lock_lesson(bank, LessonNumber::DIAGNOSTIC).await;

        let waiting = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.lock_lesson(bank, LessonNumber::DIAGNOSTIC).await;
            })
        };
        tokio::task::yield_now().await;
        assert!(!waiting.is_finished());

        // other lessons are not blocked
        let _other = locks.lock_lesson(bank, LessonNumber::new(1)).await;

        drop(guard);
        waiting.await.unwrap();
    }
}
