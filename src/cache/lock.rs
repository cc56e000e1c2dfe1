//! Poison-tolerant lock access.
//!
//! The cache never holds a std lock across an `.await`, so a poisoned lock
//! only means another thread panicked mid-update. The local tier is a cache,
//! so serving possibly stale state beats propagating the panic.

use std::sync::{LockResult, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

fn recover<G>(result: LockResult<G>, owner: &'static str, op: &'static str, kind: &str) -> G {
    result.unwrap_or_else(|poisoned| {
        warn!(
            op,
            owner,
            lock_kind = kind,
            result = "poisoned_recovered",
            "Recovered from poisoned cache lock"
        );
        poisoned.into_inner()
    })
}

pub(crate) fn read_guard<'a, T>(
    lock: &'a RwLock<T>,
    owner: &'static str,
    op: &'static str,
) -> RwLockReadGuard<'a, T> {
    recover(lock.read(), owner, op, "rwlock.read")
}

pub(crate) fn write_guard<'a, T>(
    lock: &'a RwLock<T>,
    owner: &'static str,
    op: &'static str,
) -> RwLockWriteGuard<'a, T> {
    recover(lock.write(), owner, op, "rwlock.write")
}

pub(crate) fn mutex_guard<'a, T>(
    lock: &'a Mutex<T>,
    owner: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    recover(lock.lock(), owner, op, "mutex.lock")
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use super::*;

    #[test]
    fn write_guard_recovers_after_panic() {
        let lock = RwLock::new(1_u32);

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = lock.write().expect("fresh lock");
            panic!("poison the lock");
        }));

        *write_guard(&lock, "test", "write") += 1;
        assert_eq!(*read_guard(&lock, "test", "read"), 2);
    }

    #[test]
    fn mutex_guard_recovers_after_panic() {
        let lock = Mutex::new(Vec::<u8>::new());

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = lock.lock().expect("fresh mutex");
            panic!("poison the mutex");
        }));

        mutex_guard(&lock, "test", "push").push(7);
        assert_eq!(mutex_guard(&lock, "test", "len").len(), 1);
    }
}
