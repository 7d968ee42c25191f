//! Lock primitives for the sharded caches.
//!
//! Shards are guarded by [`lock_api::Mutex<L, _>`](parking_lot::lock_api::Mutex),
//! so any [`RawMutex`] can serve as the shard lock. Two are provided:
//!
//! | Lock         | Contention behaviour                        | Best for                          |
//! |--------------|---------------------------------------------|-----------------------------------|
//! | [`SpinLock`] | busy-waits on an atomic flag                | short critical sections, many shards |
//! | [`OsMutex`]  | spins briefly, then parks the thread        | long-held locks, oversubscribed CPUs |
//!
//! Neither lock is fair and neither supports timeouts. Guards release the
//! lock on drop, including while unwinding.

use std::hint;
use std::sync::atomic::{AtomicBool, Ordering};

pub use parking_lot::lock_api::RawMutex;
use parking_lot::lock_api::GuardSend;

/// Parking mutex from `parking_lot`.
pub type OsMutex = parking_lot::RawMutex;

/// Test-and-test-and-set spin lock.
///
/// `lock` swaps the flag in with acquire ordering; while another thread
/// holds it, waiters spin on relaxed loads so the cache line stays shared
/// until the holder releases.
///
/// ```
/// use shardcache::lock::SpinLock;
/// use parking_lot::lock_api::Mutex;
///
/// let counter: Mutex<SpinLock, u64> = Mutex::new(0);
/// *counter.lock() += 1;
/// assert_eq!(*counter.lock(), 1);
/// ```
#[derive(Debug, Default)]
pub struct SpinLock {
    locked: AtomicBool,
}

unsafe impl RawMutex for SpinLock {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = SpinLock {
        locked: AtomicBool::new(false),
    };

    type GuardMarker = GuardSend;

    #[inline]
    fn lock(&self) {
        while self.locked.swap(true, Ordering::Acquire) {
            while self.locked.load(Ordering::Relaxed) {
                hint::spin_loop();
            }
        }
    }

    #[inline]
    fn try_lock(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    #[inline]
    unsafe fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }

    #[inline]
    fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}
