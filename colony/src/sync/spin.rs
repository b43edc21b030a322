use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;

use lock_api::{GuardSend, RawMutex};

/// Yield cap per contended round used by [`SpinLock`] unless overridden.
pub const DEFAULT_MAX_BACKOFF: u32 = 16;

/// Largest cap a [`SpinLock`] or [`Backoff`] may be instantiated with.
pub const MAX_BACKOFF_LIMIT: u32 = 1024;

const UNLOCKED: u32 = 0;
const LOCKED: u32 = 1;

/// A spin-based mutex that stays safe to use with `lock_api`.
pub type SpinMutex<T> = lock_api::Mutex<SpinLock, T>;

/// Guard returned by [`SpinMutex::lock`].
pub type SpinMutexGuard<'a, T> = lock_api::MutexGuard<'a, SpinLock, T>;

/// Exponential backoff between failed lock attempts.
///
/// Each call to [`snooze`](Backoff::snooze) yields the current step count to
/// the scheduler, then doubles the step up to `MAX`.
#[derive(Debug, Clone)]
pub struct Backoff<const MAX: u32 = DEFAULT_MAX_BACKOFF> {
    step: u32,
}

impl<const MAX: u32> Backoff<MAX> {
    const CAP_IS_BOUNDED: () = assert!(
        MAX >= 1 && MAX <= MAX_BACKOFF_LIMIT,
        "backoff cap must be between 1 and MAX_BACKOFF_LIMIT"
    );

    pub const fn new() -> Self {
        let () = Self::CAP_IS_BOUNDED;
        Self { step: 1 }
    }

    /// Number of yields the next [`snooze`](Backoff::snooze) will perform.
    pub fn step(&self) -> u32 {
        self.step
    }

    /// Yields `step` times and advances to the next round.
    ///
    /// Returns the number of yields performed, never more than `MAX`.
    pub fn snooze(&mut self) -> u32 {
        let yields = self.step;
        for _ in 0..yields {
            thread::yield_now();
        }
        if self.step < MAX {
            self.step = (self.step << 1).min(MAX);
        }
        yields
    }

    pub fn reset(&mut self) {
        self.step = 1;
    }
}

impl<const MAX: u32> Default for Backoff<MAX> {
    fn default() -> Self {
        Self::new()
    }
}

/// A compare-and-swap lock over a single word with bounded exponential backoff.
///
/// `lock()` retries a CAS from unlocked to locked, yielding to the scheduler
/// between attempts with a step count that doubles up to `MAX_BACKOFF`. It
/// never parks on an OS primitive, so it is only suitable for very short
/// critical sections such as counter updates or cache insertion. There is no
/// fairness guarantee and the lock is not reentrant: locking twice from the
/// same thread spins forever.
///
/// The raw type implements [`lock_api::RawMutex`], so it can back any
/// `lock_api` container; [`SpinMutex`] is the usual way to guard data with it.
///
/// # Examples
///
/// ```rust
/// use colony::sync::SpinMutex;
///
/// let counter = SpinMutex::new(0u64);
/// *counter.lock() += 1;
/// assert_eq!(*counter.lock(), 1);
/// ```
pub struct SpinLock<const MAX_BACKOFF: u32 = DEFAULT_MAX_BACKOFF> {
    state: AtomicU32,
}

impl<const MAX_BACKOFF: u32> SpinLock<MAX_BACKOFF> {
    /// Creates an unlocked spin lock.
    pub const fn new() -> Self {
        let () = Backoff::<MAX_BACKOFF>::CAP_IS_BOUNDED;
        Self {
            state: AtomicU32::new(UNLOCKED),
        }
    }

    /// Blocks the calling thread until it owns the lock.
    pub fn lock(&self) {
        self.lock_with(|_| {});
    }

    /// Acquisition loop; `on_round` sees the yield count of every failed round.
    fn lock_with(&self, mut on_round: impl FnMut(u32)) {
        let mut backoff = Backoff::<MAX_BACKOFF>::new();
        while self
            .state
            .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            on_round(backoff.snooze());
        }
    }

    /// Makes a single acquisition attempt.
    pub fn try_lock(&self) -> bool {
        self.state
            .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Releases the lock.
    ///
    /// The state is reset unconditionally; no ownership check is performed.
    ///
    /// # Safety
    ///
    /// The caller must hold the lock through a matching successful
    /// [`lock`](SpinLock::lock) or [`try_lock`](SpinLock::try_lock). Calling
    /// this otherwise may release a lock held by another thread.
    pub unsafe fn unlock(&self) {
        self.state.store(UNLOCKED, Ordering::Release);
    }

    pub fn is_locked(&self) -> bool {
        self.state.load(Ordering::Relaxed) == LOCKED
    }
}

impl<const MAX_BACKOFF: u32> Default for SpinLock<MAX_BACKOFF> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const MAX_BACKOFF: u32> std::fmt::Debug for SpinLock<MAX_BACKOFF> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpinLock")
            .field("locked", &self.is_locked())
            .field("max_backoff", &MAX_BACKOFF)
            .finish()
    }
}

unsafe impl<const MAX_BACKOFF: u32> RawMutex for SpinLock<MAX_BACKOFF> {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = Self::new();

    type GuardMarker = GuardSend;

    fn lock(&self) {
        Self::lock(self)
    }

    fn try_lock(&self) -> bool {
        Self::try_lock(self)
    }

    unsafe fn unlock(&self) {
        // SAFETY: lock_api only calls this while the lock is held.
        unsafe { Self::unlock(self) }
    }

    fn is_locked(&self) -> bool {
        Self::is_locked(self)
    }
}

/// Creates an unlocked spin lock as an opaque raw mutex.
pub fn new_spin_lock() -> impl RawMutex + Send + Sync {
    SpinLock::<DEFAULT_MAX_BACKOFF>::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU64};
    use std::time::{Duration, Instant};

    #[test]
    fn test_mutual_exclusion_with_raw_lock() {
        const THREADS: u64 = 8;
        const ROUNDS: u64 = 2_000;

        let lock = SpinLock::<DEFAULT_MAX_BACKOFF>::new();
        // Split load/store is only correct if the lock serializes the updates.
        let counter = AtomicU64::new(0);

        thread::scope(|s| {
            for _ in 0..THREADS {
                s.spawn(|| {
                    for _ in 0..ROUNDS {
                        lock.lock();
                        let value = counter.load(Ordering::Relaxed);
                        counter.store(value + 1, Ordering::Relaxed);
                        unsafe { lock.unlock() };
                    }
                });
            }
        });

        assert_eq!(counter.load(Ordering::Relaxed), THREADS * ROUNDS);
        assert!(!lock.is_locked());
    }

    #[test]
    fn test_mutual_exclusion_with_spin_mutex() {
        let counter = SpinMutex::new(0usize);

        thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..1_000 {
                        *counter.lock() += 1;
                    }
                });
            }
        });

        assert_eq!(counter.into_inner(), 4_000);
    }

    #[test]
    fn test_single_thread_single_round() {
        let lock = SpinLock::<DEFAULT_MAX_BACKOFF>::new();
        lock.lock();
        assert!(lock.is_locked());
        unsafe { lock.unlock() };
        assert!(!lock.is_locked());
    }

    #[test]
    fn test_backoff_doubles_up_to_cap() {
        let mut backoff = Backoff::<DEFAULT_MAX_BACKOFF>::new();
        let rounds: Vec<u32> = (0..8).map(|_| backoff.snooze()).collect();
        assert_eq!(rounds, vec![1, 2, 4, 8, 16, 16, 16, 16]);
        assert!(rounds.iter().all(|&yields| yields <= DEFAULT_MAX_BACKOFF));

        backoff.reset();
        assert_eq!(backoff.step(), 1);
    }

    #[test]
    fn test_backoff_cap_not_power_of_two() {
        let mut backoff = Backoff::<5>::new();
        let rounds: Vec<u32> = (0..5).map(|_| backoff.snooze()).collect();
        assert_eq!(rounds, vec![1, 2, 4, 5, 5]);
    }

    #[test]
    fn test_try_lock() {
        let lock = SpinLock::<4>::new();
        assert!(lock.try_lock());
        assert!(!lock.try_lock());
        unsafe { lock.unlock() };
        assert!(lock.try_lock());
        unsafe { lock.unlock() };
    }

    #[test]
    fn test_contended_locker_backs_off_until_unlock() {
        let lock = SpinLock::<DEFAULT_MAX_BACKOFF>::new();
        let rounds = std::sync::Mutex::new(Vec::new());
        let acquired = AtomicBool::new(false);

        lock.lock();
        thread::scope(|s| {
            s.spawn(|| {
                lock.lock_with(|yields| rounds.lock().unwrap().push(yields));
                acquired.store(true, Ordering::SeqCst);
                unsafe { lock.unlock() };
            });

            // Hold the lock until the contender has failed three rounds.
            let deadline = Instant::now() + Duration::from_secs(5);
            while rounds.lock().unwrap().len() < 3 && Instant::now() < deadline {
                thread::yield_now();
            }
            assert!(rounds.lock().unwrap().len() >= 3);
            assert!(!acquired.load(Ordering::SeqCst));
            assert!(lock.is_locked());

            unsafe { lock.unlock() };
        });

        assert!(acquired.load(Ordering::SeqCst));
        assert!(!lock.is_locked());
        let rounds = rounds.into_inner().unwrap();
        assert_eq!(&rounds[..3], &[1, 2, 4]);
        // Later rounds keep doubling until the cap.
        for pair in rounds.windows(2) {
            assert_eq!(pair[1], (pair[0] * 2).min(DEFAULT_MAX_BACKOFF));
        }
    }

    #[test]
    fn test_unbalanced_unlock_resets_state() {
        let lock = SpinLock::<DEFAULT_MAX_BACKOFF>::new();
        // Documented hazard: nothing checks who holds the lock.
        unsafe { lock.unlock() };
        assert!(!lock.is_locked());

        lock.lock();
        unsafe { lock.unlock() };
        unsafe { lock.unlock() };
        assert!(lock.try_lock());
        unsafe { lock.unlock() };
    }

    #[test]
    fn test_opaque_constructor_is_a_raw_mutex() {
        fn exercise<L: RawMutex>(lock: &L) {
            lock.lock();
            assert!(lock.is_locked());
            assert!(!lock.try_lock());
            unsafe { lock.unlock() };
            assert!(!lock.is_locked());
        }

        exercise(&new_spin_lock());
    }

    #[test]
    fn test_debug_format() {
        let lock = SpinLock::<8>::default();
        let rendered = format!("{:?}", lock);
        assert!(rendered.contains("locked: false"));
        assert!(rendered.contains("max_backoff: 8"));
    }
}
