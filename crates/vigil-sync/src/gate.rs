//! Counting admission gate bounding concurrent transfers.
//!
//! A transfer must hold an [`AdmissionPermit`] for its whole lifetime. The
//! permit is released on drop, so a transfer that fails or panics still frees
//! its slot.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct State {
    available: usize,
    peak: usize,
}

/// Fixed-capacity blocking semaphore.
#[derive(Debug)]
pub struct AdmissionGate {
    capacity: usize,
    state: Mutex<State>,
    cv: Condvar,
}

impl AdmissionGate {
    /// Creates a gate admitting at most `capacity` holders at once.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "admission gate capacity must be > 0");
        Self {
            capacity,
            state: Mutex::new(State {
                available: capacity,
                peak: 0,
            }),
            cv: Condvar::new(),
        }
    }

    /// A poisoned lock only means another holder panicked; the counters are
    /// still consistent because every update happens under the lock.
    fn lock_or_recover(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until a slot is free and takes it.
    pub fn acquire(&self) -> AdmissionPermit<'_> {
        let mut state = self.lock_or_recover();
        while state.available == 0 {
            state = self.cv.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        state.available -= 1;
        let in_use = self.capacity - state.available;
        state.peak = state.peak.max(in_use);
        AdmissionPermit { gate: self }
    }

    /// Highest number of permits held at the same time so far.
    #[must_use]
    pub fn peak(&self) -> usize {
        self.lock_or_recover().peak
    }

    fn release(&self) {
        let mut state = self.lock_or_recover();
        debug_assert!(state.available < self.capacity, "permit over-released");
        state.available += 1;
        drop(state);
        self.cv.notify_one();
    }
}

/// One admitted slot, released on drop.
#[derive(Debug)]
pub struct AdmissionPermit<'a> {
    gate: &'a AdmissionGate,
}

impl Drop for AdmissionPermit<'_> {
    fn drop(&mut self) {
        self.gate.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn permits_are_released_on_drop() {
        let gate = AdmissionGate::new(2);
        let a = gate.acquire();
        let b = gate.acquire();
        assert_eq!(gate.peak(), 2);
        drop(a);
        drop(b);

        // Both slots are free again; a leak would block here.
        let _c = gate.acquire();
        let _d = gate.acquire();
        assert_eq!(gate.peak(), 2);
    }

    #[test]
    fn blocked_acquire_resumes_after_release() {
        let gate = AdmissionGate::new(1);
        let held = gate.acquire();
        thread::scope(|s| {
            let waiter = s.spawn(|| {
                let _permit = gate.acquire();
            });
            thread::sleep(Duration::from_millis(20));
            assert!(!waiter.is_finished());
            drop(held);
        });
        let _again = gate.acquire();
        assert_eq!(gate.peak(), 1);
    }

    #[test]
    fn never_exceeds_capacity() {
        let gate = AdmissionGate::new(3);
        let running = AtomicUsize::new(0);
        let max_seen = AtomicUsize::new(0);

        thread::scope(|s| {
            for _ in 0..16 {
                s.spawn(|| {
                    let _permit = gate.acquire();
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(5));
                    running.fetch_sub(1, Ordering::SeqCst);
                });
            }
        });

        assert!(max_seen.load(Ordering::SeqCst) <= 3);
        assert!((1..=3).contains(&gate.peak()));
    }

    #[test]
    #[should_panic(expected = "capacity must be > 0")]
    fn zero_capacity_panics() {
        let _ = AdmissionGate::new(0);
    }
}
