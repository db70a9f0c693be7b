//! Condition variable: FIFO waiter queue, signal/broadcast, wait/timedwait
//! (§2 component 6, §4.6).

use core::cell::Cell;
use core::ptr;

use crate::coroutine::yield_now;
use crate::mutex::Mutex;
use crate::record::{CoroutineRecord, Passed};
use crate::status::Status;
use crate::time::Timestamp;

/// Sentinel `numSignals` value marking a destroyed condition variable
/// (§4.6 `destroy`).
const DESTROYED: i64 = -1;

/// A condition variable coordinating coroutines on one host thread (§4.6).
pub struct Condvar {
    num_waiters: Cell<i64>,
    num_signals: Cell<i64>,
    waiters_head: Cell<*mut CoroutineRecord>,
    waiters_tail: Cell<*mut CoroutineRecord>,
    last_yield_value: Cell<Passed>,
}

impl Condvar {
    pub fn new() -> Self {
        Condvar {
            num_waiters: Cell::new(0),
            num_signals: Cell::new(0),
            waiters_head: Cell::new(ptr::null_mut()),
            waiters_tail: Cell::new(ptr::null_mut()),
            last_yield_value: Cell::new(Passed::Nothing),
        }
    }

    fn current() -> *mut CoroutineRecord {
        crate::world::with_world(|world| world.running.get())
    }

    fn enqueue_self(&self) {
        let me = Self::current();
        unsafe {
            (*me).next_to_signal.set(ptr::null_mut());
            (*me).prev_to_signal.set(self.waiters_tail.get());
        }
        if self.waiters_tail.get().is_null() {
            self.waiters_head.set(me);
        } else {
            unsafe { (*self.waiters_tail.get()).next_to_signal.set(me) };
        }
        self.waiters_tail.set(me);
        self.num_waiters.set(self.num_waiters.get() + 1);
    }

    /// Blocks the caller (which must already own `mtx`) until signaled
    /// (§4.6).
    pub fn wait(&self, mtx: &Mutex) -> Status {
        self.wait_impl(mtx, None)
    }

    /// Like [`wait`](Self::wait), but returns `Status::TimedOut` once the
    /// monotonic clock passes `deadline` (§4.6).
    pub fn timedwait(&self, mtx: &Mutex, deadline: Timestamp) -> Status {
        self.wait_impl(mtx, Some(deadline))
    }

    fn wait_impl(&self, mtx: &Mutex, deadline: Option<Timestamp>) -> Status {
        mtx.unlock();
        self.enqueue_self();

        let status = loop {
            if self.num_signals.get() == DESTROYED {
                break Status::Error;
            }
            // Only the FIFO head may consume a pending signal: the
            // scheduler is free to dispatch a non-head waiter first (§5),
            // but `signal`'s "wake the oldest waiter first" guarantee (§8
            // invariant 6) would break if whichever waiter happens to run
            // next could steal it. A non-head waiter just keeps yielding.
            if self.num_signals.get() > 0 && Self::current() == self.waiters_head.get() {
                self.num_signals.set(self.num_signals.get() - 1);
                self.num_waiters.set(self.num_waiters.get() - 1);
                self.remove_waiter(Self::current());
                break Status::Success;
            }
            let yielded = yield_now(Passed::Blocked);
            self.last_yield_value.set(yielded);

            if let Some(deadline) = deadline {
                match crate::time::now() {
                    Ok(now) if now.is_past(&deadline) => {
                        self.num_waiters.set(self.num_waiters.get() - 1);
                        self.remove_waiter(Self::current());
                        break Status::TimedOut;
                    }
                    Ok(_) => {}
                    Err(_) => {
                        log::warn!("timedwait: monotonic clock unavailable");
                        break Status::Error;
                    }
                }
            }
        };

        // Reacquire the mutex regardless of outcome (§7 "resources acquired
        // before a failure ... are rolled back by reacquiring the mutex on
        // exit regardless of the success/error outcome").
        let relock_status = mtx.lock();
        if status == Status::Success {
            relock_status
        } else {
            status
        }
    }

    /// Unlinks `who` from the waiter FIFO, wherever in the queue it sits,
    /// clearing its links and preserving order for everyone else (§9
    /// "cyclic back-references ... cleared on dequeue"). Used both for the
    /// normal case (the head consuming its own signal) and for a waiter
    /// that leaves out of order (a timed-out wait).
    fn remove_waiter(&self, who: *mut CoroutineRecord) {
        unsafe {
            let prev = (*who).prev_to_signal.get();
            let next = (*who).next_to_signal.get();
            if prev.is_null() {
                self.waiters_head.set(next);
            } else {
                (*prev).next_to_signal.set(next);
            }
            if next.is_null() {
                self.waiters_tail.set(prev);
            } else {
                (*next).prev_to_signal.set(prev);
            }
            (*who).next_to_signal.set(ptr::null_mut());
            (*who).prev_to_signal.set(ptr::null_mut());
        }
    }

    /// Wakes the oldest waiter (§4.6).
    pub fn signal(&self) {
        if self.num_signals.get() == DESTROYED {
            return;
        }
        self.num_signals.set(self.num_signals.get() + 1);
        log::trace!("condvar: signaled one waiter");
    }

    /// Wakes every waiter currently queued (§4.6, §9 Open Question 2:
    /// "new wait arrivals between a broadcast call and the waking of all
    /// existing waiters join as fresh waiters" — snapshotting `numWaiters`
    /// here rather than letting later arrivals inflate `numSignals` is what
    /// enforces that).
    pub fn broadcast(&self) {
        if self.num_signals.get() == DESTROYED {
            return;
        }
        self.num_signals.set(self.num_waiters.get());
        log::trace!("condvar: broadcast to all current waiters");
    }

    /// Marks this condition variable destroyed; any coroutine still waiting
    /// observes the sentinel and returns `Status::Error` (§4.6).
    pub fn destroy(&self) {
        self.num_signals.set(DESTROYED);
        log::debug!("condvar: destroyed");
    }

    pub fn last_yield_value(&self) -> Passed {
        self.last_yield_value.get()
    }
}

impl Default for Condvar {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutex::MutexKind;

    #[test]
    fn signal_increments_by_one() {
        let cv = Condvar::new();
        cv.num_waiters.set(2);
        cv.signal();
        assert_eq!(cv.num_signals.get(), 1);
    }

    #[test]
    fn broadcast_snapshots_current_waiter_count() {
        let cv = Condvar::new();
        cv.num_waiters.set(3);
        cv.broadcast();
        assert_eq!(cv.num_signals.get(), 3);
        // A later arrival bumping numWaiters must not retroactively change
        // the signals already granted to existing waiters.
        cv.num_waiters.set(4);
        assert_eq!(cv.num_signals.get(), 3);
    }

    #[test]
    fn destroy_sets_sentinel() {
        let cv = Condvar::new();
        cv.destroy();
        assert_eq!(cv.num_signals.get(), DESTROYED);
        // Further signals/broadcasts are no-ops once destroyed.
        cv.signal();
        assert_eq!(cv.num_signals.get(), DESTROYED);
    }

    #[test]
    fn mutex_kind_combination_is_available_for_timed_wait() {
        let _ = MutexKind::RECURSIVE_TIMED;
    }
}
