//! Mutex: plain, recursive, and timed variants (§2 component 5, §4.5).

use core::cell::Cell;
use core::ptr;

use crate::coroutine::yield_now;
use crate::record::{CoroutineRecord, Passed};
use crate::status::Status;
use crate::time::Timestamp;

/// Selects mutex behavior; the two flags may be combined (§4.5).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct MutexKind {
    bits: u8,
}

impl MutexKind {
    const RECURSIVE: u8 = 0b01;
    const TIMED: u8 = 0b10;

    pub const PLAIN: MutexKind = MutexKind { bits: 0 };
    pub const RECURSIVE_KIND: MutexKind = MutexKind { bits: Self::RECURSIVE };
    pub const TIMED_KIND: MutexKind = MutexKind { bits: Self::TIMED };
    pub const RECURSIVE_TIMED: MutexKind = MutexKind { bits: Self::RECURSIVE | Self::TIMED };

    pub fn is_recursive(self) -> bool {
        self.bits & Self::RECURSIVE != 0
    }

    pub fn is_timed(self) -> bool {
        self.bits & Self::TIMED != 0
    }
}

/// A mutex coordinating coroutines on one host thread (§4.5).
///
/// Not `Sync`: like every other primitive in this crate, a mutex is only
/// ever touched by coroutines of the single host thread that created it
/// (§5 "shared-resource policy").
pub struct Mutex {
    kind: MutexKind,
    owner: Cell<*mut CoroutineRecord>,
    level: Cell<u32>,
    /// The last value a contending `lock`/`timedlock` caller received back
    /// from its retry `yield(Blocked)`, for the caller to inspect (§4.5
    /// "last-yield-value capture").
    last_yield_value: Cell<Passed>,
}

impl Mutex {
    pub fn new(kind: MutexKind) -> Self {
        Mutex {
            kind,
            owner: Cell::new(ptr::null_mut()),
            level: Cell::new(0),
            last_yield_value: Cell::new(Passed::Nothing),
        }
    }

    fn current(&self) -> *mut CoroutineRecord {
        crate::world::with_world(|world| world.running.get())
    }

    /// Non-blocking acquisition attempt (§4.5 "trylock is the decision
    /// primitive").
    pub fn trylock(&self) -> Status {
        let me = self.current();
        let owner = self.owner.get();
        if owner.is_null() {
            self.owner.set(me);
            self.level.set(1);
            return Status::Success;
        }
        if owner == me {
            if self.kind.is_recursive() {
                self.level.set(self.level.get() + 1);
                return Status::Success;
            }
            log::warn!("mutex trylock: non-recursive re-entry by owner");
            return Status::Error;
        }
        Status::Busy
    }

    /// Blocks until acquired, retrying `trylock` with `yield(Blocked)`
    /// between attempts (§4.5).
    pub fn lock(&self) -> Status {
        loop {
            match self.trylock() {
                Status::Success => return Status::Success,
                Status::Error => return Status::Error,
                _ => {
                    let yielded = yield_now(Passed::Blocked);
                    self.last_yield_value.set(yielded);
                }
            }
        }
    }

    /// Like [`lock`](Self::lock), but gives up with `Status::TimedOut` once
    /// the monotonic clock passes `deadline` (§4.5). Requires the `Timed`
    /// flag.
    pub fn timedlock(&self, deadline: Timestamp) -> Status {
        if !self.kind.is_timed() {
            log::warn!("timedlock called on a mutex without the Timed flag");
            return Status::Error;
        }
        loop {
            match self.trylock() {
                Status::Success => return Status::Success,
                Status::Error => return Status::Error,
                _ => {
                    // Check the deadline against the *failed* attempt before
                    // retrying, so an already-past deadline returns
                    // `TimedOut` without ever yielding (§8 boundary
                    // behavior).
                    match crate::time::now() {
                        Ok(now) if now.is_past(&deadline) => return Status::TimedOut,
                        Ok(_) => {}
                        Err(_) => {
                            log::warn!("timedlock: monotonic clock unavailable");
                            return Status::Error;
                        }
                    }
                    let yielded = yield_now(Passed::Blocked);
                    self.last_yield_value.set(yielded);
                }
            }
        }
    }

    /// Releases one level of ownership; fully releases when the recursion
    /// level reaches zero (§4.5). Non-owner unlock is `Status::Error`.
    pub fn unlock(&self) -> Status {
        let me = self.current();
        if self.owner.get() != me {
            log::warn!("unlock called by a coroutine that does not own this mutex");
            return Status::Error;
        }
        let remaining = self.level.get() - 1;
        if remaining == 0 {
            self.owner.set(ptr::null_mut());
            self.level.set(0);
        } else {
            self.level.set(remaining);
        }
        Status::Success
    }

    /// The value stored by the most recent contended `lock`/`timedlock`
    /// retry, for callers that want to inspect what they were yielded while
    /// waiting.
    pub fn last_yield_value(&self) -> Passed {
        self.last_yield_value.get()
    }

    pub(crate) fn owner(&self) -> *mut CoroutineRecord {
        self.owner.get()
    }

    /// Used by [`crate::coroutine::terminate`]: if `who` currently owns
    /// this mutex, forcibly clears ownership regardless of recursion level
    /// (§4.8 "forcibly release").
    pub(crate) fn force_release_if_owned_by(&self, who: *mut CoroutineRecord) {
        if self.owner.get() == who {
            self.owner.set(ptr::null_mut());
            self.level.set(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_mutex_rejects_reentry() {
        let m = Mutex::new(MutexKind::PLAIN);
        // Simulate ownership directly; exercising the full coroutine path
        // is covered by `tests/scenarios.rs`.
        m.owner.set(m.current());
        m.level.set(1);
        assert_eq!(m.trylock(), Status::Error);
    }

    #[test]
    fn recursive_mutex_allows_reentry() {
        let m = Mutex::new(MutexKind::RECURSIVE_KIND);
        m.owner.set(m.current());
        m.level.set(1);
        assert_eq!(m.trylock(), Status::Success);
        assert_eq!(m.level.get(), 2);
    }

    #[test]
    fn unlock_by_non_owner_is_error() {
        let m = Mutex::new(MutexKind::PLAIN);
        m.owner.set(ptr::null_mut());
        // current() is the host record, which is never the owner here.
        m.owner.set(0x1 as *mut CoroutineRecord);
        assert_eq!(m.unlock(), Status::Error);
    }
}
