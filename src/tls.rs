//! Thread-local-storage collaborator (§2 component 10, §4.10).
//!
//! A small key/value service the per-thread `World` storage strategy could
//! have been built on (in practice `World` uses `std::thread_local!`
//! directly, since its shape is known at compile time — see
//! `crate::world`); exposed here as its own type because demo code and
//! future collaborators need per-thread scratch storage keyed dynamically,
//! which a fixed `thread_local!` item can't provide.

use std::cell::Cell;
use std::ptr;

/// A process-wide key identifying one thread-local slot. Each thread that
/// touches a given key gets its own independent value, defaulting to null.
pub struct TlsKey {
    destructor: Option<fn(*mut u8)>,
}

thread_local! {
    static SLOTS: Cell<Vec<(usize, *mut u8, Option<fn(*mut u8)>)>> = Cell::new(Vec::new());
}

impl TlsKey {
    /// Creates a new key. `destructor`, if given, runs once on each thread
    /// that ever called [`TlsKey::set`] on this key, when that thread exits
    /// with a non-null value still stored.
    pub fn new(destructor: Option<fn(*mut u8)>) -> TlsKey {
        TlsKey { destructor }
    }

    fn id(&self) -> usize {
        self as *const TlsKey as usize
    }

    /// Reads this thread's value for this key, or `None` if never set (or
    /// set to null).
    pub fn get(&self) -> Option<*mut u8> {
        SLOTS.with(|cell| {
            let slots = cell.take();
            let found = slots.iter().find(|(id, _, _)| *id == self.id()).map(|(_, p, _)| *p);
            cell.set(slots);
            found.filter(|p| !p.is_null())
        })
    }

    /// Sets this thread's value for this key.
    pub fn set(&self, value: *mut u8) {
        SLOTS.with(|cell| {
            let mut slots = cell.take();
            match slots.iter_mut().find(|(id, _, _)| *id == self.id()) {
                Some(entry) => entry.1 = value,
                None => slots.push((self.id(), value, self.destructor)),
            }
            cell.set(slots);
        });
        // Arming `GUARD` is what makes its `Drop` run at thread exit (a
        // thread-local's drop glue only fires if the thread-local was
        // actually touched); a key with a destructor is useless unless
        // every `set` guarantees the guard is live (§4.10).
        GUARD.with(|_| {});
    }
}

// The destructor-on-exit hook (§4.10 "optional destructor on thread
// exit"): `SLOTS` itself is the thing whose drop glue runs at thread exit,
// so its value type carries the run-on-drop behavior directly rather than
// relying on a second thread-local guard.
struct SlotGuard;

impl Drop for SlotGuard {
    fn drop(&mut self) {
        SLOTS.with(|cell| {
            for (_, value, destructor) in cell.take() {
                if let (false, Some(d)) = (value.is_null(), destructor) {
                    d(value);
                }
            }
        });
    }
}

thread_local! {
    static GUARD: SlotGuard = const { SlotGuard };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_before_set_is_none() {
        let key = TlsKey::new(None);
        assert!(key.get().is_none());
    }

    #[test]
    fn set_then_get_round_trips() {
        let key = TlsKey::new(None);
        let mut value = 7u8;
        key.set(&mut value as *mut u8);
        assert_eq!(key.get(), Some(&mut value as *mut u8));
    }

    #[test]
    fn independent_keys_do_not_collide() {
        let a = TlsKey::new(None);
        let b = TlsKey::new(None);
        let mut va = 1u8;
        let mut vb = 2u8;
        a.set(&mut va as *mut u8);
        b.set(&mut vb as *mut u8);
        assert_eq!(a.get(), Some(&mut va as *mut u8));
        assert_eq!(b.get(), Some(&mut vb as *mut u8));
    }
}
