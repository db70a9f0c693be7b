//! The per-thread world (§2 component 3, §4.2, §5 "shared-resource policy").
//!
//! Storage strategy is a compile-time choice between one process-global
//! instance (`single-core`) and one instance per host thread via
//! `std::thread_local!` (`thread-safe`, the default) — mirroring the
//! teacher lineage's own split between a globally-shared scheduler and a
//! per-thread one. Within the `thread-safe` build there is additionally a
//! *runtime* toggle (§5, §6 `set_threading_support_enabled`) that decides,
//! once and for the life of the process, whether new worlds actually use
//! thread-local storage or fall back to a single shared instance — this
//! lets a consumer link the `thread-safe` feature (to keep the option open)
//! while still running single-threaded with `single-core`-like overhead.

use core::cell::Cell;
use core::ptr;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::record::{CoroutineRecord, Passed};
use crate::status::Status;

/// The bundle every coroutine operation reads and mutates (§3, §5).
pub(crate) struct World {
    /// The host thread's own distinguished record; never parked on a list,
    /// never reused (§3 "first coroutine"). A `Cell` only because
    /// `configure` may swap in a caller-supplied record before the first
    /// coroutine is created; it is fixed for the remainder of the thread's
    /// life after that.
    pub(crate) first: Cell<*mut CoroutineRecord>,
    /// LIFO of coroutines currently executing or suspended inside an
    /// outstanding `resume`; head is the active coroutine. Linked through
    /// each record's own `next` field, the same field `idle` uses, since a
    /// record is a member of at most one list at a time.
    pub(crate) running: Cell<*mut CoroutineRecord>,
    /// LIFO of parked, reusable coroutine records.
    pub(crate) idle: Cell<*mut CoroutineRecord>,
    /// Single-slot value-passing channel (§4.2).
    pub(crate) scratch: Cell<Passed>,
    /// Configured stack size for coroutines carved on this thread.
    pub(crate) stack_size: Cell<usize>,
    /// Set once the first coroutine has been created on this thread;
    /// `configure` after this point is rejected with `Busy` (§4.1, §6).
    pub(crate) configured: Cell<bool>,
}

impl World {
    fn new(first: *mut CoroutineRecord) -> Self {
        // The host record starts as the sole, bottom-most entry of
        // `running`; its own `next` stays null forever, which is why it is
        // documented as exempt from the general "non-null next means on a
        // list" invariant (§3) — nothing ever externally `resume`s the host
        // record, so the exemption is never observable.
        World {
            first: Cell::new(first),
            running: Cell::new(first),
            idle: Cell::new(ptr::null_mut()),
            scratch: Cell::new(Passed::Nothing),
            stack_size: Cell::new(crate::config::DEFAULT_STACK_SIZE),
            configured: Cell::new(false),
        }
    }

    /// Pushes `rec` onto the running list, making it the active coroutine.
    pub(crate) fn push_running(&self, rec: *mut CoroutineRecord) {
        unsafe {
            (*rec).next.set(self.running.get());
        }
        self.running.set(rec);
    }

    /// Pops and returns the current head of the running list, clearing its
    /// `next` link so it becomes externally resumable again.
    pub(crate) fn pop_running(&self) -> *mut CoroutineRecord {
        let head = self.running.get();
        debug_assert!(!head.is_null(), "running list must never be empty");
        unsafe {
            self.running.set((*head).next.get());
            (*head).next.set(ptr::null_mut());
        }
        head
    }

    /// Pushes `rec` onto the idle list.
    pub(crate) fn push_idle(&self, rec: *mut CoroutineRecord) {
        unsafe {
            (*rec).next.set(self.idle.get());
        }
        self.idle.set(rec);
    }

    /// Pops the head of the idle list, or null if empty.
    pub(crate) fn pop_idle(&self) -> *mut CoroutineRecord {
        let head = self.idle.get();
        if head.is_null() {
            return ptr::null_mut();
        }
        unsafe {
            self.idle.set((*head).next.get());
            (*head).next.set(ptr::null_mut());
        }
        head
    }
}

/// Process-wide threading toggle (§5, §6). Must be set before any
/// coroutine is created anywhere in the process; read-mostly thereafter, so
/// `Relaxed` is enough — there is no data it needs to synchronize-with,
/// only itself.
static THREADING_ENABLED: AtomicBool = AtomicBool::new(cfg!(feature = "thread-safe"));

/// Any coroutine world touched anywhere in the process pins the toggle
/// (§5: "the switch must be toggled before the first coroutine is created
/// on any thread").
static ANY_WORLD_TOUCHED: AtomicBool = AtomicBool::new(false);

/// Runtime switch choosing thread-local vs. process-global world storage
/// (§6 `set_threading_support_enabled`).
///
/// Returns `Status::Busy` if a coroutine world has already been touched
/// anywhere in the process; the switch is otherwise immutable forever
/// after (§9 "Globals vs. thread-local storage").
#[cfg(feature = "thread-safe")]
pub fn set_threading_support_enabled(enabled: bool) -> Status {
    if ANY_WORLD_TOUCHED.load(Ordering::Acquire) {
        log::warn!("set_threading_support_enabled called after a world was already in use");
        return Status::Busy;
    }
    THREADING_ENABLED.store(enabled, Ordering::Release);
    Status::Success
}

#[cfg(feature = "single-core")]
pub fn set_threading_support_enabled(_enabled: bool) -> Status {
    log::warn!("set_threading_support_enabled has no effect in a single-core build");
    Status::Error
}

// `World`'s fields are all `Cell`s specifically so `with_world` can hand out
// a plain `&World` — never a `RefCell` borrow — even though stack carving
// and context switches mean a single logical call chain into `with_world`
// can stay "open" (never normally returning) while other coroutines make
// their own nested calls into it on the same thread. A `RefCell` borrow
// guard would see that as a double borrow and panic; a bare `&World` does
// not care, and the single-host-thread discipline (§5) is what makes handing
// out that shared reference sound despite the interior mutability.
unsafe impl Send for World {}
unsafe impl Sync for World {}

#[cfg(feature = "single-core")]
mod storage {
    use super::*;

    thread_local! {
        static HOST_RECORD: CoroutineRecord = CoroutineRecord::new();
    }

    static WORLD: std::sync::OnceLock<World> = std::sync::OnceLock::new();

    pub(super) fn with_world<R>(f: impl FnOnce(&World) -> R) -> R {
        let world = WORLD.get_or_init(|| {
            ANY_WORLD_TOUCHED.store(true, Ordering::Release);
            let first = HOST_RECORD.with(|r| r as *const CoroutineRecord as *mut CoroutineRecord);
            World::new(first)
        });
        f(world)
    }
}

#[cfg(feature = "thread-safe")]
mod storage {
    use super::*;

    thread_local! {
        static HOST_RECORD: CoroutineRecord = CoroutineRecord::new();
        static TL_WORLD: World = {
            let first = HOST_RECORD.with(|r| r as *const CoroutineRecord as *mut CoroutineRecord);
            World::new(first)
        };
    }

    static GLOBAL_WORLD: std::sync::OnceLock<World> = std::sync::OnceLock::new();

    pub(super) fn with_world<R>(f: impl FnOnce(&World) -> R) -> R {
        ANY_WORLD_TOUCHED.store(true, Ordering::Release);
        if THREADING_ENABLED.load(Ordering::Acquire) {
            TL_WORLD.with(|world| f(world))
        } else {
            let world = GLOBAL_WORLD.get_or_init(|| {
                let first = HOST_RECORD.with(|r| r as *const CoroutineRecord as *mut CoroutineRecord);
                World::new(first)
            });
            f(world)
        }
    }
}

/// Runs `f` with access to the calling host thread's world, creating it on
/// first use.
pub(crate) fn with_world<R>(f: impl FnOnce(&World) -> R) -> R {
    storage::with_world(f)
}

/// Sets the per-thread stack size (§4.1, §6 `configure`).
///
/// `first_record_storage`, when non-null, overrides this thread's default
/// first-coroutine record with a caller-owned one — the no-heap property
/// the primary thread enjoys for free by construction. The storage it
/// points to is opaque to this public API (the record type is a crate
/// implementation detail); passing null keeps the default thread-local
/// record. Returns `Busy` if this thread's world already has a coroutine
/// created on it.
///
/// # Safety
/// If non-null, `first_record_storage` must be valid for reads and writes
/// of `coroutine_record_size()` bytes, aligned to `coroutine_record_align()`,
/// and must remain so for the entire remaining lifetime of the calling host
/// thread — this function initializes a record in place there and the
/// world keeps using that address afterwards.
pub unsafe fn configure(first_record_storage: *mut u8, stack_size: usize) -> Status {
    with_world(|world| {
        if world.configured.get() {
            log::warn!("configure called after the first coroutine already exists on this thread");
            return Status::Busy;
        }
        if !first_record_storage.is_null() {
            let record_ptr = first_record_storage.cast::<CoroutineRecord>();
            // Safety: caller's contract above guarantees a valid, suitably
            // aligned home for a `CoroutineRecord` at this address.
            unsafe {
                record_ptr.write(CoroutineRecord::new());
            }
            world.first.set(record_ptr);
            world.running.set(record_ptr);
        }
        world.stack_size.set(crate::config::normalize_stack_size(stack_size));
        log::debug!("configured per-thread world: stack_size={}", stack_size);
        Status::Success
    })
}

/// Size, in bytes, of the opaque storage [`configure`] needs when supplying
/// an external first-coroutine record.
pub fn coroutine_record_size() -> usize {
    core::mem::size_of::<CoroutineRecord>()
}

/// Required alignment, in bytes, of the storage [`configure`] needs when
/// supplying an external first-coroutine record.
pub fn coroutine_record_align() -> usize {
    core::mem::align_of::<CoroutineRecord>()
}
