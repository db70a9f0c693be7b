//! The coroutine record (§3 "Coroutine record") and the value-passing
//! tagged union (§9 "Function/data pointer interconversion").

use core::cell::Cell;
use core::ptr;

use crate::config::{CoroutineId, ID_NOT_SET};
use crate::context::Registers;

/// What a coroutine currently is, per the data model's *state* field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CoroutineState {
    NotRunning,
    Running,
    Blocked,
}

/// Function body a coroutine is activated with. Matches the shape `create`
/// hands through the value-passing channel: one argument in, one result out,
/// both carried as `Passed`.
pub type CoroutineFn = fn(Passed) -> Passed;

/// The tagged-union "scratch"/"passed" value (§9: "a two-field view with
/// explicit selector on write and read"). A plain enum is the idiomatic
/// substitute for a C union here: the discriminant already *is* the
/// selector the design note asks for, so there is nothing to gain from an
/// actual `union` plus a separate tag byte.
#[derive(Clone, Copy)]
pub enum Passed {
    /// No value was passed (the initial `resume` into a brand new world, or
    /// a `yield` nobody reads the return of).
    Nothing,
    /// An opaque caller-owned pointer, the common case for application data.
    Data(*mut u8),
    /// A coroutine body, handed from `create` to the coroutine main loop.
    Func(CoroutineFn),
    /// A coroutine points at its own record, used once during `create` so
    /// the creator learns the address of the coroutine it just spawned.
    /// Carried as the public [`crate::coroutine::CoroutineHandle`] rather
    /// than the bare record pointer, since `Passed` itself is public API
    /// and the record type is not.
    SelfPtr(crate::coroutine::CoroutineHandle),
    /// Written by a coroutine that suspended inside `yield` because a
    /// mutex/condvar wait is still pending; bubbles up through nested
    /// `resume` calls unchanged (§4.2 resume's return is "whatever the
    /// target next writes into the scratch").
    Blocked,
    /// Sentinel `resume` returns when the target was not resumable.
    NotResumable,
}

impl Default for Passed {
    fn default() -> Self {
        Passed::Nothing
    }
}

/// One coroutine's complete bookkeeping record (§3).
///
/// Carved coroutines' records live as a local variable inside the carved
/// stack frame (see `crate::stack`); the first/host record lives wherever
/// its owning `World` lives. Either way this struct is never moved once
/// published, since `context` holds a stack pointer into frames that
/// assume their record sits at a fixed address — every handle into it is a
/// raw pointer, never an owned value that could be relocated.
pub(crate) struct CoroutineRecord {
    /// Current machine context (where a `swap` lands when this record is
    /// resumed).
    pub(crate) context: Registers,
    /// Context captured once, right after the main loop starts and before
    /// its first `yield` (§4.4 "capture reset-context"); restoring this
    /// re-enters the main loop fresh for reuse after the user function
    /// returns.
    pub(crate) reset_context: Registers,
    pub(crate) id: Cell<CoroutineId>,
    pub(crate) state: Cell<CoroutineState>,
    /// Non-null iff this record currently sits on the running or idle
    /// list; null means "belongs to the caller, resumable" (§3 invariant).
    pub(crate) next: Cell<*mut CoroutineRecord>,
    /// Condition-variable waiter FIFO links, non-owning (§9 "cyclic
    /// back-references").
    pub(crate) next_to_signal: Cell<*mut CoroutineRecord>,
    pub(crate) prev_to_signal: Cell<*mut CoroutineRecord>,
    /// Head of this coroutine's message inbox (§4.7).
    pub(crate) inbox: Cell<*mut crate::queue::Message>,
}

impl CoroutineRecord {
    /// Builds a fresh, parked record. Used both for the first/host record
    /// and as the thing `crate::stack` constructs at the bottom of a carved
    /// frame.
    pub(crate) fn new() -> Self {
        CoroutineRecord {
            context: Registers::default(),
            reset_context: Registers::default(),
            id: Cell::new(ID_NOT_SET),
            state: Cell::new(CoroutineState::NotRunning),
            next: Cell::new(ptr::null_mut()),
            next_to_signal: Cell::new(ptr::null_mut()),
            prev_to_signal: Cell::new(ptr::null_mut()),
            inbox: Cell::new(ptr::null_mut()),
        }
    }

    /// A record is resumable from the outside exactly when it isn't
    /// currently linked onto any list (§3 invariant on `next`).
    pub(crate) fn is_resumable(&self) -> bool {
        self.next.get().is_null()
    }
}

// Safety: a `CoroutineRecord` is only ever touched by whichever single
// host thread owns its world at any instant (§5 "shared-resource
// policy") — that discipline is the crate's own scheduling invariant, not
// something the type system can see through the raw pointers this struct
// is built from. The unsafe impls exist so a process-global `World` (the
// `single-core` build, or a `thread-safe` build with the runtime toggle
// left off) can sit behind a `static`; they grant no additional safety,
// they just stop the compiler from refusing a pattern the crate already
// guarantees by construction.
unsafe impl Send for CoroutineRecord {}
unsafe impl Sync for CoroutineRecord {}
