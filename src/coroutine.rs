//! Coroutine lifecycle: create, resume, yield, the main loop, and
//! termination (§2 component 4, §4.2, §4.3, §4.4, §4.8).

use core::ptr;

use crate::config::ID_NOT_SET;
use crate::context::{self, Registers};
use crate::record::{CoroutineFn, CoroutineRecord, CoroutineState, Passed};
use crate::status::Status;
use crate::world::with_world;

/// Opaque handle to a coroutine record, returned by [`create`] and accepted
/// by [`resume`] and [`terminate`]. A thin, `Copy` wrapper over the record
/// pointer — the record itself always lives on a carved stack frame or is a
/// thread's own first record, never owned by the handle.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CoroutineHandle(pub(crate) *mut CoroutineRecord);

impl CoroutineHandle {
    /// `true` if this handle can currently be passed to [`resume`] (§3
    /// invariant: non-null `next` means already on a list).
    pub fn is_resumable(&self) -> bool {
        !self.0.is_null() && unsafe { (*self.0).is_resumable() }
    }
}

/// What [`resume`] returns (§6: the source library's two sentinel pointer
/// values modeled as an enum in the safe surface rather than raw pointers).
#[derive(Clone, Copy)]
pub enum ResumeOutcome {
    /// The target yielded, or returned, this value back.
    Value(Passed),
    /// The target was not resumable: null handle, or already on a list.
    NotResumable,
}

impl ResumeOutcome {
    /// Raw-pointer encoding for parity with the source library's ABI,
    /// where `resume` returns a plain pointer and distinguishes the two
    /// sentinels by address rather than by an enum discriminant (§6).
    pub fn into_raw(self) -> *mut u8 {
        // Distinct zero-sized statics give each sentinel a stable address
        // that can never coincide with a real caller-owned data pointer
        // (those are always allocated separately), without reserving any
        // particular bit pattern the way a hardcoded constant address would.
        static NOT_RESUMABLE: u8 = 0;
        static BLOCKED: u8 = 0;
        match self {
            ResumeOutcome::NotResumable => ptr::addr_of!(NOT_RESUMABLE) as *mut u8,
            ResumeOutcome::Value(Passed::NotResumable) => ptr::addr_of!(NOT_RESUMABLE) as *mut u8,
            ResumeOutcome::Value(Passed::Blocked) => ptr::addr_of!(BLOCKED) as *mut u8,
            ResumeOutcome::Value(Passed::Data(p)) => p,
            ResumeOutcome::Value(Passed::Nothing) => ptr::null_mut(),
            // These two variants only ever appear on the internal
            // create/main-loop handshake channel; they never escape to a
            // `resume` caller.
            ResumeOutcome::Value(Passed::Func(_)) | ResumeOutcome::Value(Passed::SelfPtr(_)) => {
                ptr::null_mut()
            }
        }
    }
}

/// Spawns (or reactivates a parked record as) a coroutine running `func`
/// (§4.3).
///
/// Returns `None` only if the internal create/main-loop handshake is
/// violated, which should not happen outside of a bug in this crate.
pub fn create(func: CoroutineFn) -> Option<CoroutineHandle> {
    let needs_carve = with_world(|world| world.idle.get().is_null());
    if needs_carve {
        log::debug!("idle list empty, carving a new coroutine stack");
        let stack_size = with_world(|world| {
            world.configured.set(true);
            world.stack_size.get()
        });
        let mut creator_ctx = Registers::default();
        // Safety: `creator_ctx` is a local that outlives the call below —
        // that call never returns in the ordinary sense, so the frame
        // holding `creator_ctx` stays alive for as long as anything could
        // still jump back into it.
        if unsafe { context::capture(&mut creator_ctx as *mut Registers) } == 0 {
            unsafe { crate::stack::carve_one(stack_size, &mut creator_ctx as *mut Registers) }
        }
        // Execution resumes here once the newly carved coroutine parks
        // itself on idle and swaps back (see `crate::stack::carve_one`).
    }

    let record_ptr = with_world(|world| {
        world.configured.set(true);
        world.pop_idle()
    });
    debug_assert!(!record_ptr.is_null(), "stack carving must leave a record on idle");
    let handle = CoroutineHandle(record_ptr);

    match resume(handle, Passed::Func(func)) {
        ResumeOutcome::Value(Passed::SelfPtr(p)) if p == record_ptr => {
            log::debug!("create: coroutine spawned");
            Some(handle)
        }
        _ => {
            debug_assert!(false, "coroutine main-loop handshake violated on first activation");
            None
        }
    }
}

/// Activates `target`, handing it `arg` through the scratch slot, and
/// blocks the caller until `target` next suspends (§4.2).
pub fn resume(target: CoroutineHandle, arg: Passed) -> ResumeOutcome {
    if !target.is_resumable() {
        log::trace!("resume: target not resumable");
        return ResumeOutcome::NotResumable;
    }
    let target_ptr = target.0;
    with_world(|world| {
        let caller_ptr = world.running.get();
        unsafe {
            (*target_ptr).state.set(CoroutineState::Running);
        }
        world.scratch.set(arg);
        world.push_running(target_ptr);
        log::trace!("resume: switching in");
        unsafe {
            let out = core::ptr::addr_of_mut!((*caller_ptr).context);
            let inp = core::ptr::addr_of!((*target_ptr).context);
            context::swap(out, inp);
        }
        // Execution resumes here once `target` (or whatever it in turn
        // resumed) switches back to `caller_ptr`.
        ResumeOutcome::Value(world.scratch.get())
    })
}

/// Suspends the current coroutine, handing `arg` to whichever coroutine is
/// now at the head of the running list (§4.2).
///
/// A no-op returning [`Passed::Nothing`] when called by a thread's own
/// first/host record, which has nothing to yield to.
pub fn yield_now(arg: Passed) -> Passed {
    let current = with_world(|world| world.running.get());
    let is_host = with_world(|world| current == world.first.get());
    if is_host {
        log::trace!("yield_now: called on the host record, no-op");
        return Passed::Nothing;
    }

    with_world(|world| {
        unsafe {
            (*current).state.set(CoroutineState::Blocked);
        }
        world.pop_running();
        world.scratch.set(arg);
    });

    let result = suspend_and_switch(current);

    with_world(|world| unsafe {
        (*current).state.set(CoroutineState::Running);
    });
    result
}

/// Captures `current`'s context and switches to whatever is now at the head
/// of the running list, returning once `current` is resumed again. Shared
/// by [`yield_now`] and the coroutine main loop's reuse handoff, which both
/// need "save myself, switch to whoever's next" without yield's own
/// running-list bookkeeping (the main loop has already done its own by the
/// time it needs this).
pub(crate) fn suspend_and_switch(current: *mut CoroutineRecord) -> Passed {
    with_world(|world| {
        let next_ptr = world.running.get();
        log::trace!("suspend_and_switch: switching out");
        unsafe {
            let out = core::ptr::addr_of_mut!((*current).context);
            let inp = core::ptr::addr_of!((*next_ptr).context);
            context::swap(out, inp);
        }
        world.scratch.get()
    })
}

/// Top-of-stack loop every carved coroutine record runs forever (§4.4).
///
/// # Safety
/// `self_ptr` must point at a `CoroutineRecord` local to the stack frame
/// this function is called from, already linked onto the idle list, with
/// that frame never returning by any path other than a context switch.
pub(crate) unsafe fn main_loop(self_ptr: *mut CoroutineRecord) -> ! {
    fn no_op(_: Passed) -> Passed {
        Passed::Nothing
    }

    let mut func = match with_world(|world| world.scratch.get()) {
        Passed::Func(f) => f,
        _ => {
            debug_assert!(false, "coroutine activated without a function pointer");
            no_op
        }
    };

    // Mirrors `context` at this clean per-activation boundary, for parity
    // with the data model's reset-context field. The reuse path below
    // never needs to restore it explicitly: looping back here through two
    // ordinary `yield_now`/`suspend_and_switch` points already lands in the
    // same place.
    unsafe {
        let _ = context::capture(core::ptr::addr_of_mut!((*self_ptr).reset_context));
    }

    loop {
        with_world(|_| unsafe {
            (*self_ptr).state.set(CoroutineState::Running);
        });
        let calling_arg = yield_now(Passed::SelfPtr(self_ptr));
        log::trace!("coroutine activated");
        let result = func(calling_arg);

        with_world(|world| {
            world.pop_running();
            unsafe {
                (*self_ptr).id.set(ID_NOT_SET);
                (*self_ptr).state.set(CoroutineState::NotRunning);
            }
            world.push_idle(self_ptr);
        });
        log::trace!("coroutine completed, parked on idle for reuse");

        let next = suspend_and_switch(self_ptr);
        func = match next {
            Passed::Func(f) => f,
            other => {
                debug_assert!(false, "coroutine reactivated without a function pointer");
                let _ = other;
                func
            }
        };
        let _ = result;
    }
}

/// Forcibly ends `target`, releasing any of `mutexes` it owns and parking
/// it back on idle (§4.8).
///
/// Rejects terminating the currently-running coroutine (§9 Open Question
/// 3). The caller warrants `mutexes` lists every mutex `target` might hold;
/// any left out stays owned by a now-unreachable coroutine.
pub fn terminate(target: CoroutineHandle, mutexes: &[&crate::mutex::Mutex]) -> Status {
    let target_ptr = target.0;
    if target_ptr.is_null() {
        return Status::Error;
    }
    with_world(|world| {
        if world.running.get() == target_ptr {
            log::warn!("terminate: refusing to terminate the currently-running coroutine");
            return Status::Error;
        }
        for mtx in mutexes {
            mtx.force_release_if_owned_by(target_ptr);
        }
        unlink_from_any_list(world, target_ptr);
        unsafe {
            (*target_ptr).id.set(ID_NOT_SET);
            (*target_ptr).state.set(CoroutineState::NotRunning);
        }
        world.push_idle(target_ptr);
        log::debug!("terminate: coroutine parked on idle");
        Status::Success
    })
}

/// Removes `target` from whichever list it is currently on (running or
/// idle), if any, so [`terminate`] can re-park it cleanly regardless of
/// where it was found.
fn unlink_from_any_list(world: &crate::world::World, target: *mut CoroutineRecord) {
    unlink_from(&world.running, target);
    unlink_from(&world.idle, target);
}

fn unlink_from(list_head: &core::cell::Cell<*mut CoroutineRecord>, target: *mut CoroutineRecord) {
    let mut prev: *mut CoroutineRecord = ptr::null_mut();
    let mut cur = list_head.get();
    while !cur.is_null() {
        let next = unsafe { (*cur).next.get() };
        if cur == target {
            if prev.is_null() {
                list_head.set(next);
            } else {
                unsafe { (*prev).next.set(next) };
            }
            unsafe { (*target).next.set(ptr::null_mut()) };
            return;
        }
        prev = cur;
        cur = next;
    }
}
