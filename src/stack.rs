//! Stack carving (§2 component 2, §4.1, §9 "stack carving").
//!
//! Manufactures a coroutine stack with zero heap allocation by recursively
//! reserving [`crate::config::STACK_GRANULARITY`]-sized buffers as locals on
//! the *current* call stack, then, once the configured size has been
//! consumed, declaring the new [`CoroutineRecord`] itself as a local in that
//! bottom-most frame. That frame never returns in the ordinary sense: once
//! parked on the idle list it hands control back to its creator through a
//! raw context swap, and from then on is only ever re-entered through
//! further context switches, never by unwinding back up through the
//! carving recursion above it.

use core::hint::black_box;

use crate::context::{self, Registers};
use crate::record::CoroutineRecord;
use crate::world::with_world;

/// Recursively consumes `remaining` bytes of stack (in
/// [`crate::config::STACK_GRANULARITY`] chunks), then parks a freshly
/// carved coroutine record on the idle list and hands control back to
/// `creator_ctx` — the context [`crate::coroutine::create`] captured with a
/// raw [`context::capture`] right before calling into here, since at that
/// point the new coroutine does not exist yet for `create` to `swap`
/// against.
///
/// `remaining` must already be a multiple of the granularity (callers go
/// through [`crate::config::normalize_stack_size`] to guarantee this), so
/// the recursion bottoms out at exactly zero.
///
/// Never returns in the ordinary sense: the bottom frame's handoff is a
/// context switch, not a Rust `return`, and once that switch lands inside
/// [`crate::coroutine::main_loop`] control stays there until the process
/// exits or the host thread does.
pub(crate) unsafe fn carve_one(remaining: usize, creator_ctx: *mut Registers) -> ! {
    if remaining >= crate::config::STACK_GRANULARITY {
        // A real, sizeable local the optimizer cannot prove is dead: this
        // buffer *is* the stack space being carved for whatever coroutine
        // eventually parks below it.
        let mut chunk = [0u8; crate::config::STACK_GRANULARITY];
        black_box(chunk.as_mut_ptr());
        unsafe { carve_one(black_box(remaining - crate::config::STACK_GRANULARITY), creator_ctx) }
    }

    let record = CoroutineRecord::new();
    let record_ptr = &record as *const CoroutineRecord as *mut CoroutineRecord;
    with_world(|world| world.push_idle(record_ptr));
    log::trace!("carved a new coroutine stack, parked on idle");

    // Captures this frame's position into `record.context` and hands
    // control back to the creator. The first time through this returns
    // into `creator_ctx` and never comes back to the line below; the next
    // time this call site is reached at all is when some future `resume`
    // swaps into `record.context` directly, at which point `swap` returns
    // normally here and falls through into the main loop.
    unsafe {
        context::swap(
            core::ptr::addr_of_mut!((*record_ptr).context),
            creator_ctx as *const Registers,
        );
        crate::coroutine::main_loop(record_ptr)
    }
}
