//! A stackful coroutine runtime: cooperative, single-host-thread
//! multitasking with mutexes, condition variables, and per-coroutine
//! message queues, built without heap allocation on the hot path.
//!
//! See `SPEC_FULL.md` in the repository root for the full design; briefly:
//! coroutines share one OS thread and hand control to one another through
//! an explicit [`coroutine::yield_now`]/[`coroutine::resume`] pair, backed
//! by a hand-written per-architecture context switch
//! ([`context`]) and stack carving ([`stack`]) that manufactures coroutine
//! stacks out of the host thread's own call stack rather than the heap.
//!
//! Every host thread owns an independent [`world::World`]; there is no
//! cross-thread coroutine migration and no preemption.

mod config;
mod context;
mod coroutine;
mod condvar;
mod mutex;
mod queue;
mod record;
mod stack;
mod status;
mod time;
mod tls;
mod world;

pub use condvar::Condvar;
pub use coroutine::{create, resume, terminate, yield_now, CoroutineHandle, ResumeOutcome};
pub use mutex::{Mutex, MutexKind};
pub use queue::{pop, pop_type, peek, push, Message, Payload};
pub use record::{CoroutineFn, Passed};
pub use status::Status;
pub use time::{now as monotonic_now, Timestamp};
pub use tls::TlsKey;
pub use world::{configure, coroutine_record_align, coroutine_record_size, set_threading_support_enabled};

/// Runtime knobs gathered into one value for callers who want to configure
/// several things at once (§6 "Runtime configuration").
#[derive(Clone, Copy)]
pub struct Config {
    pub stack_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config { stack_size: config::DEFAULT_STACK_SIZE }
    }
}

/// Applies `cfg` to the calling host thread, equivalent to calling
/// [`configure`] directly with `cfg.stack_size` and no first-record
/// override.
pub fn apply_config(cfg: Config) -> Status {
    // Safety: null storage means "keep the default thread-local record",
    // which carries none of `configure`'s storage obligations.
    unsafe { configure(core::ptr::null_mut(), cfg.stack_size) }
}
