//! Closed status-code surface.
//!
//! The library reports failures through return codes rather than panics or
//! `Result<_, E>` chains, mirroring the non-exceptional contract of the
//! source design. `Status::Success` is `0` so that FFI callers embedding
//! this crate via a C ABI can treat it the same way they would `errno == 0`.

/// Outcome of any fallible library call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Status {
    /// The call did exactly what it says.
    Success = 0,
    /// The resource is held by someone else; try again later.
    Busy = 1,
    /// Misuse, or an invariant the caller was responsible for upholding.
    Error = 2,
    /// Resource exhaustion during the thread-safe build's per-thread setup.
    NoMem = 3,
    /// A deadline passed before the operation could complete.
    TimedOut = 4,
}

impl Status {
    /// `true` for [`Status::Success`].
    #[inline]
    pub fn is_success(self) -> bool {
        matches!(self, Status::Success)
    }
}

/// Internal failure modes that don't fit the public [`Status`] taxonomy,
/// raised only by the time and TLS collaborators (see `SPEC_FULL.md` §4.9,
/// §4.10). Call sites fold these into `Status::Error` at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RuntimeError {
    /// The monotonic clock syscall failed in a way that isn't recoverable
    /// by retrying (e.g. `clock_gettime` returning an error).
    ClockUnavailable,
}

impl From<RuntimeError> for Status {
    fn from(_: RuntimeError) -> Self {
        Status::Error
    }
}
