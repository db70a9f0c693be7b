//! Compile-time and runtime configuration knobs.
//!
//! The core-mode and id-width choices are Cargo features because they
//! change the shape of generated code (which `World` storage strategy is
//! linked in, how wide a coroutine id is) rather than a value that could
//! reasonably change between runs.

#[cfg(all(feature = "single-core", feature = "thread-safe"))]
compile_error!("select exactly one of the `single-core` / `thread-safe` features, not both");

#[cfg(not(any(feature = "single-core", feature = "thread-safe")))]
compile_error!("select exactly one of the `single-core` / `thread-safe` features");

#[cfg(not(any(feature = "id8", feature = "id16", feature = "id32", feature = "id64")))]
compile_error!("select exactly one of the `id8` / `id16` / `id32` / `id64` features");

#[cfg(any(
    all(feature = "id8", feature = "id16"),
    all(feature = "id8", feature = "id32"),
    all(feature = "id8", feature = "id64"),
    all(feature = "id16", feature = "id32"),
    all(feature = "id16", feature = "id64"),
    all(feature = "id32", feature = "id64"),
))]
compile_error!("select exactly one of the `id8` / `id16` / `id32` / `id64` features, not several");

/// Signed integer type backing coroutine identities (§6, "ID width").
#[cfg(feature = "id8")]
pub type CoroutineId = i8;
#[cfg(feature = "id16")]
pub type CoroutineId = i16;
#[cfg(feature = "id32")]
pub type CoroutineId = i32;
#[cfg(feature = "id64")]
pub type CoroutineId = i64;

/// Sentinel meaning "no id has been assigned" — the minimum value of the
/// configured width, per the data model.
pub const ID_NOT_SET: CoroutineId = CoroutineId::MIN;

/// Stack-size granularity: stack carving consumes this many bytes per
/// recursive descent (§4.1).
pub const STACK_GRANULARITY: usize = 1024;

/// Floor below which a requested stack size is clamped up.
pub const MIN_STACK_SIZE: usize = 1024;

/// Stack size used when a thread never calls [`crate::world::configure`].
pub const DEFAULT_STACK_SIZE: usize = 16 * 1024;

/// Rounds `size` up to a multiple of [`STACK_GRANULARITY`], clamping the
/// floor to [`MIN_STACK_SIZE`].
pub const fn normalize_stack_size(size: usize) -> usize {
    let size = if size < MIN_STACK_SIZE { MIN_STACK_SIZE } else { size };
    let rem = size % STACK_GRANULARITY;
    if rem == 0 {
        size
    } else {
        size + (STACK_GRANULARITY - rem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_up_to_granularity() {
        assert_eq!(normalize_stack_size(1), MIN_STACK_SIZE);
        assert_eq!(normalize_stack_size(1024), 1024);
        assert_eq!(normalize_stack_size(1025), 2048);
        assert_eq!(normalize_stack_size(16384), 16384);
        assert_eq!(normalize_stack_size(0), MIN_STACK_SIZE);
    }
}
