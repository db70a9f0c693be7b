//! x86_64 System V capture/restore, hand-written with stable `global_asm!`
//! (no nightly `#[naked]`, no build-time assembler — the whole primitive
//! lives in this file and links straight into the crate).
//!
//! Only the SysV callee-saved integer registers plus the stack pointer are
//! preserved: `rbx`, `rbp`, `r12`-`r15`, `rsp`. Everything else is caller-
//! saved under the "C" ABI and is already spilled by the compiler around
//! the `call` to `corowheel_capture`/`corowheel_restore`, the same
//! reasoning the host project's naked-function switch (and every `ucontext`
//! based green-thread library before it) relies on.

use core::arch::global_asm;

/// Saved machine context: stack pointer plus the callee-saved register set.
/// `#[repr(C)]` so the field offsets below match the hand-written offsets
/// in the assembly exactly.
#[repr(C)]
#[derive(Default)]
pub(crate) struct Registers {
    rsp: u64,
    rbx: u64,
    rbp: u64,
    r12: u64,
    r13: u64,
    r14: u64,
    r15: u64,
}

extern "C" {
    pub(super) fn corowheel_capture(slot: *mut Registers) -> i64;
    pub(super) fn corowheel_restore(slot: *const Registers, value: i64) -> !;
}

// System V AMD64 ABI: first integer argument in `rdi`, second in `rsi`.
// `corowheel_capture(slot: *mut Registers) -> i64`:
//   save rsp (as it stands right after `call`, i.e. pointing at our return
//   address) and the callee-saved registers into `*slot`, then return 0.
// `corowheel_restore(slot: *const Registers, value: i64) -> i64`:
//   load rsp and the callee-saved registers back out of `*slot` and `ret`
//   into whatever return address is now on top of that stack, with `rax`
//   set to `value` so the *original* `corowheel_capture` call (whose `ret`
//   we are replaying) appears to return `value` instead of 0.
#[cfg(not(target_vendor = "apple"))]
global_asm!(
    ".text",
    ".global corowheel_capture",
    "corowheel_capture:",
    "mov [rdi + 0x00], rsp",
    "mov [rdi + 0x08], rbx",
    "mov [rdi + 0x10], rbp",
    "mov [rdi + 0x18], r12",
    "mov [rdi + 0x20], r13",
    "mov [rdi + 0x28], r14",
    "mov [rdi + 0x30], r15",
    "xor eax, eax",
    "ret",
    ".global corowheel_restore",
    "corowheel_restore:",
    "mov rsp, [rdi + 0x00]",
    "mov rbx, [rdi + 0x08]",
    "mov rbp, [rdi + 0x10]",
    "mov r12, [rdi + 0x18]",
    "mov r13, [rdi + 0x20]",
    "mov r14, [rdi + 0x28]",
    "mov r15, [rdi + 0x30]",
    "mov rax, rsi",
    "ret",
);

// Mach-O requires a leading underscore on external symbols; the Rust-side
// `extern "C"` declarations above don't need the underscore spelled out —
// the platform C ABI convention applies it automatically at every call
// site — but hand-written `global_asm!` labels are emitted verbatim, so
// only the label text differs here.
#[cfg(target_vendor = "apple")]
global_asm!(
    ".text",
    ".global _corowheel_capture",
    "_corowheel_capture:",
    "mov [rdi + 0x00], rsp",
    "mov [rdi + 0x08], rbx",
    "mov [rdi + 0x10], rbp",
    "mov [rdi + 0x18], r12",
    "mov [rdi + 0x20], r13",
    "mov [rdi + 0x28], r14",
    "mov [rdi + 0x30], r15",
    "xor eax, eax",
    "ret",
    ".global _corowheel_restore",
    "_corowheel_restore:",
    "mov rsp, [rdi + 0x00]",
    "mov rbx, [rdi + 0x08]",
    "mov rbp, [rdi + 0x10]",
    "mov r12, [rdi + 0x18]",
    "mov r13, [rdi + 0x20]",
    "mov r14, [rdi + 0x28]",
    "mov r15, [rdi + 0x30]",
    "mov rax, rsi",
    "ret",
);
