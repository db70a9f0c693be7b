//! Per-coroutine message queue (§2 component 7, §4.7).

use core::cell::Cell;
use core::ptr;

use crate::record::CoroutineRecord;

/// A message's payload: either an opaque pointer, a small inline value, or
/// a function pointer, carried via the same tagged-union approach as
/// [`crate::record::Passed`] (§9 "a two-field view with explicit selector").
#[derive(Clone, Copy)]
pub enum Payload {
    Data(*mut u8),
    Inline(u64),
    Func(crate::record::CoroutineFn),
}

/// One inbox entry (§3 "a message in an inbox has inUse ... handled ...").
pub struct Message {
    pub msg_type: i32,
    pub payload: Payload,
    pub from: *mut CoroutineRecord,
    pub in_use: Cell<bool>,
    pub handled: Cell<bool>,
    next: Cell<*mut Message>,
}

impl Message {
    pub fn new(msg_type: i32, payload: Payload) -> Self {
        Message {
            msg_type,
            payload,
            from: ptr::null_mut(),
            in_use: Cell::new(false),
            handled: Cell::new(false),
            next: Cell::new(ptr::null_mut()),
        }
    }
}

/// Links `msg` onto `target`'s inbox tail, stamping it as sent by the
/// caller's own current coroutine (§4.7 "push ... stamps msg.from with the
/// sender's coroutine record"). Tail-append resolves Open Question 1
/// (§9): FIFO delivery order.
///
/// # Safety
/// `msg` must outlive its presence on the inbox — callers own message
/// storage, same as coroutine records own their own stack.
pub unsafe fn push(target: *mut CoroutineRecord, msg: *mut Message) {
    let sender = crate::world::with_world(|world| world.running.get());
    unsafe {
        (*msg).from = sender;
        (*msg).in_use.set(true);
        (*msg).handled.set(false);
        (*msg).next.set(ptr::null_mut());

        let head = (*target).inbox.get();
        if head.is_null() {
            (*target).inbox.set(msg);
            return;
        }
        let mut cur = head;
        while !(*cur).next.get().is_null() {
            cur = (*cur).next.get();
        }
        (*cur).next.set(msg);
    }
    log::trace!("queue: message pushed");
}

/// Returns the head of `owner`'s inbox without removing it, or null if
/// empty.
///
/// # Safety
/// `owner` must point at a valid, currently-live `CoroutineRecord`.
pub unsafe fn peek(owner: *mut CoroutineRecord) -> *mut Message {
    unsafe { (*owner).inbox.get() }
}

/// Removes and returns the head of `owner`'s inbox, or null if empty.
///
/// # Safety
/// `owner` must point at a valid, currently-live `CoroutineRecord`.
pub unsafe fn pop(owner: *mut CoroutineRecord) -> *mut Message {
    unsafe {
        let head = (*owner).inbox.get();
        if head.is_null() {
            return ptr::null_mut();
        }
        (*owner).inbox.set((*head).next.get());
        (*head).next.set(ptr::null_mut());
        head
    }
}

/// Removes and returns the first message in `owner`'s inbox whose type
/// equals `msg_type`, preserving the relative order of the others (§4.7
/// `popType`).
///
/// # Safety
/// `owner` must point at a valid, currently-live `CoroutineRecord`.
pub unsafe fn pop_type(owner: *mut CoroutineRecord, msg_type: i32) -> *mut Message {
    unsafe {
        let mut prev: *mut Message = ptr::null_mut();
        let mut cur = (*owner).inbox.get();
        while !cur.is_null() {
            let next = (*cur).next.get();
            if (*cur).msg_type == msg_type {
                if prev.is_null() {
                    (*owner).inbox.set(next);
                } else {
                    (*prev).next.set(next);
                }
                (*cur).next.set(ptr::null_mut());
                return cur;
            }
            prev = cur;
            cur = next;
        }
        ptr::null_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_preserves_fifo_order() {
        let owner = CoroutineRecord::new();
        let owner_ptr = &owner as *const CoroutineRecord as *mut CoroutineRecord;
        let mut a = Message::new(1, Payload::Inline(1));
        let mut b = Message::new(2, Payload::Inline(2));
        unsafe {
            push(owner_ptr, &mut a as *mut Message);
            push(owner_ptr, &mut b as *mut Message);
            let first = pop(owner_ptr);
            assert_eq!((*first).msg_type, 1);
            let second = pop(owner_ptr);
            assert_eq!((*second).msg_type, 2);
            assert!(pop(owner_ptr).is_null());
        }
    }

    #[test]
    fn pop_type_skips_non_matching_and_preserves_order() {
        let owner = CoroutineRecord::new();
        let owner_ptr = &owner as *const CoroutineRecord as *mut CoroutineRecord;
        let mut a = Message::new(1, Payload::Inline(1));
        let mut b = Message::new(2, Payload::Inline(2));
        let mut c = Message::new(1, Payload::Inline(3));
        unsafe {
            push(owner_ptr, &mut a as *mut Message);
            push(owner_ptr, &mut b as *mut Message);
            push(owner_ptr, &mut c as *mut Message);

            let found = pop_type(owner_ptr, 1);
            assert_eq!((*found).msg_type, 1);
            match (*found).payload {
                Payload::Inline(1) => {}
                _ => panic!("expected the first type-1 message"),
            }

            let remaining_first = pop(owner_ptr);
            assert_eq!((*remaining_first).msg_type, 2);
            let remaining_second = pop(owner_ptr);
            assert_eq!((*remaining_second).msg_type, 1);
        }
    }
}
