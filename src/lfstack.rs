//! Lock-free singly-linked stack with a generation tag packed alongside the
//! head pointer, so a single-word CAS does the work a double-word CAS would.
//!
//! Stable Rust has no `AtomicU128`, so instead of a true double-word CAS on
//! `(head_ptr, generation)` we steal the high 16 bits of the head pointer.
//! User-space addresses on every target this crate cares about are
//! canonical 48-bit values (the top 16 bits are always zero), so those bits
//! are free to carry a tag without losing any pointer precision.
//!
//! A node joins a stack by embedding an [`Anchor`] as its *first* field
//! (`#[repr(C)]`), the same intrusive-list convention used for slabs and
//! blocks elsewhere in this crate: a pointer to the container is also a
//! valid pointer to its anchor, and vice versa.

use core::ptr;
use core::sync::atomic::{AtomicU64, Ordering};

const TAG_SHIFT: u32 = 48;
const PTR_MASK: u64 = (1u64 << TAG_SHIFT) - 1;

/// Intrusive link. Embed as the first field of anything pushed onto an
/// [`LfStack`].
#[repr(C)]
pub struct Anchor {
    pub next: *mut Anchor,
}

impl Anchor {
    pub const NULL: Anchor = Anchor { next: ptr::null_mut() };
}

#[inline]
fn encode(node: *mut Anchor, tag: u16) -> u64 {
    debug_assert_eq!(node as u64 & !PTR_MASK, 0, "pointer uses high bits reserved for the tag");
    ((tag as u64) << TAG_SHIFT) | (node as u64 & PTR_MASK)
}

#[inline]
fn decode(word: u64) -> (*mut Anchor, u16) {
    let ptr = (word & PTR_MASK) as *mut Anchor;
    let tag = (word >> TAG_SHIFT) as u16;
    (ptr, tag)
}

/// A lock-free stack: push/pop plus the lower-level primitives the slab
/// lifecycle protocol needs to treat the tag as arbitrary state bits rather
/// than a plain generation counter.
pub struct LfStack {
    head: AtomicU64,
}

impl LfStack {
    pub const fn new() -> Self {
        Self { head: AtomicU64::new(0) }
    }

    /// Current head pointer, ignoring the tag. Racy; for diagnostics and
    /// precondition checks only.
    #[inline]
    pub fn peek(&self) -> *mut Anchor {
        decode(self.head.load(Ordering::Acquire)).0
    }

    /// Current tag, ignoring the pointer. Racy; see [`Self::peek`].
    #[inline]
    pub fn tag(&self) -> u16 {
        decode(self.head.load(Ordering::Acquire)).1
    }

    /// Snapshot of `(head, tag)` for use in a CAS retry loop.
    #[inline]
    pub fn read(&self) -> (*mut Anchor, u16) {
        decode(self.head.load(Ordering::Acquire))
    }

    /// Push `node` on, incrementing the tag (wrapping). Loops until it wins
    /// a race against concurrent pushes/pops. Use for stacks where the tag
    /// is a pure ABA-resistance counter (the heritage and free-slab pools).
    #[inline]
    pub fn push(&self, node: *mut Anchor) {
        let mut old = self.head.load(Ordering::Relaxed);
        loop {
            let (old_ptr, old_tag) = decode(old);
            unsafe { (*node).next = old_ptr };
            let new = encode(node, old_tag.wrapping_add(1));
            match self.head.compare_exchange_weak(
                old,
                new,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(cur) => old = cur,
            }
        }
    }

    /// Pop the head, incrementing the tag (wrapping). Returns null if empty.
    #[inline]
    pub fn pop(&self) -> *mut Anchor {
        let mut old = self.head.load(Ordering::Relaxed);
        loop {
            let (old_ptr, old_tag) = decode(old);
            if old_ptr.is_null() {
                return ptr::null_mut();
            }
            let next = unsafe { (*old_ptr).next };
            let new = encode(next, old_tag.wrapping_add(1));
            match self.head.compare_exchange_weak(
                old,
                new,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return old_ptr,
                Err(cur) => old = cur,
            }
        }
    }

    /// Attempt one CAS that pushes `node` while explicitly choosing the new
    /// tag (rather than incrementing it) and requires the current state to
    /// match `expected`. Returns `true` and updates nothing further on
    /// success; on failure refreshes `expected` with the observed value so
    /// the caller's retry loop sees progress. Used by the hot-stack
    /// recovery protocol, where the tag carries `{lost, size}` state rather
    /// than a plain counter.
    #[inline]
    pub fn push_with_tag(
        &self,
        node: *mut Anchor,
        new_tag: u16,
        expected: &mut (*mut Anchor, u16),
    ) -> bool {
        let old = encode(expected.0, expected.1);
        unsafe { (*node).next = expected.0 };
        let new = encode(node, new_tag);
        match self
            .head
            .compare_exchange_weak(old, new, Ordering::AcqRel, Ordering::Relaxed)
        {
            Ok(_) => true,
            Err(cur) => {
                *expected = decode(cur);
                false
            }
        }
    }

    /// Attempt one CAS that clears the head to null while explicitly
    /// choosing the new tag, requiring the current state to match
    /// `expected`. Same retry convention as [`Self::push_with_tag`].
    #[inline]
    pub fn clear_with_tag(&self, new_tag: u16, expected: &mut (*mut Anchor, u16)) -> bool {
        let old = encode(expected.0, expected.1);
        let new = encode(ptr::null_mut(), new_tag);
        match self
            .head
            .compare_exchange_weak(old, new, Ordering::AcqRel, Ordering::Relaxed)
        {
            Ok(_) => true,
            Err(cur) => {
                *expected = decode(cur);
                false
            }
        }
    }
}

impl Default for LfStack {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl Send for LfStack {}
unsafe impl Sync for LfStack {}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(C)]
    struct Node {
        anchor: Anchor,
        val: u32,
    }

    fn as_anchor(n: &mut Node) -> *mut Anchor {
        (n as *mut Node) as *mut Anchor
    }

    fn as_node(a: *mut Anchor) -> *mut Node {
        a as *mut Node
    }

    #[test]
    fn push_pop_single_thread() {
        let stack = LfStack::new();
        let mut a = Node { anchor: Anchor::NULL, val: 1 };
        let mut b = Node { anchor: Anchor::NULL, val: 2 };

        stack.push(as_anchor(&mut a));
        stack.push(as_anchor(&mut b));

        let popped = stack.pop();
        assert_eq!(unsafe { (*as_node(popped)).val }, 2);
        let popped = stack.pop();
        assert_eq!(unsafe { (*as_node(popped)).val }, 1);
        assert!(stack.pop().is_null());
    }

    #[test]
    fn tag_increments_on_push_and_pop() {
        let stack = LfStack::new();
        let mut a = Node { anchor: Anchor::NULL, val: 1 };
        assert_eq!(stack.tag(), 0);
        stack.push(as_anchor(&mut a));
        assert_eq!(stack.tag(), 1);
        stack.pop();
        assert_eq!(stack.tag(), 2);
    }

    #[test]
    fn concurrent_push_pop_preserves_all_nodes() {
        use std::sync::Arc;
        use std::thread;

        let stack = Arc::new(LfStack::new());
        let mut nodes: Vec<Box<Node>> = (0..1000)
            .map(|i| Box::new(Node { anchor: Anchor::NULL, val: i }))
            .collect();

        let handles: Vec<_> = nodes
            .iter_mut()
            .map(|n| {
                let s = Arc::clone(&stack);
                let ptr = as_anchor(n) as usize;
                thread::spawn(move || s.push(ptr as *mut Anchor))
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let mut seen = std::collections::HashSet::new();
        loop {
            let p = stack.pop();
            if p.is_null() {
                break;
            }
            seen.insert(unsafe { (*as_node(p)).val });
        }
        assert_eq!(seen.len(), 1000);
    }

    #[test]
    fn push_with_tag_encodes_custom_state() {
        let stack = LfStack::new();
        let mut a = Node { anchor: Anchor::NULL, val: 7 };
        let mut expected = stack.read();
        assert!(stack.push_with_tag(as_anchor(&mut a), 0b10, &mut expected));
        assert_eq!(stack.tag(), 0b10);
        assert_eq!(unsafe { (*as_node(stack.peek())).val }, 7);
    }

    #[test]
    fn clear_with_tag_empties_and_sets_state() {
        let stack = LfStack::new();
        let mut a = Node { anchor: Anchor::NULL, val: 7 };
        stack.push(as_anchor(&mut a));
        let mut expected = stack.read();
        assert!(stack.clear_with_tag(0b01, &mut expected));
        assert!(stack.peek().is_null());
        assert_eq!(stack.tag(), 0b01);
    }
}
