//! Diagnostics (C8): debug-build magic-number scribbling and per-thread
//! ref/byte account scopes. Everything here is a no-op when the `debug`
//! feature is off, compiling away entirely in release configurations that
//! don't enable it — mirroring the corpus's own `debug`-gated assertions
//! in `sync.rs`/`span.rs`.

/// Repeating sentinel stamped across a block's payload when its type has
/// no `lin_init` (§4.5, §9 Design Notes (c)). Chosen to be visually
/// distinctive in a hex dump and unlikely to be a valid pointer or small
/// integer.
const MAGIC: u8 = 0xAB;

/// Sentinel stamped across a block's tail (past the intrusive link word)
/// the moment it's freed. Distinct from [`MAGIC`] so a double-free can be
/// told apart from an untouched virgin block.
const FREED_MAGIC: u8 = 0xFE;

/// Blocks smaller than this carry no tail for [`mark_freed`]/
/// [`assert_not_double_freed`] to stamp or check — the whole block is the
/// link field.
const LINK_WORD_SIZE: usize = core::mem::size_of::<*mut ()>();

#[cfg(feature = "debug")]
mod imp {
    use super::{FREED_MAGIC, LINK_WORD_SIZE, MAGIC};
    use core::cell::Cell;
    use core::sync::atomic::{AtomicI64, Ordering};

    /// Stamp every block of a freshly typed slab with [`MAGIC`].
    ///
    /// # Safety
    /// `s` must point at a live slab whose payload is not yet in use by any
    /// live reference, and `bs * max_blocks` must fit in the payload.
    pub unsafe fn magic_fill_slab(s: *mut crate::slab::Slab, bs: usize, max_blocks: usize) {
        let base = crate::slab::blocks_of(s);
        unsafe {
            for i in 0..max_blocks {
                core::ptr::write_bytes(base.add(i * bs), MAGIC, bs);
            }
        }
    }

    /// Whether `block`'s first `len` bytes still read as the untouched
    /// magic stamp. Used by tests and by `linfree`'s optional
    /// use-after-free-adjacent checks; never called on the hot path
    /// outside `debug`.
    pub fn magics_valid(block: *const u8, len: usize) -> bool {
        (0..len).all(|i| unsafe { *block.add(i) } == MAGIC)
    }

    /// Stamp `block`'s tail (everything past the link word the free-stack
    /// push just wrote) with [`FREED_MAGIC`], so a later double-free of the
    /// same address can be heuristically caught.
    ///
    /// # Safety
    /// `block` must be `bs` writable bytes, already unlinked from any live
    /// reference.
    pub unsafe fn mark_freed(block: *mut u8, bs: usize) {
        if bs <= LINK_WORD_SIZE {
            return;
        }
        unsafe { core::ptr::write_bytes(block.add(LINK_WORD_SIZE), FREED_MAGIC, bs - LINK_WORD_SIZE) };
    }

    /// Heuristic double-free check: panics if `block`'s entire tail already
    /// reads as [`FREED_MAGIC`], since a live block would have had its tail
    /// overwritten by its owner at some point since the last free.
    ///
    /// False negatives are possible (genuine data can coincidentally match);
    /// false positives would require a caller to write exactly this pattern
    /// across a block's whole tail, which real workloads don't.
    ///
    /// # Safety
    /// `block` must be `bs` readable bytes belonging to a slab.
    pub unsafe fn assert_not_double_freed(block: *const u8, bs: usize) {
        if bs <= LINK_WORD_SIZE {
            return;
        }
        let tail_len = bs - LINK_WORD_SIZE;
        let tail = unsafe { block.add(LINK_WORD_SIZE) };
        let all_freed = (0..tail_len).all(|i| unsafe { *tail.add(i) } == FREED_MAGIC);
        assert!(!all_freed, "double free detected at {block:p}");
    }

    std::thread_local! {
        static REF_ACCOUNT: Cell<i64> = const { Cell::new(0) };
        static BYTE_ACCOUNT: Cell<i64> = const { Cell::new(0) };
    }

    static PROCESS_REF_ACCOUNT: AtomicI64 = AtomicI64::new(0);

    pub fn ref_account_adjust(delta: i64) {
        REF_ACCOUNT.with(|c| c.set(c.get() + delta));
        PROCESS_REF_ACCOUNT.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn byte_account_adjust(delta: i64) {
        BYTE_ACCOUNT.with(|c| c.set(c.get() + delta));
    }

    /// Opens a ref-account scope, returning the balance to compare against
    /// at `linref_account_close`.
    pub fn linref_account_open() -> i64 {
        REF_ACCOUNT.with(|c| c.get())
    }

    /// Asserts the thread's ref account has moved by exactly `expected_delta`
    /// since the matching `linref_account_open`.
    pub fn linref_account_close(opened_at: i64, expected_delta: i64) {
        let now = REF_ACCOUNT.with(|c| c.get());
        assert_eq!(
            now - opened_at,
            expected_delta,
            "linref account imbalance: expected delta {expected_delta}, observed {}",
            now - opened_at
        );
    }

    pub fn byte_account_open() -> i64 {
        BYTE_ACCOUNT.with(|c| c.get())
    }

    pub fn byte_account_close(opened_at: i64, expected_delta: i64) {
        let now = BYTE_ACCOUNT.with(|c| c.get());
        assert_eq!(
            now - opened_at,
            expected_delta,
            "byte account imbalance: expected delta {expected_delta}, observed {}",
            now - opened_at
        );
    }
}

#[cfg(not(feature = "debug"))]
mod imp {
    #[inline]
    pub unsafe fn magic_fill_slab(_s: *mut crate::slab::Slab, _bs: usize, _max_blocks: usize) {}

    #[inline]
    pub fn magics_valid(_block: *const u8, _len: usize) -> bool {
        true
    }

    #[inline]
    pub unsafe fn mark_freed(_block: *mut u8, _bs: usize) {}

    #[inline]
    pub unsafe fn assert_not_double_freed(_block: *const u8, _bs: usize) {}

    #[inline]
    pub fn ref_account_adjust(_delta: i64) {}

    #[inline]
    pub fn byte_account_adjust(_delta: i64) {}

    #[inline]
    pub fn linref_account_open() -> i64 {
        0
    }

    #[inline]
    pub fn linref_account_close(_opened_at: i64, _expected_delta: i64) {}

    #[inline]
    pub fn byte_account_open() -> i64 {
        0
    }

    #[inline]
    pub fn byte_account_close(_opened_at: i64, _expected_delta: i64) {}
}

pub use imp::*;
