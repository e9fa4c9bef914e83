//! Slabs: a naturally aligned, fixed-size region carved into equal-sized
//! blocks of one type, holding the three free-sets (contig, local, hot) and
//! the type/refcount word.
//!
//! A slab's own anchor (used to enqueue it on a heritage's slab stack or
//! the shared free-slab pool) lives in the footer, not at offset zero, so
//! slabs don't use the anchor-is-first-field container-of convention that
//! blocks use. Instead, since every slab is `SLAB_SIZE`-aligned and exactly
//! `SLAB_SIZE` bytes, the slab containing an anchor (or any interior
//! address) is recovered by masking.

use core::sync::atomic::{AtomicU64, Ordering};

use crate::config::SLAB_SIZE;
use crate::heritage::Heritage;
use crate::lfstack::{Anchor, LfStack};
use crate::typedesc::TypeDesc;

const TX_TAG_SHIFT: u32 = 48;
const TX_PTR_MASK: u64 = (1u64 << TX_TAG_SHIFT) - 1;

/// Size of [`Footer`] in bytes. `MAX_BLOCK` is derived from this, so the
/// slab source and `malloc`'s largest class are both ultimately bounded by
/// this struct's layout.
pub const FOOTER_SIZE: usize = core::mem::size_of::<Footer>();

/// Usable payload bytes per slab.
pub const MAX_BLOCK: usize = SLAB_SIZE - FOOTER_SIZE;

/// The `(type, linrefs)` pair, packed into one `u64` and mutated only by
/// single-word CAS (stands in for the double-word CAS the design calls
/// for; see crate docs and `DESIGN.md`).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Tx {
    pub type_ptr: *const TypeDesc,
    pub linrefs: u16,
}

impl Tx {
    pub const EMPTY: Tx = Tx { type_ptr: core::ptr::null(), linrefs: 0 };

    #[inline]
    fn encode(self) -> u64 {
        debug_assert_eq!(self.type_ptr as u64 & !TX_PTR_MASK, 0);
        ((self.linrefs as u64) << TX_TAG_SHIFT) | (self.type_ptr as u64 & TX_PTR_MASK)
    }

    #[inline]
    fn decode(word: u64) -> Tx {
        let type_ptr = (word & TX_PTR_MASK) as *const TypeDesc;
        let linrefs = (word >> TX_TAG_SHIFT) as u16;
        Tx { type_ptr, linrefs }
    }
}

/// The `{lost, size}` state packed into the hot stack's tag bits.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct HotState {
    pub lost: bool,
    pub size: u16,
}

impl HotState {
    #[inline]
    pub(crate) fn encode(self) -> u16 {
        debug_assert!(self.size < 0x8000, "hot-stack size field overflowed 15 bits");
        ((self.lost as u16) << 15) | (self.size & 0x7FFF)
    }

    #[inline]
    pub(crate) fn decode(tag: u16) -> HotState {
        HotState { lost: tag & 0x8000 != 0, size: tag & 0x7FFF }
    }
}

#[repr(C)]
pub struct Footer {
    /// `(type, linrefs)`, mutated only by CAS.
    pub tx: AtomicU64,
    /// The heritage this slab currently belongs to. Plain field: only
    /// written while `tx.linrefs == 0` (minting) or by the single thread
    /// currently holding the slab (I4); never concurrently with a read
    /// that matters.
    pub heritage: *mut Heritage,
    /// Never-yet-allocated contiguous blocks at the high end of the
    /// payload. Single-writer (I4).
    pub contig_blocks: usize,
    /// Non-atomic freed-block stack. Single-writer (I4).
    pub local_free: *mut Anchor,
    /// Lock-free freed-block stack; the slab's one synchronization point.
    pub hot_blocks: LfStack,
    /// This slab's link on a heritage's slab stack or the shared pool.
    pub sanc: Anchor,
}

impl Footer {
    pub const fn zeroed() -> Self {
        Self {
            tx: AtomicU64::new(0),
            heritage: core::ptr::null_mut(),
            contig_blocks: 0,
            local_free: core::ptr::null_mut(),
            hot_blocks: LfStack::new(),
            sanc: Anchor::NULL,
        }
    }
}

#[repr(C)]
pub struct Slab {
    pub payload: [u8; MAX_BLOCK],
    pub footer: Footer,
}

impl Slab {
    /// Zero-initialize a freshly minted slab's footer in place.
    ///
    /// # Safety
    /// `ptr` must point at `SLAB_SIZE` bytes of valid, writable memory,
    /// aligned to `SLAB_SIZE`.
    pub unsafe fn init_footer(ptr: *mut Slab) {
        unsafe { core::ptr::write(core::ptr::addr_of_mut!((*ptr).footer), Footer::zeroed()) };
    }

    #[inline]
    pub fn tx_load(&self) -> Tx {
        Tx::decode(self.footer.tx.load(Ordering::Acquire))
    }

    #[inline]
    pub fn tx_cas(&self, old: Tx, new: Tx) -> Result<(), Tx> {
        match self.footer.tx.compare_exchange(
            old.encode(),
            new.encode(),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => Ok(()),
            Err(observed) => Err(Tx::decode(observed)),
        }
    }

    #[inline]
    pub fn tx_store(&self, new: Tx) {
        self.footer.tx.store(new.encode(), Ordering::Release);
    }
}

/// The slab containing `b`, found by masking to `SLAB_SIZE` alignment.
#[inline]
pub fn slab_of(b: *const u8) -> *mut Slab {
    let addr = b as usize;
    (addr & !(SLAB_SIZE - 1)) as *mut Slab
}

/// The slab whose anchor was just popped off an `LfStack`.
#[inline]
pub fn slab_of_anchor(a: *mut Anchor) -> *mut Slab {
    slab_of(a as *const u8)
}

/// Base address of a slab's block payload.
#[inline]
pub fn blocks_of(s: *mut Slab) -> *mut u8 {
    unsafe { core::ptr::addr_of_mut!((*s).payload) as *mut u8 }
}

/// Maximum number of blocks of size `bs` that fit in a slab's payload.
#[inline]
pub fn slab_max_blocks(bs: usize) -> usize {
    MAX_BLOCK / bs
}

/// Without division: "the next whole block would not fit" — accounts for
/// trailing padding between the last block and the footer.
#[inline]
pub fn fills_slab(blocks: usize, bs: usize) -> bool {
    debug_assert!(blocks * bs <= MAX_BLOCK);
    blocks * bs > MAX_BLOCK - bs
}

/// `contig == 0 && local empty`: the next allocation must migrate hot into
/// local before it can proceed.
#[inline]
pub fn slab_fully_hot(s: &Slab) -> bool {
    s.footer.contig_blocks == 0 && s.footer.local_free.is_null()
}

/// Take one block from a slab that is known (by I1) to have one available
/// in contig or local.
///
/// # Safety
/// Caller holds exclusive allocation ownership of `s` (I4); `bs` is the
/// slab's block size.
pub unsafe fn alloc_from_slab(s: *mut Slab, bs: usize) -> *mut u8 {
    unsafe {
        if (*s).footer.contig_blocks > 0 {
            (*s).footer.contig_blocks -= 1;
            return blocks_of(s).add(bs * (*s).footer.contig_blocks);
        }
        let head = (*s).footer.local_free;
        debug_assert!(!head.is_null(), "I1 violated: slab has no contig and no local blocks");
        (*s).footer.local_free = (*head).next;
        head as *mut u8
    }
}

/// Read the current hot-stack `{lost, size}` state.
#[inline]
pub fn hot_state(s: &Slab) -> HotState {
    HotState::decode(s.footer.hot_blocks.tag())
}

/// Attempt to transfer the entire hot stack into the local stack.
///
/// On success: if the hot stack held blocks, they become the new local
/// stack and the slab is returned to its caller for re-enqueuing. If the
/// hot stack was empty, the slab is marked lost (enqueued nowhere) and
/// `false` is returned — the caller must not push `s` anywhere.
///
/// # Safety
/// Caller holds exclusive allocation ownership of `s` (I4).
pub unsafe fn recover_hot_blocks(s: *mut Slab) -> bool {
    unsafe {
        debug_assert!(!hot_state(&*s).lost, "recovering an already-lost slab");
        loop {
            let mut expected = (*s).footer.hot_blocks.read();
            let (head, _) = expected;
            let was_empty = head.is_null();
            let new_tag = HotState { lost: was_empty, size: 0 }.encode();
            if (*s).footer.hot_blocks.clear_with_tag(new_tag, &mut expected) {
                if was_empty {
                    return false;
                }
                (*s).footer.local_free = head;
                return true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tx_round_trips() {
        static T: TypeDesc = TypeDesc::new("t", 16);
        let tx = Tx { type_ptr: &T, linrefs: 3 };
        let word = tx.encode();
        let back = Tx::decode(word);
        assert!(core::ptr::eq(back.type_ptr, &T));
        assert_eq!(back.linrefs, 3);
    }

    #[test]
    fn hot_state_round_trips() {
        let st = HotState { lost: true, size: 12345 };
        assert_eq!(HotState::decode(st.encode()), HotState { lost: true, size: 12345 });
        let st = HotState { lost: false, size: 0 };
        assert_eq!(HotState::decode(st.encode()), HotState { lost: false, size: 0 });
    }

    impl core::fmt::Debug for HotState {
        fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
            write!(f, "HotState {{ lost: {}, size: {} }}", self.lost, self.size)
        }
    }

    #[test]
    fn fills_slab_matches_max_block_boundary() {
        let bs = 64;
        let max_whole = MAX_BLOCK / bs;
        assert!(!fills_slab(max_whole - 1, bs));
    }

    #[test]
    fn slab_of_masks_to_alignment() {
        let fake_base = (SLAB_SIZE * 3) as *const u8;
        let interior = unsafe { fake_base.add(17) };
        assert_eq!(slab_of(interior) as usize, fake_base as usize);
    }
}
