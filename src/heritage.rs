//! Heritage: a pool of same-typed slabs, and the `linalloc`/`linfree` pair
//! that is the core allocation/free path (§4.3, §4.4).

use core::sync::atomic::{AtomicU32, Ordering};

use crate::lfstack::LfStack;
use crate::slab::{self, HotState, Slab, Tx};
use crate::slab_source;
use crate::stats;
use crate::typedesc::TypeDesc;

/// A pool of slabs of a single type. Every slab on `slabs` is guaranteed
/// (I1) to have at least one immediately allocatable block.
pub struct Heritage {
    slabs: LfStack,
    pub t: &'static TypeDesc,
    max_slabs: u32,
    nslabs: AtomicU32,
}

impl Heritage {
    pub const fn new(t: &'static TypeDesc, max_slabs: u32) -> Self {
        Self { slabs: LfStack::new(), t, max_slabs, nslabs: AtomicU32::new(0) }
    }

    #[cfg(test)]
    pub fn nslabs(&self) -> u32 {
        self.nslabs.load(Ordering::Relaxed)
    }
}

/// Type a freshly pulled untyped slab for `h` and bump-init its contig
/// count and blocks, running `lin_init` (or the debug magic-fill, §4.8)
/// once per block.
fn type_slab(h: &Heritage, s: *mut Slab) {
    let bs = h.t.size;
    let max_blocks = slab::slab_max_blocks(bs);
    unsafe {
        if let Some(init) = h.t.lin_init {
            let base = slab::blocks_of(s);
            for i in 0..max_blocks {
                init(base.add(i * bs));
            }
        } else {
            crate::debug::magic_fill_slab(s, bs, max_blocks);
        }
        (*s).footer.heritage = h as *const Heritage as *mut Heritage;
        (*s).footer.contig_blocks = max_blocks;
        (*s).footer.local_free = core::ptr::null_mut();
        (*s).tx_store(Tx { type_ptr: h.t as *const TypeDesc, linrefs: 1 });
    }
    stats::record_slab_typed();
}

/// Mint or pull one fresh, typed slab with a full contig run for `h`.
/// Returns null if the slab source is out of memory.
fn new_typed_slab(h: &Heritage) -> *mut Slab {
    let s = slab_source::take_slab();
    if s.is_null() {
        return core::ptr::null_mut();
    }
    type_slab(h, s);
    h.nslabs.fetch_add(1, Ordering::Relaxed);
    s
}

/// Allocate one block of `h`'s type. Returns null only if the slab source
/// is out of memory (§4.3).
pub fn linalloc(h: &Heritage) -> *mut u8 {
    let anchor = h.slabs.pop();
    let s = if anchor.is_null() {
        let s = new_typed_slab(h);
        if s.is_null() {
            return core::ptr::null_mut();
        }
        s
    } else {
        slab::slab_of_anchor(anchor)
    };

    let bs = h.t.size;
    let block = unsafe { slab::alloc_from_slab(s, bs) };
    stats::record_alloc(bs);
    crate::debug::byte_account_adjust(bs as i64);

    if unsafe { slab::slab_fully_hot(&*s) } {
        let recovered = unsafe { slab::recover_hot_blocks(s) };
        if recovered {
            h.slabs.push(unsafe { core::ptr::addr_of_mut!((*s).footer.sanc) });
        }
        // else: marked lost, enqueued nowhere, picked back up by a freer.
    } else {
        h.slabs.push(unsafe { core::ptr::addr_of_mut!((*s).footer.sanc) });
    }

    block
}

/// Drop the slab's last reference: return it to the untyped pool (I3).
fn release(s: *mut Slab) {
    unsafe {
        debug_assert_eq!((*s).tx_load().linrefs, 0, "releasing a slab with live linrefs");
        (*(*s).footer.heritage).nslabs.fetch_sub(1, Ordering::Relaxed);
        slab_source::release_slab(s);
    }
    stats::record_slab_released();
}

/// CAS-decrement `tx.linrefs`, releasing the slab to the untyped pool when
/// it reaches zero. Shared by [`finish_full_slab`] (the heritage's own
/// implicit reference) and [`crate::linref::linref_down`] (an external
/// type-stable reference) — both drop the same counter (I2/I3).
pub(crate) fn drop_tx_ref(s: *mut Slab) {
    loop {
        let tx = unsafe { (*s).tx_load() };
        debug_assert!(tx.linrefs > 0, "dropping a ref with none outstanding");
        let new = Tx { type_ptr: tx.type_ptr, linrefs: tx.linrefs - 1 };
        if unsafe { (*s).tx_cas(tx, new) }.is_ok() {
            if new.linrefs == 0 {
                release(s);
            }
            return;
        }
    }
}

/// Free one block. The slab and its type are recovered from the block's
/// address alone (§4.4).
pub fn linfree(block: *mut u8) {
    let s = slab::slab_of(block);
    let bs = block_size_of(s);
    linfree_sized(block, bs);
}

/// Free one block whose class size the caller already knows, skipping the
/// footer read `linfree` needs to recover it (`smalloc`/`sfree`, C9).
///
/// # Safety (debug-mode heuristic only, not a hard precondition elsewhere)
/// `bs` must be the exact size of `block`'s heritage's type; passing the
/// wrong size corrupts the hot-stack generation accounting.
pub fn linfree_sized(block: *mut u8, bs: usize) {
    let s = slab::slab_of(block);
    let node = block as *mut crate::lfstack::Anchor;

    unsafe { crate::debug::assert_not_double_freed(block, bs) };
    stats::record_dealloc(bs);
    crate::debug::byte_account_adjust(-(bs as i64));

    loop {
        let mut expected = unsafe { (*s).footer.hot_blocks.read() };
        let (head, tag) = expected;
        let st = HotState::decode(tag);

        if !st.lost {
            let new_size = st.size + 1;
            let new_tag = HotState { lost: false, size: new_size }.encode();
            if !unsafe { (*s).footer.hot_blocks.push_with_tag(node, new_tag, &mut expected) } {
                continue;
            }
            unsafe { crate::debug::mark_freed(block, bs) };
            if slab::fills_slab(new_size as usize, bs) {
                finish_full_slab(s);
            }
            return;
        }

        // Lost: try to become the resurrecting freer by claiming the
        // empty-and-not-lost state.
        debug_assert!(head.is_null(), "lost slab had a non-empty hot stack");
        let claim_tag = HotState { lost: false, size: 0 }.encode();
        if !unsafe { (*s).footer.hot_blocks.clear_with_tag(claim_tag, &mut expected) } {
            continue;
        }

        let h = unsafe { &*(*s).footer.heritage };
        if h.nslabs.load(Ordering::Relaxed) >= h.max_slabs {
            // Over cap: leave the slab unenqueued and retry from the top,
            // which now sees lost = false and pushes `block` the normal
            // way. The slab stays unreachable from any heritage stack
            // until it drains again or the cap relaxes (§9 Open
            // Question (a)).
            continue;
        }

        unsafe {
            (*s).footer.local_free = node;
            (*node).next = core::ptr::null_mut();
        }
        unsafe { crate::debug::mark_freed(block, bs) };
        h.slabs.push(unsafe { core::ptr::addr_of_mut!((*s).footer.sanc) });
        return;
    }
}

pub(crate) fn block_size_of(s: *mut Slab) -> usize {
    unsafe { (*(*s).footer.heritage).t.size }
}

/// A freer observed the hot stack's size imply every block in the slab is
/// now free. Take sole responsibility: fold hot into contig and drop the
/// slab's reference, releasing it if that was the last one.
fn finish_full_slab(s: *mut Slab) {
    loop {
        let mut expected = unsafe { (*s).footer.hot_blocks.read() };
        if unsafe { (*s).footer.hot_blocks.clear_with_tag(0, &mut expected) } {
            break;
        }
    }
    let bs = block_size_of(s);
    unsafe {
        (*s).footer.contig_blocks = slab::slab_max_blocks(bs);
        (*s).footer.local_free = core::ptr::null_mut();
    }
    drop_tx_ref(s);
}

#[cfg(test)]
mod tests {
    use super::*;

    static T: TypeDesc = TypeDesc::new("test-block", 64);

    #[test]
    fn alloc_then_free_round_trips() {
        let h = Heritage::new(&T, 64);
        let p = linalloc(&h);
        assert!(!p.is_null());
        assert_eq!(p as usize % core::mem::align_of::<usize>(), 0);
        linfree(p);
    }

    #[test]
    fn exhausts_and_mints_new_slab() {
        let h = Heritage::new(&T, 64);
        let max_blocks = slab::slab_max_blocks(T.size);
        let mut ptrs = alloc::vec::Vec::new();
        for _ in 0..max_blocks + 1 {
            let p = linalloc(&h);
            assert!(!p.is_null());
            ptrs.push(p);
        }
        assert!(h.nslabs() >= 2);
        for p in ptrs {
            linfree(p);
        }
    }

    #[test]
    fn lost_slab_resurrects_on_free() {
        let h = Heritage::new(&T, 64);
        let max_blocks = slab::slab_max_blocks(T.size);
        let mut ptrs = alloc::vec::Vec::new();
        for _ in 0..max_blocks {
            ptrs.push(linalloc(&h));
        }
        // slab is now fully hot and lost; heritage.slabs is empty.
        assert!(h.slabs.peek().is_null());
        let p = ptrs.pop().unwrap();
        linfree(p);
        // resurrected: a subsequent alloc should succeed without minting.
        let before = h.nslabs();
        let q = linalloc(&h);
        assert!(!q.is_null());
        assert_eq!(h.nslabs(), before);
        for p in ptrs {
            linfree(p);
        }
        linfree(q);
    }

    #[cfg(feature = "debug")]
    #[test]
    fn alloc_then_free_balances_byte_account() {
        let opened = crate::debug::byte_account_open();
        let h = Heritage::new(&T, 64);
        let p = linalloc(&h);
        crate::debug::byte_account_close(opened, T.size as i64);
        linfree(p);
        crate::debug::byte_account_close(opened, 0);
    }
}
