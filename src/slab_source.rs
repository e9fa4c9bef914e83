//! The slab source: mints batches of fresh, zeroed, `SLAB_SIZE`-aligned
//! slabs from the platform virtual-memory layer, and the process-wide
//! untyped free-slab pool those batches (and released slabs) land in.
//!
//! A slab is only ever "untyped" while sitting in [`FREE_SLABS`] or mid
//! mint; the moment a heritage pulls it off the pool it becomes typed. No
//! slab is ever returned to the operating system (§9 Design Notes (b)).

use core::sync::atomic::{AtomicUsize, Ordering};

use crate::config::{SLAB_ALLOC_BATCH, SLAB_SIZE};
use crate::platform;
use crate::slab::{Slab, slab_of};

/// Process-wide pool of minted-but-untyped slabs.
static FREE_SLABS: crate::lfstack::LfStack = crate::lfstack::LfStack::new();

/// Lowest and highest address ever handed out by `page_alloc`, used by
/// `linref_up` to reject addresses that could not possibly belong to this
/// allocator before it bothers to mask and dereference anything.
static HEAP_START: AtomicUsize = AtomicUsize::new(usize::MAX);
static HEAP_END: AtomicUsize = AtomicUsize::new(0);

fn record_heap_range(base: *mut u8, len: usize) {
    let start = base as usize;
    let end = start + len;
    HEAP_START.fetch_min(start, Ordering::Relaxed);
    HEAP_END.fetch_max(end, Ordering::Relaxed);
}

/// Whether `addr` could plausibly lie within memory this allocator has ever
/// reserved. Used to short-circuit `linref_up` before touching the address.
#[inline]
pub fn heap_contains(addr: *const u8) -> bool {
    let a = addr as usize;
    a >= HEAP_START.load(Ordering::Relaxed) && a < HEAP_END.load(Ordering::Relaxed)
}

/// Mint `SLAB_ALLOC_BATCH` fresh slabs in one OS call, push all but the
/// first onto the shared pool, and return the first. Returns null if the
/// platform layer fails to reserve memory.
fn mint_batch() -> *mut Slab {
    let batch_bytes = SLAB_SIZE * SLAB_ALLOC_BATCH;
    let base = unsafe { platform::page_alloc(batch_bytes) };
    if base.is_null() {
        return core::ptr::null_mut();
    }
    record_heap_range(base, batch_bytes);

    let first = base as *mut Slab;
    unsafe { Slab::init_footer(first) };

    for i in 1..SLAB_ALLOC_BATCH {
        let s = unsafe { base.add(i * SLAB_SIZE) } as *mut Slab;
        unsafe {
            Slab::init_footer(s);
            FREE_SLABS.push(core::ptr::addr_of_mut!((*s).footer.sanc));
        }
    }
    crate::stats::record_mint(SLAB_ALLOC_BATCH as u64);
    first
}

/// Obtain one untyped slab: pop the shared pool, minting a fresh batch if
/// it's empty. Returns null only if the platform layer is out of memory.
pub fn take_slab() -> *mut Slab {
    let anchor = FREE_SLABS.pop();
    if !anchor.is_null() {
        return slab_of(anchor as *const u8);
    }
    mint_batch()
}

/// Return a slab to the untyped pool (I3: only once `tx.linrefs` has
/// reached zero).
///
/// # Safety
/// `s` must not be reachable from any heritage or from any live reference.
pub unsafe fn release_slab(s: *mut Slab) {
    unsafe { FREE_SLABS.push(core::ptr::addr_of_mut!((*s).footer.sanc)) };
}
