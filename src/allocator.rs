//! External surface (C9): `GlobalAlloc`, the POSIX `malloc` family, and the
//! sized-free fast path. Everything here is built on `size_class`'s poly
//! dispatch and, ultimately, `heritage::linalloc`/`linfree`.
//!
//! `LinAlloc` is zero-sized; all mutable state lives in the poly heritages
//! and the slab source, not here.

use core::alloc::{GlobalAlloc, Layout};
use core::ptr;

use crate::heritage;
use crate::size_class::{self, MAX_BLOCK_HERITAGE};

/// Every poly class is validated (`build.rs`) to be a multiple of this;
/// it's the alignment `malloc`/`calloc`/`realloc` guarantee without a
/// caller having to ask for more via `memalign`.
const NATURAL_ALIGN: usize = core::mem::align_of::<usize>();

/// Allocate `n` bytes at default alignment. Null on zero size or if `n`
/// exceeds [`MAX_BLOCK`].
pub fn malloc(n: usize) -> *mut u8 {
    if n == 0 {
        return ptr::null_mut();
    }
    crate::hist_record!(n);
    size_class::malloc(n)
}

/// Free a block returned by any function in this module.
pub fn free(p: *mut u8) {
    size_class::free(p);
}

/// `nmemb * size` zeroed bytes, checked for overflow.
pub fn calloc(nmemb: usize, size: usize) -> *mut u8 {
    let total = match nmemb.checked_mul(size) {
        Some(t) => t,
        None => return ptr::null_mut(),
    };
    let p = malloc(total);
    if !p.is_null() {
        unsafe { ptr::write_bytes(p, 0, total) };
    }
    p
}

/// Resize a block to `new_size`, preserving its contents up to
/// `min(old_size, new_size)`. `ptr` may be null (behaves as `malloc`);
/// `new_size` may be zero (behaves as `free`, returning null).
///
/// # Safety
/// `ptr` must be null or a live pointer previously returned by this
/// module's allocation functions.
pub unsafe fn realloc(ptr: *mut u8, new_size: usize) -> *mut u8 {
    if ptr.is_null() {
        return malloc(new_size);
    }
    if new_size == 0 {
        free(ptr);
        return core::ptr::null_mut();
    }

    let old_size = unsafe { heritage::block_size_of(crate::slab::slab_of(ptr)) };
    if new_size <= old_size {
        // Same or a smaller poly class would only be reached by a fresh
        // allocation anyway; shrinking in place avoids a copy.
        return ptr;
    }

    let new_ptr = malloc(new_size);
    if new_ptr.is_null() {
        return core::ptr::null_mut();
    }
    unsafe { ptr::copy_nonoverlapping(ptr, new_ptr, old_size) };
    free(ptr);
    new_ptr
}

/// The smallest poly class `>= size` whose size is itself a multiple of
/// `align`. A block at offset `k * class_size` from a `SLAB_SIZE`-aligned
/// slab base is aligned to `align` for every `k` exactly when `class_size`
/// is a multiple of `align` (the base itself already is, since
/// `align <= SLAB_SIZE` is required). Returns `None` if no class
/// satisfies both constraints.
fn class_for_alignment(size: usize, align: usize) -> Option<usize> {
    if align > crate::config::SLAB_SIZE || !align.is_power_of_two() {
        return None;
    }
    for h in crate::config::POLY_HERITAGES.iter() {
        if h.t.size >= size && h.t.size % align == 0 {
            return Some(h.t.size);
        }
    }
    if MAX_BLOCK_HERITAGE.t.size >= size && MAX_BLOCK_HERITAGE.t.size % align == 0 {
        return Some(MAX_BLOCK_HERITAGE.t.size);
    }
    None
}

/// Allocate `size` bytes aligned to `align`. Null if no poly class can
/// satisfy the alignment, or `align` isn't a power of two `<= SLAB_SIZE`.
pub fn memalign(align: usize, size: usize) -> *mut u8 {
    if size == 0 {
        return ptr::null_mut();
    }
    match class_for_alignment(size, align) {
        Some(class_size) => size_class::malloc(class_size),
        None => ptr::null_mut(),
    }
}

/// POSIX `posix_memalign`: `align` must be a power of two and a multiple
/// of `size_of::<*mut ()>()`. Returns `Err(())` (mapped by callers to
/// `EINVAL`/`ENOMEM`) instead of setting `errno`.
pub fn posix_memalign(align: usize, size: usize) -> Result<*mut u8, ()> {
    if !align.is_power_of_two() || align % core::mem::size_of::<*mut ()>() != 0 {
        return Err(());
    }
    if size == 0 {
        return Ok(ptr::null_mut());
    }
    match class_for_alignment(size, align) {
        Some(class_size) => {
            let p = size_class::malloc(class_size);
            if p.is_null() { Err(()) } else { Ok(p) }
        }
        None => Err(()),
    }
}

/// `aligned_alloc`: like `posix_memalign` but returns the pointer directly
/// (null on failure) and additionally requires `size` be a multiple of
/// `align`, per the C11 contract.
pub fn aligned_alloc(align: usize, size: usize) -> *mut u8 {
    if size % align != 0 {
        return ptr::null_mut();
    }
    posix_memalign(align, size).unwrap_or(ptr::null_mut())
}

/// Unimplemented: whole-page-aligned allocation doesn't fit this design's
/// fixed size classes (matches the source this was distilled from).
pub fn pvalloc(_size: usize) -> *mut u8 {
    panic!("linalloc: pvalloc is not implemented (no whole-page allocation in this design)");
}

/// See [`pvalloc`].
pub fn valloc(_size: usize) -> *mut u8 {
    panic!("linalloc: valloc is not implemented (no whole-page allocation in this design)");
}

/// Allocate a block of exactly `size` bytes' class, for a caller that will
/// pass the same `size` back to [`sfree`] — skips the footer read plain
/// `free` needs to recover the class size.
pub fn smalloc(size: usize) -> *mut u8 {
    malloc(size)
}

/// Free a block allocated by [`smalloc`] (or `malloc`/`calloc`/`realloc`
/// with the same `size`), bypassing the footer lookup.
pub fn sfree(p: *mut u8, size: usize) {
    if p.is_null() {
        return;
    }
    let class_size = size_class::class_size_for(size).unwrap_or(size);
    heritage::linfree_sized(p, class_size);
}

/// `#[global_allocator]`-installable `GlobalAlloc` over the poly heritages.
pub struct LinAlloc;

unsafe impl GlobalAlloc for LinAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if layout.align() <= NATURAL_ALIGN {
            malloc(layout.size())
        } else {
            memalign(layout.align(), layout.size())
        }
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        if layout.align() <= NATURAL_ALIGN {
            calloc(1, layout.size())
        } else {
            let p = memalign(layout.align(), layout.size());
            if !p.is_null() {
                unsafe { ptr::write_bytes(p, 0, layout.size()) };
            }
            p
        }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        free(ptr)
    }

    unsafe fn realloc(&self, ptr: *mut u8, _layout: Layout, new_size: usize) -> *mut u8 {
        unsafe { realloc(ptr, new_size) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malloc_free_round_trips() {
        let p = malloc(40);
        assert!(!p.is_null());
        free(p);
    }

    #[test]
    fn malloc_zero_is_null() {
        assert!(malloc(0).is_null());
    }

    #[test]
    fn calloc_zeroes_memory() {
        let p = calloc(4, 16);
        assert!(!p.is_null());
        for i in 0..64 {
            assert_eq!(unsafe { *p.add(i) }, 0);
        }
        free(p);
    }

    #[test]
    fn calloc_overflow_is_null() {
        assert!(calloc(usize::MAX, 2).is_null());
    }

    #[test]
    fn realloc_grows_and_preserves_prefix() {
        let p = malloc(16);
        unsafe { ptr::write_bytes(p, 0x42, 16) };
        let q = unsafe { realloc(p, 256) };
        assert!(!q.is_null());
        for i in 0..16 {
            assert_eq!(unsafe { *q.add(i) }, 0x42);
        }
        free(q);
    }

    #[test]
    fn realloc_null_behaves_as_malloc() {
        let p = unsafe { realloc(ptr::null_mut(), 32) };
        assert!(!p.is_null());
        free(p);
    }

    #[test]
    fn realloc_zero_size_frees_and_returns_null() {
        let p = malloc(32);
        let q = unsafe { realloc(p, 0) };
        assert!(q.is_null());
    }

    #[test]
    fn memalign_respects_alignment() {
        let p = memalign(64, 100);
        assert!(!p.is_null());
        assert_eq!(p as usize % 64, 0);
        free(p);
    }

    #[test]
    fn posix_memalign_rejects_non_power_of_two() {
        assert!(posix_memalign(3, 16).is_err());
    }

    #[test]
    fn aligned_alloc_requires_size_multiple_of_align() {
        assert!(aligned_alloc(32, 33).is_null());
        let p = aligned_alloc(32, 64);
        assert!(!p.is_null());
        assert_eq!(p as usize % 32, 0);
        free(p);
    }

    #[test]
    #[should_panic(expected = "pvalloc")]
    fn pvalloc_is_a_fatal_stub() {
        pvalloc(4096);
    }

    #[test]
    fn smalloc_sfree_round_trips() {
        let p = smalloc(48);
        assert!(!p.is_null());
        sfree(p, 48);
    }

    #[test]
    fn global_alloc_impl_round_trips() {
        let alloc = LinAlloc;
        let layout = Layout::from_size_align(128, 8).unwrap();
        let p = unsafe { alloc.alloc(layout) };
        assert!(!p.is_null());
        unsafe { alloc.dealloc(p, layout) };
    }

    #[test]
    fn global_alloc_zeroed_is_zero() {
        let alloc = LinAlloc;
        let layout = Layout::from_size_align(64, 8).unwrap();
        let p = unsafe { alloc.alloc_zeroed(layout) };
        assert!(!p.is_null());
        for i in 0..64 {
            assert_eq!(unsafe { *p.add(i) }, 0);
        }
        unsafe { alloc.dealloc(p, layout) };
    }
}
