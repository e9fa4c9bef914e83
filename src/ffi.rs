//! C ABI exports (C9, `ffi` feature): `malloc`/`free`/`realloc`-equivalent
//! symbols taking explicit size/align parameters, for embedding this
//! allocator in non-Rust harnesses.
//!
//! Unlike the corpus's own FFI layer, there is no per-build-configuration
//! variant fan-out to disambiguate in symbol names (`nightly`/`std`/`percpu`
//! tiers) — this design has exactly one shape per feature set, so plain
//! `linalloc_*` names suffice, with the `testing` feature only renaming them
//! to avoid collisions when multiple copies of this crate are linked into
//! one test harness.

use crate::allocator;

#[cfg_attr(not(feature = "testing"), unsafe(no_mangle))]
#[cfg_attr(feature = "testing", unsafe(export_name = "linalloc_testing_malloc"))]
pub unsafe extern "C" fn linalloc_malloc(size: usize) -> *mut u8 {
    allocator::malloc(size)
}

#[cfg_attr(not(feature = "testing"), unsafe(no_mangle))]
#[cfg_attr(feature = "testing", unsafe(export_name = "linalloc_testing_free"))]
pub unsafe extern "C" fn linalloc_free(ptr: *mut u8) {
    allocator::free(ptr)
}

#[cfg_attr(not(feature = "testing"), unsafe(no_mangle))]
#[cfg_attr(feature = "testing", unsafe(export_name = "linalloc_testing_calloc"))]
pub unsafe extern "C" fn linalloc_calloc(nmemb: usize, size: usize) -> *mut u8 {
    allocator::calloc(nmemb, size)
}

#[cfg_attr(not(feature = "testing"), unsafe(no_mangle))]
#[cfg_attr(feature = "testing", unsafe(export_name = "linalloc_testing_realloc"))]
pub unsafe extern "C" fn linalloc_realloc(ptr: *mut u8, new_size: usize) -> *mut u8 {
    unsafe { allocator::realloc(ptr, new_size) }
}

#[cfg_attr(not(feature = "testing"), unsafe(no_mangle))]
#[cfg_attr(feature = "testing", unsafe(export_name = "linalloc_testing_memalign"))]
pub unsafe extern "C" fn linalloc_memalign(align: usize, size: usize) -> *mut u8 {
    allocator::memalign(align, size)
}
