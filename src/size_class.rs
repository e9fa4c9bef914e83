//! Poly size classes (C6): the fixed ladder of built-in heritages malloc
//! dispatches across, plus the implicit top class that absorbs every size
//! the explicit ladder doesn't cover.
//!
//! `config::POLY_HERITAGES` (generated by `build.rs` from `linalloc.toml`)
//! supplies the explicit classes. The top class — up to `slab::MAX_BLOCK`,
//! the largest size a single slab can hold at all — is defined here
//! instead, because `MAX_BLOCK` depends on `Footer`'s layout and is only
//! knowable to the compiler, not to `build.rs`.

use crate::config;
use crate::heritage::{self, Heritage};
use crate::slab::MAX_BLOCK;
use crate::typedesc::TypeDesc;

/// The implicit top class: every size larger than the biggest explicit
/// class, up to `MAX_BLOCK`, rounds up to this.
pub static MAX_BLOCK_TYPE: TypeDesc = TypeDesc::new("poly-max", MAX_BLOCK);

/// The heritage backing [`MAX_BLOCK_TYPE`].
pub static MAX_BLOCK_HERITAGE: Heritage = Heritage::new(&MAX_BLOCK_TYPE, config::MAX_SLABS_PER_HERITAGE);

/// Find the smallest poly heritage whose block size is `>= n`, scanning
/// the explicit ladder before falling back to the implicit top class.
/// Returns `None` if `n` exceeds `MAX_BLOCK` — too large for any slab.
#[inline]
pub fn pick_heritage(n: usize) -> Option<&'static Heritage> {
    if n > MAX_BLOCK {
        return None;
    }
    for h in config::POLY_HERITAGES.iter() {
        if h.t.size >= n {
            return Some(h);
        }
    }
    Some(&MAX_BLOCK_HERITAGE)
}

/// The block size a request for `n` bytes will actually be rounded up to,
/// or `None` if `n` is too large for any poly class.
#[inline]
pub fn class_size_for(n: usize) -> Option<usize> {
    pick_heritage(n).map(|h| h.t.size)
}

/// Allocate one block sized to fit `n` bytes from the poly ladder. Returns
/// null if `n` is too large or the slab source is out of memory.
#[inline]
pub fn malloc(n: usize) -> *mut u8 {
    match pick_heritage(n) {
        Some(h) => heritage::linalloc(h),
        None => core::ptr::null_mut(),
    }
}

/// Free a block previously returned by [`malloc`] (or any poly heritage
/// allocation).
#[inline]
pub fn free(p: *mut u8) {
    if !p.is_null() {
        heritage::linfree(p);
    }
}
