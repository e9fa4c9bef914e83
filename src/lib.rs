#![no_std]

//! linalloc: a lock-free slab allocator with type-stable references.
//!
//! Blocks are carved from fixed-size, naturally-aligned slabs. A slab is
//! untyped until a [`Heritage`] claims it; while claimed, every block in
//! the slab is guaranteed to satisfy its type's invariants, even blocks
//! never individually allocated — callers that hold a
//! [`linref_up`]/[`linref_down`]-bracketed reference can rely on that
//! typing staying stable until they release it, independent of whether
//! the underlying block is currently allocated or free.
//!
//! # Usage
//!
//! ```ignore
//! #[global_allocator]
//! static GLOBAL: linalloc::allocator::LinAlloc = linalloc::allocator::LinAlloc;
//! ```

#[cfg(any(test, feature = "debug", feature = "std"))]
extern crate std;
extern crate alloc;

pub mod allocator;
pub mod config;
pub mod debug;
#[cfg(feature = "ffi")]
pub mod ffi;
#[cfg(feature = "alloc-histogram")]
pub mod histogram;
pub mod heritage;
pub mod lfstack;
pub mod linref;
#[macro_use]
pub mod macros;
pub mod platform;
pub mod size_class;
pub mod slab;
pub mod slab_source;
pub mod stats;
pub mod typedesc;

pub use allocator::LinAlloc;
pub use heritage::{Heritage, linalloc, linfree};
pub use linref::{LinrefError, fake_linref_down, fake_linref_up, linref_down, linref_up};
pub use typedesc::TypeDesc;

// Panic handler for staticlib/cdylib builds (no_std has no default one).
// Only active under the `fast` profile's `panic = "abort"`, never during
// normal `cargo test`/`cargo check`.
#[cfg(all(feature = "ffi", not(test), not(feature = "std"), panic = "abort"))]
#[panic_handler]
fn panic(_: &core::panic::PanicInfo) -> ! {
    unsafe extern "C" {
        fn abort() -> !;
    }
    unsafe { abort() }
}
