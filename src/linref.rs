//! Type-stable references (C5): `linref_up`/`linref_down` over a slab's
//! `tx` word, and the contract they share with `linfree` (§4.5).
//!
//! A successful `linref_up` witnesses that `tx.type == t` and that the
//! slab will not be retyped until the matching `linref_down` (and every
//! other outstanding reference) releases it — retyping only ever happens
//! while `tx.linrefs == 0`, and `linrefs` is only ever raised while it is
//! already positive (I2).

use crate::heritage;
use crate::slab::{self, Tx};
use crate::slab_source;
use crate::typedesc::TypeDesc;

/// Why a `linref_up` failed. Both variants are recoverable: callers
/// typically retry at a higher level rather than treat this as fatal
/// (§7).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinrefError {
    /// The slab at this address is untyped, or typed with a different
    /// descriptor than `t`.
    WrongType,
    /// `addr` lies outside any region this allocator has ever minted a
    /// slab in; it can never carry a type.
    OutOfRange,
}

/// Raise a type-stable reference on `addr`, asserting it currently belongs
/// to a live block of type `t`.
///
/// If `t` declares `has_special_ref`, that predicate is consulted first
/// and, if it claims the address, short-circuits the slab protocol
/// entirely — only the thread-local ref account is touched.
pub fn linref_up(addr: *const u8, t: &'static TypeDesc) -> Result<(), LinrefError> {
    if let Some(special) = t.has_special_ref
        && special(addr, true)
    {
        crate::debug::ref_account_adjust(1);
        return Ok(());
    }

    if !slab_source::heap_contains(addr) {
        return Err(LinrefError::OutOfRange);
    }

    let s = slab::slab_of(addr);
    loop {
        let tx = unsafe { (*s).tx_load() };
        if tx.linrefs == 0 || !core::ptr::eq(tx.type_ptr, t as *const TypeDesc) {
            return Err(LinrefError::WrongType);
        }
        let new = Tx { type_ptr: tx.type_ptr, linrefs: tx.linrefs + 1 };
        if unsafe { (*s).tx_cas(tx, new) }.is_ok() {
            crate::debug::ref_account_adjust(1);
            return Ok(());
        }
    }
}

/// Release a reference previously raised by [`linref_up`] on the same
/// `(addr, t)` pair.
///
/// # Safety
/// `addr`/`t` must be the exact pair a prior successful `linref_up` call
/// returned `Ok` for, not yet matched by a `linref_down`.
pub fn linref_down(addr: *const u8, t: &'static TypeDesc) {
    crate::debug::ref_account_adjust(-1);

    if let Some(special) = t.has_special_ref
        && special(addr, false)
    {
        return;
    }

    let s = slab::slab_of(addr);
    heritage::drop_tx_ref(s);
}

/// Adjust the calling thread's ref account without touching any slab —
/// for code paths statically known not to need the real protocol but that
/// still want their account balance to stay honest under debug accounting
/// (C8, §4.5 "Fake references").
pub fn fake_linref_up() {
    crate::debug::ref_account_adjust(1);
}

/// Mirror of [`fake_linref_up`].
pub fn fake_linref_down() {
    crate::debug::ref_account_adjust(-1);
}
