//! Type descriptors: the immutable metadata a heritage carries about the
//! blocks it hands out.

/// Describes one block type: its size and, optionally, how to construct a
/// fresh block and whether a given address should bypass the normal
/// slab-reference protocol entirely.
///
/// `Copy`: type descriptors are plain, immutable, `'static` data — the same
/// shape `fn` pointers already have — and the poly size-class table builds
/// its descriptor array with an initial-fill-then-overwrite `const fn`
/// (`size_class::make_poly_types`) that needs a `Copy` placeholder.
#[derive(Clone, Copy)]
pub struct TypeDesc {
    pub name: &'static str,
    /// Block size in bytes. Must be a non-zero multiple of the link-field
    /// alignment (`core::mem::align_of::<*mut ()>()`).
    pub size: usize,
    /// Run once per block when a slab is first assigned this type (or
    /// reused after being untyped). Mutually exclusive, per type, with
    /// participating in debug magic-fill (§4.5/§9 Open Question (c)): a
    /// type either supplies this or gets magic-filled in debug builds, not
    /// both.
    pub lin_init: Option<fn(*mut u8)>,
    /// If present, lets a type short-circuit `linref_up`/`linref_down` for
    /// addresses it has its own reference discipline for. Called with the
    /// address and `true` for an up-call, `false` for a down-call; returns
    /// whether the special path was taken.
    pub has_special_ref: Option<fn(*const u8, bool) -> bool>,
}

impl TypeDesc {
    /// Placeholder used only as the initial-fill value before a `const fn`
    /// overwrites every element of a generated array; never observed by
    /// any live heritage.
    pub const EMPTY: TypeDesc = TypeDesc::new("", 1);

    pub const fn new(name: &'static str, size: usize) -> Self {
        Self { name, size, lin_init: None, has_special_ref: None }
    }

    pub const fn with_init(mut self, lin_init: fn(*mut u8)) -> Self {
        self.lin_init = Some(lin_init);
        self
    }

    pub const fn with_special_ref(mut self, f: fn(*const u8, bool) -> bool) -> Self {
        self.has_special_ref = Some(f);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        fn init(_p: *mut u8) {}
        let t = TypeDesc::new("widget", 64).with_init(init);
        assert_eq!(t.name, "widget");
        assert_eq!(t.size, 64);
        assert!(t.lin_init.is_some());
        assert!(t.has_special_ref.is_none());
    }
}
