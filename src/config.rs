//! Build-time constants: slab geometry and the explicit size-class list.
//!
//! Generated by `build.rs` from `linalloc.toml` (or an override pointed to
//! by `LINALLOC_CONFIG`/`LINALLOC_CLASSES`) and pulled in here verbatim.

include!(concat!(env!("OUT_DIR"), "/config_gen.rs"));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slab_size_is_power_of_two() {
        assert!(SLAB_SIZE.is_power_of_two());
    }

    #[test]
    fn classes_are_sorted_and_aligned() {
        let mut prev = 0;
        for &size in EXPLICIT_CLASSES.iter() {
            assert!(size > prev);
            assert_eq!(size % 8, 0);
            prev = size;
        }
    }
}
