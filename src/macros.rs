/// Record an allocation size in the histogram.
///
/// Compiles to nothing when the `alloc-histogram` feature is disabled.
#[macro_export]
macro_rules! hist_record {
    ($size:expr) => {
        #[cfg(feature = "alloc-histogram")]
        {
            $crate::histogram::record($size);
        }
    };
}
