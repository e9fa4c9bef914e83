//! Profiling counters (C8): slab lifecycle and live-byte accounting.
//!
//! Counters use `Relaxed` ordering — they're observational, not a
//! synchronization mechanism; the slab/heritage protocol provides its own
//! ordering. Everything here compiles to nothing when the `stats` feature
//! is off, mirroring `debug.rs`'s `imp`/no-op split.
//!
//! These intentionally do not resemble a thread-cache/span-split
//! allocator's counters (hits/misses across cache tiers, span splits and
//! coalesces) — there are no such tiers in this design. What's tracked
//! instead is slab lifecycle and live-byte pressure.

#[cfg(feature = "stats")]
mod imp {
    use core::sync::atomic::{AtomicU64, Ordering};

    struct Stats {
        slabs_minted: AtomicU64,
        slabs_typed: AtomicU64,
        slabs_released: AtomicU64,
        alloc_count: AtomicU64,
        dealloc_count: AtomicU64,
        live_bytes: AtomicU64,
        peak_live_bytes: AtomicU64,
    }

    impl Stats {
        const fn new() -> Self {
            Self {
                slabs_minted: AtomicU64::new(0),
                slabs_typed: AtomicU64::new(0),
                slabs_released: AtomicU64::new(0),
                alloc_count: AtomicU64::new(0),
                dealloc_count: AtomicU64::new(0),
                live_bytes: AtomicU64::new(0),
                peak_live_bytes: AtomicU64::new(0),
            }
        }
    }

    static STATS: Stats = Stats::new();

    /// One batch pulled from the platform (`slab_source::mint_batch`).
    pub fn record_mint(n: u64) {
        STATS.slabs_minted.fetch_add(n, Ordering::Relaxed);
    }

    /// An untyped slab was assigned a type and handed to a heritage.
    pub fn record_slab_typed() {
        STATS.slabs_typed.fetch_add(1, Ordering::Relaxed);
    }

    /// A slab's last reference dropped; it returned to the untyped pool.
    pub fn record_slab_released() {
        STATS.slabs_released.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_alloc(bs: usize) {
        STATS.alloc_count.fetch_add(1, Ordering::Relaxed);
        let live = STATS.live_bytes.fetch_add(bs as u64, Ordering::Relaxed) + bs as u64;
        STATS.peak_live_bytes.fetch_max(live, Ordering::Relaxed);
    }

    pub fn record_dealloc(bs: usize) {
        STATS.dealloc_count.fetch_add(1, Ordering::Relaxed);
        STATS.live_bytes.fetch_sub(bs as u64, Ordering::Relaxed);
    }

    pub fn snapshot() -> super::Snapshot {
        super::Snapshot {
            slabs_minted: STATS.slabs_minted.load(Ordering::Relaxed),
            slabs_typed: STATS.slabs_typed.load(Ordering::Relaxed),
            slabs_released: STATS.slabs_released.load(Ordering::Relaxed),
            slabs_in_use: STATS
                .slabs_typed
                .load(Ordering::Relaxed)
                .saturating_sub(STATS.slabs_released.load(Ordering::Relaxed)),
            alloc_count: STATS.alloc_count.load(Ordering::Relaxed),
            dealloc_count: STATS.dealloc_count.load(Ordering::Relaxed),
            live_bytes: STATS.live_bytes.load(Ordering::Relaxed),
            peak_live_bytes: STATS.peak_live_bytes.load(Ordering::Relaxed),
        }
    }
}

#[cfg(not(feature = "stats"))]
mod imp {
    #[inline]
    pub fn record_mint(_n: u64) {}

    #[inline]
    pub fn record_slab_typed() {}

    #[inline]
    pub fn record_slab_released() {}

    #[inline]
    pub fn record_alloc(_bs: usize) {}

    #[inline]
    pub fn record_dealloc(_bs: usize) {}

    #[inline]
    pub fn snapshot() -> super::Snapshot {
        super::Snapshot::default()
    }
}

pub use imp::*;

/// A point-in-time snapshot of the profiling counters. Individual fields
/// are each atomically loaded, but the snapshot as a whole is not globally
/// consistent with itself under concurrent traffic.
///
/// All fields read zero when the `stats` feature is disabled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Total slabs ever pulled from the platform (`slab_source::mint_batch`).
    pub slabs_minted: u64,
    /// Total slabs ever assigned a type.
    pub slabs_typed: u64,
    /// Total slabs ever returned to the untyped pool.
    pub slabs_released: u64,
    /// `slabs_typed - slabs_released`: slabs currently assigned to some heritage.
    pub slabs_in_use: u64,
    /// Total successful `linalloc` calls.
    pub alloc_count: u64,
    /// Total `linfree` calls.
    pub dealloc_count: u64,
    /// Bytes currently live, summed over every outstanding allocation's
    /// block size.
    pub live_bytes: u64,
    /// High-water mark of `live_bytes`.
    pub peak_live_bytes: u64,
}

/// Print a human-readable profiling report to stdout.
#[cfg(feature = "std")]
pub fn profile_report() {
    let s = snapshot();
    println!("linalloc profile:");
    println!("  slabs minted:    {}", s.slabs_minted);
    println!("  slabs typed:     {}", s.slabs_typed);
    println!("  slabs released:  {}", s.slabs_released);
    println!("  slabs in use:    {}", s.slabs_in_use);
    println!("  alloc calls:     {}", s.alloc_count);
    println!("  dealloc calls:   {}", s.dealloc_count);
    println!("  live bytes:      {}", s.live_bytes);
    println!("  peak live bytes: {}", s.peak_live_bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "stats")]
    #[test]
    fn alloc_and_dealloc_track_live_bytes() {
        let before = snapshot();
        record_alloc(64);
        record_alloc(64);
        let mid = snapshot();
        assert_eq!(mid.live_bytes - before.live_bytes, 128);
        assert_eq!(mid.alloc_count - before.alloc_count, 2);
        record_dealloc(64);
        let after = snapshot();
        assert_eq!(after.live_bytes - before.live_bytes, 64);
        assert_eq!(after.dealloc_count - before.dealloc_count, 1);
    }

    #[cfg(feature = "stats")]
    #[test]
    fn peak_live_bytes_does_not_fall_with_live_bytes() {
        record_alloc(256);
        let peak_after_alloc = snapshot().peak_live_bytes;
        record_dealloc(256);
        assert_eq!(snapshot().peak_live_bytes, peak_after_alloc);
    }

    #[cfg(not(feature = "stats"))]
    #[test]
    fn disabled_counters_stay_zero() {
        record_alloc(64);
        record_dealloc(64);
        assert_eq!(snapshot(), Snapshot::default());
    }
}
