//! Strictly increasing record timestamps for one writer.

use std::sync::atomic::{AtomicU64, Ordering};

use space_core::{timestamp_now, Timestamp};

/// Spins on the wall clock until it moves past the last issued value.
/// After this many reads without progress (a clock stepped backwards),
/// it issues `last + 1` instead.
const MAX_SPINS: u32 = 10_000;

#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: AtomicU64,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> Timestamp {
        loop {
            let last = self.last.load(Ordering::Acquire);
            let mut now = timestamp_now();
            let mut spins = 0;
            while now <= last {
                if spins == MAX_SPINS {
                    now = last + 1;
                    break;
                }
                std::hint::spin_loop();
                now = timestamp_now();
                spins += 1;
            }
            if self
                .last
                .compare_exchange(last, now, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return now;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn strictly_increasing() {
        let clock = MonotonicClock::new();
        let stamps: Vec<Timestamp> = (0..10_000).map(|_| clock.next()).collect();
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn unique_across_threads() {
        let clock = Arc::new(MonotonicClock::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let clock = Arc::clone(&clock);
                std::thread::spawn(move || (0..1000).map(|_| clock.next()).collect::<Vec<_>>())
            })
            .collect();
        let mut all: Vec<Timestamp> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        let total = all.len();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), total);
    }

    #[test]
    fn survives_clock_behind_last() {
        let clock = MonotonicClock::new();
        clock.last.store(u64::MAX - 10, Ordering::Release);
        assert_eq!(clock.next(), u64::MAX - 9);
    }
}
