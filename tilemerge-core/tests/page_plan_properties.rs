//! Property tests for page planning and progress arithmetic.

use std::{num::NonZeroU64, time::Duration};

use proptest::prelude::*;
use tilemerge_core::{PagePlan, ProgressSnapshot};

proptest! {
    #[test]
    fn pages_tile_the_scan_without_gaps_or_overlap(total in 0u64..5_000, batch in 1u64..300) {
        let plan = PagePlan::new(total, NonZeroU64::new(batch).expect("batch is non-zero"));
        let pages: Vec<_> = plan.pages().collect();

        prop_assert_eq!(pages.len() as u64, total.div_ceil(batch));
        let mut expected_offset = 0;
        for (index, page) in pages.iter().enumerate() {
            prop_assert_eq!(page.index, index as u64);
            prop_assert_eq!(page.offset, expected_offset);
            prop_assert!(page.limit >= 1 && page.limit <= batch);
            expected_offset += page.limit;
        }
        prop_assert_eq!(expected_offset, total);
    }

    #[test]
    fn percent_stays_within_bounds(total in 1u64..1_000_000, merged_share in 0u64..=100) {
        let merged = total * merged_share / 100;
        let snapshot = ProgressSnapshot::new(merged, 0, total, Duration::from_secs(1));
        let percent = snapshot.percent_complete();
        prop_assert!((0.0..=100.0).contains(&percent));
    }

    #[test]
    fn eta_never_exceeds_elapsed_times_remaining(
        total in 1u64..100_000,
        merged in 1u64..100_000,
        elapsed_ms in 0u64..10_000_000,
    ) {
        let merged = merged.min(total);
        let elapsed = Duration::from_millis(elapsed_ms);
        let snapshot = ProgressSnapshot::new(merged, 0, total, elapsed);
        let eta = snapshot.estimated_remaining().expect("eta defined once a tile merged");
        let bound = elapsed.as_nanos() * u128::from(total - merged);
        prop_assert!(eta.as_nanos() <= bound);
        if merged == total {
            prop_assert_eq!(eta, Duration::ZERO);
        }
    }
}
