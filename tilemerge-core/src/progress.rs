//! Progress arithmetic and rendering for long-running merges.
//!
//! A [`ProgressSnapshot`] is a pure value: it captures counters and elapsed
//! wall-clock time at one instant and derives completion percentage and an
//! estimate of the remaining time from them.

use std::{fmt, time::Duration};

use indicatif::FormattedDuration;

/// Counters captured at one point during a merge.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use tilemerge_core::ProgressSnapshot;
///
/// let snapshot = ProgressSnapshot::new(150, 0, 300, Duration::from_secs(12));
/// assert_eq!(snapshot.percent_complete(), 50.0);
/// assert_eq!(snapshot.estimated_remaining(), Some(Duration::from_secs(12)));
/// assert_eq!(
///     snapshot.to_string(),
///     "elapsed 00:00:12 | 150/300 tiles | 50.0% | eta 00:00:12"
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    /// Tiles written successfully so far.
    pub merged: u64,
    /// Tiles dropped after a failed write.
    pub skipped: u64,
    /// Tiles the merge expects to process.
    pub total: u64,
    /// Wall-clock time since the merge started.
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    /// Capture a snapshot from raw counters.
    #[must_use]
    pub const fn new(merged: u64, skipped: u64, total: u64, elapsed: Duration) -> Self {
        Self {
            merged,
            skipped,
            total,
            elapsed,
        }
    }

    /// Tiles still outstanding.
    #[must_use]
    pub const fn remaining(&self) -> u64 {
        self.total.saturating_sub(self.merged)
    }

    /// Share of tiles merged, as a percentage rounded to one decimal place.
    ///
    /// An empty merge is complete by definition and reports `100.0`.
    #[must_use]
    #[expect(
        clippy::float_arithmetic,
        clippy::cast_precision_loss,
        reason = "percentages are display values; counts beyond 2^53 tiles lose precision"
    )]
    pub fn percent_complete(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        let ratio = self.merged as f64 / self.total as f64;
        (ratio * 1000.0).round() / 10.0
    }

    /// Projected time to finish, scaled from the average time per merged tile.
    ///
    /// Returns `None` until at least one tile has been merged.
    #[must_use]
    pub fn estimated_remaining(&self) -> Option<Duration> {
        if self.merged == 0 {
            return None;
        }
        let nanos = self
            .elapsed
            .as_nanos()
            .checked_mul(u128::from(self.remaining()))?
            .checked_div(u128::from(self.merged))?;
        u64::try_from(nanos).ok().map(Duration::from_nanos)
    }
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "elapsed {} | {}/{} tiles | {:.1}%",
            FormattedDuration(self.elapsed),
            self.merged,
            self.total,
            self.percent_complete()
        )?;
        if let Some(eta) = self.estimated_remaining() {
            write!(f, " | eta {}", FormattedDuration(eta))?;
        }
        if self.skipped > 0 {
            write!(f, " | skipped {}", self.skipped)?;
        }
        Ok(())
    }
}
