//! Offset-based pagination over a store's coordinate-ordered scan.

use std::num::NonZeroU64;

/// One bounded slice of a store's scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Zero-based position of the page within its plan.
    pub index: u64,
    /// Number of rows to skip in the scan order.
    pub offset: u64,
    /// Maximum number of rows the page may return.
    pub limit: u64,
}

/// Partition of `[0, total)` into consecutive pages of `batch` rows.
///
/// The plan always holds `ceil(total / batch)` pages; the final page is
/// shortened to the rows that remain.
///
/// # Examples
///
/// ```
/// use std::num::NonZeroU64;
/// use tilemerge_core::PagePlan;
///
/// let batch = NonZeroU64::new(2).expect("non-zero batch");
/// let plan = PagePlan::new(5, batch);
/// let limits: Vec<u64> = plan.pages().map(|page| page.limit).collect();
/// assert_eq!(plan.page_count(), 3);
/// assert_eq!(limits, vec![2, 2, 1]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagePlan {
    total: u64,
    batch: NonZeroU64,
}

impl PagePlan {
    /// Plan pages of `batch` rows over `total` rows.
    #[must_use]
    pub const fn new(total: u64, batch: NonZeroU64) -> Self {
        Self { total, batch }
    }

    /// Number of rows the plan covers.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.total
    }

    /// Rows requested per page.
    #[must_use]
    pub const fn batch(&self) -> NonZeroU64 {
        self.batch
    }

    /// Number of pages in the plan.
    #[must_use]
    pub const fn page_count(&self) -> u64 {
        self.total.div_ceil(self.batch.get())
    }

    /// Page at `index`, or `None` past the end of the plan.
    #[must_use]
    pub fn page(&self, index: u64) -> Option<Page> {
        if index >= self.page_count() {
            return None;
        }
        let offset = index.checked_mul(self.batch.get())?;
        let limit = self.batch.get().min(self.total - offset);
        Some(Page {
            index,
            offset,
            limit,
        })
    }

    /// Iterate the pages in scan order.
    pub fn pages(&self) -> impl Iterator<Item = Page> + use<> {
        let plan = *self;
        (0..plan.page_count()).filter_map(move |index| plan.page(index))
    }
}
