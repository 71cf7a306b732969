//! Deterministic distribution of hit counts into per-query page windows.
//!
//! Given the total hit count of each query, a global starting offset, an
//! optional global result cap, and the page size, [`distribute_hits`]
//! produces one window list per query. The allocation is proportional
//! round-robin: each query accumulates fractional credit at the rate of its
//! share of the total hits, so partial budgets are spread fairly across
//! queries instead of draining them left to right and starving the small
//! ones. The output depends only on the inputs, never on fetch timing.

/// One contiguous page window within a query's hit range.
///
/// `stop - start` never exceeds the page size used to build it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// First document offset covered (inclusive).
    pub start: usize,
    /// End of the covered range (exclusive).
    pub stop: usize,
}

impl Window {
    /// Number of documents covered by this window.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stop - self.start
    }

    /// True for a degenerate zero-length window.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stop == self.start
    }
}

/// Awards `budget` integer units across queries proportionally to their hit
/// counts.
///
/// Walks queries round-robin, accumulating fractional credit per query at
/// rate `hits[i] / sum(hits)`; whenever a query's credit reaches one or
/// more whole units they are awarded and subtracted. The walk stops the
/// moment the running total reaches the budget, assigning the remainder to
/// whichever query is in progress. The budget is clamped to `sum(hits)`.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn allocate(hits: &[usize], budget: usize) -> Vec<usize> {
    let n = hits.len();
    if n == 0 {
        return Vec::new();
    }
    let total_hits: usize = hits.iter().sum();
    let budget = budget.min(total_hits);
    let denominator = if total_hits == 0 { 1.0 } else { total_hits as f64 };
    let steps: Vec<f64> = hits.iter().map(|&h| h as f64 / denominator).collect();

    let mut credit = vec![0.0_f64; n];
    let mut awarded = vec![0_usize; n];
    let mut total = 0_usize;
    let mut i = 0_usize;
    loop {
        credit[i] += steps[i];
        let step = credit[i] as usize;
        if total + step >= budget {
            awarded[i] += budget - total;
            break;
        }
        total += step;
        credit[i] -= step as f64;
        awarded[i] += step;
        i = (i + 1) % n;
    }
    awarded
}

/// Distributes hit counts into per-query page windows.
///
/// The allocation runs twice: once with `offset` as the budget to compute
/// per-query starting offsets, then once over the remaining hits with
/// `max_total` as the budget (unlimited when `None`) to compute per-query
/// counts. Each query's awarded range is then sliced into consecutive
/// windows of at most `page_limit` documents.
///
/// Queries with zero hits contribute no windows. Offsets and counts are
/// always within `[0, hits[i]]`. Output ordering matches input query order.
#[must_use]
pub fn distribute_hits(
    hits: &[usize],
    offset: usize,
    max_total: Option<usize>,
    page_limit: usize,
) -> Vec<Vec<Window>> {
    if page_limit == 0 {
        return hits.iter().map(|_| Vec::new()).collect();
    }
    let offsets = allocate(hits, offset);
    let remaining: Vec<usize> = hits
        .iter()
        .zip(&offsets)
        .map(|(&h, &o)| h.saturating_sub(o))
        .collect();
    let counts = match max_total {
        Some(cap) => allocate(&remaining, cap),
        None => remaining,
    };

    offsets
        .iter()
        .zip(&counts)
        .map(|(&start_offset, &count)| {
            let fullstop = start_offset + count;
            let mut windows = Vec::new();
            let mut start = start_offset;
            while start < fullstop {
                let stop = fullstop.min(start + page_limit);
                windows.push(Window { start, stop });
                start = stop;
            }
            windows
        })
        .collect()
}
