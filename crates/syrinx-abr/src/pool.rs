/// Source of quality-variant information for selection.
///
/// This trait abstracts selection from any specific manifest model; the
/// streaming layer implements it for its own adaptation-set type.
pub trait RepresentationPool {
    /// Total number of selectable variants.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bandwidth (bits per second) of the variant at `index`.
    fn bandwidth_bps(&self, index: usize) -> Option<u64>;

    /// Optional `(width, height)` of the variant at `index`.
    fn dimensions(&self, _index: usize) -> Option<(u32, u32)> {
        None
    }
}

/// Pick the highest-bandwidth variant not exceeding `max_bps` and fitting
/// `max_dimensions`, falling back to the lowest-bandwidth variant of the pool
/// when the constrained query comes up empty.
///
/// Returns `None` only for an empty pool — a non-empty pool always yields a
/// candidate.
pub fn select_by_bandwidth(
    pool: &dyn RepresentationPool,
    max_bps: u64,
    max_dimensions: Option<(u32, u32)>,
) -> Option<usize> {
    let mut best: Option<(usize, u64)> = None;
    for index in 0..pool.len() {
        let Some(bw) = pool.bandwidth_bps(index) else {
            continue;
        };
        if bw > max_bps {
            continue;
        }
        if let (Some((max_w, max_h)), Some((w, h))) = (max_dimensions, pool.dimensions(index)) {
            if w > max_w || h > max_h {
                continue;
            }
        }
        if best.is_none_or(|(_, best_bw)| bw > best_bw) {
            best = Some((index, bw));
        }
    }

    best.map(|(index, _)| index).or_else(|| select_lowest(pool))
}

/// Unconstrained fallback: the lowest-bandwidth variant.
///
/// Variants without an advertised bandwidth rank below everything else, so a
/// pool that only carries unlabelled variants still yields one.
pub fn select_lowest(pool: &dyn RepresentationPool) -> Option<usize> {
    let mut lowest: Option<(usize, Option<u64>)> = None;
    for index in 0..pool.len() {
        let bw = pool.bandwidth_bps(index);
        let better = match (lowest, bw) {
            (None, _) => true,
            (Some((_, None)), _) => false,
            (Some((_, Some(_))), None) => true,
            (Some((_, Some(best))), Some(bw)) => bw < best,
        };
        if better {
            lowest = Some((index, bw));
        }
    }
    lowest.map(|(index, _)| index)
}
