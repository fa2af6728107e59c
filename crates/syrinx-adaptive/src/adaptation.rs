//! Representation selection policies.

use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use syrinx_abr::{
    select_by_bandwidth, select_lowest, DownloadSample, Estimator, RateEstimator,
};
use tracing::debug;

use crate::{
    adaptation_set::{AdaptationSet, MediaType, Period},
    events::{SegmentTrackerListener, TrackerEvent},
    representation::Representation,
};

/// Policy selecting the best representation for the next fetch.
///
/// One dynamic-dispatch level: the tracker holds an `Arc<dyn
/// AdaptationLogic>` and queries it whenever a switch is allowed.
pub trait AdaptationLogic: Send + Sync {
    /// Best representation of `set` right now. `current` is the active one,
    /// if any. `None` means the set has nothing selectable.
    fn next_representation(
        &self,
        set: &AdaptationSet,
        current: Option<&Arc<Representation>>,
    ) -> Option<Arc<Representation>>;

    /// Constrained query over a period: the best representation of the
    /// first adaptation set with the given media type. Guaranteed to yield
    /// a result whenever such a set is non-empty (unconstrained fallback).
    fn current_representation(
        &self,
        media_type: MediaType,
        period: &Period,
    ) -> Option<Arc<Representation>> {
        period
            .adaptation_set(media_type)
            .and_then(|set| self.next_representation(set, None))
    }

    /// Feed back one completed transfer for throughput estimation.
    fn update_download_rate(&self, bytes: u64, elapsed: Duration);
}

/// Throughput-driven selection.
///
/// Picks the highest-bandwidth representation the published throughput
/// estimate sustains, optionally constrained by viewport dimensions. Until
/// an estimate is published it keeps the current representation, or starts
/// from the lowest bandwidth.
pub struct RateBasedAdaptationLogic<E: Estimator = RateEstimator> {
    estimator: Mutex<E>,
    max_dimensions: Option<(u32, u32)>,
}

impl RateBasedAdaptationLogic<RateEstimator> {
    pub fn new() -> Self {
        Self::with_estimator(RateEstimator::new())
    }
}

impl Default for RateBasedAdaptationLogic<RateEstimator> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Estimator> RateBasedAdaptationLogic<E> {
    pub fn with_estimator(estimator: E) -> Self {
        Self {
            estimator: Mutex::new(estimator),
            max_dimensions: None,
        }
    }

    pub fn with_max_dimensions(mut self, width: u32, height: u32) -> Self {
        self.max_dimensions = Some((width, height));
        self
    }
}

impl<E: Estimator + Send> AdaptationLogic for RateBasedAdaptationLogic<E> {
    fn next_representation(
        &self,
        set: &AdaptationSet,
        current: Option<&Arc<Representation>>,
    ) -> Option<Arc<Representation>> {
        let published = self.estimator.lock().published_bps();

        let index = match published {
            Some(bps) => select_by_bandwidth(set, bps, self.max_dimensions),
            None => match current {
                Some(current) => return Some(Arc::clone(current)),
                None => select_lowest(set),
            },
        };

        let chosen = index.and_then(|i| set.representations().get(i).cloned());
        debug!(
            published_bps = published,
            chosen = chosen.as_ref().map(|r| r.id()),
            current = current.map(|r| r.id()),
            "rate-based selection"
        );
        chosen
    }

    fn update_download_rate(&self, bytes: u64, elapsed: Duration) {
        self.estimator
            .lock()
            .push_sample(DownloadSample { bytes, elapsed });
    }
}

impl<E: Estimator + Send> SegmentTrackerListener for RateBasedAdaptationLogic<E> {
    fn on_tracker_event(&self, event: &TrackerEvent<'_>) {
        if let TrackerEvent::Switching { from, to } = event {
            debug!(
                from = from.map(|r| r.id()),
                to = to.map(|r| r.id()),
                "tracker switched representation"
            );
        }
    }
}

/// Selection pinned to a caller-supplied constant bitrate.
pub struct FixedRateAdaptationLogic {
    bandwidth_bps: u64,
}

impl FixedRateAdaptationLogic {
    pub fn new(bandwidth_bps: u64) -> Self {
        Self { bandwidth_bps }
    }
}

impl AdaptationLogic for FixedRateAdaptationLogic {
    fn next_representation(
        &self,
        set: &AdaptationSet,
        _current: Option<&Arc<Representation>>,
    ) -> Option<Arc<Representation>> {
        select_by_bandwidth(set, self.bandwidth_bps, None)
            .and_then(|i| set.representations().get(i).cloned())
    }

    fn update_download_rate(&self, _bytes: u64, _elapsed: Duration) {}
}

#[cfg(test)]
mod tests {
    use mockall::mock;
    use rstest::rstest;

    use super::*;
    use crate::representation::SegmentTemplate;

    mock! {
        Rate {}
        impl Estimator for Rate {
            fn push_sample(&mut self, sample: DownloadSample);
            fn published_bps(&self) -> Option<u64>;
        }
    }

    fn set(bandwidths: &[u64]) -> AdaptationSet {
        let mut set = AdaptationSet::new(0, MediaType::Audio);
        for (i, bw) in bandwidths.iter().enumerate() {
            set = set.with_representation(Representation::new(
                format!("r{i}"),
                *bw,
                SegmentTemplate::new("https://cdn.example/$RepresentationID$/$Number$.m4s", 2),
            ));
        }
        set
    }

    #[rstest]
    #[case(500_000, "r1")]
    #[case(799_999, "r1")]
    #[case(800_000, "r2")]
    // Nothing sustainable: unconstrained fallback.
    #[case(100_000, "r0")]
    fn fixed_rate_selects_best_under_target(#[case] target: u64, #[case] expected: &str) {
        let set = set(&[300_000, 500_000, 800_000]);
        let logic = FixedRateAdaptationLogic::new(target);
        let chosen = logic.next_representation(&set, None).unwrap();
        assert_eq!(chosen.id(), expected);
    }

    #[test]
    fn fixed_rate_empty_set_yields_nothing() {
        let set = set(&[]);
        let logic = FixedRateAdaptationLogic::new(500_000);
        assert!(logic.next_representation(&set, None).is_none());
    }

    #[test]
    fn rate_based_keeps_current_without_estimate() {
        let mut estimator = MockRate::new();
        estimator.expect_published_bps().return_const(None);

        let set = set(&[300_000, 500_000, 800_000]);
        let current = Arc::clone(&set.representations()[2]);
        let logic = RateBasedAdaptationLogic::with_estimator(estimator);

        let chosen = logic.next_representation(&set, Some(&current)).unwrap();
        assert!(Arc::ptr_eq(&chosen, &current));
    }

    #[test]
    fn rate_based_starts_lowest_without_estimate() {
        let mut estimator = MockRate::new();
        estimator.expect_published_bps().return_const(None);

        let set = set(&[800_000, 300_000, 500_000]);
        let logic = RateBasedAdaptationLogic::with_estimator(estimator);

        let chosen = logic.next_representation(&set, None).unwrap();
        assert_eq!(chosen.id(), "r1");
    }

    #[test]
    fn rate_based_follows_published_estimate() {
        let mut estimator = MockRate::new();
        estimator
            .expect_published_bps()
            .return_const(Some(600_000u64));

        let set = set(&[300_000, 500_000, 800_000]);
        let logic = RateBasedAdaptationLogic::with_estimator(estimator);

        let chosen = logic.next_representation(&set, None).unwrap();
        assert_eq!(chosen.id(), "r1");
    }

    #[test]
    fn samples_reach_the_estimator() {
        let mut estimator = MockRate::new();
        estimator.expect_push_sample().times(1).return_const(());

        let logic = RateBasedAdaptationLogic::with_estimator(estimator);
        logic.update_download_rate(250_000, Duration::from_secs(1));
    }

    #[test]
    fn real_estimator_end_to_end() {
        let set = set(&[300_000, 500_000, 800_000]);
        let logic = RateBasedAdaptationLogic::new();

        // ~1 Mbit/s across five samples publishes an estimate high enough
        // for the 800 kbit/s representation.
        for _ in 0..5 {
            logic.update_download_rate(125_000, Duration::from_secs(1));
        }
        let chosen = logic.next_representation(&set, None).unwrap();
        assert_eq!(chosen.id(), "r2");
    }
}
