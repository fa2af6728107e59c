use std::time::Duration;

#[cfg(test)]
use mockall::automock;

/// One completed download measurement.
#[derive(Clone, Copy, Debug)]
pub struct DownloadSample {
    pub bytes: u64,
    pub elapsed: Duration,
}

/// Trait for throughput estimation strategies.
///
/// Allows testing the adaptation logic with mock estimators.
#[cfg_attr(test, automock)]
pub trait Estimator {
    /// Feed one download measurement into the estimate.
    fn push_sample(&mut self, sample: DownloadSample);

    /// The currently published throughput estimate in bits per second.
    ///
    /// Returns `None` until enough samples have been observed.
    fn published_bps(&self) -> Option<u64>;
}

/// Throughput estimator with damped publication.
///
/// Every sample nudges the running average toward the new measurement by
/// `1 / (sample_count + 1)`, so early samples weigh more and the estimate
/// settles as the session ages. The externally visible value is republished
/// only every [`Self::PUBLISH_INTERVAL`]th sample, which keeps the selected
/// variant from oscillating on short-lived throughput spikes.
#[derive(Clone, Debug, Default)]
pub struct RateEstimator {
    average_bps: f64,
    published_bps: Option<u64>,
    sample_count: u64,
}

impl RateEstimator {
    /// Republish the visible estimate every Nth sample.
    const PUBLISH_INTERVAL: u64 = 5;
    /// Clamp for degenerate (near-instant) transfer durations.
    const MIN_ELAPSED_MS: f64 = 0.5;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_sample(&mut self, sample: DownloadSample) {
        let elapsed_ms = (sample.elapsed.as_secs_f64() * 1000.0).max(Self::MIN_ELAPSED_MS);
        #[allow(clippy::cast_precision_loss)] // bitrate precision loss is negligible
        let bps = (sample.bytes as f64) * 8000.0 / elapsed_ms;

        self.sample_count += 1;
        #[allow(clippy::cast_precision_loss)]
        let weight = (self.sample_count + 1) as f64;
        self.average_bps += (bps - self.average_bps) / weight;

        if self.sample_count % Self::PUBLISH_INTERVAL == 0 {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let published = self.average_bps.round().max(0.0) as u64;
            self.published_bps = Some(published);
            tracing::trace!(
                published,
                sample_count = self.sample_count,
                "rate estimate republished"
            );
        }
    }

    pub fn published_bps(&self) -> Option<u64> {
        self.published_bps
    }

    /// Number of samples observed so far.
    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }
}

impl Estimator for RateEstimator {
    fn push_sample(&mut self, sample: DownloadSample) {
        self.push_sample(sample);
    }

    fn published_bps(&self) -> Option<u64> {
        self.published_bps()
    }
}
