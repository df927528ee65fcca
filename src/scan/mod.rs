//! The sampling loop: a fixed number of bounded, concurrent probe trials.
//!
//! Each trial picks a range uniformly from the range table, synthesizes a
//! candidate within it and probes that candidate. Results are collected in
//! arrival order, each tagged with the sequence number of its trial so that
//! ranking stays deterministic whatever the completion order.

use std::{net::IpAddr, pin::pin, time::Duration};

use futures::{StreamExt as _, stream};
use rand::{SeedableRng as _, rngs::SmallRng, seq::IndexedRandom as _};
use serde::{Serialize, Serializer, ser::SerializeStruct as _};
use tokio_util::sync::CancellationToken;

use crate::{
    candidate::CandidateGenerator,
    probe::{EdgeProbe, ProbeResult, ProbeTarget, ProbeTimeouts},
    range::{AddressRange, EDGE_RANGES},
    rank::{ClassifiedResult, Ranking},
};

mod observer;
#[doc(inline)]
pub use observer::TrialObserver;

/// Default number of trials in a single scan.
pub const DEFAULT_TRIALS: usize = 20;

/// One completed trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrialRecord {
    /// Trial number, increasing in the order trials were started.
    pub sequence: usize,
    /// Range the candidate was generated in,
    /// `None` for explicitly given addresses.
    pub range: Option<AddressRange>,
    #[serde(flatten)]
    /// Outcome of the probe.
    pub result: ProbeResult,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Configuration of a [`Scanner`].
pub struct ScanConfig {
    trials: usize,
    concurrency: Option<usize>,
    timeouts: ProbeTimeouts,
    generator: CandidateGenerator,
    seed: Option<u64>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            trials: DEFAULT_TRIALS,
            concurrency: None,
            timeouts: ProbeTimeouts::default(),
            generator: CandidateGenerator::default(),
            seed: None,
        }
    }
}

impl ScanConfig {
    /// Number of trials to run.
    #[must_use]
    pub fn trials(&self) -> usize {
        self.trials
    }

    /// Set the number of trials to run.
    pub fn set_trials(&mut self, trials: usize) -> &mut Self {
        self.trials = trials;
        self
    }

    /// Same as [`Self::set_trials`] but consuming self.
    #[must_use]
    pub fn with_trials(mut self, trials: usize) -> Self {
        self.trials = trials;
        self
    }

    /// Maximum number of trials in flight at once,
    /// `None` if all trials run at once.
    #[must_use]
    pub fn concurrency(&self) -> Option<usize> {
        self.concurrency
    }

    /// Cap the number of trials in flight at once (at least 1),
    /// or with `None` run all trials at once.
    ///
    /// A scan is bounded by a single total timeout only while
    /// all trials run at once: a cap of `n` makes it last up to
    /// `ceil(trials / n)` times the total timeout.
    pub fn set_concurrency(&mut self, concurrency: Option<usize>) -> &mut Self {
        self.concurrency = concurrency.map(|concurrency| concurrency.max(1));
        self
    }

    /// Same as [`Self::set_concurrency`] but consuming self.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: Option<usize>) -> Self {
        self.set_concurrency(concurrency);
        self
    }

    /// Timeouts applied to every trial.
    #[must_use]
    pub fn timeouts(&self) -> ProbeTimeouts {
        self.timeouts
    }

    /// Set the timeouts applied to every trial.
    pub fn set_timeouts(&mut self, timeouts: ProbeTimeouts) -> &mut Self {
        self.timeouts = timeouts;
        self
    }

    /// Same as [`Self::set_timeouts`] but consuming self.
    #[must_use]
    pub fn with_timeouts(mut self, timeouts: ProbeTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Generator used to synthesize candidates.
    #[must_use]
    pub fn generator(&self) -> CandidateGenerator {
        self.generator
    }

    /// Set the generator used to synthesize candidates.
    pub fn set_generator(&mut self, generator: CandidateGenerator) -> &mut Self {
        self.generator = generator;
        self
    }

    /// Same as [`Self::set_generator`] but consuming self.
    #[must_use]
    pub fn with_generator(mut self, generator: CandidateGenerator) -> Self {
        self.generator = generator;
        self
    }

    /// Seed making range and candidate selection reproducible.
    #[must_use]
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Set (or with `None` clear) the seed.
    pub fn set_seed(&mut self, seed: Option<u64>) -> &mut Self {
        self.seed = seed;
        self
    }

    /// Same as [`Self::set_seed`] but consuming self.
    #[must_use]
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }
}

/// Runs scans using an [`EdgeProbe`].
#[derive(Debug, Clone)]
pub struct Scanner<P> {
    probe: P,
    ranges: Vec<AddressRange>,
    config: ScanConfig,
}

impl<P: EdgeProbe> Scanner<P> {
    /// Create a new [`Scanner`] sampling the [`EDGE_RANGES`]
    /// with the default [`ScanConfig`].
    pub fn new(probe: P) -> Self {
        Self {
            probe,
            ranges: EDGE_RANGES.to_vec(),
            config: ScanConfig::default(),
        }
    }

    /// Sample the given ranges instead of [`EDGE_RANGES`].
    #[must_use]
    pub fn with_ranges(mut self, ranges: impl IntoIterator<Item = AddressRange>) -> Self {
        self.ranges = ranges.into_iter().collect();
        self
    }

    /// Use the given [`ScanConfig`].
    #[must_use]
    pub fn with_config(mut self, config: ScanConfig) -> Self {
        self.config = config;
        self
    }

    /// The active [`ScanConfig`].
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// The ranges sampled from.
    pub fn ranges(&self) -> &[AddressRange] {
        &self.ranges
    }

    /// Run exactly [`ScanConfig::trials`] trials, or less if cancelled.
    ///
    /// Every completed trial is passed to the `observer` as it arrives.
    /// Once `cancel` fires, probes still in flight are abandoned and the
    /// report is marked as cancelled. An empty range table yields an
    /// empty report.
    pub async fn run<O: TrialObserver>(
        &self,
        target: &ProbeTarget,
        observer: O,
        cancel: CancellationToken,
    ) -> ScanReport {
        let mut rng = match self.config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => rand::make_rng(),
        };

        let generator = self.config.generator;
        let candidates: Vec<_> = (0..self.config.trials)
            .map_while(|sequence| {
                let range = *self.ranges.choose(&mut rng)?;
                let address = IpAddr::V4(generator.generate(&range, &mut rng));
                Some((sequence, Some(range), address))
            })
            .collect();

        if candidates.len() < self.config.trials {
            tracing::warn!("no ranges to sample candidates from");
        }

        self.drive(candidates, target, observer, cancel).await
    }

    /// Probe the given addresses, in order, with the same loop
    /// as [`Self::run`] but without sampling any range.
    pub async fn run_addresses<O: TrialObserver>(
        &self,
        addresses: impl IntoIterator<Item = IpAddr>,
        target: &ProbeTarget,
        observer: O,
        cancel: CancellationToken,
    ) -> ScanReport {
        let candidates: Vec<_> = addresses
            .into_iter()
            .enumerate()
            .map(|(sequence, address)| (sequence, None, address))
            .collect();
        self.drive(candidates, target, observer, cancel).await
    }

    async fn drive<O: TrialObserver>(
        &self,
        candidates: Vec<(usize, Option<AddressRange>, IpAddr)>,
        target: &ProbeTarget,
        mut observer: O,
        cancel: CancellationToken,
    ) -> ScanReport {
        let probe = &self.probe;
        let timeouts = self.config.timeouts;
        let concurrency = self
            .config
            .concurrency
            .unwrap_or(candidates.len())
            .max(1);

        tracing::debug!(
            trials = candidates.len(),
            concurrency,
            tls.server_name = target.virtual_host(),
            "scan started",
        );

        let mut trials = Vec::with_capacity(candidates.len());
        let mut pending = pin!(stream::iter(candidates)
            .map(|(sequence, range, address)| async move {
                let result = probe.probe(address, target, timeouts).await;
                TrialRecord {
                    sequence,
                    range,
                    result,
                }
            })
            .buffer_unordered(concurrency));

        let mut cancelled = false;
        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    tracing::debug!(completed = trials.len(), "scan cancelled");
                    cancelled = true;
                    break;
                }
                next = pending.next() => match next {
                    Some(record) => {
                        observer.on_trial(&record);
                        trials.push(record);
                    }
                    None => break,
                },
            }
        }

        let ranking = Ranking::from_records(&trials);
        tracing::debug!(
            attempted = trials.len(),
            succeeded = ranking.len(),
            cancelled,
            "scan finished",
        );

        ScanReport {
            trials,
            ranking,
            cancelled,
        }
    }
}

/// Outcome of a scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    trials: Vec<TrialRecord>,
    ranking: Ranking,
    cancelled: bool,
}

impl ScanReport {
    /// All completed trials, in arrival order.
    #[must_use]
    pub fn trials(&self) -> &[TrialRecord] {
        &self.trials
    }

    /// Reachable candidates, fastest first.
    #[must_use]
    pub fn ranking(&self) -> &Ranking {
        &self.ranking
    }

    /// The fastest reachable candidate, if any.
    #[must_use]
    pub fn winner(&self) -> Option<&ClassifiedResult> {
        self.ranking.winner()
    }

    /// Returns `true` if the scan was cancelled before all trials completed.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Number of completed trials.
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.trials.len()
    }

    /// Number of reachable candidates.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.ranking.len()
    }

    /// Mean latency of the reachable candidates.
    #[must_use]
    pub fn mean_latency(&self) -> Option<Duration> {
        self.ranking.mean_latency()
    }
}

impl Serialize for ScanReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut report = serializer.serialize_struct("ScanReport", 7)?;
        report.serialize_field("attempted", &self.attempted())?;
        report.serialize_field("succeeded", &self.succeeded())?;
        report.serialize_field(
            "mean_latency_ms",
            &self.mean_latency().map(|latency| latency.as_millis()),
        )?;
        report.serialize_field("cancelled", &self.cancelled)?;
        report.serialize_field("winner", &self.winner())?;
        report.serialize_field("ranked", self.ranking.ranked())?;
        report.serialize_field("trials", &self.trials)?;
        report.end()
    }
}
