//! Classification and ranking of reachable candidates.

use std::{fmt, net::IpAddr, time::Duration};

use serde::Serialize;

use crate::scan::TrialRecord;

/// Latency from which a candidate is no longer [`LatencyCategory::Interactive`].
pub const STREAMING_THRESHOLD: Duration = Duration::from_millis(250);
/// Latency from which a candidate is only [`LatencyCategory::General`].
pub const GENERAL_THRESHOLD: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
/// Qualitative category of a latency.
pub enum LatencyCategory {
    /// Below 250ms: fit for gaming and other interactive use.
    Interactive,
    /// From 250ms up to (excluding) 500ms: fit for streaming.
    Streaming,
    /// 500ms or more: general, average use.
    General,
}

impl LatencyCategory {
    /// Classify a latency. Boundary values fall into the higher category.
    #[must_use]
    pub fn classify(latency: Duration) -> Self {
        if latency < STREAMING_THRESHOLD {
            Self::Interactive
        } else if latency < GENERAL_THRESHOLD {
            Self::Streaming
        } else {
            Self::General
        }
    }

    /// Short human label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Interactive => "gaming",
            Self::Streaming => "stream",
            Self::General => "average",
        }
    }

    /// Emoji used in human readable reports.
    #[must_use]
    pub const fn emoji(self) -> &'static str {
        match self {
            Self::Interactive => "🎮",
            Self::Streaming => "📺",
            Self::General => "🌐",
        }
    }
}

impl fmt::Display for LatencyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.label().fmt(f)
    }
}

/// A reachable candidate along with its category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClassifiedResult {
    /// Trial sequence number, the tie-break for equal latencies.
    pub sequence: usize,
    /// Address of the candidate.
    pub address: IpAddr,
    #[serde(rename = "latency_ms", serialize_with = "serialize_ms")]
    /// End-to-end latency of the probe.
    pub latency: Duration,
    /// Category of the latency.
    pub category: LatencyCategory,
}

impl ClassifiedResult {
    /// Classify a reachable trial, `None` for an unreachable one.
    #[must_use]
    pub fn from_record(record: &TrialRecord) -> Option<Self> {
        let latency = record.result.latency()?;
        Some(Self {
            sequence: record.sequence,
            address: record.result.address(),
            latency,
            category: LatencyCategory::classify(latency),
        })
    }
}

fn serialize_ms<S: serde::Serializer>(latency: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u128(latency.as_millis())
}

/// Reachable candidates ordered by ascending latency.
///
/// Equal latencies keep the order of their trial sequence numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Ranking {
    ranked: Vec<ClassifiedResult>,
}

impl Ranking {
    /// Rank all reachable trials found in `records`, in any order.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a TrialRecord>) -> Self {
        let mut ranked: Vec<_> = records
            .into_iter()
            .filter_map(ClassifiedResult::from_record)
            .collect();
        // stable: keeps sequence order for equal (latency, sequence) pairs too
        ranked.sort_by_key(|result| (result.latency, result.sequence));
        Self { ranked }
    }

    /// The fastest candidate, `None` if nothing was reachable.
    #[must_use]
    pub fn winner(&self) -> Option<&ClassifiedResult> {
        self.ranked.first()
    }

    /// All reachable candidates, fastest first.
    #[must_use]
    pub fn ranked(&self) -> &[ClassifiedResult] {
        &self.ranked
    }

    /// Number of reachable candidates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ranked.len()
    }

    /// Returns `true` if nothing was reachable.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }

    /// Mean latency of all reachable candidates.
    #[must_use]
    pub fn mean_latency(&self) -> Option<Duration> {
        let count = u32::try_from(self.ranked.len()).ok().filter(|n| *n > 0)?;
        let total: Duration = self.ranked.iter().map(|result| result.latency).sum();
        Some(total / count)
    }
}
