//! The probe capability: one bounded protocol-upgrade attempt
//! against a candidate address.
//!
//! [`EdgeProbe`] is the abstract capability the scanner depends on.
//! [`UpgradeProbe`] implements it natively using tokio and rustls:
//! a TLS handshake presenting the virtual host as server name, followed
//! by a WebSocket upgrade request for the target path.

use std::{net::IpAddr, sync::Arc, time::Duration};

use serde::{Serialize, Serializer};

use crate::error::OpaqueError;

mod response;
mod upgrade;
mod verify;

#[doc(inline)]
pub use self::upgrade::{DEFAULT_EDGE_SIGNATURE, UpgradeProbe, UpgradeProbeBuilder};

/// Default port used to reach edge candidates.
pub const DEFAULT_EDGE_PORT: u16 = 443;

/// The virtual-host identity and resource path presented to every candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    virtual_host: Arc<str>,
    path: Arc<str>,
}

impl ProbeTarget {
    /// Create a new [`ProbeTarget`].
    ///
    /// An empty path is treated as `/`.
    pub fn new(virtual_host: impl Into<Arc<str>>, path: impl AsRef<str>) -> Self {
        let path = path.as_ref();
        let path: Arc<str> = if path.is_empty() {
            Arc::from("/")
        } else if path.starts_with('/') {
            Arc::from(path)
        } else {
            Arc::from(format!("/{path}"))
        };
        Self {
            virtual_host: virtual_host.into(),
            path,
        }
    }

    /// Hostname presented as TLS server name and `Host` header.
    #[must_use]
    pub fn virtual_host(&self) -> &str {
        &self.virtual_host
    }

    /// Resource path requested during the upgrade.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Timeouts of a single probe attempt.
///
/// The connect phase (tcp connect and tls handshake) is always
/// strictly shorter than the total attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeTimeouts {
    connect: Duration,
    total: Duration,
}

impl Default for ProbeTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(2),
            total: Duration::from_secs(5),
        }
    }
}

impl ProbeTimeouts {
    /// Create new [`ProbeTimeouts`], failing if `connect` is not
    /// strictly shorter than `total`.
    pub fn try_new(connect: Duration, total: Duration) -> Result<Self, OpaqueError> {
        if connect.is_zero() || connect >= total {
            return Err(OpaqueError::from_display(format!(
                "connect timeout ({}ms) has to be non-zero and shorter than the total timeout ({}ms)",
                connect.as_millis(),
                total.as_millis(),
            )));
        }
        Ok(Self { connect, total })
    }

    /// Budget for the tcp connect and tls handshake.
    #[must_use]
    pub const fn connect(&self) -> Duration {
        self.connect
    }

    /// Hard wall-clock budget for the entire attempt.
    #[must_use]
    pub const fn total(&self) -> Duration {
        self.total
    }
}

/// Outcome of a single probe.
///
/// All failure causes collapse into the same unreachable outcome,
/// which never carries a latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    address: IpAddr,
    #[serde(rename = "latency_ms", serialize_with = "serialize_latency_ms")]
    latency: Option<Duration>,
}

impl ProbeResult {
    /// A reachable candidate, answering after the given latency.
    #[must_use]
    pub const fn reachable(address: IpAddr, latency: Duration) -> Self {
        Self {
            address,
            latency: Some(latency),
        }
    }

    /// A candidate that could not be used.
    #[must_use]
    pub const fn unreachable(address: IpAddr) -> Self {
        Self {
            address,
            latency: None,
        }
    }

    /// The probed address.
    #[must_use]
    pub const fn address(&self) -> IpAddr {
        self.address
    }

    /// End-to-end latency, only present for reachable candidates.
    #[must_use]
    pub const fn latency(&self) -> Option<Duration> {
        self.latency
    }

    /// Returns `true` if the candidate was usable.
    #[must_use]
    pub const fn is_reachable(&self) -> bool {
        self.latency.is_some()
    }
}

fn serialize_latency_ms<S: Serializer>(
    latency: &Option<Duration>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match latency {
        Some(latency) => serializer.serialize_some(&latency.as_millis()),
        None => serializer.serialize_none(),
    }
}

/// The probe capability.
///
/// Attempts one protocol-upgrade handshake against `address`, presenting
/// the [`ProbeTarget`] identity, and reports whether the candidate is
/// usable. Implementations must never return later than
/// [`ProbeTimeouts::total`] and must never fail: every error degrades
/// into [`ProbeResult::unreachable`].
pub trait EdgeProbe: Send + Sync + 'static {
    /// Probe a single address.
    fn probe(
        &self,
        address: IpAddr,
        target: &ProbeTarget,
        timeouts: ProbeTimeouts,
    ) -> impl Future<Output = ProbeResult> + Send;
}

impl<P: EdgeProbe> EdgeProbe for Arc<P> {
    fn probe(
        &self,
        address: IpAddr,
        target: &ProbeTarget,
        timeouts: ProbeTimeouts,
    ) -> impl Future<Output = ProbeResult> + Send {
        (**self).probe(address, target, timeouts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn target_path_is_normalized() {
        assert_eq!(ProbeTarget::new("real.host.net", "").path(), "/");
        assert_eq!(ProbeTarget::new("real.host.net", "ws").path(), "/ws");
        assert_eq!(ProbeTarget::new("real.host.net", "/ws?ed=2048").path(), "/ws?ed=2048");
        assert_eq!(ProbeTarget::new("real.host.net", "/").virtual_host(), "real.host.net");
    }

    #[test]
    fn timeouts_reject_connect_not_shorter_than_total() {
        assert!(ProbeTimeouts::try_new(Duration::from_secs(5), Duration::from_secs(5)).is_err());
        assert!(ProbeTimeouts::try_new(Duration::from_secs(6), Duration::from_secs(5)).is_err());
        assert!(ProbeTimeouts::try_new(Duration::ZERO, Duration::from_secs(5)).is_err());

        let timeouts =
            ProbeTimeouts::try_new(Duration::from_millis(500), Duration::from_secs(1)).unwrap();
        assert_eq!(timeouts.connect(), Duration::from_millis(500));
        assert_eq!(timeouts.total(), Duration::from_secs(1));
    }

    #[test]
    fn default_timeouts() {
        let timeouts = ProbeTimeouts::default();
        assert!(timeouts.connect() < timeouts.total());
    }

    #[test]
    fn unreachable_result_has_no_latency() {
        let addr = IpAddr::V4(Ipv4Addr::new(104, 16, 1, 1));
        let result = ProbeResult::unreachable(addr);
        assert!(!result.is_reachable());
        assert_eq!(result.latency(), None);

        let result = ProbeResult::reachable(addr, Duration::from_millis(120));
        assert!(result.is_reachable());
        assert_eq!(result.latency(), Some(Duration::from_millis(120)));
    }

    #[test]
    fn result_serializes_latency_in_millis() {
        let addr = IpAddr::V4(Ipv4Addr::new(104, 16, 1, 1));
        let json = serde_json::to_value(ProbeResult::reachable(addr, Duration::from_millis(120)))
            .unwrap();
        assert_eq!(json["address"], "104.16.1.1");
        assert_eq!(json["latency_ms"], 120);

        let json = serde_json::to_value(ProbeResult::unreachable(addr)).unwrap();
        assert!(json["latency_ms"].is_null());
    }
}
