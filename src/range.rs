//! Address ranges known to belong to the target edge network.

use std::{fmt, net::Ipv4Addr, str::FromStr};

use ipnet::Ipv4Net;
use serde::{Serialize, Serializer};

use crate::error::{ErrorContext as _, OpaqueError};

/// An IPv4 address prefix together with its mask width,
/// e.g. `104.16.0.0/13`.
///
/// Ranges are never validated on construction: an entry with a mask wider
/// than 32 bits or with host bits set in its prefix is still usable, the
/// network is always derived by masking (see [`AddressRange::network`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressRange {
    prefix: Ipv4Addr,
    mask: u8,
}

impl AddressRange {
    /// Create a new [`AddressRange`].
    #[must_use]
    pub const fn new(prefix: Ipv4Addr, mask: u8) -> Self {
        Self { prefix, mask }
    }

    /// The prefix as it was defined.
    #[must_use]
    pub const fn prefix(&self) -> Ipv4Addr {
        self.prefix
    }

    /// The mask width in bits, as it was defined.
    #[must_use]
    pub const fn mask(&self) -> u8 {
        self.mask
    }

    /// The mask width clamped to the 32 bits of an IPv4 address.
    #[must_use]
    pub const fn effective_mask(&self) -> u8 {
        if self.mask > 32 { 32 } else { self.mask }
    }

    /// The network address of this range: the prefix with all host bits cleared.
    #[must_use]
    pub fn network(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.prefix) & netmask(self.effective_mask()))
    }

    /// Returns `true` if the given address falls within this range.
    #[must_use]
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        self.as_net().contains(&addr)
    }

    /// Number of bits available for hosts within this range.
    #[must_use]
    pub const fn host_bits(&self) -> u8 {
        32 - self.effective_mask()
    }

    fn as_net(&self) -> Ipv4Net {
        // effective mask is always <= 32
        Ipv4Net::new(self.network(), self.effective_mask())
            .unwrap_or_else(|_| Ipv4Net::from(self.network()))
    }
}

/// The bitmask selecting the first `mask` bits of an IPv4 address.
pub(crate) const fn netmask(mask: u8) -> u32 {
    match mask {
        0 => 0,
        m if m >= 32 => u32::MAX,
        m => u32::MAX << (32 - m),
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.prefix, self.mask)
    }
}

impl FromStr for AddressRange {
    type Err = OpaqueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let net: Ipv4Net = s.trim().parse().context("parse address range as ipv4 cidr")?;
        Ok(Self::new(net.addr(), net.prefix_len()))
    }
}

impl Serialize for AddressRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Address allocations of the edge network, sampled by the scanner.
///
/// Process-wide and read-only.
pub const EDGE_RANGES: &[AddressRange] = &[
    AddressRange::new(Ipv4Addr::new(173, 245, 48, 0), 20),
    AddressRange::new(Ipv4Addr::new(103, 21, 244, 0), 22),
    AddressRange::new(Ipv4Addr::new(103, 22, 200, 0), 22),
    AddressRange::new(Ipv4Addr::new(103, 31, 4, 0), 22),
    AddressRange::new(Ipv4Addr::new(141, 101, 64, 0), 18),
    AddressRange::new(Ipv4Addr::new(108, 162, 192, 0), 18),
    AddressRange::new(Ipv4Addr::new(190, 93, 240, 0), 20),
    AddressRange::new(Ipv4Addr::new(188, 114, 96, 0), 20),
    AddressRange::new(Ipv4Addr::new(197, 234, 240, 0), 22),
    AddressRange::new(Ipv4Addr::new(198, 41, 128, 0), 17),
    AddressRange::new(Ipv4Addr::new(162, 158, 0, 0), 15),
    AddressRange::new(Ipv4Addr::new(104, 16, 0, 0), 13),
    AddressRange::new(Ipv4Addr::new(172, 64, 0, 0), 13),
    AddressRange::new(Ipv4Addr::new(131, 0, 72, 0), 22),
];
