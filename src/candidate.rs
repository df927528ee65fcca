//! Synthesis of plausible edge addresses within a known [`AddressRange`].

use std::net::Ipv4Addr;

use rand::RngExt;

use crate::range::{AddressRange, netmask};

/// The default for [`CandidateGenerator::widest_mask`].
pub const DEFAULT_WIDEST_MASK: u8 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Generates one candidate address inside a given [`AddressRange`].
///
/// Bits between the range's mask and the final octet are randomized within
/// the bounds of the block. The final octet is picked uniformly from
/// `1..=254` for blocks of at least a `/24`, so network and broadcast
/// values are never produced.
///
/// Top-level allocations wider than [`Self::widest_mask`] are narrowed
/// to their first sub-block of that width: edge nodes are densely packed,
/// so sampling a smaller block converges faster than covering the full
/// theoretical space. This is a tunable heuristic, not a correctness
/// requirement.
pub struct CandidateGenerator {
    widest_mask: u8,
}

impl Default for CandidateGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl CandidateGenerator {
    /// Create a new [`CandidateGenerator`] using [`DEFAULT_WIDEST_MASK`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            widest_mask: DEFAULT_WIDEST_MASK,
        }
    }

    /// Mask width below which ranges are narrowed before sampling.
    #[must_use]
    pub const fn widest_mask(&self) -> u8 {
        self.widest_mask
    }

    /// Set the mask width below which ranges are narrowed before sampling.
    ///
    /// Use `0` to sample the full range, whatever its width.
    pub fn set_widest_mask(&mut self, mask: u8) -> &mut Self {
        self.widest_mask = mask.min(32);
        self
    }

    /// Same as [`Self::set_widest_mask`] but consuming self.
    #[must_use]
    pub fn with_widest_mask(mut self, mask: u8) -> Self {
        self.set_widest_mask(mask);
        self
    }

    /// Generate one candidate address within the given range.
    ///
    /// Never fails: an inconsistent range still yields a syntactically
    /// valid address (in the worst case, its network address).
    pub fn generate<R: RngExt + ?Sized>(&self, range: &AddressRange, rng: &mut R) -> Ipv4Addr {
        let mask = range.effective_mask().max(self.widest_mask);
        let network = u32::from(range.network()) & netmask(mask);
        let host_bits = 32 - u32::from(mask);

        let host = if host_bits >= 8 {
            let upper = if host_bits > 8 {
                rng.random_range(0..(1u32 << (host_bits - 8))) << 8
            } else {
                0
            };
            upper | rng.random_range(1..=254u32)
        } else if host_bits >= 2 {
            rng.random_range(1..(1u32 << host_bits) - 1)
        } else {
            0
        };

        Ipv4Addr::from(network | host)
    }
}

/// Generate one candidate within the given range,
/// using the default [`CandidateGenerator`] and the thread-local rng.
#[must_use]
pub fn generate(range: &AddressRange) -> Ipv4Addr {
    CandidateGenerator::new().generate(range, &mut rand::rng())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::EDGE_RANGES;
    use rand::{SeedableRng, rngs::SmallRng};

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(42)
    }

    #[test]
    fn candidates_stay_within_their_range() {
        let generator = CandidateGenerator::new();
        let mut rng = rng();
        for range in EDGE_RANGES {
            for _ in 0..500 {
                let addr = generator.generate(range, &mut rng);
                assert!(range.contains(addr), "{addr} not in {range}");
                let last = addr.octets()[3];
                assert!((1..=254).contains(&last), "{addr} has reserved host octet");
            }
        }
    }

    #[test]
    fn network_octets_match_prefix() {
        let generator = CandidateGenerator::new();
        let mut rng = rng();
        for range in EDGE_RANGES {
            let fixed_octets = usize::from(range.mask() / 8);
            let prefix = range.prefix().octets();
            for _ in 0..100 {
                let addr = generator.generate(range, &mut rng).octets();
                assert_eq!(addr[..fixed_octets], prefix[..fixed_octets], "{range}");
            }
        }
    }

    #[test]
    fn narrow_block_randomizes_third_octet_within_bounds() {
        let generator = CandidateGenerator::new();
        let mut rng = rng();
        let range: AddressRange = "103.21.244.0/22".parse().unwrap();
        let mut seen = [false; 4];
        for _ in 0..1_000 {
            let [a, b, c, _] = generator.generate(&range, &mut rng).octets();
            assert_eq!((a, b), (103, 21));
            assert!((244..=247).contains(&c));
            seen[usize::from(c - 244)] = true;
        }
        assert!(seen.iter().all(|s| *s), "third octet never covered: {seen:?}");
    }

    #[test]
    fn wide_allocation_is_narrowed() {
        let generator = CandidateGenerator::new();
        let mut rng = rng();
        let range: AddressRange = "104.16.0.0/13".parse().unwrap();
        for _ in 0..1_000 {
            let [a, b, _, _] = generator.generate(&range, &mut rng).octets();
            assert_eq!((a, b), (104, 16));
        }
    }

    #[test]
    fn wide_allocation_can_be_widened() {
        let generator = CandidateGenerator::new().with_widest_mask(0);
        let mut rng = rng();
        let range: AddressRange = "104.16.0.0/13".parse().unwrap();
        let mut second_octets = std::collections::HashSet::new();
        for _ in 0..1_000 {
            let addr = generator.generate(&range, &mut rng);
            assert!(range.contains(addr));
            second_octets.insert(addr.octets()[1]);
        }
        assert!(second_octets.len() > 1);
    }

    #[test]
    fn small_blocks_avoid_network_and_broadcast() {
        let generator = CandidateGenerator::new();
        let mut rng = rng();
        let range = AddressRange::new(Ipv4Addr::new(192, 0, 2, 8), 30);
        for _ in 0..100 {
            let addr = generator.generate(&range, &mut rng);
            assert!(
                addr == Ipv4Addr::new(192, 0, 2, 9) || addr == Ipv4Addr::new(192, 0, 2, 10),
                "{addr}"
            );
        }
    }

    #[test]
    fn inconsistent_ranges_still_yield_an_address() {
        let generator = CandidateGenerator::new();
        let mut rng = rng();

        let range = AddressRange::new(Ipv4Addr::new(192, 0, 2, 77), 64);
        assert_eq!(generator.generate(&range, &mut rng), Ipv4Addr::new(192, 0, 2, 77));

        let range = AddressRange::new(Ipv4Addr::new(192, 0, 2, 77), 31);
        assert_eq!(generator.generate(&range, &mut rng), Ipv4Addr::new(192, 0, 2, 76));

        let range = AddressRange::new(Ipv4Addr::new(198, 51, 100, 200), 20);
        let addr = generator.generate(&range, &mut rng);
        assert!(range.contains(addr));
    }

    #[test]
    fn generate_with_thread_rng() {
        let range = EDGE_RANGES[0];
        assert!(range.contains(generate(&range)));
    }
}
