//! Connection descriptors: `vless://<identity>@<authority>?<query-options>`.
//!
//! Only the authority is ever substituted: virtual host, path and every other
//! query option stay byte-identical between input and rewritten output.

use std::{borrow::Cow, fmt, net::IpAddr, str::FromStr};

use percent_encoding::percent_decode_str;

use crate::probe::{DEFAULT_EDGE_PORT, ProbeTarget};

/// Scheme prefix every descriptor has to start with.
pub const SCHEME: &str = "vless://";

#[derive(Debug, Clone, PartialEq, Eq)]
/// Error returned for a malformed [`ConnectionDescriptor`].
pub enum DescriptorError {
    /// The input does not start with `vless://`.
    MissingScheme,
    /// No `<identity>@` part found before the authority.
    MissingIdentity,
    /// The authority (`host[:port]`) is empty.
    MissingAuthority,
}

impl fmt::Display for DescriptorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingScheme => write!(f, "invalid descriptor: expected {SCHEME} scheme"),
            Self::MissingIdentity => write!(f, "invalid descriptor: missing <identity>@"),
            Self::MissingAuthority => write!(f, "invalid descriptor: missing authority"),
        }
    }
}

impl std::error::Error for DescriptorError {}

/// A parsed connection descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    raw: String,
    identity: String,
    authority: String,
    query: Vec<(String, String)>,
    virtual_host: String,
    path: String,
}

impl ConnectionDescriptor {
    /// Parse a descriptor, ignoring surrounding whitespace.
    ///
    /// The virtual host is taken from the `sni` option, falling back to
    /// `host` and finally to the authority's own host. The path is the
    /// `path` option percent-decoded twice, `/` if absent: shared links
    /// often carry it double-encoded (`%252Fws`).
    pub fn parse(input: &str) -> Result<Self, DescriptorError> {
        let raw = input.trim();
        let rest = raw
            .strip_prefix(SCHEME)
            .ok_or(DescriptorError::MissingScheme)?;

        let rest = rest.split_once('#').map_or(rest, |(before, _)| before);
        let (netloc, query) = rest.split_once('?').unwrap_or((rest, ""));
        let netloc = netloc.split_once('/').map_or(netloc, |(before, _)| before);

        let (identity, authority) = netloc
            .rsplit_once('@')
            .ok_or(DescriptorError::MissingIdentity)?;
        if identity.is_empty() {
            return Err(DescriptorError::MissingIdentity);
        }
        if authority.is_empty() {
            return Err(DescriptorError::MissingAuthority);
        }

        let query: Vec<(String, String)> = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                (decode_component(key), decode_component(value))
            })
            .collect();

        let option = |key: &str| {
            query
                .iter()
                .find(|(k, v)| k == key && !v.is_empty())
                .map(|(_, v)| v.clone())
        };
        let virtual_host = option("sni")
            .or_else(|| option("host"))
            .unwrap_or_else(|| authority_host(authority).to_owned());
        let path = option("path")
            .map(|path| percent_decode_str(&path).decode_utf8_lossy().into_owned())
            .unwrap_or_else(|| "/".to_owned());

        Ok(Self {
            raw: raw.to_owned(),
            identity: identity.to_owned(),
            authority: authority.to_owned(),
            query,
            virtual_host,
            path,
        })
    }

    /// The descriptor as it was parsed.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Scheme identity, e.g. the user id.
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Authority token (`host[:port]`) the descriptor connects to.
    #[must_use]
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Virtual host presented as SNI and `Host` header.
    #[must_use]
    pub fn virtual_host(&self) -> &str {
        &self.virtual_host
    }

    /// Decoded resource path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Value of the first query option with the given key.
    #[must_use]
    pub fn query_option(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The identity to present to every probed candidate.
    #[must_use]
    pub fn probe_target(&self) -> ProbeTarget {
        ProbeTarget::new(self.virtual_host.as_str(), &self.path)
    }

    /// Replace every literal occurrence of the authority token with
    /// `<winner>:443`.
    ///
    /// This is a textual substitution over the descriptor as parsed: if the
    /// authority does not occur verbatim, the descriptor is returned as is.
    #[must_use]
    pub fn rewrite(&self, winner: IpAddr) -> String {
        let target = match winner {
            IpAddr::V4(addr) => format!("{addr}:{DEFAULT_EDGE_PORT}"),
            IpAddr::V6(addr) => format!("[{addr}]:{DEFAULT_EDGE_PORT}"),
        };
        self.raw.replace(&self.authority, &target)
    }
}

impl FromStr for ConnectionDescriptor {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn decode_component(s: &str) -> String {
    let s: Cow<'_, str> = if s.contains('+') {
        Cow::Owned(s.replace('+', " "))
    } else {
        Cow::Borrowed(s)
    };
    percent_decode_str(&s).decode_utf8_lossy().into_owned()
}

fn authority_host(authority: &str) -> &str {
    if let Some(rest) = authority.strip_prefix('[') {
        return rest.split_once(']').map_or(rest, |(host, _)| host);
    }
    authority
        .rsplit_once(':')
        .map_or(authority, |(host, _)| host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    const DESCRIPTOR: &str = "vless://uuid@old.example.com:443?sni=real.host.net&path=%2Fws";

    #[test]
    fn parse_descriptor() {
        let descriptor = ConnectionDescriptor::parse(DESCRIPTOR).unwrap();
        assert_eq!(descriptor.identity(), "uuid");
        assert_eq!(descriptor.authority(), "old.example.com:443");
        assert_eq!(descriptor.virtual_host(), "real.host.net");
        assert_eq!(descriptor.path(), "/ws");
        assert_eq!(descriptor.query_option("sni"), Some("real.host.net"));
        assert_eq!(descriptor.as_str(), DESCRIPTOR);

        let target = descriptor.probe_target();
        assert_eq!(target.virtual_host(), "real.host.net");
        assert_eq!(target.path(), "/ws");
    }

    #[test]
    fn parse_trims_whitespace_and_fragment() {
        let descriptor = ConnectionDescriptor::parse(
            "  vless://uuid@old.example.com:443/?type=ws&host=cdn.host.net#my%20node\n",
        )
        .unwrap();
        assert_eq!(descriptor.authority(), "old.example.com:443");
        assert_eq!(descriptor.virtual_host(), "cdn.host.net");
        assert_eq!(descriptor.path(), "/");
        assert_eq!(
            descriptor.as_str(),
            "vless://uuid@old.example.com:443/?type=ws&host=cdn.host.net#my%20node"
        );
    }

    #[test]
    fn virtual_host_fallbacks() {
        let descriptor =
            ConnectionDescriptor::parse("vless://uuid@a.example.com:443?sni=&host=b.example.com")
                .unwrap();
        assert_eq!(descriptor.virtual_host(), "b.example.com");

        let descriptor = ConnectionDescriptor::parse("vless://uuid@a.example.com:8443").unwrap();
        assert_eq!(descriptor.virtual_host(), "a.example.com");
        assert_eq!(descriptor.path(), "/");

        let descriptor = ConnectionDescriptor::parse("vless://uuid@[2001:db8::1]:443").unwrap();
        assert_eq!(descriptor.virtual_host(), "2001:db8::1");
    }

    #[test]
    fn parse_decodes_options() {
        let descriptor = ConnectionDescriptor::parse(
            "vless://uuid@a.example.com:443?path=%2Fip1neo%40sf%3Fed%3D2048&sni=real.host.net",
        )
        .unwrap();
        assert_eq!(descriptor.path(), "/ip1neo@sf?ed=2048");
    }

    #[test]
    fn parse_decodes_double_encoded_path() {
        let descriptor =
            ConnectionDescriptor::parse("vless://uuid@a.example.com:443?path=%252Fws&sni=real.host.net")
                .unwrap();
        assert_eq!(descriptor.path(), "/ws");
        assert_eq!(descriptor.probe_target().path(), "/ws");
        // only the path is decoded twice
        assert_eq!(descriptor.query_option("path"), Some("%2Fws"));

        let descriptor = ConnectionDescriptor::parse(
            "vless://uuid@a.example.com:443?path=%252Fip1neo%2540sf%253Fed%253D2048",
        )
        .unwrap();
        assert_eq!(descriptor.path(), "/ip1neo@sf?ed=2048");

        // a lone percent sign survives both passes
        let descriptor = ConnectionDescriptor::parse("vless://uuid@a.example.com:443?path=%2F100%25")
            .unwrap();
        assert_eq!(descriptor.path(), "/100%");
    }

    #[test]
    fn parse_malformed() {
        let cases = [
            ("", DescriptorError::MissingScheme),
            ("vmess://uuid@a.example.com:443", DescriptorError::MissingScheme),
            ("https://a.example.com", DescriptorError::MissingScheme),
            ("vless://a.example.com:443?sni=x", DescriptorError::MissingIdentity),
            ("vless://@a.example.com:443", DescriptorError::MissingIdentity),
            ("vless://uuid@?sni=x", DescriptorError::MissingAuthority),
        ];
        for (input, expected) in cases {
            assert_eq!(ConnectionDescriptor::parse(input).unwrap_err(), expected, "{input}");
        }
    }

    #[test]
    fn rewrite_replaces_only_authority() {
        let descriptor: ConnectionDescriptor = DESCRIPTOR.parse().unwrap();
        let rewritten = descriptor.rewrite(IpAddr::V4(Ipv4Addr::new(104, 16, 12, 34)));
        assert_eq!(
            rewritten,
            "vless://uuid@104.16.12.34:443?sni=real.host.net&path=%2Fws"
        );
        assert!(rewritten.contains("sni=real.host.net"));
        assert!(rewritten.contains("path=%2Fws"));
    }

    #[test]
    fn rewrite_replaces_every_occurrence() {
        let descriptor = ConnectionDescriptor::parse(
            "vless://uuid@old.example.com:443?sni=real.host.net#old.example.com:443",
        )
        .unwrap();
        let rewritten = descriptor.rewrite(IpAddr::V4(Ipv4Addr::new(172, 64, 0, 9)));
        assert_eq!(
            rewritten,
            "vless://uuid@172.64.0.9:443?sni=real.host.net#172.64.0.9:443"
        );
    }

    #[test]
    fn rewrite_brackets_ipv6() {
        let descriptor: ConnectionDescriptor = DESCRIPTOR.parse().unwrap();
        let rewritten = descriptor.rewrite(IpAddr::V6(Ipv6Addr::LOCALHOST));
        assert_eq!(rewritten, "vless://uuid@[::1]:443?sni=real.host.net&path=%2Fws");
    }

    #[test]
    fn display_is_raw_input() {
        let descriptor: ConnectionDescriptor = DESCRIPTOR.parse().unwrap();
        assert_eq!(descriptor.to_string(), DESCRIPTOR);
    }
}
