//! Interpretation of the response head returned by an edge.

/// Maximum number of bytes read while waiting for a response head.
pub(super) const MAX_HEAD_SIZE: usize = 16 * 1024;

const MAX_HEADERS: usize = 64;

/// What proved the edge usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum EdgeSignal {
    /// `101 Switching Protocols`.
    SwitchingProtocols,
    /// An `HTTP/2` status line, or SETTINGS answering the `h2` connection preface.
    Http2,
    /// A `server` header carrying the provider signature.
    ProviderSignature,
}

/// Returns `true` once `buf` holds a complete response head.
pub(super) fn is_head_complete(buf: &[u8]) -> bool {
    buf.windows(4).any(|w| w == b"\r\n\r\n")
}

/// Decide if the (possibly partial) response head proves a usable edge.
///
/// `signature` is matched case-insensitively as a substring of any
/// `server` header value.
pub(super) fn evaluate(head: &[u8], signature: Option<&str>) -> Option<EdgeSignal> {
    if head.starts_with(b"HTTP/2") {
        return Some(EdgeSignal::Http2);
    }

    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut response = httparse::Response::new(&mut headers);
    if let Err(err) = response.parse(head) {
        tracing::trace!("invalid response head: {err}");
        return None;
    }

    if response.code == Some(101) {
        return Some(EdgeSignal::SwitchingProtocols);
    }

    let signature = signature.filter(|s| !s.is_empty())?.to_ascii_lowercase();
    response
        .headers
        .iter()
        .filter(|header| header.name.eq_ignore_ascii_case("server"))
        .any(|header| {
            String::from_utf8_lossy(header.value)
                .to_ascii_lowercase()
                .contains(&signature)
        })
        .then_some(EdgeSignal::ProviderSignature)
}
