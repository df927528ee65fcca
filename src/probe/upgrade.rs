use std::{
    net::{IpAddr, SocketAddr},
    sync::{Arc, OnceLock},
    time::Duration,
};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use http::{
    HeaderValue, Method, Request, Version,
    header::{CONNECTION, HOST, SEC_WEBSOCKET_KEY, SEC_WEBSOCKET_VERSION, UPGRADE, USER_AGENT},
};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use rustls::{ClientConfig, RootCertStore, pki_types::ServerName};
use tokio::{
    io::{AsyncReadExt as _, AsyncWriteExt as _},
    net::TcpStream,
    time::Instant,
};
use tokio_rustls::{TlsConnector, client::TlsStream};

use super::{
    DEFAULT_EDGE_PORT, EdgeProbe, ProbeResult, ProbeTarget, ProbeTimeouts,
    response::{self, EdgeSignal, MAX_HEAD_SIZE},
    verify::NoServerCertVerifier,
};
use crate::error::{ErrorContext as _, ErrorExt as _, OpaqueError};

/// Provider signature expected in the `server` header of edge responses.
pub const DEFAULT_EDGE_SIGNATURE: &str = "cloudflare";

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";

const REQUEST_TARGET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'{')
    .add(b'}');

const ALPN_H2: &[u8] = b"h2";
const ALPN_HTTP_11: &[u8] = b"http/1.1";

const H2_PREFACE: &[u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";
/// Frame header of an empty SETTINGS frame on stream 0.
const H2_EMPTY_SETTINGS: [u8; 9] = [0, 0, 0, 0x4, 0, 0, 0, 0, 0];
const H2_FRAME_SETTINGS: u8 = 0x4;

#[derive(Debug, Clone)]
/// Native [`EdgeProbe`] performing a WebSocket upgrade over TLS.
///
/// The tcp connection is made to the candidate address, while the
/// [`ProbeTarget`]'s virtual host is presented as TLS server name and
/// `Host` header: the candidate is pinned to the identity, much like
/// overriding DNS resolution for that single host.
///
/// A candidate is usable if any of the following holds:
///
/// - the edge answered the upgrade with `101 Switching Protocols`;
/// - the edge answered with an `HTTP/2` status line;
/// - the response carries a `server` header with the provider signature,
///   proving an authentic edge even if the path refuses to upgrade;
/// - `h2` is offered (see [`UpgradeProbeBuilder::with_http2`]), got negotiated
///   and the edge answered the connection preface with its SETTINGS frame.
///
/// In every case the latency runs until the edge's answer arrived.
///
/// Created using [`UpgradeProbe::builder`].
pub struct UpgradeProbe {
    tls_config: Arc<ClientConfig>,
    port: u16,
    signature: Option<Arc<str>>,
}

impl UpgradeProbe {
    /// Create a new [`UpgradeProbe`] with the default configuration.
    pub fn try_new() -> Result<Self, OpaqueError> {
        Self::builder().build()
    }

    /// Create a new [`UpgradeProbeBuilder`].
    #[must_use]
    pub fn builder() -> UpgradeProbeBuilder {
        UpgradeProbeBuilder::new()
    }

    /// Port to which candidates are dialed.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    async fn attempt(
        &self,
        address: IpAddr,
        target: &ProbeTarget,
        connect_timeout: Duration,
    ) -> Result<EdgeSignal, OpaqueError> {
        let server_name = ServerName::try_from(target.virtual_host().to_owned())
            .context("virtual host as tls server name")?;

        let mut stream = tokio::time::timeout(connect_timeout, self.connect(address, server_name))
            .await
            .context("connect timeout")??;

        if stream.get_ref().1.alpn_protocol() == Some(ALPN_H2) {
            return exchange_h2_settings(&mut stream).await;
        }

        let request = upgrade_request(target)?;
        stream
            .write_all(&encode_request_head(&request))
            .await
            .context("write upgrade request")?;
        stream.flush().await.context("flush upgrade request")?;

        let head = read_response_head(&mut stream).await?;
        tracing::trace!(
            network.peer.address = %address,
            "response head: {}",
            String::from_utf8_lossy(&head),
        );

        response::evaluate(&head, self.signature.as_deref())
            .ok_or_else(|| OpaqueError::from_display("response does not prove a usable edge"))
    }

    async fn connect(
        &self,
        address: IpAddr,
        server_name: ServerName<'static>,
    ) -> Result<TlsStream<TcpStream>, OpaqueError> {
        let tcp = TcpStream::connect(SocketAddr::new(address, self.port))
            .await
            .context("tcp connect")?;

        TlsConnector::from(self.tls_config.clone())
            .connect(server_name, tcp)
            .await
            .context("tls handshake")
    }
}

impl EdgeProbe for UpgradeProbe {
    async fn probe(
        &self,
        address: IpAddr,
        target: &ProbeTarget,
        timeouts: ProbeTimeouts,
    ) -> ProbeResult {
        let start = Instant::now();
        let attempt = self.attempt(address, target, timeouts.connect());

        match tokio::time::timeout(timeouts.total(), attempt).await {
            Ok(Ok(signal)) => {
                let latency = start.elapsed();
                tracing::debug!(
                    network.peer.address = %address,
                    tls.server_name = target.virtual_host(),
                    latency_ms = latency.as_millis(),
                    ?signal,
                    "edge candidate reachable",
                );
                ProbeResult::reachable(address, latency)
            }
            Ok(Err(err)) => {
                tracing::debug!(
                    network.peer.address = %address,
                    tls.server_name = target.virtual_host(),
                    "edge candidate unreachable: {err}",
                );
                ProbeResult::unreachable(address)
            }
            Err(_) => {
                tracing::debug!(
                    network.peer.address = %address,
                    tls.server_name = target.virtual_host(),
                    "edge candidate unreachable: timeout after {}ms",
                    timeouts.total().as_millis(),
                );
                ProbeResult::unreachable(address)
            }
        }
    }
}

/// Builder for [`UpgradeProbe`].
#[derive(Debug, Clone)]
pub struct UpgradeProbeBuilder {
    port: u16,
    insecure: bool,
    http2: bool,
    signature: Option<Arc<str>>,
}

impl Default for UpgradeProbeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl UpgradeProbeBuilder {
    /// Create a new [`UpgradeProbeBuilder`]: port 443, verified certificates,
    /// only `http/1.1` offered and the [`DEFAULT_EDGE_SIGNATURE`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            port: DEFAULT_EDGE_PORT,
            insecure: false,
            http2: false,
            signature: Some(Arc::from(DEFAULT_EDGE_SIGNATURE)),
        }
    }

    /// Set the port to which candidates are dialed.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Skip verification of the certificate presented by the edge.
    #[must_use]
    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    /// Offer `h2` in the ALPN extension.
    ///
    /// An edge negotiating it is not sent the upgrade request: it is usable
    /// once it answers the `h2` connection preface with a SETTINGS frame.
    #[must_use]
    pub fn with_http2(mut self, http2: bool) -> Self {
        self.http2 = http2;
        self
    }

    /// Set (or with `None` disable) the provider signature
    /// matched against the `server` response header.
    #[must_use]
    pub fn with_signature(mut self, signature: Option<impl Into<Arc<str>>>) -> Self {
        self.signature = signature.map(Into::into);
        self
    }

    /// Build the [`UpgradeProbe`].
    pub fn build(self) -> Result<UpgradeProbe, OpaqueError> {
        let builder =
            ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
                .with_protocol_versions(rustls::ALL_VERSIONS)
                .context("select tls protocol versions")?;

        let mut config = if self.insecure {
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(NoServerCertVerifier))
                .with_no_client_auth()
        } else {
            builder
                .with_root_certificates(client_root_certs())
                .with_no_client_auth()
        };

        config.alpn_protocols = if self.http2 {
            vec![ALPN_H2.to_vec(), ALPN_HTTP_11.to_vec()]
        } else {
            vec![ALPN_HTTP_11.to_vec()]
        };

        Ok(UpgradeProbe {
            tls_config: Arc::new(config),
            port: self.port,
            signature: self.signature,
        })
    }
}

fn client_root_certs() -> Arc<RootCertStore> {
    static ROOT_CERTS: OnceLock<Arc<RootCertStore>> = OnceLock::new();
    ROOT_CERTS
        .get_or_init(|| {
            let mut root_storage = RootCertStore::empty();
            root_storage.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            Arc::new(root_storage)
        })
        .clone()
}

fn upgrade_request(target: &ProbeTarget) -> Result<Request<()>, OpaqueError> {
    let key: [u8; 16] = rand::random();
    Request::builder()
        .method(Method::GET)
        .uri(utf8_percent_encode(target.path(), REQUEST_TARGET).to_string())
        .version(Version::HTTP_11)
        .header(HOST, target.virtual_host())
        .header(UPGRADE, HeaderValue::from_static("websocket"))
        .header(CONNECTION, HeaderValue::from_static("Upgrade"))
        .header(SEC_WEBSOCKET_KEY, STANDARD.encode(key))
        .header(SEC_WEBSOCKET_VERSION, HeaderValue::from_static("13"))
        .header(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT))
        .body(())
        .context("build upgrade request")
}

fn encode_request_head(request: &Request<()>) -> Vec<u8> {
    let target = request
        .uri()
        .path_and_query()
        .map_or("/", |path_and_query| path_and_query.as_str());

    let mut head = Vec::with_capacity(512);
    head.extend_from_slice(request.method().as_str().as_bytes());
    head.push(b' ');
    head.extend_from_slice(target.as_bytes());
    head.extend_from_slice(b" HTTP/1.1\r\n");
    for (name, value) in request.headers() {
        head.extend_from_slice(name.as_str().as_bytes());
        head.extend_from_slice(b": ");
        head.extend_from_slice(value.as_bytes());
        head.extend_from_slice(b"\r\n");
    }
    head.extend_from_slice(b"\r\n");
    head
}

async fn exchange_h2_settings(
    stream: &mut TlsStream<TcpStream>,
) -> Result<EdgeSignal, OpaqueError> {
    stream
        .write_all(H2_PREFACE)
        .await
        .context("write h2 connection preface")?;
    stream
        .write_all(&H2_EMPTY_SETTINGS)
        .await
        .context("write h2 settings")?;
    stream.flush().await.context("flush h2 preface")?;

    // the server preface has to start with a SETTINGS frame
    let mut frame_header = [0u8; 9];
    stream
        .read_exact(&mut frame_header)
        .await
        .context("read h2 server preface")?;
    if frame_header[3] != H2_FRAME_SETTINGS {
        return Err(OpaqueError::from_display(format!(
            "h2 server preface starts with frame type {:#x} instead of SETTINGS",
            frame_header[3],
        )));
    }
    Ok(EdgeSignal::Http2)
}

async fn read_response_head(stream: &mut TlsStream<TcpStream>) -> Result<Vec<u8>, OpaqueError> {
    let mut head = Vec::with_capacity(1024);
    let mut chunk = [0u8; 4096];
    loop {
        let n = match stream.read(&mut chunk).await {
            Ok(n) => n,
            // edges often drop the connection without a tls close_notify
            Err(_) if !head.is_empty() => break,
            Err(err) => return Err(err.context("read response head")),
        };
        if n == 0 {
            break;
        }
        head.extend_from_slice(&chunk[..n]);
        if head.len() >= MAX_HEAD_SIZE || response::is_head_complete(&head) {
            break;
        }
    }
    Ok(head)
}
