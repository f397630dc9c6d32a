//! Discovery probes.
//!
//! A probe is one `GET http://127.0.0.1:{port}{path}`. The [`Prober`] trait
//! is the seam the resolver is tested through; [`HttpProber`] is the real
//! implementation.

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::trace;
use url::Url;

use crate::error::{Error, Result};

use super::endpoint::LOOPBACK;

// ============================================================================
// Prober
// ============================================================================

/// Fetches the discovery resource from one candidate port.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Returns the raw body of the discovery resource at `port`.
    ///
    /// # Errors
    ///
    /// Any failure (refused, timeout, non-2xx) is an error; the resolver
    /// treats them all the same way.
    async fn fetch(&self, port: u16, path: &str, timeout: Duration) -> Result<String>;
}

// ============================================================================
// HttpProber
// ============================================================================

/// [`Prober`] backed by a `reqwest` client.
///
/// Proxies are disabled: the discovery resource is always on loopback.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: Client,
    host: IpAddr,
}

impl HttpProber {
    /// Creates a prober targeting the loopback interface.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        let client = Client::builder().no_proxy().build()?;
        Ok(Self {
            client,
            host: LOOPBACK,
        })
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn fetch(&self, port: u16, path: &str, timeout: Duration) -> Result<String> {
        let url = discovery_url(self.host, port, path)?;
        trace!(%url, "Probing");

        let response = self.client.get(url).timeout(timeout).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::ProbeStatus {
                status: status.as_u16(),
            });
        }

        Ok(response.text().await?)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Builds the URL of the discovery resource on `host:port`.
pub(crate) fn discovery_url(host: IpAddr, port: u16, path: &str) -> Result<Url> {
    let base = format!("http://{}/", SocketAddr::new(host, port));
    let mut url =
        Url::parse(&base).map_err(|e| Error::config(format!("invalid discovery url: {e}")))?;
    url.set_path(path);
    Ok(url)
}

/// Parses a discovery body into a control port.
///
/// The body is trimmed and must be a base-10 integer in `1..=65535`.
///
/// # Errors
///
/// Returns [`Error::MalformedDiscovery`] otherwise.
pub fn parse_control_port(body: &str) -> Result<u16> {
    let trimmed = body.trim();
    match trimmed.parse::<u16>() {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(Error::malformed_discovery(trimmed)),
    }
}

// ============================================================================
// Tests
// ============================================================================
