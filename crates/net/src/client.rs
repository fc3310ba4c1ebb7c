//! Transport session shared by the single- and multi-transfer drivers.
//!
//! Both drivers need the same `reqwest::Client`, the same timeout/user-agent
//! policy, and the same same-mirror retry loop; giving them a single
//! [`Session`] to hold onto avoids each driver reimplementing that policy
//! (and avoids building a fresh `reqwest::Client`, and its connection pool,
//! per transfer).

use crate::external::ExternalFetch;
use rand::Rng;
use sps2_config::NetworkConfig;
use sps2_errors::{Error, NetworkError};
use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

/// Connect timeout applied to every attempt, independent of the overall
/// per-transfer timeout (which `disable_dl_timeout` can turn off).
const CONNECT_TIMEOUT_SECS: u64 = 10;
/// Redirect chains longer than this are treated as a transport failure.
const MAX_REDIRECTS: usize = 10;
/// TCP keepalive idle time and probe interval.
const KEEPALIVE_SECS: u64 = 60;
/// Window the low-speed guard uses to decide a transfer has stalled.
pub const STALL_WINDOW_SECS: u64 = 10;

/// Shared HTTP transport plus the retry policy same-mirror attempts use.
///
/// This is not a pluggable strategy: the engine's only notion of retry
/// beyond this bounded same-mirror loop is moving to the next mirror, which
/// lives in the multi-transfer driver instead.
#[derive(Clone)]
pub struct Session {
    client: reqwest::Client,
    retries: u32,
    retry_delay: Duration,
    disable_timeout: bool,
    max_sig_size: u64,
    external_fetch: Option<ExternalFetch>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("client", &self.client)
            .field("retries", &self.retries)
            .field("retry_delay", &self.retry_delay)
            .field("disable_timeout", &self.disable_timeout)
            .field("max_sig_size", &self.max_sig_size)
            .field("external_fetch", &self.external_fetch.is_some())
            .finish()
    }
}

impl Session {
    /// Build a session from network configuration.
    ///
    /// `disable_timeout` mirrors [`sps2_config::GeneralConfig::disable_dl_timeout`];
    /// it is a separate parameter rather than a `NetworkConfig` field since the
    /// timeout policy is a general, not per-protocol, setting.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed
    /// (e.g. the TLS backend fails to initialize).
    pub fn new(config: &NetworkConfig, disable_timeout: bool) -> Result<Self, Error> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .tcp_keepalive(Duration::from_secs(KEEPALIVE_SECS));

        if !disable_timeout {
            builder = builder.timeout(Duration::from_secs(config.timeout));
        }

        let user_agent = config
            .user_agent
            .clone()
            .or_else(|| std::env::var("HTTP_USER_AGENT").ok());
        if let Some(agent) = user_agent {
            builder = builder.user_agent(agent);
        }

        let client = builder
            .build()
            .map_err(|e| Error::internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            retries: config.retries,
            retry_delay: Duration::from_secs(config.retry_delay),
            disable_timeout,
            max_sig_size: config.max_sig_size,
            external_fetch: None,
        })
    }

    /// Upper bound applied to signature-companion payloads, from
    /// [`sps2_config::NetworkConfig::max_sig_size`].
    #[must_use]
    pub fn max_sig_size(&self) -> u64 {
        self.max_sig_size
    }

    /// Attach a fetch callback that bypasses the HTTP transport for every
    /// mirror attempt made through this session.
    #[must_use]
    pub fn with_external_fetch(mut self, fetch: ExternalFetch) -> Self {
        self.external_fetch = Some(fetch);
        self
    }

    #[must_use]
    pub fn external_fetch(&self) -> Option<&ExternalFetch> {
        self.external_fetch.as_ref()
    }

    #[must_use]
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// How long the streaming loop should wait for the next chunk before
    /// treating the transfer as stalled, or `None` when `disable_dl_timeout`
    /// is set.
    #[must_use]
    pub fn stall_timeout(&self) -> Option<Duration> {
        (!self.disable_timeout).then(|| Duration::from_secs(STALL_WINDOW_SECS))
    }

    /// Run `attempt` against the current mirror, retrying on transport-level
    /// failures (connect/timeout/reset) up to the configured retry count
    /// with jittered backoff. Non-transport failures (HTTP status handling,
    /// stream errors) are the caller's responsibility and are not retried
    /// here.
    ///
    /// # Errors
    ///
    /// Returns the last transport error once retries are exhausted.
    pub async fn send_with_retry<F, Fut>(&self, mut attempt: F) -> Result<reqwest::Response, Error>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
    {
        let mut last_err = None;
        for attempt_no in 0..=self.retries {
            match attempt().await {
                Ok(response) => return Ok(response),
                Err(e) if attempt_no < self.retries && is_transport_retryable(&e) => {
                    let delay = backoff_delay(self.retry_delay, attempt_no);
                    tracing::debug!(attempt = attempt_no, ?delay, "retrying transfer attempt");
                    tokio::time::sleep(delay).await;
                    last_err = Some(e);
                }
                Err(e) => return Err(map_transport_error(e)),
            }
        }
        Err(last_err.map_or_else(
            || Error::internal("retry loop exited without a response or error"),
            map_transport_error,
        ))
    }
}

fn is_transport_retryable(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

/// Exponential backoff with jitter, capped at 30s, grounded in the base delay
/// configured for the session.
fn backoff_delay(base: Duration, attempt_no: u32) -> Duration {
    let exp = base.saturating_mul(1u32 << attempt_no.min(6));
    let capped = exp.min(Duration::from_secs(30));
    let jitter_ms = rand::thread_rng().gen_range(0..=100);
    capped.saturating_add(Duration::from_millis(jitter_ms))
}

/// Maps a `reqwest` failure onto the engine's error kinds. DNS resolution
/// failures are singled out as [`NetworkError::ServerBadUrl`] so the
/// multi-transfer driver can fail over to the next mirror instead of
/// retrying a host that will never resolve.
pub(crate) fn map_transport_error(err: reqwest::Error) -> Error {
    let url = err.url().map(reqwest::Url::to_string).unwrap_or_default();
    if err.is_timeout() {
        NetworkError::Timeout { url }.into()
    } else if err.is_connect() && is_dns_failure(&err) {
        NetworkError::ServerBadUrl {
            url,
            reason: "could not resolve host".to_string(),
        }
        .into()
    } else if err.is_connect() {
        NetworkError::ConnectionRefused(err.to_string()).into()
    } else {
        NetworkError::DownloadFailed(err.to_string()).into()
    }
}

/// `reqwest` does not expose a dedicated DNS-failure variant; the only
/// reliable signal is the lowercase substring in the error source chain.
fn is_dns_failure(err: &reqwest::Error) -> bool {
    let mut source = err.source();
    while let Some(err) = source {
        let msg = err.to_string().to_lowercase();
        if msg.contains("dns") || msg.contains("resolve") || msg.contains("lookup") {
            return true;
        }
        source = err.source();
    }
    false
}
