#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Resumable, multi-mirror file transfer engine.
//!
//! Built around a [`Payload`] (an immutable [`Request`] plus its in-progress
//! [`Attempt`]) driven either one at a time through [`download_one`] (the
//! single-transfer entry point: one mirror attempt wrapped with the full
//! `Init -> Progress* -> Completed` event sequence) or as a batch through
//! [`download_many`], which admits payloads up to
//! [`sps2_resources::ResourceManager`]'s configured concurrency and handles
//! mirror failover for each one independently. [`attempt`]/[`finalize`] are
//! the lower-level building blocks both of those use.

pub mod cancel;
pub mod client;
pub mod download;
mod external;
pub mod payload;
pub mod tempfile;
pub mod url;

pub use cancel::CancelToken;
pub use client::Session;
pub use download::{
    attempt, demote_error, download as download_one, download_many, finalize, AttemptOutcome,
    MultiOutcome, PayloadResult, SingleOutcome,
};
pub use external::ExternalFetch;
pub use payload::{Attempt, Payload, Request};
pub use tempfile::TempFileManager;
pub use url::parse_transfer_url;

use sps2_errors::{Error, NetworkError};

/// Fetch a URL's body as text, outside the payload/resume machinery. Useful
/// for small artifacts (repo indexes, checksums) that do not need `.part`
/// bookkeeping or mirror failover.
///
/// # Errors
///
/// Returns an error if the request fails, the server returns a non-success
/// status, or the body cannot be decoded as UTF-8.
pub async fn fetch_text(session: &Session, url: &str) -> Result<String, Error> {
    let response = session
        .send_with_retry(|| session.client().get(url).send())
        .await?;
    ensure_success(&response)?;
    response
        .text()
        .await
        .map_err(|e| NetworkError::DownloadFailed(e.to_string()).into())
}

/// Fetch a URL's body as raw bytes. See [`fetch_text`] for when to prefer this
/// over a full payload.
///
/// # Errors
///
/// Returns an error if the request fails or the server returns a non-success
/// status.
pub async fn fetch_bytes(session: &Session, url: &str) -> Result<Vec<u8>, Error> {
    let response = session
        .send_with_retry(|| session.client().get(url).send())
        .await?;
    ensure_success(&response)?;
    response
        .bytes()
        .await
        .map(|b| b.to_vec())
        .map_err(|e| NetworkError::DownloadFailed(e.to_string()).into())
}

/// Probe a URL with `HEAD`, returning `Ok(false)` rather than an error for
/// any failure short of a malformed request (connection refused, timeout,
/// non-success status all read as "not accessible").
///
/// # Errors
///
/// Returns an error only if the request itself cannot be built.
pub async fn check_url(session: &Session, url: &str) -> Result<bool, Error> {
    match session.client().head(url).send().await {
        Ok(response) => Ok(response.status().is_success()),
        Err(_) => Ok(false),
    }
}

fn ensure_success(response: &reqwest::Response) -> Result<(), Error> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(NetworkError::HttpError {
            status: response.status().as_u16(),
            message: response.status().to_string(),
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_url_rejects_garbage() {
        assert!(parse_transfer_url("not a url").is_err());
    }
}
