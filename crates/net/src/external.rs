//! External-fetch fallback: when the caller supplies a fetch function, the
//! engine bypasses the HTTP transport entirely and lets that function
//! retrieve each mirror URL into place. This exists for hosts that proxy
//! fetches through something other than plain HTTP(S) (a FUSE-mounted
//! cache, a corporate artifact store reachable only via its own client
//! library) without needing their own driver.
//!
//! The fallback still goes through the normal mirror-failover loop in
//! [`super::download::multi`]: a failed fetch comes back as
//! [`super::download::single::AttemptOutcome::Retryable`], so a multi-mirror
//! payload tries its next server exactly as it would against a transport
//! failure.

use crate::payload::Payload;
use crate::tempfile::TempFileManager;
use futures::future::BoxFuture;
use sps2_errors::{Error, NetworkError};
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

/// Caller-supplied fetch function: retrieve `url` into `dest`, respecting
/// `force` the same way the transport path would (bypass any conditional-GET
/// equivalent the source might otherwise apply).
///
/// Wrapped in `Arc` rather than taken by value so a [`crate::client::Session`]
/// can be cloned cheaply across concurrent payloads in a batch.
pub type ExternalFetch =
    Arc<dyn Fn(Url, PathBuf, bool) -> BoxFuture<'static, Result<(), Error>> + Send + Sync>;

/// Run one mirror attempt through `fetch` instead of the HTTP transport.
///
/// Returns `Fetched` on success (with the byte count read back from disk,
/// since the callback reports no progress), `Retryable` on failure so the
/// caller can fail over to the next mirror, matching the behavior of the
/// transport path for the same `AttemptOutcome`.
pub(crate) async fn attempt(
    fetch: &ExternalFetch,
    files: &TempFileManager,
    payload: &Payload,
) -> super::download::AttemptOutcome {
    use super::download::AttemptOutcome;

    let Some(url) = payload.current_server().cloned() else {
        return AttemptOutcome::Fatal(
            NetworkError::ServerNone {
                remote_name: payload.request.remote_name.clone(),
            }
            .into(),
        );
    };

    let destination = files.dest_path(&payload.request.remote_name);
    let result = fetch(url, destination.clone(), payload.request.force).await;

    match result {
        Ok(()) => match tokio::fs::metadata(&destination).await {
            Ok(metadata) => AttemptOutcome::Fetched {
                bytes: metadata.len(),
                destination,
            },
            Err(e) => AttemptOutcome::Fatal(Error::io_with_path(&e, &destination)),
        },
        Err(e) => AttemptOutcome::Retryable(
            NetworkError::ExternalFetchFailed(e.to_string()).into(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::AttemptOutcome;
    use crate::payload::Request;

    fn fetch_ok() -> ExternalFetch {
        Arc::new(|_url, dest, _force| {
            Box::pin(async move {
                tokio::fs::write(&dest, b"fetched by callback").await?;
                Ok(())
            })
        })
    }

    fn fetch_err() -> ExternalFetch {
        Arc::new(|_url, _dest, _force| {
            Box::pin(async move { Err(Error::internal("callback refused")) })
        })
    }

    #[tokio::test]
    async fn successful_fetch_reports_bytes_written() {
        let dir = tempfile::tempdir().unwrap();
        let files = TempFileManager::new(dir.path(), dir.path());
        let url = Url::parse("https://mirror.example.com/pkg.tar.zst").unwrap();
        let payload = Payload::new(Request::new(url, dir.path().to_path_buf()));

        let outcome = attempt(&fetch_ok(), &files, &payload).await;
        match outcome {
            AttemptOutcome::Fetched { bytes, destination } => {
                assert_eq!(bytes, b"fetched by callback".len() as u64);
                assert_eq!(
                    tokio::fs::read(&destination).await.unwrap(),
                    b"fetched by callback"
                );
            }
            other => panic!("expected Fetched, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn failing_fetch_is_retryable() {
        let dir = tempfile::tempdir().unwrap();
        let files = TempFileManager::new(dir.path(), dir.path());
        let url = Url::parse("https://mirror.example.com/pkg.tar.zst").unwrap();
        let payload = Payload::new(Request::new(url, dir.path().to_path_buf()));

        let outcome = attempt(&fetch_err(), &files, &payload).await;
        assert!(matches!(outcome, AttemptOutcome::Retryable(_)));
    }

    #[tokio::test]
    async fn exhausted_servers_report_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let files = TempFileManager::new(dir.path(), dir.path());
        let url = Url::parse("https://mirror.example.com/pkg.tar.zst").unwrap();
        let mut payload = Payload::new(Request::new(url, dir.path().to_path_buf()));
        payload.attempt.server_idx = 1;

        let outcome = attempt(&fetch_ok(), &files, &payload).await;
        assert!(matches!(outcome, AttemptOutcome::Fatal(_)));
    }
}
