//! Multi-transfer driver: admits many payloads at once, bounded by
//! [`sps2_resources::ResourceManager`], and runs each one to completion
//! independently.
//!
//! Each admitted payload gets its own mirror-failover loop (try a mirror via
//! [`super::single::attempt`], move to the next one on a retryable failure,
//! give up once [`Payload::servers_exhausted`] or a fatal failure hits). A
//! required payload (`errors_ok == false`) failing stops admission of
//! whatever is still queued, but payloads already admitted keep running to
//! completion rather than being aborted mid-transfer.

use crate::cancel::CancelToken;
use crate::client::Session;
use crate::download::single::{self, AttemptOutcome, SingleOutcome};
use crate::payload::Payload;
use crate::tempfile::TempFileManager;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use sps2_errors::Error;
use sps2_events::{EventEmitter, EventSender};
use sps2_resources::ResourceManager;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use url::Url;

/// Per-payload result: `Ok` on success, `Err(Some(e))` on a failure the
/// caller must report, `Err(None)` when the payload was optional and the
/// failure was swallowed.
pub type PayloadResult = Result<SingleOutcome, Option<Error>>;

/// Outcome of a batch of payloads.
#[derive(Debug)]
pub struct MultiOutcome {
    /// Every payload the caller submitted (including signature companions
    /// synthesized from `fetch_signature`), paired with its result. Payloads
    /// never admitted because an earlier required payload failed are
    /// included with a [`sps2_errors::Error::Cancelled`] result.
    pub results: Vec<(Payload, PayloadResult)>,
    /// `false` if any non-optional payload ended in `Err(Some(_))`.
    pub all_required_succeeded: bool,
}

/// Run a batch of payloads to completion, admitting up to
/// `resources`'s configured concurrency at a time.
///
/// Every payload is queued as a task right away; the concurrency bound comes
/// from each task waiting on [`ResourceManager::acquire_download_permit`]
/// before it does any network I/O, not from staggering when tasks are
/// created. A required payload (`errors_ok == false`) failing sets a shared
/// flag that later, not-yet-started tasks check before acquiring a permit,
/// so a batch-ending failure does not waste a concurrency slot on work that
/// would be reported as failed anyway; work already past that check keeps
/// running to completion.
pub async fn download_many(
    session: &Session,
    files: &TempFileManager,
    resources: &ResourceManager,
    payloads: Vec<Payload>,
    cancel: &CancelToken,
    events: &EventSender,
) -> MultiOutcome {
    let payloads = expand_with_signatures(payloads, session.max_sig_size());
    let stop_admitting = Arc::new(AtomicBool::new(false));
    let mut in_flight = FuturesUnordered::new();

    for mut payload in payloads {
        announce_init(events, &payload);

        let session = session.clone();
        let files = files.clone();
        let cancel = cancel.clone();
        let events = events.clone();
        let resources = resources.clone();
        let stop_admitting = Arc::clone(&stop_admitting);

        in_flight.push(async move {
            if stop_admitting.load(Ordering::SeqCst) || cancel.check().is_err() {
                return (payload, Err(Some(Error::Cancelled)));
            }

            let permit = match resources.acquire_download_permit().await {
                Ok(permit) => permit,
                Err(e) => return (payload, Err(Some(e))),
            };

            if stop_admitting.load(Ordering::SeqCst) {
                drop(permit);
                return (payload, Err(Some(Error::Cancelled)));
            }

            let outcome = run_payload(&session, &files, &mut payload, &cancel, &events).await;
            drop(permit);
            (payload, outcome)
        });
    }

    let mut results = Vec::new();
    while let Some((payload, outcome)) = in_flight.next().await {
        announce_completed(events, &payload, &outcome);
        if matches!(outcome, Err(Some(_))) && !payload.request.errors_ok {
            stop_admitting.store(true, Ordering::SeqCst);
        }
        results.push((payload, outcome));
    }

    let all_required_succeeded = results
        .iter()
        .all(|(_, outcome)| !matches!(outcome, Err(Some(_))));

    MultiOutcome {
        results,
        all_required_succeeded,
    }
}

/// Run the mirror-failover loop for one payload: try the current server,
/// move to the next on a retryable failure, stop on the first fatal one or
/// once every mirror has been tried.
async fn run_payload(
    session: &Session,
    files: &TempFileManager,
    payload: &mut Payload,
    cancel: &CancelToken,
    events: &EventSender,
) -> PayloadResult {
    loop {
        let outcome = single::attempt(session, files, payload, cancel, events).await;
        match outcome {
            AttemptOutcome::Fetched { bytes, destination } => {
                return Ok(SingleOutcome::Fetched { bytes, destination })
            }
            AttemptOutcome::UpToDate => return Ok(SingleOutcome::UpToDate),
            AttemptOutcome::Fatal(e) => {
                return Err(single::demote_error(e, payload.request.errors_ok))
            }
            AttemptOutcome::Retryable(e) => {
                let failed_url = payload
                    .current_server()
                    .map(Url::to_string)
                    .unwrap_or_default();
                payload.retry_next_server();
                if payload.servers_exhausted() {
                    return Err(single::demote_error(e, payload.request.errors_ok));
                }
                if !payload.request.is_signature {
                    let next_url = payload.current_server().map(Url::to_string);
                    events.emit_download_failover(
                        payload.request.remote_name.clone(),
                        failed_url,
                        next_url,
                    );
                }
            }
        }
    }
}

fn announce_init(events: &EventSender, payload: &Payload) {
    if payload.request.is_signature {
        return;
    }
    let url = payload
        .current_server()
        .map(Url::to_string)
        .unwrap_or_default();
    events.emit_download_init(
        url,
        payload.request.remote_name.clone(),
        None,
        None,
        payload.request.errors_ok,
    );
}

fn announce_completed(events: &EventSender, payload: &Payload, outcome: &PayloadResult) {
    if payload.request.is_signature {
        return;
    }
    let url = payload
        .current_server()
        .map(Url::to_string)
        .unwrap_or_default();
    events.emit_download_completed(
        url,
        payload.request.remote_name.clone(),
        single::outcome_to_event(outcome),
    );
}

/// Expand the submitted batch with a signature companion payload for every
/// payload whose `fetch_signature` flag is set, capped at `max_sig_size`.
fn expand_with_signatures(payloads: Vec<Payload>, max_sig_size: u64) -> Vec<Payload> {
    let mut expanded = Vec::with_capacity(payloads.len());
    for payload in payloads {
        if payload.request.fetch_signature {
            let companion = Payload::new(payload.request.signature_companion(max_sig_size));
            expanded.push(payload);
            expanded.push(companion);
        } else {
            expanded.push(payload);
        }
    }
    expanded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::Request;
    use sps2_resources::ResourceLimits;
    use url::Url;

    fn resources(n: usize) -> ResourceManager {
        ResourceManager::new(ResourceLimits {
            concurrent_downloads: n,
            memory_usage: None,
        })
    }

    #[tokio::test]
    async fn empty_batch_returns_empty_results() {
        let session = Session::new(&sps2_config::NetworkConfig::default(), false).unwrap();
        let files = TempFileManager::new("/tmp/sps2-multi-test-dest", "/tmp/sps2-multi-test-tmp");
        let cancel = CancelToken::new();
        let (tx, _rx) = sps2_events::channel();
        let outcome = download_many(&session, &files, &resources(2), Vec::new(), &cancel, &tx).await;
        assert!(outcome.results.is_empty());
        assert!(outcome.all_required_succeeded);
    }

    #[tokio::test]
    async fn already_cancelled_batch_reports_every_payload_as_cancelled() {
        let session = Session::new(&sps2_config::NetworkConfig::default(), false).unwrap();
        let files = TempFileManager::new("/tmp/sps2-multi-test-dest2", "/tmp/sps2-multi-test-tmp2");
        let cancel = CancelToken::new();
        cancel.cancel();
        let (tx, _rx) = sps2_events::channel();

        let url = Url::parse("https://mirror.example.com/pkg.tar.zst").unwrap();
        let request = Request::new(url, "/tmp/sps2-multi-test-dest2".into());
        let payload = Payload::new(request);

        let outcome = download_many(
            &session,
            &files,
            &resources(2),
            vec![payload],
            &cancel,
            &tx,
        )
        .await;

        assert_eq!(outcome.results.len(), 1);
        assert!(!outcome.all_required_succeeded);
        assert!(matches!(outcome.results[0].1, Err(Some(_))));
    }

    #[test]
    fn expand_with_signatures_adds_one_companion_per_request() {
        let url = Url::parse("https://mirror.example.com/pkg.tar.zst").unwrap();
        let mut request = Request::new(url, "/tmp".into());
        request.fetch_signature = true;
        let payloads = vec![Payload::new(request)];
        let expanded = expand_with_signatures(payloads, 64 * 1024);
        assert_eq!(expanded.len(), 2);
        assert!(expanded[1].request.is_signature);
        assert_eq!(expanded[1].request.remote_name, "pkg.tar.zst.sig");
        assert_eq!(expanded[1].request.max_size, Some(64 * 1024));
    }
}
