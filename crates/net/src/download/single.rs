//! Single-transfer driver: one GET against one mirror.
//!
//! Owns conditional GET, range resume, progress deduplication, the
//! post-transfer decision tree, and atomic publish. It does not know about
//! mirror lists; [`attempt`] always targets [`Payload::current_server`],
//! and advancing to the next mirror on failure is the multi-transfer
//! driver's job (see [`super::multi`]).

use crate::cancel::CancelToken;
use crate::client::Session;
use crate::payload::Payload;
use crate::tempfile::TempFileManager;
use crate::url::{effective_remote_name, filename_from_content_disposition};
use futures::StreamExt;
use reqwest::header::{
    CONTENT_DISPOSITION, CONTENT_LENGTH, IF_MODIFIED_SINCE, LAST_MODIFIED, RANGE,
};
use reqwest::StatusCode;
use sps2_errors::{Error, NetworkError};
use sps2_events::{DownloadOutcome, EventEmitter, EventSender};
use std::path::PathBuf;
use std::time::SystemTime;
use tokio::fs::File;
use tokio::io::{AsyncSeekExt, AsyncWriteExt, SeekFrom};

/// Result of one completed attempt, before the caller decides whether the
/// batch should keep running.
#[derive(Debug)]
pub enum AttemptOutcome {
    /// Bytes were written (or the payload resumed to completion) and
    /// published to `destination`.
    Fetched { bytes: u64, destination: PathBuf },
    /// A conditional GET (or a resume that found nothing left to fetch)
    /// confirmed the local copy is current.
    UpToDate,
    /// The attempt failed in a way a different mirror might recover from.
    Retryable(Error),
    /// The attempt failed in a way retrying (this mirror or another) will
    /// not fix: cancellation, or the max-size cap was exceeded.
    Fatal(Error),
}

/// The terminal result of a whole payload (after all mirrors have been
/// tried), matching the engine's `download()` return contract: `Ok(fresh)`,
/// `Ok(up_to_date)`, or `Err`.
#[derive(Debug)]
pub enum SingleOutcome {
    Fetched { bytes: u64, destination: PathBuf },
    UpToDate,
}

/// Run one mirror attempt for `payload`, reporting progress as it goes.
///
/// This only emits `Progress` (and only when the payload is not a signature
/// and the response is not a redirect body); it does not emit `Init` or
/// `Completed`. Most callers want [`download`], which wraps this together
/// with [`finalize`] and emits the full per-payload event sequence; use
/// `attempt`/`finalize` directly only when composing your own mirror-failover
/// loop, as [`super::multi::run_payload`] does.
pub async fn attempt(
    session: &Session,
    files: &TempFileManager,
    payload: &mut Payload,
    cancel: &CancelToken,
    events: &EventSender,
) -> AttemptOutcome {
    let Some(url) = payload.current_server().cloned() else {
        return AttemptOutcome::Fatal(
            NetworkError::ServerNone {
                remote_name: payload.request.remote_name.clone(),
            }
            .into(),
        );
    };

    if let Err(e) = cancel.check() {
        return AttemptOutcome::Fatal(e);
    }

    if let Some(fetch) = session.external_fetch() {
        return super::external_attempt(fetch, files, payload).await;
    }

    // A payload whose `remote_name` is literally ".sig" has no usable
    // basename for a named `.part` file, so it always takes the
    // anonymous-temp path rather than colliding on a shared name.
    let use_named_temp = payload.request.remote_name != ".sig";

    let dest_guess = files.dest_path(&payload.request.remote_name);
    let part_path = use_named_temp.then(|| files.part_path(&payload.request.remote_name));

    let (resume_offset, if_modified_since) =
        resolve_resume_state(payload, part_path.as_deref(), dest_guess.as_path()).await;

    if let Some(max) = payload.request.max_size {
        if resume_offset >= max {
            // The `.part` already holds everything this payload is allowed
            // to have; skip the network round-trip entirely.
            let Some(part_path) = part_path.clone() else {
                return AttemptOutcome::Fatal(Error::internal(
                    "max_size reached with no named temp file to publish",
                ));
            };
            return publish(files, payload, &part_path, resume_offset).await;
        }
    }

    let mut request = session.client().get(url.clone());
    if resume_offset > 0 {
        request = request.header(RANGE, format!("bytes={resume_offset}-"));
    } else if let Some(since) = if_modified_since {
        request = request.header(IF_MODIFIED_SINCE, httpdate::fmt_http_date(since));
    }

    let response = match session.send_with_retry(|| request.try_clone().expect("GET has no body").send()).await {
        Ok(response) => response,
        Err(e) => return classify_failure(e),
    };

    payload.attempt.respcode = Some(response.status().as_u16());
    payload.attempt.content_disp_name = response
        .headers()
        .get(CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(filename_from_content_disposition);
    payload.attempt.last_modified = response
        .headers()
        .get(LAST_MODIFIED)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| httpdate::parse_http_date(v).ok());

    if response.status() == StatusCode::NOT_MODIFIED {
        if let Some(part_path) = &part_path {
            files.remove_best_effort(part_path).await;
        }
        return AttemptOutcome::UpToDate;
    }

    if response.status().as_u16() >= 400 {
        if let Some(part_path) = &part_path {
            if payload.request.unlink_on_fail {
                files.remove_best_effort(part_path).await;
            }
        }
        return classify_retrieve_failure(response.status());
    }

    let suppress_progress = payload.request.is_signature || response.status().is_redirection();
    let remaining_size = response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    // Range requests some servers answer with 200 instead of 206 ignore the
    // offset entirely; restart the temp file from scratch rather than
    // appending onto a byte stream that does not line up.
    let resume_offset = if resume_offset > 0 && response.status() != StatusCode::PARTIAL_CONTENT {
        0
    } else {
        resume_offset
    };
    payload.attempt.initial_size = resume_offset;

    let (mut file, part_path) = match open_temp(files, part_path, resume_offset).await {
        Ok(opened) => opened,
        Err(e) => return AttemptOutcome::Fatal(e),
    };

    let stall_timeout = session.stall_timeout();
    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;

    loop {
        let next = match stall_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, stream.next()).await {
                Ok(next) => next,
                Err(_) => {
                    if payload.request.unlink_on_fail {
                        files.remove_best_effort(&part_path).await;
                    }
                    return AttemptOutcome::Retryable(
                        NetworkError::Timeout {
                            url: url.to_string(),
                        }
                        .into(),
                    );
                }
            },
            None => stream.next().await,
        };

        let Some(chunk) = next else { break };
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                if payload.request.unlink_on_fail {
                    files.remove_best_effort(&part_path).await;
                }
                return AttemptOutcome::Retryable(NetworkError::DownloadFailed(e.to_string()).into());
            }
        };

        if let Err(e) = cancel.check() {
            if payload.request.unlink_on_fail {
                files.remove_best_effort(&part_path).await;
            }
            return AttemptOutcome::Fatal(e);
        }

        if let Err(e) = file.write_all(&chunk).await {
            return AttemptOutcome::Fatal(e.into());
        }
        downloaded += chunk.len() as u64;

        if let Some(max) = payload.request.max_size {
            if payload.attempt.initial_size + downloaded > max {
                drop(file);
                if payload.request.unlink_on_fail {
                    files.remove_best_effort(&part_path).await;
                }
                return AttemptOutcome::Fatal(
                    NetworkError::FileSizeExceeded {
                        size: payload.attempt.initial_size + downloaded,
                        limit: max,
                    }
                    .into(),
                );
            }
        }

        if !suppress_progress {
            let cumulative = payload.attempt.initial_size + downloaded;
            if cumulative != payload.attempt.prevprogress {
                payload.attempt.prevprogress = cumulative;
                events.emit_download_progress(
                    url.to_string(),
                    payload.request.remote_name.clone(),
                    downloaded,
                    remaining_size,
                );
            }
        }
    }

    if let Some(expected) = remaining_size {
        if expected != downloaded {
            if payload.request.unlink_on_fail {
                files.remove_best_effort(&part_path).await;
            }
            return AttemptOutcome::Retryable(
                NetworkError::ContentLengthMismatch {
                    expected,
                    actual: downloaded,
                }
                .into(),
            );
        }
    }

    if let Err(e) = file.flush().await {
        return AttemptOutcome::Fatal(e.into());
    }
    if let Some(mtime) = payload.attempt.last_modified {
        apply_mtime(file, mtime).await;
    } else {
        drop(file);
    }

    publish(
        files,
        payload,
        &part_path,
        payload.attempt.initial_size + downloaded,
    )
    .await
}

/// Decide the resume offset and, when resuming is not in play, whether a
/// conditional GET against the existing destination applies.
async fn resolve_resume_state(
    payload: &Payload,
    part_path: Option<&std::path::Path>,
    dest_guess: &std::path::Path,
) -> (u64, Option<SystemTime>) {
    if payload.request.allow_resume {
        if let Some(part_path) = part_path {
            if let Ok(metadata) = tokio::fs::metadata(part_path).await {
                return (metadata.len(), None);
            }
        }
        return (0, None);
    }

    if !payload.request.force {
        if let Ok(metadata) = tokio::fs::metadata(dest_guess).await {
            if let Ok(mtime) = metadata.modified() {
                return (0, Some(mtime));
            }
        }
    }
    (0, None)
}

async fn open_temp(
    files: &TempFileManager,
    part_path: Option<PathBuf>,
    resume_offset: u64,
) -> Result<(File, PathBuf), Error> {
    match part_path {
        Some(part_path) => {
            let mut file = files.open_named(&part_path, resume_offset).await?;
            if resume_offset > 0 {
                file.seek(SeekFrom::End(0)).await?;
            }
            Ok((file, part_path))
        }
        None => files.create_anonymous().await,
    }
}

/// Finish a successful transfer: pick the published name (honoring
/// `trust_remote_name`), rename the temp file onto it, and report the
/// total bytes the destination now holds.
async fn publish(
    files: &TempFileManager,
    payload: &Payload,
    part_path: &std::path::Path,
    total_bytes: u64,
) -> AttemptOutcome {
    let published_name = effective_remote_name(
        payload.request.trust_remote_name,
        payload.attempt.content_disp_name.as_deref(),
        &payload.request.remote_name,
    );
    let destination = files.dest_path(&published_name);
    if let Err(e) = files.publish(part_path, &destination).await {
        return AttemptOutcome::Fatal(e);
    }
    AttemptOutcome::Fetched {
        bytes: total_bytes,
        destination,
    }
}

async fn apply_mtime(file: File, mtime: SystemTime) {
    let std_file = file.into_std().await;
    let _ = std_file.set_modified(mtime);
}

fn classify_failure(err: Error) -> AttemptOutcome {
    match &err {
        Error::Network(NetworkError::ServerBadUrl { .. }) => AttemptOutcome::Retryable(err),
        Error::Network(
            NetworkError::Timeout { .. }
            | NetworkError::ConnectionRefused(_)
            | NetworkError::DownloadFailed(_),
        ) => AttemptOutcome::Retryable(err),
        _ => AttemptOutcome::Fatal(err),
    }
}

fn classify_retrieve_failure(status: StatusCode) -> AttemptOutcome {
    AttemptOutcome::Retryable(
        NetworkError::HttpError {
            status: status.as_u16(),
            message: status.to_string(),
        }
        .into(),
    )
}

/// Demote a terminal failure to silence when the payload marked itself
/// optional (`errors_ok`); otherwise keep the error for the caller to report.
///
/// Cancellation is never demoted: an optional payload that gets cancelled
/// mid-stream must still report `Error::Cancelled` rather than being
/// swallowed as if it had merely failed.
#[must_use]
pub fn demote_error(e: Error, errors_ok: bool) -> Option<Error> {
    if errors_ok && !matches!(e, Error::Cancelled) {
        None
    } else {
        Some(e)
    }
}

/// Convert the low-level [`AttemptOutcome`] of the *last* mirror tried into
/// the public single-transfer contract, demoting failures to `errors_ok`
/// silence where the caller asked for it.
pub fn finalize(
    outcome: AttemptOutcome,
    errors_ok: bool,
) -> Result<SingleOutcome, Option<Error>> {
    match outcome {
        AttemptOutcome::Fetched { bytes, destination } => {
            Ok(SingleOutcome::Fetched { bytes, destination })
        }
        AttemptOutcome::UpToDate => Ok(SingleOutcome::UpToDate),
        AttemptOutcome::Retryable(e) | AttemptOutcome::Fatal(e) => {
            Err(demote_error(e, errors_ok))
        }
    }
}

pub(crate) fn outcome_to_event(outcome: &Result<SingleOutcome, Option<Error>>) -> DownloadOutcome {
    match outcome {
        Ok(SingleOutcome::Fetched { bytes, destination }) => DownloadOutcome::Fetched {
            bytes: *bytes,
            destination: destination.clone(),
        },
        Ok(SingleOutcome::UpToDate) => DownloadOutcome::UpToDate,
        Err(Some(e)) => DownloadOutcome::Failed {
            retryable: false,
            message: e.to_string(),
        },
        Err(None) => DownloadOutcome::Failed {
            retryable: false,
            message: "optional payload failed".to_string(),
        },
    }
}

/// The engine's documented single-transfer entry point: one mirror attempt,
/// wrapped with the `Init -> Progress* -> Completed` event sequence every
/// payload must see (suppressed entirely for signature payloads, per §4.3's
/// terminal-event contract). Mirror failover across `payload.request.servers`
/// is not this function's job; a caller that wants it should drive
/// [`attempt`]/[`finalize`] itself in a loop the way
/// [`super::multi::run_payload`] does.
pub async fn download(
    session: &Session,
    files: &TempFileManager,
    payload: &mut Payload,
    cancel: &CancelToken,
    events: &EventSender,
) -> Result<SingleOutcome, Option<Error>> {
    if !payload.request.is_signature {
        let url = payload.current_server().map(ToString::to_string).unwrap_or_default();
        events.emit_download_init(
            url,
            payload.request.remote_name.clone(),
            None,
            None,
            payload.request.errors_ok,
        );
    }

    let outcome = attempt(session, files, payload, cancel, events).await;
    let result = finalize(outcome, payload.request.errors_ok);

    if !payload.request.is_signature {
        let url = payload.current_server().map(ToString::to_string).unwrap_or_default();
        events.emit_download_completed(
            url,
            payload.request.remote_name.clone(),
            outcome_to_event(&result),
        );
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalize_demotes_when_errors_ok() {
        let outcome = AttemptOutcome::Fatal(Error::internal("boom"));
        let result = finalize(outcome, true);
        assert!(result.is_err());
        assert!(result.unwrap_err().is_none());
    }

    #[test]
    fn finalize_keeps_error_when_not_optional() {
        let outcome = AttemptOutcome::Retryable(Error::internal("boom"));
        let result = finalize(outcome, false);
        assert!(matches!(result, Err(Some(_))));
    }

    #[test]
    fn demote_error_never_swallows_cancellation() {
        assert!(matches!(
            demote_error(Error::Cancelled, true),
            Some(Error::Cancelled)
        ));
        assert!(demote_error(Error::internal("boom"), true).is_none());
    }
}
