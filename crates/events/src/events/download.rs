use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Download-specific events surfaced to the CLI and logging pipeline.
///
/// These mirror the three callback points a transfer driver reports
/// through: an `Init` once headers are known, zero or more `Progress`
/// updates as bytes arrive, and a terminal `Completed` once the payload
/// is resolved one way or another.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DownloadEvent {
    /// A payload was admitted into the driver. Mirrors the engine's
    /// admission-time `Init` callback: fired before the request is sent, so
    /// `total_size` is not yet known.
    Init {
        url: String,
        remote_name: String,
        resume_from: Option<u64>,
        total_size: Option<u64>,
        /// Whether a failure of this payload is tolerated (`errors_ok`).
        optional: bool,
    },

    /// Bytes have been written to the temp file since the last update.
    Progress {
        url: String,
        remote_name: String,
        downloaded: u64,
        total: Option<u64>,
    },

    /// A mirror failed and the driver is about to try the next server.
    ServerFailover {
        remote_name: String,
        failed_url: String,
        next_url: Option<String>,
    },

    /// The transfer reached a terminal state for this payload.
    Completed {
        url: String,
        remote_name: String,
        outcome: DownloadOutcome,
    },
}

/// Terminal result of a single-transfer attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum DownloadOutcome {
    /// Payload was written (or completed via resume) to `destination`.
    Fetched { bytes: u64, destination: PathBuf },

    /// Server reported the local copy is current (304 / unchanged mtime).
    UpToDate,

    /// All servers were exhausted or a non-retryable error occurred.
    Failed { retryable: bool, message: String },
}

impl DownloadEvent {
    #[must_use]
    pub fn init(
        url: impl Into<String>,
        remote_name: impl Into<String>,
        resume_from: Option<u64>,
        total_size: Option<u64>,
        optional: bool,
    ) -> Self {
        Self::Init {
            url: url.into(),
            remote_name: remote_name.into(),
            resume_from,
            total_size,
            optional,
        }
    }

    #[must_use]
    pub fn progress(
        url: impl Into<String>,
        remote_name: impl Into<String>,
        downloaded: u64,
        total: Option<u64>,
    ) -> Self {
        Self::Progress {
            url: url.into(),
            remote_name: remote_name.into(),
            downloaded,
            total,
        }
    }

    #[must_use]
    pub fn completed(
        url: impl Into<String>,
        remote_name: impl Into<String>,
        outcome: DownloadOutcome,
    ) -> Self {
        Self::Completed {
            url: url.into(),
            remote_name: remote_name.into(),
            outcome,
        }
    }
}
