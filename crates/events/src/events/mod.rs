use serde::{Deserialize, Serialize};

pub mod download;
pub mod general;

pub use download::{DownloadEvent, DownloadOutcome};
pub use general::{FailureContext, GeneralEvent};

/// Top-level application event enum that aggregates all domain-specific events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", content = "event", rename_all = "snake_case")]
pub enum AppEvent {
    /// General utility events (warnings, errors, operations).
    General(GeneralEvent),

    /// Download-specific events (HTTP downloads, progress, mirror failover).
    Download(DownloadEvent),
}

impl AppEvent {
    /// Determine the appropriate tracing log level for this event.
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;

        match self {
            AppEvent::General(GeneralEvent::Error { .. } | GeneralEvent::OperationFailed { .. }) => {
                Level::ERROR
            }
            AppEvent::Download(DownloadEvent::Completed {
                outcome: DownloadOutcome::Failed { .. },
                ..
            }) => Level::ERROR,
            AppEvent::General(GeneralEvent::Warning { .. }) => Level::WARN,
            AppEvent::Download(DownloadEvent::ServerFailover { .. }) => Level::WARN,
            AppEvent::Download(DownloadEvent::Completed { .. } | DownloadEvent::Init { .. }) => {
                Level::INFO
            }
            AppEvent::General(
                GeneralEvent::OperationStarted { .. } | GeneralEvent::OperationCompleted { .. },
            ) => Level::INFO,
            AppEvent::General(GeneralEvent::DebugLog { .. }) => Level::DEBUG,
            AppEvent::Download(DownloadEvent::Progress { .. }) => Level::DEBUG,
        }
    }

    /// Get the log target for this event (for structured logging).
    #[must_use]
    pub fn log_target(&self) -> &'static str {
        match self {
            AppEvent::General(_) => "sps2::events::general",
            AppEvent::Download(_) => "sps2::events::download",
        }
    }
}
