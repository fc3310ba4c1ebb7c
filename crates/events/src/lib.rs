#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Event system for async communication in the download engine.
//!
//! All observable output goes through events rather than direct logging or
//! printing, so that a CLI, a library embedder, and the tracing subscriber
//! can all consume the same stream.
//!
//! ## Architecture
//!
//! - **Domain-driven events**: events grouped by functional domain (`General`, `Download`).
//! - **Unified `EventEmitter` trait**: a single, consistent API for all event emissions.
//! - **Tracing integration**: every event carries a tracing level and target.

pub mod meta;
pub use meta::{EventLevel, EventMeta, EventSource};

pub mod events;
pub use events::{AppEvent, DownloadEvent, DownloadOutcome, FailureContext, GeneralEvent};

use tokio::sync::mpsc::UnboundedSender;

/// Sender half of the event channel.
pub type EventSender = UnboundedSender<AppEvent>;

/// Receiver half of the event channel.
pub type EventReceiver = tokio::sync::mpsc::UnboundedReceiver<AppEvent>;

/// Create a new event channel.
#[must_use]
pub fn channel() -> (EventSender, EventReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}

/// The unified trait for emitting events throughout the download engine.
///
/// This trait provides a single, consistent API for emitting events regardless
/// of whether you hold a raw `EventSender` or a struct that contains one.
pub trait EventEmitter {
    /// Get the event sender for this emitter.
    fn event_sender(&self) -> Option<&EventSender>;

    /// Emit an event through this emitter.
    fn emit(&self, event: AppEvent) {
        if let Some(sender) = self.event_sender() {
            // Ignore send errors - if the receiver is dropped, we just continue.
            let _ = sender.send(event);
        }
    }

    /// Emit a debug log event.
    fn emit_debug(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::debug(message)));
    }

    /// Emit a debug log event with context.
    fn emit_debug_with_context(
        &self,
        message: impl Into<String>,
        context: std::collections::HashMap<String, String>,
    ) {
        self.emit(AppEvent::General(GeneralEvent::debug_with_context(
            message, context,
        )));
    }

    /// Emit a warning event.
    fn emit_warning(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::warning(message)));
    }

    /// Emit a warning event with context.
    fn emit_warning_with_context(&self, message: impl Into<String>, context: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::warning_with_context(
            message, context,
        )));
    }

    /// Emit an error event.
    fn emit_error(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::error(message)));
    }

    /// Emit an error event with details.
    fn emit_error_with_details(&self, message: impl Into<String>, details: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::error_with_details(
            message, details,
        )));
    }

    /// Emit an operation started event.
    fn emit_operation_started(&self, operation: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::OperationStarted {
            operation: operation.into(),
        }));
    }

    /// Emit an operation completed event.
    fn emit_operation_completed(&self, operation: impl Into<String>, success: bool) {
        self.emit(AppEvent::General(GeneralEvent::OperationCompleted {
            operation: operation.into(),
            success,
        }));
    }

    /// Emit an operation failed event.
    fn emit_operation_failed(&self, operation: impl Into<String>, failure: FailureContext) {
        self.emit(AppEvent::General(GeneralEvent::operation_failed(
            operation, failure,
        )));
    }

    /// Emit a transfer-initiated event.
    fn emit_download_init(
        &self,
        url: impl Into<String>,
        remote_name: impl Into<String>,
        resume_from: Option<u64>,
        total_size: Option<u64>,
        optional: bool,
    ) {
        self.emit(AppEvent::Download(DownloadEvent::init(
            url,
            remote_name,
            resume_from,
            total_size,
            optional,
        )));
    }

    /// Emit a transfer-progress event.
    fn emit_download_progress(
        &self,
        url: impl Into<String>,
        remote_name: impl Into<String>,
        downloaded: u64,
        total: Option<u64>,
    ) {
        self.emit(AppEvent::Download(DownloadEvent::progress(
            url,
            remote_name,
            downloaded,
            total,
        )));
    }

    /// Emit a mirror-failover event.
    fn emit_download_failover(
        &self,
        remote_name: impl Into<String>,
        failed_url: impl Into<String>,
        next_url: Option<String>,
    ) {
        self.emit(AppEvent::Download(DownloadEvent::ServerFailover {
            remote_name: remote_name.into(),
            failed_url: failed_url.into(),
            next_url,
        }));
    }

    /// Emit a terminal download-completed event.
    fn emit_download_completed(
        &self,
        url: impl Into<String>,
        remote_name: impl Into<String>,
        outcome: DownloadOutcome,
    ) {
        self.emit(AppEvent::Download(DownloadEvent::completed(
            url,
            remote_name,
            outcome,
        )));
    }
}

/// Implementation of `EventEmitter` for the raw `EventSender`.
/// This allows `EventSender` to be used directly where `EventEmitter` is expected.
impl EventEmitter for EventSender {
    fn event_sender(&self) -> Option<&EventSender> {
        Some(self)
    }
}
