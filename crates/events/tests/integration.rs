//! Integration tests for events

#[cfg(test)]
mod tests {
    use sps2_events::*;

    #[tokio::test]
    async fn test_event_sender_ext() {
        let (tx, mut rx) = channel();

        tx.emit_error("test error");
        tx.emit_debug("test debug");

        let event1 = rx.recv().await.unwrap();
        assert!(matches!(event1, AppEvent::General(GeneralEvent::Error { .. })));

        let event2 = rx.recv().await.unwrap();
        assert!(matches!(
            event2,
            AppEvent::General(GeneralEvent::DebugLog { .. })
        ));
    }

    #[tokio::test]
    async fn test_dropped_receiver() {
        let (tx, rx) = channel();
        drop(rx);

        // Should not panic when the receiver is dropped.
        tx.emit_warning("ignored");
    }

    #[tokio::test]
    async fn test_download_lifecycle_events() {
        let (tx, mut rx) = channel();

        tx.emit_download_init("https://mirror.example.com/pkg.tar.zst", "pkg.tar.zst", None, Some(1024), false);
        tx.emit_download_progress("https://mirror.example.com/pkg.tar.zst", "pkg.tar.zst", 512, Some(1024));
        tx.emit_download_completed(
            "https://mirror.example.com/pkg.tar.zst",
            "pkg.tar.zst",
            DownloadOutcome::Fetched {
                bytes: 1024,
                destination: "/tmp/pkg.tar.zst".into(),
            },
        );

        let init = rx.recv().await.unwrap();
        assert!(matches!(init, AppEvent::Download(DownloadEvent::Init { .. })));
        assert_eq!(init.log_level(), tracing::Level::INFO);

        let progress = rx.recv().await.unwrap();
        assert_eq!(progress.log_level(), tracing::Level::DEBUG);

        let completed = rx.recv().await.unwrap();
        match completed {
            AppEvent::Download(DownloadEvent::Completed { outcome, .. }) => {
                assert!(matches!(outcome, DownloadOutcome::Fetched { bytes: 1024, .. }));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_event_meta_builder() {
        let meta = EventMeta::new(EventLevel::Info, EventSource::DOWNLOAD)
            .with_correlation_id("job-1")
            .with_label("mirror", "primary");
        assert_eq!(meta.correlation_id.as_deref(), Some("job-1"));
        assert_eq!(meta.labels.get("mirror").map(String::as_str), Some("primary"));
    }
}
