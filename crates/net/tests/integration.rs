//! Integration tests for the transfer engine, exercised against a local
//! mock server rather than real mirrors.

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use sps2_config::NetworkConfig;
    use sps2_events::{channel, AppEvent, DownloadEvent, DownloadOutcome};
    use sps2_net::{
        attempt, check_url, download_many, download_one, fetch_bytes, fetch_text, finalize,
        url::parse_transfer_url, AttemptOutcome, CancelToken, MultiOutcome, Payload, Request,
        Session, TempFileManager,
    };
    use tempfile::tempdir;

    fn session() -> Session {
        Session::new(&NetworkConfig::default(), false).unwrap()
    }

    #[tokio::test]
    async fn single_transfer_fetches_and_publishes() {
        let server = MockServer::start();
        let content = b"test file content";
        let mock = server.mock(|when, then| {
            when.method(GET).path("/test.txt");
            then.status(200)
                .header("content-length", content.len().to_string())
                .body(content);
        });

        let dest = tempdir().unwrap();
        let tmp = tempdir().unwrap();
        let files = TempFileManager::new(dest.path(), tmp.path());
        let session = session();
        let cancel = CancelToken::new();
        let (tx, _rx) = channel();

        let url = parse_transfer_url(&server.url("/test.txt")).unwrap();
        let request = Request::new(url, dest.path().to_path_buf());
        let mut payload = Payload::new(request);

        let outcome = attempt(&session, &files, &mut payload, &cancel, &tx).await;
        mock.assert();

        match outcome {
            AttemptOutcome::Fetched { bytes, destination } => {
                assert_eq!(bytes, content.len() as u64);
                assert_eq!(
                    tokio::fs::read(&destination).await.unwrap(),
                    content.to_vec()
                );
            }
            other => panic!("expected Fetched, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn download_one_emits_init_then_completed() {
        let server = MockServer::start();
        let content = b"single entry point content";
        server.mock(|when, then| {
            when.method(GET).path("/single.txt");
            then.status(200)
                .header("content-length", content.len().to_string())
                .body(content);
        });

        let dest = tempdir().unwrap();
        let tmp = tempdir().unwrap();
        let files = TempFileManager::new(dest.path(), tmp.path());
        let session = session();
        let cancel = CancelToken::new();
        let (tx, mut rx) = channel();

        let url = parse_transfer_url(&server.url("/single.txt")).unwrap();
        let request = Request::new(url, dest.path().to_path_buf());
        let mut payload = Payload::new(request);

        let result = download_one(&session, &files, &mut payload, &cancel, &tx).await;
        assert!(matches!(
            result,
            Ok(sps2_net::SingleOutcome::Fetched { .. })
        ));

        let first = rx.try_recv().expect("Init event expected");
        assert!(matches!(first, AppEvent::Download(DownloadEvent::Init { .. })));

        let mut saw_completed = false;
        while let Ok(event) = rx.try_recv() {
            if let AppEvent::Download(DownloadEvent::Completed { outcome, .. }) = event {
                saw_completed = true;
                assert!(matches!(outcome, DownloadOutcome::Fetched { .. }));
            }
        }
        assert!(saw_completed, "expected a terminal Completed event");
    }

    #[tokio::test]
    async fn not_modified_response_reports_up_to_date() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/current.txt");
            then.status(304);
        });

        let dest = tempdir().unwrap();
        let files = TempFileManager::new(dest.path(), dest.path());
        let session = session();
        let cancel = CancelToken::new();
        let (tx, _rx) = channel();

        // Pre-create the destination so the driver sends a conditional GET.
        tokio::fs::write(dest.path().join("current.txt"), b"old")
            .await
            .unwrap();

        let url = parse_transfer_url(&server.url("/current.txt")).unwrap();
        let mut request = Request::new(url, dest.path().to_path_buf());
        request.allow_resume = false;
        let mut payload = Payload::new(request);

        let outcome = attempt(&session, &files, &mut payload, &cancel, &tx).await;
        assert!(matches!(outcome, AttemptOutcome::UpToDate));
    }

    #[tokio::test]
    async fn http_error_is_retryable_and_optional_payloads_are_demoted() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/missing.txt");
            then.status(404);
        });

        let dest = tempdir().unwrap();
        let files = TempFileManager::new(dest.path(), dest.path());
        let session = session();
        let cancel = CancelToken::new();
        let (tx, _rx) = channel();

        let url = parse_transfer_url(&server.url("/missing.txt")).unwrap();
        let mut request = Request::new(url, dest.path().to_path_buf());
        request.errors_ok = true;
        let mut payload = Payload::new(request);

        let outcome = attempt(&session, &files, &mut payload, &cancel, &tx).await;
        assert!(matches!(outcome, AttemptOutcome::Retryable(_)));
        let result = finalize(outcome, true);
        assert!(result.unwrap_err().is_none());
    }

    #[tokio::test]
    async fn multi_transfer_fails_over_to_the_next_mirror() {
        let dead = MockServer::start();
        dead.mock(|when, then| {
            when.method(GET).path("/pkg.tar.zst");
            then.status(404);
        });
        let good = MockServer::start();
        let content = b"mirror two content";
        good.mock(|when, then| {
            when.method(GET).path("/pkg.tar.zst");
            then.status(200)
                .header("content-length", content.len().to_string())
                .body(content);
        });

        let dest = tempdir().unwrap();
        let files = TempFileManager::new(dest.path(), dest.path());
        let session = session();
        let cancel = CancelToken::new();
        let (tx, mut rx) = channel();

        let mut request = Request::new(
            parse_transfer_url(&dead.url("/pkg.tar.zst")).unwrap(),
            dest.path().to_path_buf(),
        );
        request
            .servers
            .push(parse_transfer_url(&good.url("/pkg.tar.zst")).unwrap());
        let payload = Payload::new(request);

        let resources = sps2_resources::ResourceManager::new(sps2_resources::ResourceLimits {
            concurrent_downloads: 2,
            memory_usage: None,
        });
        let MultiOutcome {
            results,
            all_required_succeeded,
        } = download_many(&session, &files, &resources, vec![payload], &cancel, &tx).await;

        assert!(all_required_succeeded);
        assert_eq!(results.len(), 1);
        assert!(matches!(
            &results[0].1,
            Ok(sps2_net::SingleOutcome::Fetched { bytes, .. }) if *bytes == content.len() as u64
        ));

        let mut saw_failover = false;
        let mut saw_completed = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                AppEvent::Download(DownloadEvent::ServerFailover { .. }) => saw_failover = true,
                AppEvent::Download(DownloadEvent::Completed { outcome, .. }) => {
                    saw_completed = true;
                    assert!(matches!(outcome, DownloadOutcome::Fetched { .. }));
                }
                _ => {}
            }
        }
        assert!(saw_failover);
        assert!(saw_completed);
    }

    #[tokio::test]
    async fn fetch_text_decodes_body() {
        let server = MockServer::start();
        let content = "Hello, world!";
        server.mock(|when, then| {
            when.method(GET).path("/text");
            then.status(200)
                .header("content-type", "text/plain")
                .body(content);
        });

        let session = session();
        let text = fetch_text(&session, &server.url("/text")).await.unwrap();
        assert_eq!(text, content);
    }

    #[tokio::test]
    async fn fetch_bytes_returns_raw_body() {
        let server = MockServer::start();
        let content = b"raw bytes";
        server.mock(|when, then| {
            when.method(GET).path("/bytes");
            then.status(200).body(content);
        });

        let session = session();
        let bytes = fetch_bytes(&session, &server.url("/bytes")).await.unwrap();
        assert_eq!(bytes, content.to_vec());
    }

    #[tokio::test]
    async fn fetch_text_surfaces_http_errors() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/404");
            then.status(404).body("Not Found");
        });

        let session = session();
        let error = fetch_text(&session, &server.url("/404")).await.unwrap_err();
        assert!(matches!(
            error,
            sps2_errors::Error::Network(sps2_errors::NetworkError::HttpError { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn external_fetch_bypasses_transport_and_fails_over() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_for_closure = Arc::clone(&calls);
        let fetch: sps2_net::ExternalFetch = Arc::new(move |url, dest, _force| {
            let calls = Arc::clone(&calls_for_closure);
            Box::pin(async move {
                let attempt_no = calls.fetch_add(1, Ordering::SeqCst);
                if url.to_string().contains("dead") {
                    return Err(sps2_errors::Error::internal("dead mirror"));
                }
                tokio::fs::write(&dest, format!("attempt {attempt_no}")).await?;
                Ok(())
            })
        });

        let dest = tempdir().unwrap();
        let files = TempFileManager::new(dest.path(), dest.path());
        let session = session().with_external_fetch(fetch);
        let cancel = CancelToken::new();
        let (tx, _rx) = channel();

        let mut request = Request::new(
            parse_transfer_url("https://dead.example.com/pkg.tar.zst").unwrap(),
            dest.path().to_path_buf(),
        );
        request
            .servers
            .push(parse_transfer_url("https://good.example.com/pkg.tar.zst").unwrap());
        let payload = Payload::new(request);

        let resources = sps2_resources::ResourceManager::new(sps2_resources::ResourceLimits {
            concurrent_downloads: 2,
            memory_usage: None,
        });
        let MultiOutcome {
            results,
            all_required_succeeded,
        } = download_many(&session, &files, &resources, vec![payload], &cancel, &tx).await;

        assert!(all_required_succeeded);
        assert_eq!(results.len(), 1);
        assert!(matches!(
            &results[0].1,
            Ok(sps2_net::SingleOutcome::Fetched { .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn check_url_reports_head_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(HEAD).path("/exists");
            then.status(200);
        });
        server.mock(|when, then| {
            when.method(HEAD).path("/missing");
            then.status(404);
        });

        let session = session();
        assert!(check_url(&session, &server.url("/exists")).await.unwrap());
        assert!(!check_url(&session, &server.url("/missing")).await.unwrap());
    }
}
