fn main() {
    println!("Run `cargo test -p pipeline-tests` to execute end-to-end pipeline tests.");
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    use dropship_endpoint::{Endpoint, EndpointError, ProgressFn, SendOutcome};
    use dropship_queue::DeliveryQueue;
    use dropship_watch::{DirectoryWatcher, WatcherConfig};
    use dropship_worker::DeliveryWorker;

    /// Endpoint that replays scripted outcomes and records every attempt.
    /// Once the script is exhausted, `default` is returned.
    struct ScriptedEndpoint {
        outcomes: Mutex<VecDeque<SendOutcome>>,
        default: SendOutcome,
        calls: Mutex<Vec<PathBuf>>,
    }

    impl ScriptedEndpoint {
        fn new(outcomes: Vec<SendOutcome>) -> Arc<Self> {
            Self::with_default(outcomes, SendOutcome::Success)
        }

        fn with_default(outcomes: Vec<SendOutcome>, default: SendOutcome) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                default,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<PathBuf> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Endpoint for ScriptedEndpoint {
        async fn start(&self) -> Result<(), EndpointError> {
            Ok(())
        }

        async fn stop(&self) -> Result<(), EndpointError> {
            Ok(())
        }

        async fn send_notification(&self, _: &str, _: &str) -> Result<(), EndpointError> {
            Ok(())
        }

        async fn send_document(
            &self,
            _recipient: &str,
            document: &Path,
            _thumbnail: Option<&Path>,
            _progress: ProgressFn,
        ) -> SendOutcome {
            self.calls.lock().unwrap().push(document.to_path_buf());
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.default.clone())
        }
    }

    struct Pipeline {
        endpoint: Arc<ScriptedEndpoint>,
        watcher: DirectoryWatcher,
        cancel: CancellationToken,
        worker_task: tokio::task::JoinHandle<()>,
    }

    /// Wires watcher → queue → worker over a temp directory, with short
    /// test timings (stability window 100 ms, modify delay 200 ms).
    fn start_pipeline(watch_dir: &Path, outcomes: Vec<SendOutcome>) -> Pipeline {
        start_pipeline_with(watch_dir, ScriptedEndpoint::new(outcomes))
    }

    fn start_pipeline_with(watch_dir: &Path, endpoint: Arc<ScriptedEndpoint>) -> Pipeline {
        let (producer, consumer) = DeliveryQueue::new();
        let cancel = CancellationToken::new();

        let watcher = DirectoryWatcher::start(
            WatcherConfig {
                watch_dir: watch_dir.to_path_buf(),
                stability_window: Duration::from_millis(100),
                modify_delay: Duration::from_millis(200),
            },
            producer.clone(),
            cancel.child_token(),
        )
        .expect("watcher should start");

        let worker = DeliveryWorker::new(
            Arc::clone(&endpoint) as Arc<dyn Endpoint>,
            "42".into(),
            None,
            producer,
            consumer,
            cancel.child_token(),
        );
        let worker_task = tokio::spawn(worker.run());

        Pipeline {
            endpoint,
            watcher,
            cancel,
            worker_task,
        }
    }

    impl Pipeline {
        async fn shutdown(self) {
            self.watcher.stop();
            self.cancel.cancel();
            let _ = self.worker_task.await;
        }
    }

    /// Polls `check` until it returns true or the deadline passes.
    async fn wait_for(deadline: Duration, mut check: impl FnMut() -> bool) -> bool {
        let start = tokio::time::Instant::now();
        while start.elapsed() < deadline {
            if check() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        check()
    }

    #[tokio::test]
    async fn created_archive_is_delivered_and_deleted() {
        let tmp = tempfile::tempdir().unwrap();
        let pipeline = start_pipeline(tmp.path(), vec![SendOutcome::Success]);

        tokio::time::sleep(Duration::from_millis(100)).await;
        let path = tmp.path().join("video.rar");
        std::fs::write(&path, vec![0u8; 1000]).unwrap();

        let delivered = wait_for(Duration::from_secs(5), || !path.exists()).await;
        assert!(delivered, "source file should be deleted after delivery");
        assert_eq!(pipeline.endpoint.calls(), vec![path]);

        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn growing_file_is_admitted_exactly_once() {
        let tmp = tempfile::tempdir().unwrap();
        let pipeline = start_pipeline(tmp.path(), vec![]);

        tokio::time::sleep(Duration::from_millis(100)).await;
        let path = tmp.path().join("big.7z");

        // Write in bursts spaced inside the stability window so early
        // samples disagree and the oracle has to re-sample.
        {
            use std::io::Write;
            let mut f = std::fs::File::create(&path).unwrap();
            for _ in 0..3 {
                f.write_all(&[0u8; 300]).unwrap();
                f.flush().unwrap();
                tokio::time::sleep(Duration::from_millis(60)).await;
            }
        }

        let delivered = wait_for(Duration::from_secs(8), || !path.exists()).await;
        assert!(delivered, "file should be delivered after stabilizing");

        // Settle, then confirm it was only ever sent once despite the
        // overlapping created/modified checks.
        tokio::time::sleep(Duration::from_millis(500)).await;
        let calls = pipeline.endpoint.calls();
        assert_eq!(calls, vec![path]);

        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn rate_limited_delivery_retries_after_delay() {
        let tmp = tempfile::tempdir().unwrap();
        let pipeline = start_pipeline(
            tmp.path(),
            vec![
                SendOutcome::RateLimited(Duration::from_millis(100)),
                SendOutcome::Success,
            ],
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        let path = tmp.path().join("a.zip");
        std::fs::write(&path, b"payload").unwrap();

        let delivered = wait_for(Duration::from_secs(5), || !path.exists()).await;
        assert!(delivered, "file should be delivered on the second attempt");
        assert_eq!(pipeline.endpoint.calls(), vec![path.clone(), path]);

        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn non_archive_and_temp_files_are_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        let pipeline = start_pipeline(tmp.path(), vec![]);

        tokio::time::sleep(Duration::from_millis(100)).await;
        let notes = tmp.path().join("notes.txt");
        let partial = tmp.path().join("archive.zip.tmp");
        std::fs::write(&notes, b"hello").unwrap();
        std::fs::write(&partial, b"partial").unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(notes.exists());
        assert!(partial.exists());
        assert!(pipeline.endpoint.calls().is_empty());

        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn hard_failure_leaves_file_on_disk() {
        let tmp = tempfile::tempdir().unwrap();
        // Every attempt fails hard: the preserved file may be re-admitted
        // by the trailing `modified` event (accepted race), so the default
        // outcome must stay a hard failure too.
        let pipeline = start_pipeline_with(
            tmp.path(),
            ScriptedEndpoint::with_default(
                vec![],
                SendOutcome::HardFailure("request entity too large".into()),
            ),
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        let path = tmp.path().join("huge.tar.gz");
        std::fs::write(&path, vec![0u8; 2048]).unwrap();

        let attempted = wait_for(Duration::from_secs(5), || {
            !pipeline.endpoint.calls().is_empty()
        })
        .await;
        assert!(attempted, "delivery should have been attempted");

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(path.exists(), "failed file must be preserved for inspection");

        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_abandons_queued_entries_without_panicking() {
        let tmp = tempfile::tempdir().unwrap();
        // Endpoint stalls forever behind a huge rate limit, so the first
        // entry is mid-backoff and the second is still queued at shutdown.
        let pipeline = start_pipeline(
            tmp.path(),
            vec![SendOutcome::RateLimited(Duration::from_secs(3600))],
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        let a = tmp.path().join("a.zip");
        let b = tmp.path().join("b.zip");
        std::fs::write(&a, b"a").unwrap();
        std::fs::write(&b, b"b").unwrap();

        let attempted = wait_for(Duration::from_secs(5), || {
            !pipeline.endpoint.calls().is_empty()
        })
        .await;
        assert!(attempted);

        pipeline.shutdown().await;
        assert!(a.exists());
        assert!(b.exists());
    }
}
