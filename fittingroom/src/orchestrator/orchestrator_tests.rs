//! End-to-end tests of submit, background jobs and polling.

#[cfg(test)]
mod tests {
    use crate::collaborators::{
        BlobStore, MockBlobStore, OperationHandle, OperationState, VideoGenerator, VideoRequest,
    };
    use crate::config::{OrchestratorConfig, DEFAULT_VIDEO_PROMPT};
    use crate::core::{GenerationStatus, PollResponse, PollStatus};
    use crate::errors::{FittingRoomError, InputError, MediaError, StorageError};
    use crate::events::{self, CollectingEventSink, EventSink};
    use crate::orchestrator::{GenerationOrchestrator, GenerationRegistry, TryOnRequest};
    use crate::storage::MemoryBlobStore;
    use crate::testing::{fast_config, wait_for_terminal, MockCompositor, MockVideoGenerator};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(5);

    struct Harness {
        orchestrator: GenerationOrchestrator,
        compositor: Arc<MockCompositor>,
        video: Arc<MockVideoGenerator>,
        store: Arc<MemoryBlobStore>,
        events: Arc<CollectingEventSink>,
    }

    fn harness_with(
        config: OrchestratorConfig,
        video: impl FnOnce(Arc<MemoryBlobStore>) -> MockVideoGenerator,
    ) -> Harness {
        let store = Arc::new(MemoryBlobStore::new("bucket"));
        let compositor = Arc::new(MockCompositor::new());
        let video = Arc::new(video(store.clone()));
        let events = Arc::new(CollectingEventSink::new());

        let orchestrator = GenerationOrchestrator::builder()
            .compositor(compositor.clone())
            .blob_store(store.clone() as Arc<dyn BlobStore>)
            .video_generator(video.clone() as Arc<dyn VideoGenerator>)
            .event_sink(events.clone() as Arc<dyn EventSink>)
            .config(config)
            .build()
            .unwrap();

        Harness {
            orchestrator,
            compositor,
            video,
            store,
            events,
        }
    }

    fn harness() -> Harness {
        harness_with(fast_config(), |store| MockVideoGenerator::new(store))
    }

    fn shirt_request() -> TryOnRequest {
        TryOnRequest::parse("gs://bucket/p.png", &["gs://bucket/shirt.png"]).unwrap()
    }

    #[tokio::test]
    async fn test_submit_registers_processing_then_done() {
        let h = harness_with(fast_config(), |store| MockVideoGenerator::new(store).held());

        let submission = h.orchestrator.submit(shirt_request()).await.unwrap();
        let id = submission.generation_id.to_string();

        assert_eq!(h.orchestrator.poll(&id).status, PollStatus::Processing);
        assert!(submission
            .image_url
            .starts_with("https://storage.googleapis.com/bucket/vto/vto_"));
        assert!(h.store.get(&submission.artifact.key).is_some());

        h.video.release();
        let response = wait_for_terminal(&h.orchestrator, &id, WAIT).await;
        assert_eq!(response.status, PollStatus::Done);
        let url = response.url.unwrap();
        assert!(url.starts_with("https://storage.googleapis.com/bucket/videos/"));
        assert!(url.ends_with(&format!("/{id}/sample_0.mp4")));
    }

    #[tokio::test]
    async fn test_unknown_id_polls_not_found() {
        let h = harness();
        assert_eq!(h.orchestrator.poll("no-such-id"), PollResponse::not_found());
        h.orchestrator.submit(shirt_request()).await.unwrap();
        assert_eq!(h.orchestrator.poll("no-such-id").status, PollStatus::NotFound);
    }

    #[tokio::test]
    async fn test_done_record_does_not_change_again() {
        let h = harness();
        let submission = h.orchestrator.submit(shirt_request()).await.unwrap();
        let id = submission.generation_id.to_string();

        let response = wait_for_terminal(&h.orchestrator, &id, WAIT).await;
        assert_eq!(response.status, PollStatus::Done);

        assert!(h.orchestrator.registry().fail(&id, "late").is_err());
        let record = h.orchestrator.record(&id).unwrap();
        assert_eq!(record.status, GenerationStatus::Done);
        assert_eq!(record.result, response.url);
        assert_eq!(h.events.of_type(events::GENERATION_COMPLETED).len(), 1);
    }

    #[tokio::test]
    async fn test_operation_failure_marks_failed() {
        let h = harness_with(fast_config(), |store| {
            MockVideoGenerator::new(store).failing_operation("prompt rejected")
        });

        let submission = h.orchestrator.submit(shirt_request()).await.unwrap();
        let id = submission.generation_id.to_string();

        let response = wait_for_terminal(&h.orchestrator, &id, WAIT).await;
        assert_eq!(response.status, PollStatus::Failed);
        assert_eq!(response.url, None);

        let record = h.orchestrator.record(&id).unwrap();
        assert_eq!(record.result, None);
        assert!(record.error.unwrap().contains("prompt rejected"));

        let failed = h.events.of_type(events::GENERATION_FAILED);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].data.as_ref().unwrap()["kind"], "media_error");
    }

    struct PanickingVideo;

    #[async_trait]
    impl VideoGenerator for PanickingVideo {
        async fn start(&self, _request: &VideoRequest) -> Result<OperationHandle, MediaError> {
            Ok(OperationHandle::new("operations/doomed"))
        }

        async fn poll(&self, _handle: &OperationHandle) -> Result<OperationState, MediaError> {
            panic!("operation client exploded")
        }
    }

    #[tokio::test]
    async fn test_panicking_collaborator_marks_failed() {
        let store = Arc::new(MemoryBlobStore::new("bucket"));
        let sink = Arc::new(CollectingEventSink::new());
        let orchestrator = GenerationOrchestrator::builder()
            .compositor(Arc::new(MockCompositor::new()))
            .blob_store(store as Arc<dyn BlobStore>)
            .video_generator(Arc::new(PanickingVideo))
            .event_sink(sink.clone() as Arc<dyn EventSink>)
            .config(fast_config())
            .build()
            .unwrap();

        let submission = orchestrator.submit(shirt_request()).await.unwrap();
        let id = submission.generation_id.to_string();

        let response = wait_for_terminal(&orchestrator, &id, WAIT).await;
        assert_eq!(response.status, PollStatus::Failed);
        assert_eq!(response.url, None);

        let record = orchestrator.record(&id).unwrap();
        assert!(record.error.unwrap().contains("operation client exploded"));

        let failed = sink.of_type(events::GENERATION_FAILED);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].data.as_ref().unwrap()["kind"], "internal_error");
    }

    #[tokio::test]
    async fn test_start_failure_marks_failed() {
        let h = harness_with(fast_config(), |store| {
            MockVideoGenerator::new(store).failing_start("quota exceeded")
        });

        let submission = h.orchestrator.submit(shirt_request()).await.unwrap();
        let response =
            wait_for_terminal(&h.orchestrator, submission.generation_id.as_str(), WAIT).await;
        assert_eq!(response.status, PollStatus::Failed);
    }

    #[tokio::test]
    async fn test_missing_video_marks_failed() {
        let h = harness_with(fast_config(), |store| {
            MockVideoGenerator::new(store).without_artifact()
        });

        let submission = h.orchestrator.submit(shirt_request()).await.unwrap();
        let id = submission.generation_id.to_string();
        let response = wait_for_terminal(&h.orchestrator, &id, WAIT).await;

        assert_eq!(response.status, PollStatus::Failed);
        let error = h.orchestrator.record(&id).unwrap().error.unwrap();
        assert!(error.starts_with("Generated video not found"));
    }

    #[tokio::test]
    async fn test_pending_checks_are_polled_through() {
        let h = harness_with(fast_config(), |store| {
            MockVideoGenerator::new(store).with_pending_checks(3)
        });

        let submission = h.orchestrator.submit(shirt_request()).await.unwrap();
        let response =
            wait_for_terminal(&h.orchestrator, submission.generation_id.as_str(), WAIT).await;
        assert_eq!(response.status, PollStatus::Done);
    }

    #[tokio::test]
    async fn test_layers_applied_in_caller_order() {
        let h = harness();
        let request = TryOnRequest::parse(
            "gs://bucket/p.png",
            &["gs://bucket/top-a.png", "gs://bucket/top-b.png"],
        )
        .unwrap();

        let submission = h.orchestrator.submit(request).await.unwrap();

        let calls = h.compositor.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1.describe(), "gs://bucket/top-a.png");
        assert_eq!(calls[1].1.describe(), "gs://bucket/top-b.png");
        assert_eq!(
            h.store.get(&submission.artifact.key).unwrap(),
            h.compositor.output_of(1).bytes
        );
    }

    #[tokio::test]
    async fn test_composition_failure_registers_nothing() {
        let store = Arc::new(MemoryBlobStore::new("bucket"));
        let video = Arc::new(MockVideoGenerator::new(store.clone()));
        let orchestrator = GenerationOrchestrator::builder()
            .compositor(Arc::new(MockCompositor::new().failing_at(1)))
            .blob_store(store.clone())
            .video_generator(video.clone())
            .config(fast_config())
            .build()
            .unwrap();

        let request = TryOnRequest::parse(
            "gs://bucket/p.png",
            &["gs://bucket/a.png", "gs://bucket/b.png"],
        )
        .unwrap();
        let err = orchestrator.submit(request).await.unwrap_err();

        match err {
            FittingRoomError::Composition(err) => assert_eq!(err.layer, 1),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(orchestrator.registry().is_empty());
        assert!(store.is_empty());
        assert_eq!(video.start_count(), 0);
    }

    #[tokio::test]
    async fn test_storage_failure_registers_nothing() {
        let mut blobs = MockBlobStore::new();
        blobs.expect_put().times(1).returning(|key, _, _| {
            Err(StorageError::Upload {
                key: key.to_string(),
                message: "permission denied".to_string(),
            })
        });
        let blobs: Arc<dyn BlobStore> = Arc::new(blobs);
        let registry = Arc::new(GenerationRegistry::new());

        let orchestrator = GenerationOrchestrator::builder()
            .compositor(Arc::new(MockCompositor::new()))
            .blob_store(blobs.clone())
            .video_generator(Arc::new(MockVideoGenerator::new(blobs)))
            .registry(registry.clone())
            .config(fast_config())
            .build()
            .unwrap();

        let err = orchestrator.submit(shirt_request()).await.unwrap_err();
        assert!(matches!(err, FittingRoomError::Storage(_)));
        assert!(registry.is_empty());
        assert_eq!(orchestrator.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_empty_garments_rejected_before_submit() {
        let h = harness();
        let err = TryOnRequest::parse::<&str>("gs://bucket/p.png", &[]).unwrap_err();
        assert_eq!(err, InputError::missing("garmentImageRefs"));
        assert!(h.orchestrator.registry().is_empty());
        assert!(h.compositor.calls().is_empty());
    }

    #[tokio::test]
    async fn test_identical_submissions_get_distinct_ids() {
        let h = harness();
        let first = h.orchestrator.submit(shirt_request()).await.unwrap();
        let second = h.orchestrator.submit(shirt_request()).await.unwrap();

        assert_ne!(first.generation_id, second.generation_id);
        assert_eq!(h.orchestrator.registry().len(), 2);
    }

    #[tokio::test]
    async fn test_video_request_built_from_composite() {
        let h = harness();
        let submission = h.orchestrator.submit(shirt_request()).await.unwrap();
        wait_for_terminal(&h.orchestrator, submission.generation_id.as_str(), WAIT).await;

        let requests = h.video.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].input_uri, submission.artifact.uri);
        assert_eq!(requests[0].input_mime_type, "image/png");
        assert_eq!(requests[0].prompt, DEFAULT_VIDEO_PROMPT);
        assert_eq!(requests[0].aspect_ratio, "9:16");
        assert!(requests[0].output_uri.starts_with("gs://bucket/videos/vto_"));
        assert!(requests[0].output_prefix.ends_with('/'));
    }

    #[tokio::test]
    async fn test_cancel_marks_failed() {
        let h = harness_with(fast_config(), |store| MockVideoGenerator::new(store).held());
        let submission = h.orchestrator.submit(shirt_request()).await.unwrap();
        let id = submission.generation_id.to_string();

        assert!(h.orchestrator.cancel(&id));
        let response = wait_for_terminal(&h.orchestrator, &id, WAIT).await;

        assert_eq!(response.status, PollStatus::Failed);
        let error = h.orchestrator.record(&id).unwrap().error.unwrap();
        assert!(error.contains("cancelled by caller"));
        assert_eq!(
            h.events.of_type(events::GENERATION_CANCEL_REQUESTED).len(),
            1
        );
    }

    #[tokio::test]
    async fn test_cancel_unknown_id() {
        let h = harness();
        assert!(!h.orchestrator.cancel("missing"));
        assert!(h.events.of_type(events::GENERATION_CANCEL_REQUESTED).is_empty());
    }

    #[tokio::test]
    async fn test_stage2_timeout_marks_failed() {
        let config = fast_config().with_stage2_timeout(Duration::from_millis(50));
        let h = harness_with(config, |store| MockVideoGenerator::new(store).held());

        let submission = h.orchestrator.submit(shirt_request()).await.unwrap();
        let id = submission.generation_id.to_string();
        let response = wait_for_terminal(&h.orchestrator, &id, WAIT).await;

        assert_eq!(response.status, PollStatus::Failed);
        let error = h.orchestrator.record(&id).unwrap().error.unwrap();
        assert!(error.contains("timed out"));
    }

    #[tokio::test]
    async fn test_shutdown_fails_running_jobs_and_rejects_new_work() {
        let h = harness_with(fast_config(), |store| MockVideoGenerator::new(store).held());
        let first = h.orchestrator.submit(shirt_request()).await.unwrap();
        let second = h.orchestrator.submit(shirt_request()).await.unwrap();

        let remaining = h.orchestrator.shutdown().await;
        assert_eq!(remaining, 0);
        assert!(h.orchestrator.is_shutting_down());

        for id in [&first.generation_id, &second.generation_id] {
            assert_eq!(h.orchestrator.poll(id.as_str()).status, PollStatus::Failed);
        }

        let err = h.orchestrator.submit(shirt_request()).await.unwrap_err();
        assert!(matches!(err, FittingRoomError::ServiceShutdown));
        assert_eq!(h.orchestrator.registry().len(), 2);
    }

    #[tokio::test]
    async fn test_job_concurrency_bound() {
        let config = fast_config().with_max_concurrent_jobs(1);
        let h = harness_with(config, |store| MockVideoGenerator::new(store).held());

        let first = h.orchestrator.submit(shirt_request()).await.unwrap();
        let second = h.orchestrator.submit(shirt_request()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(h.video.start_count(), 1);
        assert_eq!(h.orchestrator.in_flight(), 2);
        assert_eq!(h.orchestrator.job_stats().running, 1);

        h.video.release();
        for id in [&first.generation_id, &second.generation_id] {
            let response = wait_for_terminal(&h.orchestrator, id.as_str(), WAIT).await;
            assert_eq!(response.status, PollStatus::Done);
        }
        assert_eq!(h.video.start_count(), 2);
    }

    #[tokio::test]
    async fn test_lifecycle_events_in_order() {
        let h = harness();
        let submission = h.orchestrator.submit(shirt_request()).await.unwrap();
        wait_for_terminal(&h.orchestrator, submission.generation_id.as_str(), WAIT).await;

        assert_eq!(
            h.events.event_types(),
            vec![
                events::GENERATION_SUBMITTED,
                events::GENERATION_DISPATCHED,
                events::GENERATION_COMPLETED,
            ]
        );
    }

    #[tokio::test]
    async fn test_sweep_expired_respects_retention_setting() {
        let h = harness();
        let submission = h.orchestrator.submit(shirt_request()).await.unwrap();
        wait_for_terminal(&h.orchestrator, submission.generation_id.as_str(), WAIT).await;
        assert_eq!(h.orchestrator.sweep_expired(), 0);

        let h = harness_with(fast_config().with_record_ttl(Duration::ZERO), |store| {
            MockVideoGenerator::new(store)
        });
        let submission = h.orchestrator.submit(shirt_request()).await.unwrap();
        wait_for_terminal(&h.orchestrator, submission.generation_id.as_str(), WAIT).await;
        assert_eq!(h.orchestrator.sweep_expired(), 1);
        assert_eq!(
            h.orchestrator.poll(submission.generation_id.as_str()),
            PollResponse::not_found()
        );
    }

    #[test]
    fn test_builder_requires_collaborators() {
        let err = GenerationOrchestrator::builder().build().unwrap_err();
        assert_eq!(err.to_string(), "Internal error: compositor is not configured");
    }
}
