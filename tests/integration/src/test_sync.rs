//! Catalog synchronization end to end.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use filetime::FileTime;
    use prism_store::ObjectStoreClient;
    use prism_sync::{
        ChangeCache, ImageCodec, JsonFileChangeCache, MemoryChangeCache, SyncOrchestrator,
        SyncState, TriggerOutcome,
    };
    use tempfile::NamedTempFile;

    use crate::{
        DESTINATION, RenderedExtractor, SharedCatalog, StubObjectStore, client_for, stored_path,
        test_profile, wait_until,
    };

    fn orchestrator(
        stub: &StubObjectStore,
        catalog: &SharedCatalog,
        cache: Box<dyn ChangeCache>,
        poll_interval_ms: u64,
    ) -> (SyncOrchestrator, Arc<ObjectStoreClient>) {
        let mut config = stub.config();
        config.poll_interval_ms = poll_interval_ms;
        let client = Arc::new(client_for(stub, test_profile()));
        let sync = SyncOrchestrator::new(
            config,
            Arc::clone(&client),
            Box::new(catalog.clone()),
            cache,
            Arc::new(RenderedExtractor {
                longest_dimension: 320,
            }),
            Arc::new(ImageCodec),
        );
        (sync, client)
    }

    #[test]
    fn test_should_upload_and_remove_with_single_flight() {
        let stub = StubObjectStore::start(test_profile());
        let catalog = SharedCatalog::default();
        for uuid in ["A", "B", "C"] {
            catalog.insert(uuid, &[80, 320, 1024]);
        }
        let catalog_file = NamedTempFile::new().unwrap();
        let (mut sync, client) =
            orchestrator(&stub, &catalog, Box::new(MemoryChangeCache::new()), 60_000);

        stub.set_delay(Duration::from_millis(200));
        assert_eq!(
            sync.begin(catalog_file.path(), DESTINATION).unwrap(),
            TriggerOutcome::Started(3)
        );
        assert_eq!(sync.state(), SyncState::Synchronizing);
        assert_eq!(sync.trigger().unwrap(), TriggerOutcome::Busy);
        assert!(sync.is_worker_active());

        let report = sync.wait_for_batch().unwrap().unwrap();
        assert_eq!(report.uploaded, 3);
        assert!(report.failures.is_empty(), "{:?}", report.failures);
        assert_eq!(stub.accepted("PUT"), 3);

        let preview = stub.object(&stored_path("A.jpg")).unwrap();
        let decoded = image::load_from_memory(&preview).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (220, 165));

        stub.set_delay(Duration::ZERO);
        catalog.insert("D", &[320]);
        catalog.remove("A");
        assert_eq!(sync.trigger().unwrap(), TriggerOutcome::Started(2));
        let report = sync.wait_for_batch().unwrap().unwrap();
        assert_eq!((report.uploaded, report.removed), (1, 1));
        assert_eq!(stub.accepted("PUT"), 4);
        assert_eq!(stub.accepted("DELETE"), 1);
        assert!(stub.object(&stored_path("A.jpg")).is_none());
        assert!(stub.object(&stored_path("D.jpg")).is_some());

        assert_eq!(sync.trigger().unwrap(), TriggerOutcome::UpToDate);
        assert!(sync.stop().unwrap().is_none());
        assert_eq!(sync.state(), SyncState::Idle);
        assert_eq!(client.live_requests(), 0);
    }

    #[test]
    fn test_should_persist_synchronized_keys() {
        let stub = StubObjectStore::start(test_profile());
        let cache_dir = tempfile::tempdir().unwrap();
        let mut stale = JsonFileChangeCache::in_dir(cache_dir.path());
        stale.load_or_create().unwrap();
        stale.insert("Z").unwrap();

        let catalog = SharedCatalog::default();
        catalog.insert("A", &[320]);
        catalog.insert("B", &[320]);
        let catalog_file = NamedTempFile::new().unwrap();
        let (mut sync, _client) = orchestrator(
            &stub,
            &catalog,
            Box::new(JsonFileChangeCache::in_dir(cache_dir.path())),
            60_000,
        );

        assert_eq!(
            sync.begin(catalog_file.path(), DESTINATION).unwrap(),
            TriggerOutcome::Started(3)
        );
        let report = sync.wait_for_batch().unwrap().unwrap();
        assert_eq!((report.uploaded, report.removed), (2, 1));
        sync.stop().unwrap();

        let mut reloaded = JsonFileChangeCache::in_dir(cache_dir.path());
        reloaded.load_or_create().unwrap();
        assert!(reloaded.contains("A"));
        assert!(reloaded.contains("B"));
        assert!(!reloaded.contains("Z"));
        assert_eq!(stub.accepted("DELETE"), 1);
    }

    #[test]
    fn test_should_cancel_running_batch_on_stop() {
        let stub = StubObjectStore::start(test_profile());
        let catalog = SharedCatalog::default();
        for i in 0..10 {
            catalog.insert(&format!("item-{i:02}"), &[320]);
        }
        let catalog_file = NamedTempFile::new().unwrap();
        let (mut sync, client) =
            orchestrator(&stub, &catalog, Box::new(MemoryChangeCache::new()), 60_000);

        stub.set_delay(Duration::from_millis(300));
        assert_eq!(
            sync.begin(catalog_file.path(), DESTINATION).unwrap(),
            TriggerOutcome::Started(10)
        );
        std::thread::sleep(Duration::from_millis(50));

        let started = Instant::now();
        let report = sync.stop().unwrap().unwrap();
        assert!(started.elapsed() < Duration::from_secs(3));
        assert!(report.cancelled);
        assert!(report.uploaded < 10);
        assert!(!sync.is_worker_active());
        assert_eq!(client.live_requests(), 0);
        assert!(sync.trigger().is_err());
    }

    #[test]
    fn test_should_sync_when_catalog_file_changes() {
        let stub = StubObjectStore::start(test_profile());
        let catalog = SharedCatalog::default();
        let catalog_file = NamedTempFile::new().unwrap();
        let (mut sync, _client) =
            orchestrator(&stub, &catalog, Box::new(MemoryChangeCache::new()), 50);

        assert_eq!(
            sync.begin(catalog_file.path(), DESTINATION).unwrap(),
            TriggerOutcome::UpToDate
        );
        // Let the watcher record the initial modification time.
        std::thread::sleep(Duration::from_millis(200));

        catalog.insert("W", &[320]);
        let later = FileTime::from_unix_time(FileTime::now().unix_seconds() + 60, 0);
        filetime::set_file_mtime(catalog_file.path(), later).unwrap();

        assert!(wait_until(Duration::from_secs(5), || stub.accepted("PUT") == 1));
        assert!(wait_until(Duration::from_secs(5), || !sync.is_worker_active()));
        assert!(stub.object(&stored_path("W.jpg")).is_some());
        assert!(catalog.reopens() >= 2);
        sync.stop().unwrap();
    }
}
