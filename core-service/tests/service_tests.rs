//! End-to-end tests for the service façade with injected bridges.

use async_trait::async_trait;
use bridge_desktop::TokioFileSystem;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{FetchedResource, ResourceFetcher};
use bridge_traits::network::{
    ConnectionType, HostNetworkMonitor, NetworkMonitor, NetworkSnapshot, SignalStrength,
};
use core_cache::{PrecachePolicy, QualityLevel};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, QualityEvent};
use core_service::{MediaCacheService, PlaybackSource, ServiceError};
use mockall::mock;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

mock! {
    pub Network {}

    #[async_trait]
    impl NetworkMonitor for Network {
        async fn snapshot(&self) -> BridgeResult<NetworkSnapshot>;
    }
}

/// Serves a fixed payload; URLs containing "missing" answer 404.
#[derive(Default)]
struct StaticFetcher {
    calls: AtomicUsize,
}

#[async_trait]
impl ResourceFetcher for StaticFetcher {
    async fn fetch_resource(&self, url: &str) -> BridgeResult<FetchedResource> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if url.contains("missing") {
            return Err(BridgeError::HttpStatus {
                status: 404,
                url: url.to_string(),
            });
        }
        Ok(FetchedResource::new(b"reel-bytes".to_vec()).with_mime_type("video/mp4"))
    }
}

struct Fixture {
    service: MediaCacheService,
    fetcher: Arc<StaticFetcher>,
    network: Arc<HostNetworkMonitor>,
    root: PathBuf,
}

impl Fixture {
    async fn new() -> Self {
        let root = std::env::temp_dir().join(format!("feedcache-service-{}", Uuid::new_v4()));
        let fetcher = Arc::new(StaticFetcher::default());
        let network = Arc::new(HostNetworkMonitor::new(NetworkSnapshot::new(
            ConnectionType::Wifi,
        )));

        let config = CoreConfig::builder()
            .resource_fetcher(fetcher.clone())
            .file_system(Arc::new(TokioFileSystem::with_cache_directory(root.clone())))
            .network_monitor(network.clone())
            .build()
            .unwrap();

        Self {
            service: MediaCacheService::bootstrap(config).await.unwrap(),
            fetcher,
            network,
            root,
        }
    }

    fn cleanup(self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

#[tokio::test]
async fn test_bootstrap_places_durable_tier_under_cache_directory() {
    let fixture = Fixture::new().await;
    assert!(fixture.root.join("media_cache").is_dir());
    fixture.cleanup();
}

#[tokio::test]
async fn test_bootstrap_honours_explicit_cache_dir() {
    let root = std::env::temp_dir().join(format!("feedcache-service-{}", Uuid::new_v4()));
    let explicit = root.join("reels");
    let config = CoreConfig::builder()
        .cache_dir(explicit.clone())
        .resource_fetcher(Arc::new(StaticFetcher::default()))
        .file_system(Arc::new(TokioFileSystem::with_cache_directory(root.clone())))
        .network_monitor(Arc::new(HostNetworkMonitor::default()))
        .build()
        .unwrap();

    let service = MediaCacheService::bootstrap(config).await.unwrap();
    service.resolve("https://cdn.test/a.mp4").await.unwrap();

    assert!(explicit.is_dir());
    assert!(std::fs::read_dir(&explicit).unwrap().count() >= 2);
    let _ = std::fs::remove_dir_all(&root);
}

#[tokio::test]
async fn test_resolve_populates_and_serves_from_cache() {
    let fixture = Fixture::new().await;
    let url = "https://cdn.test/reels/1.mp4";

    assert!(!fixture.service.is_available(url).await.unwrap());
    let first = fixture.service.resolve(url).await.unwrap();
    let second = fixture.service.resolve(url).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(fixture.fetcher.calls.load(Ordering::SeqCst), 1);
    assert!(fixture.service.is_available(url).await.unwrap());

    let stats = fixture.service.stats().await;
    assert_eq!(stats.ephemeral.entry_count, 1);
    assert_eq!(stats.durable.entry_count, 1);
    fixture.cleanup();
}

#[tokio::test]
async fn test_errors_surface_through_service_error() {
    let fixture = Fixture::new().await;

    let fetch = fixture
        .service
        .resolve("https://cdn.test/missing.mp4")
        .await
        .unwrap_err();
    assert!(matches!(fetch, ServiceError::Fetch(_)));
    assert_eq!(fetch.status(), Some(404));

    let invalid = fixture.service.resolve("   ").await.unwrap_err();
    assert!(matches!(invalid, ServiceError::Cache(_)));
    fixture.cleanup();
}

#[tokio::test]
async fn test_playback_source_falls_back_to_remote() {
    let fixture = Fixture::new().await;

    let cached = fixture
        .service
        .playback_source("https://cdn.test/ok.mp4")
        .await;
    assert!(cached.is_cached());

    let remote = fixture
        .service
        .playback_source("https://cdn.test/missing.mp4?token=abc")
        .await;
    assert_eq!(
        remote,
        PlaybackSource::Remote("https://cdn.test/missing.mp4?token=abc".to_string())
    );
    fixture.cleanup();
}

#[tokio::test]
async fn test_schedule_ignores_blank_urls() {
    let fixture = Fixture::new().await;

    let report = fixture
        .service
        .schedule(
            ["https://cdn.test/1.mp4", "", "https://cdn.test/2.mp4"],
            PrecachePolicy::default().with_high_bandwidth_required(true),
        )
        .wait()
        .await;

    assert_eq!(report.scheduled, 2);
    assert_eq!(report.succeeded, 2);
    assert!(fixture.service.is_available("https://cdn.test/2.mp4").await.unwrap());
    fixture.cleanup();
}

#[tokio::test]
async fn test_remove_and_clear() {
    let fixture = Fixture::new().await;
    fixture.service.resolve("https://cdn.test/1.mp4").await.unwrap();
    fixture.service.resolve("https://cdn.test/2.mp4").await.unwrap();

    assert!(fixture.service.remove("https://cdn.test/1.mp4").await.unwrap());
    assert!(!fixture.service.is_available("https://cdn.test/1.mp4").await.unwrap());

    assert_eq!(fixture.service.clear_all().await, 2);
    assert_eq!(fixture.service.stats().await.total_bytes(), 0);
    fixture.cleanup();
}

#[tokio::test]
async fn test_recommend_quality_follows_host_monitor() {
    let fixture = Fixture::new().await;
    assert_eq!(fixture.service.recommend_quality(None).await.label, "4K");

    fixture
        .network
        .update(NetworkSnapshot::new(ConnectionType::Cellular));
    assert_eq!(fixture.service.recommend_quality(None).await.label, "720p");

    fixture.network.set_low_power_mode(true);
    assert_eq!(fixture.service.recommend_quality(None).await.label, "360p");
    assert_eq!(
        fixture
            .service
            .recommend_quality(Some(QualityLevel::High))
            .await
            .label,
        "1080p"
    );
    fixture.cleanup();
}

#[tokio::test]
async fn test_unreadable_network_counts_as_unknown() {
    let root = std::env::temp_dir().join(format!("feedcache-service-{}", Uuid::new_v4()));
    let mut network = MockNetwork::new();
    network
        .expect_snapshot()
        .returning(|| Err(BridgeError::OperationFailed("no radio".to_string())));

    let config = CoreConfig::builder()
        .resource_fetcher(Arc::new(StaticFetcher::default()))
        .file_system(Arc::new(TokioFileSystem::with_cache_directory(root.clone())))
        .network_monitor(Arc::new(network))
        .build()
        .unwrap();
    let service = MediaCacheService::bootstrap(config).await.unwrap();

    assert_eq!(service.recommend_quality(None).await.label, "240p");
    let _ = std::fs::remove_dir_all(&root);
}

#[tokio::test]
async fn test_network_change_publishes_quality_event() {
    let fixture = Fixture::new().await;
    let mut events = fixture
        .service
        .subscribe_events()
        .filter(|event| matches!(event, CoreEvent::Quality(_)));

    let wifi = NetworkSnapshot::new(ConnectionType::Wifi).with_signal(SignalStrength::Excellent);
    let current = fixture.service.select_quality(&wifi, false, None);
    assert_eq!(current.label, "4K");

    let stable = fixture
        .service
        .analyze_network_change(&wifi, &wifi, Some(&current))
        .await;
    assert!(!stable.should_change);
    assert!(events.try_recv().is_none());

    let cellular = NetworkSnapshot::new(ConnectionType::Cellular);
    let change = fixture
        .service
        .analyze_network_change(&wifi, &cellular, Some(&current))
        .await;
    assert!(change.should_change);
    assert_eq!(change.quality.label, "720p");

    match events.try_recv() {
        Some(Ok(CoreEvent::Quality(QualityEvent::Changed { from, to, .. }))) => {
            assert_eq!(from.as_deref(), Some("4K"));
            assert_eq!(to, "720p");
        }
        other => panic!("expected quality event, got {:?}", other),
    }
    fixture.cleanup();
}

#[tokio::test]
async fn test_rendition_url() {
    let fixture = Fixture::new().await;
    let tier = fixture
        .service
        .select_quality(&NetworkSnapshot::offline(), false, None);

    assert_eq!(
        fixture
            .service
            .rendition_url("https://cdn.test/reels/9.mp4", &tier),
        "https://cdn.test/reels/9_240p.mp4"
    );
    fixture.cleanup();
}

#[test]
fn test_logging_config_carries_no_sink_by_default() {
    let config = CoreConfig::builder()
        .resource_fetcher(Arc::new(StaticFetcher::default()))
        .file_system(Arc::new(TokioFileSystem::with_cache_directory(
            std::env::temp_dir(),
        )))
        .network_monitor(Arc::new(HostNetworkMonitor::default()))
        .build()
        .unwrap();

    assert!(MediaCacheService::logging_config(&config)
        .logger_sink
        .is_none());
}
