mod common;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{channel, wait_for_position, Lines, BACKWARD, FORWARD};
use encodio::encoder::{
    AmbiguousPolicy, ChannelSampler, DigitalInput, EncoderChannel, EncoderId, LoopPhase,
    PollingSettings, SimulatedLine,
};
use encodio::publish::PublishSettings;
use encodio::{ConfigError, EncoderService, EncodioConfig, ServiceError};

fn test_config(name: &str) -> EncodioConfig {
    EncodioConfig {
        polling: PollingSettings {
            thread_name: format!("enc-{}", name),
            idle_interval_us: 50,
            stats_interval_secs: 0,
        },
        publish: PublishSettings {
            attribute_path: attribute_path(name),
            refresh_interval_ms: 5,
        },
        ..Default::default()
    }
}

fn attribute_path(name: &str) -> PathBuf {
    std::env::temp_dir()
        .join(format!("encodio-service-{}-{}", name, std::process::id()))
        .join("enc")
        .join("dot")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_service_publishes_positions() {
    let config = test_config("publish");
    let enc1 = Lines::default();
    let enc2 = Lines::default();

    let service = EncoderService::start_with_channels(
        &config,
        channel(EncoderId::Enc1, &enc1, AmbiguousPolicy::Literal),
        channel(EncoderId::Enc2, &enc2, AmbiguousPolicy::Literal),
    )
    .await
    .unwrap();

    assert_eq!(service.phase(), LoopPhase::Running);
    assert!(service.is_published());
    assert_eq!(service.read(), "0 0");

    let store = service.store();
    let driver = tokio::task::spawn_blocking(move || {
        for step in 1..=5 {
            enc1.set_step(&FORWARD, step);
            wait_for_position(&store, EncoderId::Enc1, step as i32);
        }
        for step in 1..=7 {
            enc2.set_step(&BACKWARD, step);
            wait_for_position(&store, EncoderId::Enc2, -(step as i32));
        }
    });
    driver.await.unwrap();

    assert_eq!(service.positions(), (5, -7));
    assert_eq!(service.read(), "5 -7");

    let mut rx = service.subscribe();
    tokio::time::timeout(Duration::from_secs(5), async {
        while rx.borrow_and_update().positions() != (5, -7) {
            rx.changed().await.unwrap();
        }
    })
    .await
    .expect("attribute refresh timed out");

    let path = config.publish.attribute_path.clone();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "5 -7");

    let final_positions = service.stop().await.unwrap();
    assert_eq!(final_positions, (5, -7));
    assert!(!path.exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_service_runs_without_attribute() {
    let blocker = std::env::temp_dir().join(format!("encodio-service-blocker-{}", std::process::id()));
    std::fs::write(&blocker, "").unwrap();

    let mut config = test_config("detached");
    config.publish.attribute_path = blocker.join("enc").join("dot");

    let enc1 = Lines::default();
    let enc2 = Lines::default();
    let service = EncoderService::start_with_channels(
        &config,
        channel(EncoderId::Enc1, &enc1, AmbiguousPolicy::Literal),
        channel(EncoderId::Enc2, &enc2, AmbiguousPolicy::Literal),
    )
    .await
    .unwrap();
    assert!(!service.is_published());

    // Tracking carries on without a published attribute
    let store = service.store();
    tokio::task::spawn_blocking(move || {
        enc2.set_step(&FORWARD, 1);
        wait_for_position(&store, EncoderId::Enc2, 1);
    })
    .await
    .unwrap();
    assert_eq!(service.read(), "0 1");

    assert_eq!(service.stop().await.unwrap(), (0, 1));
    std::fs::remove_file(&blocker).unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dropped_service_removes_attribute() {
    let config = test_config("drop");
    let enc1 = Lines::default();
    let enc2 = Lines::default();

    let service = EncoderService::start_with_channels(
        &config,
        channel(EncoderId::Enc1, &enc1, AmbiguousPolicy::Literal),
        channel(EncoderId::Enc2, &enc2, AmbiguousPolicy::Literal),
    )
    .await
    .unwrap();
    let path = config.publish.attribute_path.clone();
    assert!(path.exists());

    let store = service.store();
    drop(service);

    assert!(!path.exists());
    // The worker was joined, so the lines no longer move the store
    enc1.set_step(&FORWARD, 1);
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(store.read(), (0, 0));
}

/// Line that notes, on every read, whether the attribute file exists.
struct AttributeWatcher {
    line: SimulatedLine,
    path: PathBuf,
    seen_present: Arc<AtomicBool>,
    present_at_last_read: Arc<AtomicBool>,
}

impl DigitalInput for AttributeWatcher {
    fn read_level(&self) -> u8 {
        let present = self.path.exists();
        if present {
            self.seen_present.store(true, Ordering::Relaxed);
        }
        self.present_at_last_read.store(present, Ordering::Relaxed);
        self.line.read_level()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_unpublishes_before_last_read() {
    let config = test_config("order");
    let path = config.publish.attribute_path.clone();
    let seen_present = Arc::new(AtomicBool::new(false));
    let present_at_last_read = Arc::new(AtomicBool::new(false));

    let enc1 = Lines::default();
    // ENC2's B line is the last read of every iteration
    let enc2 = EncoderChannel::new(
        EncoderId::Enc2,
        ChannelSampler::new(
            SimulatedLine::new(),
            AttributeWatcher {
                line: SimulatedLine::new(),
                path: path.clone(),
                seen_present: seen_present.clone(),
                present_at_last_read: present_at_last_read.clone(),
            },
        ),
        AmbiguousPolicy::Literal,
    );

    let service = EncoderService::start_with_channels(
        &config,
        channel(EncoderId::Enc1, &enc1, AmbiguousPolicy::Literal),
        enc2,
    )
    .await
    .unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while !seen_present.load(Ordering::Relaxed) {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("worker never saw the attribute");

    service.stop().await.unwrap();
    assert!(!present_at_last_read.load(Ordering::Relaxed));
    assert!(!path.exists());
}

#[tokio::test]
async fn test_start_with_channels_rejects_invalid_config() {
    let mut config = test_config("invalid");
    config.publish.refresh_interval_ms = 0;
    let enc1 = Lines::default();
    let enc2 = Lines::default();

    let result = EncoderService::start_with_channels(
        &config,
        channel(EncoderId::Enc1, &enc1, AmbiguousPolicy::Literal),
        channel(EncoderId::Enc2, &enc2, AmbiguousPolicy::Literal),
    )
    .await;
    match result {
        Err(ServiceError::ConfigError(ConfigError::Invalid(msg))) => {
            assert!(msg.contains("refresh_interval_ms"))
        }
        Err(other) => panic!("Expected invalid config, got {}", other),
        Ok(_) => panic!("Expected invalid config, service started"),
    }
    assert!(!config.publish.attribute_path.exists());
}
