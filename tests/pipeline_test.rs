//! End-to-end test: synthetic camera through the real EAN-13 engine.

use std::sync::Arc;
use std::time::Duration;

use barscan::config::{CaptureConfig, ScanConfig, ScannerConfig};
use barscan::decode::{Ean13Engine, MockEngine};
use barscan::session::{LifecycleState, ResultHandler, ScanSession};
use barscan::source::synthetic::SyntheticCamera;

fn pipeline_config() -> ScannerConfig {
    ScannerConfig {
        capture: CaptureConfig {
            min_width: 640,
            ..CaptureConfig::default()
        },
        scan: ScanConfig {
            interval_ms: 10,
            ..ScanConfig::default()
        },
        ..ScannerConfig::default()
    }
}

#[tokio::test]
async fn test_synthetic_camera_decodes_end_to_end() {
    let camera = SyntheticCamera::new(640, 480)
        .with_payload("4607004345302")
        .with_warmup_frames(2);

    let (result_tx, mut result_rx) = tokio::sync::mpsc::unbounded_channel();
    let on_result: ResultHandler = Box::new(move |payload| {
        let _ = result_tx.send(payload);
    });

    let mut session = ScanSession::start(
        &pipeline_config(),
        Box::new(camera),
        Arc::new(Ean13Engine::new()),
        on_result,
    )
    .await;
    assert_eq!(session.state(), LifecycleState::Running);

    let payload = tokio::time::timeout(Duration::from_secs(5), result_rx.recv())
        .await
        .expect("no recognition within the deadline")
        .expect("result channel closed");
    assert_eq!(payload, "4607004345302");

    let status = session.status();
    assert!(status.ready);
    assert!(status.mean_latency_ms > 0.0);

    session.stop().await.unwrap();
    assert_eq!(session.state(), LifecycleState::Stopped);
}

#[tokio::test]
async fn test_stop_while_running_is_clean() {
    let camera = SyntheticCamera::new(640, 480).with_warmup_frames(1);

    let mut session = ScanSession::start(
        &pipeline_config(),
        Box::new(camera),
        Arc::new(MockEngine::empty()),
        Box::new(|_payload| {}),
    )
    .await;
    assert_eq!(session.state(), LifecycleState::Running);

    tokio::time::sleep(Duration::from_millis(100)).await;
    session.stop().await.unwrap();
    assert_eq!(session.state(), LifecycleState::Stopped);
    session.stop().await.unwrap();
}

#[tokio::test]
async fn test_narrow_synthetic_sensor_is_unsupported() {
    // Default capture config wants 1920 px; the sensor cannot deliver.
    let camera = SyntheticCamera::new(640, 480);

    let session = ScanSession::start(
        &ScannerConfig::default(),
        Box::new(camera),
        Arc::new(MockEngine::empty()),
        Box::new(|_payload| {}),
    )
    .await;
    assert_eq!(session.state(), LifecycleState::DeviceUnavailable);
}
