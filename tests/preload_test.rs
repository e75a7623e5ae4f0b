use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use image_resource_engine::config::ResourceConfig;
use image_resource_engine::engine::preload::{PreloadOutcome, Preloader};
use image_resource_engine::error::{ResourceError, StateError};
use image_resource_engine::platform::{AlwaysIdle, DeviceActivity, FixedMemory};
use image_resource_engine::progress::ProgressSink;

const FRAME_COUNT: u32 = 9;

fn test_config() -> ResourceConfig {
    let mut config = ResourceConfig::default();
    config.image.frame_count = FRAME_COUNT;
    config.preload.load_delay_ms = 1;
    config
}

fn make_preloader(free_bytes: u64) -> Arc<Preloader> {
    Arc::new(Preloader::new(
        Arc::new(test_config()),
        Arc::new(AlwaysIdle),
        Arc::new(FixedMemory::new(free_bytes)),
    ))
}

/// Device activity stub whose busy state the test flips.
struct ToggleActivity {
    busy: AtomicBool,
}

impl DeviceActivity for ToggleActivity {
    fn is_idle(&self) -> bool {
        !self.busy.load(Ordering::SeqCst)
    }

    fn is_audio_queue_empty(&self) -> bool {
        !self.busy.load(Ordering::SeqCst)
    }
}

#[tokio::test]
async fn test_cancel_after_three_frames_stops_there() {
    let preloader = make_preloader(64 * 1024 * 1024);
    let loaded = Arc::new(AtomicU32::new(0));

    // The third successful load requests cancellation; the loop notices at
    // the next index, cooperatively.
    let counter = loaded.clone();
    let canceller = preloader.clone();
    let report = preloader
        .preload_silent(
            FRAME_COUNT,
            move |_| {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if n == 3 {
                    canceller.cancel();
                }
                true
            },
            |_| false,
            0,
        )
        .await
        .unwrap();

    assert_eq!(report.outcome, PreloadOutcome::Cancelled);
    assert_eq!(report.loaded, 3);
    assert_eq!(loaded.load(Ordering::SeqCst), 3);
    assert!(!preloader.is_running());
}

#[tokio::test]
async fn test_second_start_while_running_is_rejected() {
    // A slow session: each frame takes a while through load_delay_ms.
    let slow = {
        let mut config = test_config();
        config.preload.load_delay_ms = 50;
        Arc::new(Preloader::new(
            Arc::new(config),
            Arc::new(AlwaysIdle),
            Arc::new(FixedMemory::new(64 * 1024 * 1024)),
        ))
    };

    let background = slow.clone();
    let worker = tokio::spawn(async move {
        background
            .preload_silent(FRAME_COUNT, |_| true, |_| false, 0)
            .await
    });

    // Give the worker a moment to take the running slot.
    while !slow.is_running() {
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
    }

    let err = slow
        .preload_silent(FRAME_COUNT, |_| true, |_| false, 0)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ResourceError::State(StateError::PreloadAlreadyRunning)
    ));

    slow.cancel();
    assert!(slow.wait_for_finish(2_000).await);
    assert!(!slow.is_running());
    worker.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_wait_for_finish_times_out_while_running() {
    let slow = {
        let mut config = test_config();
        config.preload.load_delay_ms = 100;
        Arc::new(Preloader::new(
            Arc::new(config),
            Arc::new(AlwaysIdle),
            Arc::new(FixedMemory::new(64 * 1024 * 1024)),
        ))
    };

    let background = slow.clone();
    let worker = tokio::spawn(async move {
        background
            .preload_silent(FRAME_COUNT, |_| true, |_| false, 0)
            .await
    });
    while !slow.is_running() {
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
    }

    // Far shorter than a full session.
    assert!(!slow.wait_for_finish(10).await);
    assert!(slow.is_running());

    slow.cancel();
    assert!(slow.wait_for_finish(2_000).await);
    worker.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_audio_activity_yields_visible_preload() {
    let activity = Arc::new(ToggleActivity {
        busy: AtomicBool::new(true),
    });
    let preloader = Preloader::new(
        Arc::new(test_config()),
        activity,
        Arc::new(FixedMemory::new(64 * 1024 * 1024)),
    );

    // The audio guard runs every third index, so frames 1 and 2 load and
    // index 3 stops the session.
    let report = preloader
        .preload_remaining(FRAME_COUNT, |_| true, |_| false, &ProgressSink::disabled())
        .await
        .unwrap();

    assert_eq!(report.outcome, PreloadOutcome::AudioYield);
    assert_eq!(report.loaded, 2);
}

#[tokio::test]
async fn test_silent_preload_ignores_audio_activity() {
    let activity = Arc::new(ToggleActivity {
        busy: AtomicBool::new(true),
    });
    let preloader = Preloader::new(
        Arc::new(test_config()),
        activity,
        Arc::new(FixedMemory::new(64 * 1024 * 1024)),
    );

    let report = preloader
        .preload_silent(FRAME_COUNT, |_| true, |_| false, 0)
        .await
        .unwrap();

    assert_eq!(report.outcome, PreloadOutcome::Completed);
    assert_eq!(report.loaded, FRAME_COUNT);
}

#[tokio::test]
async fn test_load_failures_do_not_end_the_session() {
    let preloader = make_preloader(64 * 1024 * 1024);

    // Every even frame fails to load; the session still visits all nine.
    let report = preloader
        .preload_silent(FRAME_COUNT, |i| i % 2 == 1, |_| false, 0)
        .await
        .unwrap();

    assert_eq!(report.outcome, PreloadOutcome::Completed);
    assert_eq!(report.loaded, 5);
    assert!(report.useful());
}

#[tokio::test]
async fn test_progress_interval_throttles_per_frame_events() {
    let mut config = test_config();
    config.preload.progress_update_interval = 3;
    let preloader = Preloader::new(
        Arc::new(config),
        Arc::new(AlwaysIdle),
        Arc::new(FixedMemory::new(64 * 1024 * 1024)),
    );
    let (progress, mut rx) = ProgressSink::channel(256);

    let report = preloader
        .preload_remaining(FRAME_COUNT, |_| true, |_| false, &progress)
        .await
        .unwrap();
    assert_eq!(report.outcome, PreloadOutcome::Completed);

    // Only every third frame announces itself; the completion message and
    // the hide event still arrive.
    let mut per_frame = 0;
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let Some(msg) = &event.message {
            if msg.starts_with("Preloading image") {
                per_frame += 1;
            }
        }
        events.push(event);
    }
    assert_eq!(per_frame, 3); // frames 3, 6 and 9
    assert!(events.last().unwrap().message.is_none());
}

#[tokio::test]
async fn test_preload_emits_progress_and_terminal_hide() {
    let preloader = make_preloader(64 * 1024 * 1024);
    let (progress, mut rx) = ProgressSink::channel(256);

    let report = preloader
        .preload_remaining(3, |_| true, |_| false, &progress)
        .await
        .unwrap();
    assert_eq!(report.outcome, PreloadOutcome::Completed);

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert!(!events.is_empty());
    // The stream ends with the hide event.
    let last = events.last().unwrap();
    assert!(last.message.is_none());
    assert_eq!(last.current, 3);
}
