use studyroom_client::{LocalMediaController, MediaStatus};

use crate::integration::init_tracing;
use crate::utils::FakeDevices;

#[tokio::test]
async fn test_release_all_returns_every_handle() {
    init_tracing();

    let devices = FakeDevices::new();
    let media = LocalMediaController::new(devices.clone());
    media.acquire().await.unwrap();
    media.start_screen_share().await.unwrap();

    media.release_all();

    assert!(devices.live().is_empty());
    assert_eq!(devices.released().len(), 3);
    assert!(!media.is_screen_sharing());
    assert_eq!(media.status(), MediaStatus::Pending);

    // The next session captures again.
    assert_eq!(media.acquire().await, Ok(MediaStatus::Full));
    assert_eq!(devices.live().len(), 2);
}

#[tokio::test]
async fn test_drop_releases_capture() {
    init_tracing();

    let devices = FakeDevices::new();
    let media = LocalMediaController::new(devices.clone());
    media.acquire().await.unwrap();
    media.start_screen_share().await.unwrap();
    let clone = media.clone();

    drop(media);
    assert_eq!(devices.live().len(), 3);

    drop(clone);
    assert!(devices.live().is_empty());
}

#[tokio::test]
async fn test_release_during_capture_drops_late_tracks() {
    init_tracing();

    let (devices, gate) = FakeDevices::gated();
    let media = LocalMediaController::new(devices.clone());
    let capture = tokio::spawn({
        let media = media.clone();
        async move { media.acquire().await }
    });
    // Lets the capture reach the permission prompt.
    tokio::task::yield_now().await;

    media.release_all();
    gate.notify_one();

    assert_eq!(capture.await.unwrap(), Ok(MediaStatus::Pending));
    assert_eq!(devices.released().len(), 2);
    assert!(devices.live().is_empty());
    assert_eq!(media.status(), MediaStatus::Pending);
    assert!(media.stream().tracks.is_empty());

    gate.notify_one();
    assert_eq!(media.acquire().await, Ok(MediaStatus::Full));
    assert_eq!(devices.live().len(), 2);
}
