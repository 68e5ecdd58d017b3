use std::time::Duration;

use studyroom_client::{LinkState, MediaStatus, SessionEvent};
use studyroom_server::ServerConfig;

use crate::integration::init_tracing;
use crate::utils::{
    EVENT_TIMEOUT_MS, FakeDevices, FakeTransportFactory, join_and_wait, spawn_relay,
    start_session, wait_for_event, wait_until,
};

const ROOM: &str = "booking-5";

#[tokio::test]
async fn test_leave_closes_links_and_releases_media() {
    init_tracing();

    let addr = spawn_relay(ServerConfig::default())
        .await
        .expect("Failed to start relay");
    let (tutor, mut tutor_events) =
        start_session(addr, "Tutor", FakeDevices::new(), FakeTransportFactory::new())
            .await
            .expect("tutor");
    let ada_devices = FakeDevices::new();
    let (ada, mut ada_events) =
        start_session(addr, "Ada", ada_devices.clone(), FakeTransportFactory::new())
            .await
            .expect("ada");
    join_and_wait(&tutor, &mut tutor_events, ROOM).await.expect("join");
    join_and_wait(&ada, &mut ada_events, ROOM).await.expect("join");

    wait_until(&tutor, |s| s.connected() == vec![ada.participant()])
        .await
        .expect("tutor never connected");

    ada.leave().await.expect("leave");

    let left = wait_for_event(&mut tutor_events, |e| {
        matches!(e, SessionEvent::ParticipantLeft { .. })
    })
    .await
    .expect("participant-left");
    assert_eq!(
        left,
        SessionEvent::ParticipantLeft {
            participant: ada.participant()
        }
    );
    let tutor_view = wait_until(&tutor, |s| s.connected().is_empty())
        .await
        .expect("tutor link still up");
    assert!(tutor_view.links.contains(&(ada.participant(), LinkState::Closed)));

    let ada_view = ada.snapshot().await.expect("snapshot");
    assert_eq!(ada_view.room, None);
    assert_eq!(ada_view.media, MediaStatus::Pending);
    assert!(ada_view.links.iter().all(|(_, state)| *state == LinkState::Closed));
    assert!(ada_devices.live().is_empty());

    // Coming back gets fresh media and a fresh link.
    join_and_wait(&ada, &mut ada_events, ROOM).await.expect("rejoin");
    wait_until(&tutor, |s| s.connected() == vec![ada.participant()])
        .await
        .expect("no link after rejoin");
    wait_until(&ada, |s| s.media == MediaStatus::Full)
        .await
        .expect("media not re-acquired");
    assert_eq!(ada_devices.live().len(), 2);
}

#[tokio::test]
async fn test_shutdown_is_seen_as_departure() {
    init_tracing();

    let addr = spawn_relay(ServerConfig::default())
        .await
        .expect("Failed to start relay");
    let (tutor, mut tutor_events) =
        start_session(addr, "Tutor", FakeDevices::new(), FakeTransportFactory::new())
            .await
            .expect("tutor");
    let ada_devices = FakeDevices::new();
    let (ada, mut ada_events) =
        start_session(addr, "Ada", ada_devices.clone(), FakeTransportFactory::new())
            .await
            .expect("ada");
    join_and_wait(&tutor, &mut tutor_events, ROOM).await.expect("join");
    join_and_wait(&ada, &mut ada_events, ROOM).await.expect("join");

    let ada_id = ada.participant();
    ada.shutdown().await.expect("shutdown");

    wait_for_event(&mut tutor_events, |e| {
        *e == SessionEvent::ParticipantLeft {
            participant: ada_id,
        }
    })
    .await
    .expect("participant-left");

    // Fails once the session task is gone.
    assert!(ada.snapshot().await.is_err());
    assert!(ada_devices.live().is_empty());
}

#[tokio::test]
async fn test_leave_during_capture_releases_late_tracks() {
    init_tracing();

    let addr = spawn_relay(ServerConfig::default())
        .await
        .expect("Failed to start relay");
    let (devices, gate) = FakeDevices::gated();
    let (ada, mut ada_events) =
        start_session(addr, "Ada", devices.clone(), FakeTransportFactory::new())
            .await
            .expect("ada");

    join_and_wait(&ada, &mut ada_events, ROOM).await.expect("join");
    ada.leave().await.expect("leave");
    wait_until(&ada, |s| s.room.is_none()).await.expect("still in room");

    // The permission prompt is answered after the leave.
    gate.notify_one();
    tokio::time::timeout(Duration::from_millis(EVENT_TIMEOUT_MS), async {
        while devices.released().len() < 2 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("late tracks never released");

    assert!(devices.live().is_empty());
    let snapshot = ada.snapshot().await.expect("snapshot");
    assert_eq!(snapshot.room, None);
    assert_eq!(snapshot.media, MediaStatus::Pending);

    // A rejoin captures again.
    gate.notify_one();
    join_and_wait(&ada, &mut ada_events, ROOM).await.expect("rejoin");
    wait_until(&ada, |s| s.media == MediaStatus::Full)
        .await
        .expect("media not re-acquired");
    assert_eq!(devices.live().len(), 2);
}
