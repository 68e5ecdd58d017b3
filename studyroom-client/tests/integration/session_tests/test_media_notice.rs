use studyroom_client::{MediaStatus, SessionEvent};
use studyroom_server::ServerConfig;

use crate::integration::init_tracing;
use crate::utils::{
    FakeDevices, FakeTransportFactory, join_and_wait, spawn_relay, start_session, wait_for_event,
    wait_until,
};

const ROOM: &str = "booking-12";

fn is_notice(event: &SessionEvent) -> bool {
    matches!(event, SessionEvent::MediaNotice { .. })
}

#[tokio::test]
async fn test_missing_camera_is_reported() {
    init_tracing();

    let addr = spawn_relay(ServerConfig::default())
        .await
        .expect("Failed to start relay");
    let (ada, mut events) = start_session(
        addr,
        "Ada",
        FakeDevices::without_camera(),
        FakeTransportFactory::new(),
    )
    .await
    .expect("ada");

    match wait_for_event(&mut events, is_notice).await.expect("notice") {
        SessionEvent::MediaNotice { status, .. } => assert_eq!(status, MediaStatus::AudioOnly),
        other => panic!("Expected media notice, got {:?}", other),
    }
    assert_eq!(ada.snapshot().await.expect("snapshot").media, MediaStatus::AudioOnly);
}

#[tokio::test]
async fn test_participant_without_media_still_connects() {
    init_tracing();

    let addr = spawn_relay(ServerConfig::default())
        .await
        .expect("Failed to start relay");
    let (tutor, mut tutor_events) =
        start_session(addr, "Tutor", FakeDevices::new(), FakeTransportFactory::new())
            .await
            .expect("tutor");
    let (ada, mut ada_events) = start_session(
        addr,
        "Ada",
        FakeDevices::without_any(),
        FakeTransportFactory::new(),
    )
    .await
    .expect("ada");

    match wait_for_event(&mut ada_events, is_notice).await.expect("notice") {
        SessionEvent::MediaNotice { status, message } => {
            assert_eq!(status, MediaStatus::Unavailable);
            assert!(!message.is_empty());
        }
        other => panic!("Expected media notice, got {:?}", other),
    }

    join_and_wait(&tutor, &mut tutor_events, ROOM).await.expect("join");
    join_and_wait(&ada, &mut ada_events, ROOM).await.expect("join");

    wait_until(&tutor, |s| s.connected() == vec![ada.participant()])
        .await
        .expect("tutor not connected");
    let snapshot = wait_until(&ada, |s| s.connected() == vec![tutor.participant()])
        .await
        .expect("ada not connected");
    assert_eq!(snapshot.media, MediaStatus::Unavailable);
}
