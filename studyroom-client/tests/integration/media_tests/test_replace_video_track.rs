use studyroom_client::{LinkState, LocalTrack, MediaStatus, TrackSource};

use crate::integration::init_tracing;
use crate::utils::{
    FakeDevices, FakeTransportFactory, Peer, TransportCall, connect, exchange, peer_with_media,
};

#[tokio::test]
async fn test_replace_in_place_keeps_negotiation() {
    init_tracing();

    let devices = FakeDevices::new();
    let (mut a, media) =
        peer_with_media(FakeTransportFactory::replacing_in_place(), devices.clone()).await;
    let mut b = Peer::new().ready().await;
    connect(&mut a, &mut b).await;
    let old = media.stream().video().cloned().expect("camera");

    let new = LocalTrack::new(TrackSource::Camera);
    media.replace_video_track(new.clone()).unwrap();
    a.manager.sync_local_media(&media.stream()).await;

    let transport = a.transport(&b);
    assert_eq!(
        transport.calls().last(),
        Some(&TransportCall::ReplaceTrack(
            old.id().to_owned(),
            new.id().to_owned()
        ))
    );
    assert_eq!(transport.offers(), 1);
    assert_eq!(a.state(&b), Some(LinkState::Connected));
    assert!(devices.is_released(&old));
}

#[tokio::test]
async fn test_replace_falls_back_to_renegotiation() {
    init_tracing();

    let (mut a, media) = peer_with_media(FakeTransportFactory::new(), FakeDevices::new()).await;
    let mut b = Peer::new().ready().await;
    connect(&mut a, &mut b).await;
    let old = media.stream().video().cloned().expect("camera");

    let new = LocalTrack::new(TrackSource::Camera);
    media.replace_video_track(new.clone()).unwrap();
    a.manager.sync_local_media(&media.stream()).await;

    let calls = a.transport(&b).calls();
    assert!(calls.contains(&TransportCall::RemoveTrack(old.id().to_owned())));
    assert!(calls.contains(&TransportCall::AddTrack(new.id().to_owned())));
    assert_eq!(a.state(&b), Some(LinkState::OfferSent));

    exchange(&mut a, &mut b).await;

    assert_eq!(a.state(&b), Some(LinkState::Connected));
    assert_eq!(b.state(&a), Some(LinkState::Connected));
    assert_eq!(a.transport(&b).offers(), 2);
    // Same transport on the answering side.
    assert_eq!(b.factory.created(), 1);
}

#[tokio::test]
async fn test_delayed_camera_grant_renegotiates() {
    init_tracing();

    let (mut a, media) =
        peer_with_media(FakeTransportFactory::new(), FakeDevices::without_camera()).await;
    let mut b = Peer::new().ready().await;
    connect(&mut a, &mut b).await;
    assert_eq!(media.status(), MediaStatus::AudioOnly);

    let camera = LocalTrack::new(TrackSource::Camera);
    media.add_track(camera.clone()).unwrap();
    assert_eq!(media.status(), MediaStatus::Full);

    a.manager.sync_local_media(&media.stream()).await;
    assert_eq!(a.state(&b), Some(LinkState::OfferSent));
    exchange(&mut a, &mut b).await;

    assert_eq!(a.state(&b), Some(LinkState::Connected));
    assert!(
        a.transport(&b)
            .calls()
            .contains(&TransportCall::AddTrack(camera.id().to_owned()))
    );
}

#[tokio::test]
async fn test_tracks_changed_mid_exchange_renegotiate_after_connect() {
    init_tracing();

    let (mut a, media) = peer_with_media(FakeTransportFactory::new(), FakeDevices::new()).await;
    let mut b = Peer::new().ready().await;

    a.manager.participant_joined(b.id).await;
    media.start_screen_share().await.unwrap();
    a.manager.sync_local_media(&media.stream()).await;
    // Still waiting for the first answer.
    assert_eq!(a.state(&b), Some(LinkState::OfferSent));

    exchange(&mut a, &mut b).await;

    assert_eq!(a.state(&b), Some(LinkState::Connected));
    assert_eq!(a.transport(&b).offers(), 2);
}
