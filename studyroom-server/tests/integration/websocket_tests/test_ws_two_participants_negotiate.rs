use studyroom_core::{ClientMessage, RoomId, ServerMessage, SignalKind};
use studyroom_server::ServerConfig;

use crate::integration::init_tracing;
use crate::utils::{WsTestClient, sdp, spawn_relay};

#[tokio::test]
async fn test_ws_two_participants_negotiate() {
    init_tracing();

    let addr = spawn_relay(ServerConfig::default())
        .await
        .expect("Failed to start relay");
    let room = RoomId::from("booking-21");

    let mut tutor = WsTestClient::connect(addr, Some("tutor-1"))
        .await
        .expect("tutor connect");
    let mut learner = WsTestClient::connect(addr, Some("learner-1"))
        .await
        .expect("learner connect");
    assert_ne!(tutor.participant, learner.participant);

    tutor
        .send(&ClientMessage::JoinSession { room: room.clone() })
        .await
        .expect("tutor join");
    match tutor.recv().await.expect("tutor joined") {
        ServerMessage::SessionJoined { participants, .. } => assert!(participants.is_empty()),
        other => panic!("Expected session-joined, got {:?}", other),
    }

    learner
        .send(&ClientMessage::JoinSession { room: room.clone() })
        .await
        .expect("learner join");
    match learner.recv().await.expect("learner joined") {
        ServerMessage::SessionJoined { participants, .. } => {
            assert_eq!(participants, vec![tutor.participant]);
        }
        other => panic!("Expected session-joined, got {:?}", other),
    }

    match tutor.recv().await.expect("announcement") {
        ServerMessage::ParticipantJoined {
            participant,
            identity,
            ..
        } => {
            assert_eq!(participant, learner.participant);
            assert_eq!(identity.map(|i| i.user_id).as_deref(), Some("learner-1"));
        }
        other => panic!("Expected participant-joined, got {:?}", other),
    }

    // The newcomer offers; the relay stamps the sender.
    learner
        .send(&ClientMessage::signal(
            SignalKind::Offer,
            room.clone(),
            tutor.participant,
            sdp("learner-offer"),
        ))
        .await
        .expect("offer");
    assert_eq!(
        tutor.recv().await.expect("offer relayed"),
        ServerMessage::Offer {
            room: room.clone(),
            from: learner.participant,
            to: tutor.participant,
            payload: sdp("learner-offer"),
        }
    );

    tutor
        .send(&ClientMessage::signal(
            SignalKind::Answer,
            room.clone(),
            learner.participant,
            sdp("tutor-answer"),
        ))
        .await
        .expect("answer");
    match learner.recv().await.expect("answer relayed") {
        ServerMessage::Answer { from, payload, .. } => {
            assert_eq!(from, tutor.participant);
            assert_eq!(payload, sdp("tutor-answer"));
        }
        other => panic!("Expected answer, got {:?}", other),
    }

    let learner_id = learner.participant;
    learner.close().await.expect("close");
    assert_eq!(
        tutor.recv().await.expect("departure"),
        ServerMessage::ParticipantLeft {
            room,
            participant: learner_id,
        }
    );
}

#[tokio::test]
async fn test_ws_spoofed_sender_dropped() {
    init_tracing();

    let addr = spawn_relay(ServerConfig::default())
        .await
        .expect("Failed to start relay");
    let room = RoomId::from("booking-22");

    let mut a = WsTestClient::connect(addr, None).await.expect("connect a");
    let mut b = WsTestClient::connect(addr, None).await.expect("connect b");

    a.send(&ClientMessage::JoinSession { room: room.clone() })
        .await
        .expect("join a");
    a.recv().await.expect("a joined");
    b.send(&ClientMessage::JoinSession { room: room.clone() })
        .await
        .expect("join b");
    b.recv().await.expect("b joined");
    a.recv().await.expect("a told about b");

    b.send(&ClientMessage::Offer {
        room: room.clone(),
        from: Some(studyroom_core::ParticipantId::new()),
        to: a.participant,
        payload: sdp("spoofed"),
    })
    .await
    .expect("spoofed offer");
    a.expect_silence(300).await.expect("spoofed offer leaked");

    // Claiming one's own id is fine.
    b.send(&ClientMessage::Offer {
        room: room.clone(),
        from: Some(b.participant),
        to: a.participant,
        payload: sdp("honest"),
    })
    .await
    .expect("honest offer");
    match a.recv().await.expect("honest offer relayed") {
        ServerMessage::Offer { from, payload, .. } => {
            assert_eq!(from, b.participant);
            assert_eq!(payload, sdp("honest"));
        }
        other => panic!("Expected offer, got {:?}", other),
    }
}
