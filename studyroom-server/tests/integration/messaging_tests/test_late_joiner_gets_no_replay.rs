use studyroom_core::{BroadcastEvent, DrawSegment, ParticipantId, Point, RoomId, ServerMessage};
use studyroom_server::RelayCommand;

use crate::integration::{create_test_relay, init_tracing};
use crate::utils::{join, settle};

#[tokio::test]
async fn test_late_joiner_gets_no_replay() {
    init_tracing();

    let (cmd_tx, outbound) = create_test_relay();
    let room = RoomId::from("booking-11");
    let (a, b, late) = (ParticipantId::new(), ParticipantId::new(), ParticipantId::new());

    join(&cmd_tx, a, &room).await.expect("join a");
    join(&cmd_tx, b, &room).await.expect("join b");

    let stroke = BroadcastEvent::Draw(DrawSegment {
        from: Point::new(0.0, 0.0),
        to: Point::new(120.0, 80.0),
        color: "#1e88e5".into(),
        width: 3.0,
    });
    cmd_tx
        .send(RelayCommand::Broadcast {
            participant: a,
            room: room.clone(),
            event: stroke,
        })
        .await
        .expect("broadcast");

    join(&cmd_tx, late, &room).await.expect("join late");
    settle(&cmd_tx).await.expect("settle");

    let to_late = outbound.messages_for(&late).await;
    assert_eq!(to_late.len(), 1);
    assert!(matches!(to_late[0], ServerMessage::SessionJoined { .. }));
}
