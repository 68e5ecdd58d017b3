use studyroom_core::{ParticipantId, RoomId, ServerMessage};
use studyroom_server::RelayCommand;

use crate::integration::{create_test_relay, init_tracing};
use crate::utils::{join, settle};

#[tokio::test]
async fn test_disconnect_triggers_leave() {
    init_tracing();

    let (cmd_tx, outbound) = create_test_relay();
    let room = RoomId::from("booking-7");
    let (a, b) = (ParticipantId::new(), ParticipantId::new());

    join(&cmd_tx, a, &room).await.expect("join a");
    join(&cmd_tx, b, &room).await.expect("join b");

    cmd_tx
        .send(RelayCommand::Disconnect { participant: b })
        .await
        .expect("Failed to send Disconnect");
    let snapshot = settle(&cmd_tx).await.expect("settle");

    assert_eq!(snapshot.participants, 1);
    assert_eq!(snapshot.room_sizes.get("booking-7"), Some(&1));

    let last = outbound.messages_for(&a).await.pop().expect("a got nothing");
    assert_eq!(
        last,
        ServerMessage::ParticipantLeft {
            room: room.clone(),
            participant: b,
        }
    );

    // Last one out closes the room.
    cmd_tx
        .send(RelayCommand::Disconnect { participant: a })
        .await
        .expect("Failed to send Disconnect");
    let snapshot = settle(&cmd_tx).await.expect("settle");

    assert_eq!(snapshot.rooms, 0);
    assert_eq!(snapshot.participants, 0);
}

#[tokio::test]
async fn test_explicit_leave_then_disconnect_announces_once() {
    init_tracing();

    let (cmd_tx, outbound) = create_test_relay();
    let room = RoomId::from("booking-7");
    let (a, b) = (ParticipantId::new(), ParticipantId::new());

    join(&cmd_tx, a, &room).await.expect("join a");
    join(&cmd_tx, b, &room).await.expect("join b");

    cmd_tx
        .send(RelayCommand::Leave {
            participant: b,
            room: room.clone(),
        })
        .await
        .expect("Failed to send Leave");
    cmd_tx
        .send(RelayCommand::Disconnect { participant: b })
        .await
        .expect("Failed to send Disconnect");
    settle(&cmd_tx).await.expect("settle");

    let departures = outbound
        .messages_for(&a)
        .await
        .into_iter()
        .filter(|msg| matches!(msg, ServerMessage::ParticipantLeft { .. }))
        .count();
    assert_eq!(departures, 1);
}
