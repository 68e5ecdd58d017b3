use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::relay::relay_command::RelayCommand;
use crate::room::{Departure, RoomRegistry};
use crate::signaling::Outbound;
use studyroom_core::{
    BroadcastEvent, Identity, ParticipantId, RoomId, ServerMessage, SessionInfo, Signal,
};

/// The relay actor.
///
/// Owns the room registry and handles one command at a time, so membership
/// changes, signal forwarding and broadcast fan-out never interleave. Each
/// command is plain map work followed by non-blocking queue pushes.
pub struct Relay {
    registry: RoomRegistry,
    command_rx: mpsc::Receiver<RelayCommand>,
    outbound: Arc<dyn Outbound>,
}

impl Relay {
    pub fn new(command_rx: mpsc::Receiver<RelayCommand>, outbound: Arc<dyn Outbound>) -> Self {
        Self {
            registry: RoomRegistry::new(),
            command_rx,
            outbound,
        }
    }

    pub async fn run(mut self) {
        info!("Relay event loop started");

        loop {
            match self.command_rx.recv().await {
                Some(cmd) => self.handle_command(cmd).await,
                None => {
                    info!("Command channel closed. Shutting down relay.");
                    break;
                }
            }
        }

        info!("Relay event loop finished");
    }

    async fn handle_command(&mut self, cmd: RelayCommand) {
        match cmd {
            RelayCommand::Join {
                participant,
                room,
                identity,
                session,
            } => self.join(participant, room, identity, session).await,

            RelayCommand::Leave { participant, room } => {
                if let Some(departure) = self.registry.leave(&room, &participant) {
                    info!("{} left {}", participant, room);
                    self.announce_departure(departure).await;
                }
            }

            RelayCommand::Signal(signal) => self.relay_signal(signal).await,

            RelayCommand::Broadcast {
                participant,
                room,
                event,
            } => self.fan_out(participant, room, event).await,

            RelayCommand::Disconnect { participant } => {
                if let Some(departure) = self.registry.leave_all(&participant) {
                    info!("{} disconnected from {}", participant, departure.room);
                    self.announce_departure(departure).await;
                }
            }

            RelayCommand::Snapshot { reply } => {
                let _ = reply.send(self.registry.snapshot());
            }
        }
    }

    async fn join(
        &mut self,
        participant: ParticipantId,
        room: RoomId,
        identity: Option<Identity>,
        session: SessionInfo,
    ) {
        let outcome = self
            .registry
            .join(room.clone(), participant, identity.clone(), session);

        if let Some(previous) = outcome.previous {
            self.announce_departure(previous).await;
        }

        self.outbound
            .deliver(
                &participant,
                ServerMessage::SessionJoined {
                    room: room.clone(),
                    participants: outcome.existing.clone(),
                    session: outcome.session,
                },
            )
            .await;

        if !outcome.newly_joined {
            debug!("{} re-joined {}, nothing to announce", participant, room);
            return;
        }

        info!(
            "{} joined {} ({} already present)",
            participant,
            room,
            outcome.existing.len()
        );

        let joined = ServerMessage::ParticipantJoined {
            room,
            participant,
            identity,
        };
        for member in &outcome.existing {
            self.outbound.deliver(member, joined.clone()).await;
        }
    }

    async fn announce_departure(&self, departure: Departure) {
        let left = ServerMessage::ParticipantLeft {
            room: departure.room,
            participant: departure.participant,
        };
        for member in &departure.remaining {
            self.outbound.deliver(member, left.clone()).await;
        }
    }

    /// Forwards a negotiation message to its target without looking at the payload.
    ///
    /// Both ends must be members of the signal's room at the moment it is
    /// processed; anything else is dropped without telling the sender.
    async fn relay_signal(&self, signal: Signal) {
        if !self.registry.is_member(&signal.room, &signal.from) {
            debug!(
                "Dropping {:?} from {}: not a member of {}",
                signal.kind, signal.from, signal.room
            );
            return;
        }

        if !self.registry.is_member(&signal.room, &signal.to) {
            debug!(
                "Dropping {:?} from {} to {}: target not in {}",
                signal.kind, signal.from, signal.to, signal.room
            );
            return;
        }

        let to = signal.to;
        let kind = signal.kind;
        if !self
            .outbound
            .deliver(&to, ServerMessage::from_signal(signal))
            .await
        {
            debug!("Dropping {:?} to {}: connection already closed", kind, to);
        }
    }

    async fn fan_out(&self, sender: ParticipantId, room: RoomId, event: BroadcastEvent) {
        let Some(members) = self.registry.room(&room).map(|r| r.others(&sender)) else {
            debug!("Dropping broadcast from {} to unknown room {}", sender, room);
            return;
        };

        if !self.registry.is_member(&room, &sender) {
            debug!("Dropping broadcast from non-member {} in {}", sender, room);
            return;
        }

        let msg = ServerMessage::from_broadcast(room, sender, event);
        for member in &members {
            self.outbound.deliver(member, msg.clone()).await;
        }
    }
}
