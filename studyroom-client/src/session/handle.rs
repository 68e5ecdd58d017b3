use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, oneshot, watch};

use crate::board::Board;
use crate::error::{ClientError, MediaError};
use crate::media::{LocalMediaController, LocalTrack, TrackKind};
use crate::session::{SessionCommand, SessionSnapshot};
use studyroom_core::{
    BroadcastEvent, ChatMessage, DrawSegment, FileAnnouncement, ParticipantId, RoomId,
};

/// Cloneable front door to a running [`Session`](crate::session::Session).
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    participant: ParticipantId,
    sender_name: String,
    media: LocalMediaController,
    board: watch::Receiver<Board>,
}

impl SessionHandle {
    pub(crate) fn new(
        commands: mpsc::Sender<SessionCommand>,
        participant: ParticipantId,
        sender_name: String,
        media: LocalMediaController,
        board: watch::Receiver<Board>,
    ) -> Self {
        Self {
            commands,
            participant,
            sender_name,
            media,
            board,
        }
    }

    /// The id the relay assigned to this connection.
    pub fn participant(&self) -> ParticipantId {
        self.participant
    }

    pub async fn join(&self, room: impl Into<RoomId>) -> Result<(), ClientError> {
        self.send(SessionCommand::Join(room.into())).await
    }

    /// Closes every peer link and releases local media.
    pub async fn leave(&self) -> Result<(), ClientError> {
        self.send(SessionCommand::Leave).await
    }

    pub async fn shutdown(&self) -> Result<(), ClientError> {
        self.send(SessionCommand::Shutdown).await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, ClientError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Snapshot(reply)).await?;
        rx.await.map_err(|_| ClientError::Closed)
    }

    pub async fn send_chat(&self, text: impl Into<String>) -> Result<(), ClientError> {
        let message = ChatMessage {
            text: text.into(),
            sender: self.sender_name.clone(),
            timestamp: now_millis(),
        };
        self.broadcast(BroadcastEvent::Chat(message)).await
    }

    pub async fn draw(&self, segment: DrawSegment) -> Result<(), ClientError> {
        self.broadcast(BroadcastEvent::Draw(segment)).await
    }

    pub async fn clear_board(&self) -> Result<(), ClientError> {
        self.broadcast(BroadcastEvent::Clear).await
    }

    /// Announces a file already uploaded to the file service.
    pub async fn share_file(&self, file: FileAnnouncement) -> Result<(), ClientError> {
        self.broadcast(BroadcastEvent::File(file)).await
    }

    pub async fn broadcast(&self, event: BroadcastEvent) -> Result<(), ClientError> {
        self.send(SessionCommand::Broadcast(event)).await
    }

    /// Current board, own strokes and messages included.
    pub fn board(&self) -> Board {
        self.board.borrow().clone()
    }

    pub fn watch_board(&self) -> watch::Receiver<Board> {
        self.board.clone()
    }

    pub fn media(&self) -> &LocalMediaController {
        &self.media
    }

    /// Mutes or unmutes the microphone. `None` without a microphone.
    pub fn toggle_audio(&self) -> Option<bool> {
        self.media.toggle_track(TrackKind::Audio)
    }

    pub fn toggle_video(&self) -> Option<bool> {
        self.media.toggle_track(TrackKind::Video)
    }

    pub fn replace_video_track(&self, track: LocalTrack) -> Result<(), MediaError> {
        self.media.replace_video_track(track)
    }

    pub async fn start_screen_share(&self) -> Result<(), MediaError> {
        self.media.start_screen_share().await
    }

    pub fn stop_screen_share(&self) -> Result<(), MediaError> {
        self.media.stop_screen_share()
    }

    async fn send(&self, cmd: SessionCommand) -> Result<(), ClientError> {
        self.commands
            .send(cmd)
            .await
            .map_err(|_| ClientError::Closed)
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}
