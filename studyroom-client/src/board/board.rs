use studyroom_core::{BroadcastEvent, ChatMessage, DrawSegment, FileAnnouncement, ParticipantId};

#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptEntry {
    pub from: ParticipantId,
    pub message: ChatMessage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SharedFile {
    pub from: ParticipantId,
    pub file: FileAnnouncement,
}

/// Local copy of the room's shared surfaces.
///
/// Everything lives only as long as the session: the chat transcript grows
/// without bound, the canvas is the list of strokes since the last clear.
/// A late joiner starts from an empty board.
#[derive(Debug, Clone, Default)]
pub struct Board {
    transcript: Vec<TranscriptEntry>,
    strokes: Vec<DrawSegment>,
    files: Vec<SharedFile>,
    clears: u64,
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one event, whether it came from a remote or from us.
    pub fn apply(&mut self, from: ParticipantId, event: BroadcastEvent) {
        match event {
            BroadcastEvent::Chat(message) => self.transcript.push(TranscriptEntry { from, message }),
            BroadcastEvent::Draw(segment) => self.strokes.push(segment),
            BroadcastEvent::Clear => {
                self.strokes.clear();
                self.clears += 1;
            }
            BroadcastEvent::File(file) => self.files.push(SharedFile { from, file }),
        }
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    pub fn strokes(&self) -> &[DrawSegment] {
        &self.strokes
    }

    pub fn files(&self) -> &[SharedFile] {
        &self.files
    }

    /// How many times the canvas has been cleared.
    pub fn clears(&self) -> u64 {
        self.clears
    }
}
