use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub text: String,
    /// Display name chosen by the sender.
    pub sender: String,
    /// Unix time in milliseconds, stamped by the sender.
    pub timestamp: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DrawSegment {
    pub from: Point,
    pub to: Point,
    pub color: String,
    pub width: f32,
}

/// Metadata for a file uploaded through the separate file service.
/// Only this announcement crosses the relay, never the bytes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileAnnouncement {
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub mime_type: String,
    /// Where the receiver can download the file from.
    pub url: String,
}

/// A room-scoped event fanned out to every member except its sender.
#[derive(Debug, Clone, PartialEq)]
pub enum BroadcastEvent {
    Chat(ChatMessage),
    Draw(DrawSegment),
    Clear,
    File(FileAnnouncement),
}
