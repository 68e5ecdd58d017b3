use async_trait::async_trait;

use crate::error::MediaError;
use crate::media::LocalTrack;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: bool,
}

impl MediaConstraints {
    pub const AUDIO_VIDEO: Self = Self {
        audio: true,
        video: true,
    };

    pub const AUDIO_ONLY: Self = Self {
        audio: true,
        video: false,
    };
}

/// Capture devices of the local machine.
///
/// Requests may take as long as the user needs to answer a permission
/// prompt. Every track handed out is given back through [`release`] exactly
/// once.
///
/// [`release`]: MediaDevices::release
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Camera and/or microphone capture.
    async fn get_user_media(
        &self,
        constraints: MediaConstraints,
    ) -> Result<Vec<LocalTrack>, MediaError>;

    /// Screen or window capture.
    async fn get_display_media(&self) -> Result<LocalTrack, MediaError>;

    /// Stops capturing `track`.
    fn release(&self, track: &LocalTrack);
}
