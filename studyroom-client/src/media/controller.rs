use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::MediaError;
use crate::media::{LocalTrack, MediaConstraints, MediaDevices, TrackKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaStatus {
    /// Acquisition has not finished yet.
    Pending,
    Full,
    AudioOnly,
    /// No local capture at all. The session still runs and receives remote media.
    Unavailable,
}

impl MediaStatus {
    pub fn is_settled(self) -> bool {
        self != MediaStatus::Pending
    }

    fn for_tracks(tracks: &[LocalTrack]) -> Self {
        if tracks.is_empty() {
            MediaStatus::Unavailable
        } else if tracks.iter().any(|t| t.kind() == TrackKind::Video) {
            MediaStatus::Full
        } else {
            MediaStatus::AudioOnly
        }
    }
}

/// The tracks currently offered to peers.
#[derive(Debug, Clone)]
pub struct LocalStream {
    pub status: MediaStatus,
    pub tracks: Vec<LocalTrack>,
}

impl Default for LocalStream {
    fn default() -> Self {
        Self {
            status: MediaStatus::Pending,
            tracks: Vec::new(),
        }
    }
}

impl LocalStream {
    pub fn track(&self, kind: TrackKind) -> Option<&LocalTrack> {
        self.tracks.iter().find(|t| t.kind() == kind)
    }

    pub fn video(&self) -> Option<&LocalTrack> {
        self.track(TrackKind::Video)
    }

    pub fn audio(&self) -> Option<&LocalTrack> {
        self.track(TrackKind::Audio)
    }

    /// Puts `new` in place of the outgoing video track and returns the old one.
    /// `None` removes the video track.
    fn swap_video(&mut self, new: Option<LocalTrack>) -> Option<LocalTrack> {
        let current = self.tracks.iter().position(|t| t.kind() == TrackKind::Video);
        let old = match (current, new) {
            (Some(i), Some(new)) => Some(mem::replace(&mut self.tracks[i], new)),
            (Some(i), None) => Some(self.tracks.remove(i)),
            (None, Some(new)) => {
                self.tracks.push(new);
                None
            }
            (None, None) => None,
        };
        self.refresh_status();
        old
    }

    fn refresh_status(&mut self) {
        if self.status.is_settled() {
            self.status = MediaStatus::for_tracks(&self.tracks);
        }
    }
}

struct ScreenShare {
    screen: LocalTrack,
    /// Camera track taken off the wire while sharing, restored on stop.
    parked_camera: Option<LocalTrack>,
}

struct MediaInner {
    devices: Arc<dyn MediaDevices>,
    stream: watch::Sender<LocalStream>,
    screen: Mutex<Option<ScreenShare>>,
    /// Bumped by every `release_all`.
    releases: AtomicU64,
}

impl Drop for MediaInner {
    fn drop(&mut self) {
        for track in &self.stream.borrow().tracks {
            self.devices.release(track);
        }
        let share = self
            .screen
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(camera) = share.and_then(|s| s.parked_camera) {
            self.devices.release(&camera);
        }
        debug!("Local media released");
    }
}

/// Owns the local capture for one session.
///
/// The current [`LocalStream`] is published on a watch channel; peer links
/// follow it to learn about added, removed and replaced tracks. Capture
/// handles are given back to the devices when the last clone is dropped.
#[derive(Clone)]
pub struct LocalMediaController {
    inner: Arc<MediaInner>,
}

impl LocalMediaController {
    pub fn new(devices: Arc<dyn MediaDevices>) -> Self {
        let (stream, _) = watch::channel(LocalStream::default());
        Self {
            inner: Arc::new(MediaInner {
                devices,
                stream,
                screen: Mutex::new(None),
                releases: AtomicU64::new(0),
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<LocalStream> {
        self.inner.stream.subscribe()
    }

    pub fn stream(&self) -> LocalStream {
        self.inner.stream.borrow().clone()
    }

    pub fn status(&self) -> MediaStatus {
        self.inner.stream.borrow().status
    }

    /// Requests camera and microphone, falling back to microphone only.
    ///
    /// The stream always settles, even when both requests fail: the error is
    /// returned for the caller to report, while the session keeps running
    /// with no local tracks.
    ///
    /// If [`release_all`](Self::release_all) runs while the devices are still
    /// answering, the late tracks are released on arrival and the stream
    /// stays `Pending`.
    pub async fn acquire(&self) -> Result<MediaStatus, MediaError> {
        if self.status().is_settled() {
            debug!("Local media already acquired");
            return Ok(self.status());
        }
        let releases = self.inner.releases.load(Ordering::SeqCst);

        let devices = &self.inner.devices;
        let result = match devices.get_user_media(MediaConstraints::AUDIO_VIDEO).await {
            Ok(tracks) => Ok(tracks),
            Err(e) => {
                warn!("Camera and microphone unavailable ({}), trying audio only", e);
                devices.get_user_media(MediaConstraints::AUDIO_ONLY).await
            }
        };

        let (acquired, error) = match result {
            Ok(tracks) => (tracks, None),
            Err(e) => {
                warn!("No local media: {}", e);
                (Vec::new(), Some(e))
            }
        };

        let mut status = MediaStatus::Pending;
        let mut late = None;
        self.inner.stream.send_if_modified(|stream| {
            // Checked under the channel lock, which `release_all` also takes.
            if self.inner.releases.load(Ordering::SeqCst) != releases {
                late = Some(acquired);
                return false;
            }
            stream.tracks.extend(acquired);
            stream.status = MediaStatus::for_tracks(&stream.tracks);
            status = stream.status;
            true
        });

        if let Some(late) = late {
            info!("Local media released during capture, dropping {} track(s)", late.len());
            for track in &late {
                self.inner.devices.release(track);
            }
            return Ok(MediaStatus::Pending);
        }
        info!("Local media settled: {:?}", status);

        match error {
            Some(e) if status == MediaStatus::Unavailable => {
                Err(MediaError::Unavailable(e.to_string()))
            }
            _ => Ok(status),
        }
    }

    /// Flips the enabled flag of every local track of `kind`.
    ///
    /// Nothing is renegotiated: peers keep receiving a muted or blank track.
    /// Returns the new state, or `None` when there is no such track.
    pub fn toggle_track(&self, kind: TrackKind) -> Option<bool> {
        let stream = self.inner.stream.borrow();
        let enabled = !stream.track(kind)?.is_enabled();
        for track in stream.tracks.iter().filter(|t| t.kind() == kind) {
            track.set_enabled(enabled);
        }
        debug!("{} {}", kind, if enabled { "unmuted" } else { "muted" });
        Some(enabled)
    }

    /// Swaps the outgoing camera track.
    ///
    /// While a screen share is running the new camera is parked instead and
    /// goes on the wire once the share stops.
    pub fn replace_video_track(&self, track: LocalTrack) -> Result<(), MediaError> {
        expect_kind(&track, TrackKind::Video)?;

        let replaced = {
            let mut screen = self.lock_screen();
            match screen.as_mut() {
                Some(share) => share.parked_camera.replace(track),
                None => {
                    let mut old = None;
                    self.inner
                        .stream
                        .send_modify(|stream| old = stream.swap_video(Some(track)));
                    old
                }
            }
        };

        if let Some(old) = replaced {
            self.inner.devices.release(&old);
        }
        Ok(())
    }

    /// Adds a track granted after the session started.
    ///
    /// A second video track replaces the first, like [`replace_video_track`].
    ///
    /// [`replace_video_track`]: Self::replace_video_track
    pub fn add_track(&self, track: LocalTrack) -> Result<(), MediaError> {
        if track.kind() == TrackKind::Video {
            return self.replace_video_track(track);
        }

        let mut duplicate = None;
        self.inner.stream.send_modify(|stream| {
            if let Some(i) = stream.tracks.iter().position(|t| t.kind() == track.kind()) {
                duplicate = Some(mem::replace(&mut stream.tracks[i], track));
            } else {
                stream.tracks.push(track);
            }
            stream.refresh_status();
        });

        if let Some(old) = duplicate {
            self.inner.devices.release(&old);
        }
        Ok(())
    }

    pub fn is_screen_sharing(&self) -> bool {
        self.lock_screen().is_some()
    }

    /// Sends a screen capture in place of the camera.
    pub async fn start_screen_share(&self) -> Result<(), MediaError> {
        if self.is_screen_sharing() {
            return Err(MediaError::ScreenShareActive);
        }

        let screen = self.inner.devices.get_display_media().await?;
        expect_kind(&screen, TrackKind::Video)?;

        let mut share = self.lock_screen();
        if share.is_some() {
            // Another start won the race while the picker was open.
            self.inner.devices.release(&screen);
            return Err(MediaError::ScreenShareActive);
        }

        let mut parked_camera = None;
        let on_wire = screen.clone();
        self.inner
            .stream
            .send_modify(|stream| parked_camera = stream.swap_video(Some(on_wire)));
        *share = Some(ScreenShare {
            screen,
            parked_camera,
        });

        info!("Screen share started");
        Ok(())
    }

    /// Puts the camera back, or drops the video track if there was none.
    pub fn stop_screen_share(&self) -> Result<(), MediaError> {
        let share = self.lock_screen().take().ok_or(MediaError::NoScreenShare)?;

        self.inner
            .stream
            .send_modify(|stream| {
                stream.swap_video(share.parked_camera);
            });
        self.inner.devices.release(&share.screen);

        info!("Screen share stopped");
        Ok(())
    }

    /// Gives every capture handle back to the devices.
    ///
    /// The stream goes back to `Pending`, so a later [`acquire`] captures
    /// again. A capture still in flight is discarded.
    ///
    /// [`acquire`]: Self::acquire
    pub fn release_all(&self) {
        let share = self.lock_screen().take();

        let mut released = Vec::new();
        self.inner.stream.send_modify(|stream| {
            self.inner.releases.fetch_add(1, Ordering::SeqCst);
            released = mem::take(&mut stream.tracks);
            stream.status = MediaStatus::Pending;
        });

        // The screen track is already among the released ones.
        let parked = share.and_then(|s| s.parked_camera);
        for track in released.iter().chain(parked.iter()) {
            self.inner.devices.release(track);
        }
        if !released.is_empty() {
            info!("Released {} local track(s)", released.len());
        }
    }

    fn lock_screen(&self) -> MutexGuard<'_, Option<ScreenShare>> {
        self.inner
            .screen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn expect_kind(track: &LocalTrack, expected: TrackKind) -> Result<(), MediaError> {
    if track.kind() != expected {
        return Err(MediaError::WrongKind {
            expected,
            actual: track.kind(),
        });
    }
    Ok(())
}
