use super::capability::{LocalStream, MediaTrack, TrackKind};
use std::sync::Arc;

/// Local capture and received tracks for one call.
///
/// Toggles flip `enabled` on tracks that already exist; nothing is
/// renegotiated. [`release`](Self::release) stops every track exactly once.
#[derive(Debug)]
pub struct MediaSession {
    local: LocalStream,
    remote: Vec<RemoteTrack>,
    released: bool,
}

struct RemoteTrack(Arc<dyn MediaTrack>);

impl std::fmt::Debug for RemoteTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.id())
    }
}

impl MediaSession {
    pub fn new(local: LocalStream) -> Self {
        Self {
            local,
            remote: Vec::new(),
            released: false,
        }
    }

    pub fn local_stream(&self) -> &LocalStream {
        &self.local
    }

    pub fn remote_tracks(&self) -> Vec<Arc<dyn MediaTrack>> {
        self.remote.iter().map(|track| Arc::clone(&track.0)).collect()
    }

    pub(crate) fn add_remote_track(&mut self, track: Arc<dyn MediaTrack>) {
        if self.released {
            track.stop();
            return;
        }
        self.remote.push(RemoteTrack(track));
    }

    /// Returns `false` when there is no local audio track to mute.
    pub fn set_audio_enabled(&self, enabled: bool) -> bool {
        self.set_enabled(TrackKind::Audio, enabled)
    }

    /// Returns `false` when there is no local video track to toggle.
    pub fn set_video_enabled(&self, enabled: bool) -> bool {
        self.set_enabled(TrackKind::Video, enabled)
    }

    pub fn is_audio_enabled(&self) -> bool {
        self.is_enabled(TrackKind::Audio)
    }

    pub fn is_video_enabled(&self) -> bool {
        self.is_enabled(TrackKind::Video)
    }

    pub fn has_video(&self) -> bool {
        self.local.tracks_of(TrackKind::Video).next().is_some()
    }

    fn set_enabled(&self, kind: TrackKind, enabled: bool) -> bool {
        let mut found = false;
        for track in self.local.tracks_of(kind) {
            found = true;
            if track.is_enabled() != enabled {
                track.set_enabled(enabled);
            }
        }
        if found {
            tracing::debug!("{:?} tracks enabled={}", kind, enabled);
        }
        found
    }

    fn is_enabled(&self, kind: TrackKind) -> bool {
        self.local.tracks_of(kind).any(|track| track.is_enabled())
    }

    /// Stops local capture and remote receivers. Later calls do nothing.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        for track in self.local.tracks() {
            track.stop();
        }
        for track in self.remote.drain(..) {
            track.0.stop();
        }
        tracing::debug!("Released {} local tracks", self.local.tracks().len());
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for MediaSession {
    fn drop(&mut self) {
        self.release();
    }
}
