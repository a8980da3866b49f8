//! Local media tracks: the injected device controller and the shared,
//! reference-counted track set used by every live session.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use peerlink_common::SignalError;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

// ---------------------------------------------------------------------------
// Tracks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => f.write_str("audio"),
            Self::Video => f.write_str("video"),
        }
    }
}

/// A handle to one local media track owned by the device layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub id: String,
    pub kind: TrackKind,
    pub label: String,
}

impl Track {
    pub fn new(id: impl Into<String>, kind: TrackKind, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackSet(pub Vec<Track>);

impl TrackSet {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.0.iter()
    }

    /// First track of the given kind.
    pub fn first(&self, kind: TrackKind) -> Option<&Track> {
        self.0.iter().find(|t| t.kind == kind)
    }

    pub fn has(&self, kind: TrackKind) -> bool {
        self.first(kind).is_some()
    }
}

/// Notifications from the device layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaEvent {
    /// A local track stopped from outside, such as a screen capture ended
    /// through the browser or OS controls.
    TrackEnded { track_id: String },
}

/// What to ask the device layer for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: bool,
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            audio: true,
            video: true,
            width: 1280,
            height: 720,
            frame_rate: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// Controller contract
// ---------------------------------------------------------------------------

/// Supplies and revokes local media. Implemented by the host platform.
#[async_trait]
pub trait MediaTrackController: Send + Sync {
    /// Open camera/microphone. Fails with `PermissionDenied` or
    /// `DeviceUnavailable`.
    async fn acquire(&self, constraints: &MediaConstraints) -> Result<TrackSet, SignalError>;

    /// Open a display capture track for screen sharing. If the capture is
    /// stopped from outside, report [`MediaEvent::TrackEnded`] on `events`.
    async fn acquire_display(
        &self,
        events: mpsc::Sender<MediaEvent>,
    ) -> Result<Track, SignalError>;

    async fn current_tracks(&self) -> TrackSet;

    /// Swap the local track of `kind`. Idempotent; no matching track is a no-op.
    async fn replace_track(&self, kind: TrackKind, track: Track);

    /// Enable or disable every local track of `kind`.
    async fn set_enabled(&self, kind: TrackKind, enabled: bool);

    /// Stop the given tracks and free the devices.
    async fn release(&self, tracks: TrackSet);
}

// ---------------------------------------------------------------------------
// Shared local media
// ---------------------------------------------------------------------------

struct Shared {
    tracks: Option<TrackSet>,
    holders: usize,
}

/// Reference-counted access to the local track set.
///
/// The first lease opens the devices; the last release closes them. The
/// inner lock is held across `acquire` so concurrent sessions share a single
/// acquisition.
#[derive(Clone)]
pub struct LocalMedia {
    controller: Arc<dyn MediaTrackController>,
    shared: Arc<Mutex<Shared>>,
}

/// Proof that one session holds the local tracks. Must be handed back to
/// [`LocalMedia::release`]; it is not cloneable.
#[derive(Debug)]
pub struct MediaLease {
    tracks: TrackSet,
}

impl MediaLease {
    pub fn tracks(&self) -> &TrackSet {
        &self.tracks
    }
}

impl LocalMedia {
    pub fn new(controller: Arc<dyn MediaTrackController>) -> Self {
        Self {
            controller,
            shared: Arc::new(Mutex::new(Shared {
                tracks: None,
                holders: 0,
            })),
        }
    }

    /// Take a lease on the local tracks, opening devices if nobody holds them.
    pub async fn lease(&self, constraints: &MediaConstraints) -> Result<MediaLease, SignalError> {
        let mut shared = self.shared.lock().await;
        let tracks = match &shared.tracks {
            Some(tracks) => tracks.clone(),
            None => {
                let tracks = self.controller.acquire(constraints).await?;
                info!(count = tracks.len(), "Local media acquired");
                shared.tracks = Some(tracks.clone());
                tracks
            }
        };
        shared.holders += 1;
        debug!(holders = shared.holders, "Media lease taken");
        Ok(MediaLease { tracks })
    }

    /// Return a lease. Devices are released when the last lease comes back.
    pub async fn release(&self, lease: MediaLease) {
        let mut shared = self.shared.lock().await;
        shared.holders = shared.holders.saturating_sub(1);
        debug!(holders = shared.holders, "Media lease returned");
        if shared.holders == 0 {
            if let Some(tracks) = shared.tracks.take() {
                info!("Releasing local media");
                self.controller.release(tracks).await;
            }
        }
        drop(lease);
    }

    pub async fn holders(&self) -> usize {
        self.shared.lock().await.holders
    }

    /// The shared track set, if currently open.
    pub async fn tracks(&self) -> Option<TrackSet> {
        self.shared.lock().await.tracks.clone()
    }

    pub fn controller(&self) -> &Arc<dyn MediaTrackController> {
        &self.controller
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeMedia;

    #[tokio::test]
    async fn first_lease_acquires_and_last_release_frees() {
        let fake = Arc::new(FakeMedia::default());
        let media = LocalMedia::new(fake.clone());
        let constraints = MediaConstraints::default();

        let a = media.lease(&constraints).await.unwrap();
        let b = media.lease(&constraints).await.unwrap();
        assert_eq!(fake.acquire_count(), 1);
        assert_eq!(media.holders().await, 2);
        assert_eq!(a.tracks(), b.tracks());

        media.release(a).await;
        assert_eq!(fake.release_count(), 0);
        assert!(media.tracks().await.is_some());

        media.release(b).await;
        assert_eq!(fake.release_count(), 1);
        assert_eq!(media.holders().await, 0);
        assert!(media.tracks().await.is_none());
    }

    #[tokio::test]
    async fn failed_acquire_takes_no_lease() {
        let fake = Arc::new(FakeMedia::denying());
        let media = LocalMedia::new(fake.clone());

        let err = media.lease(&MediaConstraints::default()).await.unwrap_err();
        assert!(matches!(err, SignalError::PermissionDenied(_)));
        assert_eq!(media.holders().await, 0);
        assert_eq!(fake.release_count(), 0);
    }

    #[tokio::test]
    async fn reacquires_after_full_release() {
        let fake = Arc::new(FakeMedia::default());
        let media = LocalMedia::new(fake.clone());
        let constraints = MediaConstraints::default();

        let lease = media.lease(&constraints).await.unwrap();
        media.release(lease).await;
        let lease = media.lease(&constraints).await.unwrap();
        media.release(lease).await;

        assert_eq!(fake.acquire_count(), 2);
        assert_eq!(fake.release_count(), 2);
    }

    #[test]
    fn track_set_lookup() {
        let set = TrackSet(vec![
            Track::new("a1", TrackKind::Audio, "mic"),
            Track::new("v1", TrackKind::Video, "cam"),
        ]);
        assert_eq!(set.first(TrackKind::Video).map(|t| t.id.as_str()), Some("v1"));
        assert!(set.has(TrackKind::Audio));
        assert!(!TrackSet::default().has(TrackKind::Audio));
        assert_eq!(TrackKind::Audio.to_string(), "audio");
    }
}
