use super::capability::{MediaTrack, PeerLink};
use super::config::{CallCapabilities, CallConfig};
use super::driver::CallDriver;
use super::media::MediaSession;
use super::state::{CallEvent, CallRole, CallState, EndReason};
use crate::connection::{Connection, ConnectionEvent, ConnectionOptions};
use crate::infrastructure::TaskManager;
use crate::types::constants::CLOSE_HANDSHAKE_TIMEOUT;
use crate::types::{RealtimeError, Result, SignalingFrame};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::time;

/// How a session stopped.
pub(crate) enum Outcome {
    Ended(EndReason),
    Failed(String),
}

/// State shared between a [`CallSession`] handle and its driver task.
///
/// Every owned resource sits in an `Option` slot. Slots are filled through
/// [`adopt`](Self::adopt), which refuses once the session is closed, and
/// emptied by [`release`](Self::release). A step that finishes after the
/// session was torn down therefore gets its resource back and discards it.
pub(crate) struct SessionShared {
    pub(crate) call_id: String,
    state: watch::Sender<CallState>,
    events: mpsc::UnboundedSender<CallEvent>,
    closed: AtomicBool,
    pub(crate) media: Mutex<Option<MediaSession>>,
    pub(crate) peer: Mutex<Option<Arc<dyn PeerLink>>>,
    pub(crate) connection: Mutex<Option<Connection>>,
    tasks: Mutex<TaskManager>,
}

impl SessionShared {
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn state(&self) -> CallState {
        *self.state.borrow()
    }

    /// Moves to `state` unless the session has already been torn down.
    pub(crate) fn transition(&self, state: CallState) -> bool {
        if self.is_closed() {
            return false;
        }
        self.publish(state);
        true
    }

    fn publish(&self, state: CallState) {
        let changed = self.state.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
        if changed {
            tracing::info!("Call {} -> {:?}", self.call_id, state);
            self.emit(CallEvent::StateChanged(state));
        }
    }

    pub(crate) fn emit(&self, event: CallEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("Call event receiver dropped");
        }
    }

    /// Stores `value` in `slot`, or hands it back if the session is closed.
    pub(crate) async fn adopt<T>(
        &self,
        slot: &Mutex<Option<T>>,
        value: T,
    ) -> std::result::Result<(), T> {
        let mut guard = slot.lock().await;
        if self.is_closed() {
            return Err(value);
        }
        *guard = Some(value);
        Ok(())
    }

    /// Returns `true` for the caller that closed the session.
    fn mark_closed(&self) -> bool {
        !self.closed.swap(true, Ordering::SeqCst)
    }

    /// Tears the session down and reports `outcome`, once.
    pub(crate) async fn finish(&self, outcome: Outcome) -> bool {
        if !self.mark_closed() {
            return false;
        }
        self.release().await;
        self.conclude(outcome);
        true
    }

    async fn release(&self) {
        let media = self.media.lock().await.take();
        if let Some(mut media) = media {
            media.release();
        }

        let peer = self.peer.lock().await.take();
        if let Some(peer) = peer {
            match time::timeout(CLOSE_HANDSHAKE_TIMEOUT, peer.close()).await {
                Ok(Ok(())) => tracing::debug!("Peer link closed"),
                Ok(Err(e)) => tracing::warn!("Failed to close peer link: {}", e),
                Err(_) => tracing::warn!("Timed out closing peer link"),
            }
        }

        let connection = self.connection.lock().await.take();
        if let Some(connection) = connection {
            connection.close();
        }
    }

    /// Synchronous part of [`release`](Self::release) for use outside a runtime.
    /// The peer link is dropped without a close handshake.
    fn release_now(&self) {
        if let Ok(mut media) = self.media.try_lock() {
            if let Some(mut media) = media.take() {
                media.release();
            }
        }
        if let Ok(mut peer) = self.peer.try_lock() {
            *peer = None;
        }
        if let Ok(mut connection) = self.connection.try_lock() {
            if let Some(connection) = connection.take() {
                connection.close();
            }
        }
    }

    fn conclude(&self, outcome: Outcome) {
        match outcome {
            Outcome::Ended(reason) => {
                tracing::info!("Call {} ended: {:?}", self.call_id, reason);
                self.publish(CallState::Ended);
                self.emit(CallEvent::Ended(reason));
            }
            Outcome::Failed(error) => {
                tracing::error!("Call {} failed: {}", self.call_id, error);
                self.publish(CallState::Failed);
                self.emit(CallEvent::Failed(error));
            }
        }
    }
}

/// One outgoing or incoming call.
///
/// [`start`](Self::start) acquires local media, opens the per-call signaling
/// channel, attaches the tracks to a fresh peer link and, for the caller,
/// sends the offer. From then on a background task drives the exchange and
/// reports progress on the event receiver returned by [`new`](Self::new).
///
/// [`cleanup`](Self::cleanup) may be called at any time, from any task, any
/// number of times. Dropping the session without it tears the call down the
/// same way in the background.
pub struct CallSession {
    shared: Arc<SessionShared>,
    role: CallRole,
    config: CallConfig,
    capabilities: CallCapabilities,
    started: AtomicBool,
}

impl CallSession {
    pub fn new(
        call_id: impl Into<String>,
        role: CallRole,
        capabilities: CallCapabilities,
        config: CallConfig,
    ) -> (Self, mpsc::UnboundedReceiver<CallEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(CallState::Idle);

        let shared = Arc::new(SessionShared {
            call_id: call_id.into(),
            state: state_tx,
            events: event_tx,
            closed: AtomicBool::new(false),
            media: Mutex::new(None),
            peer: Mutex::new(None),
            connection: Mutex::new(None),
            tasks: Mutex::new(TaskManager::new()),
        });

        let session = Self {
            shared,
            role,
            config,
            capabilities,
            started: AtomicBool::new(false),
        };
        (session, event_rx)
    }

    pub fn call_id(&self) -> &str {
        &self.shared.call_id
    }

    pub fn role(&self) -> CallRole {
        self.role
    }

    pub fn state(&self) -> CallState {
        self.shared.state()
    }

    pub fn watch_state(&self) -> watch::Receiver<CallState> {
        self.shared.state.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Runs the call setup. Returns once the caller's offer is sent, or once
    /// the callee is ready to receive one.
    ///
    /// # Errors
    ///
    /// - [`RealtimeError::MediaPermission`] if capture is refused; no socket is opened.
    /// - [`RealtimeError::Signaling`] if the signaling channel does not open;
    ///   acquired media is released first.
    /// - [`RealtimeError::Closed`] if the session was cleaned up meanwhile.
    ///
    /// Every error except `Closed` leaves the session in [`CallState::Failed`].
    pub async fn start(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(RealtimeError::InvalidState(
                "call already started".to_string(),
            ));
        }
        if self.shared.is_closed() {
            return Err(RealtimeError::Closed);
        }

        // Media before signaling: a refused permission must not leave a socket behind.
        self.shared.transition(CallState::AcquiringMedia);
        let stream = match self
            .capabilities
            .media
            .acquire_local_media(&self.config.constraints)
            .await
        {
            Ok(stream) => stream,
            Err(e) => return Err(self.fail(e).await),
        };
        let tracks = stream.tracks().to_vec();
        if self
            .shared
            .adopt(&self.shared.media, MediaSession::new(stream))
            .await
            .is_err()
        {
            // Dropping the rejected session stops its tracks.
            tracing::debug!("Call {} closed while acquiring media", self.call_id());
            return Err(RealtimeError::Closed);
        }

        self.shared.transition(CallState::SignalingConnecting);
        let path = self.config.signaling_path_for(self.call_id());
        let (connection, mut signals) = match self
            .capabilities
            .signaling
            .open(&path, ConnectionOptions::default().without_reconnect())
        {
            Ok(opened) => opened,
            Err(e) => return Err(self.fail(RealtimeError::Signaling(e.to_string())).await),
        };
        if self
            .shared
            .adopt(&self.shared.connection, connection.clone())
            .await
            .is_err()
        {
            connection.close();
            return Err(RealtimeError::Closed);
        }
        if let Err(e) = wait_for_open(&mut signals).await {
            return Err(self.fail(e).await);
        }

        let (peer, peer_events) = match self
            .capabilities
            .peers
            .create(&self.config.ice_servers)
            .await
        {
            Ok(created) => created,
            Err(e) => return Err(self.fail(e).await),
        };
        if self
            .shared
            .adopt(&self.shared.peer, Arc::clone(&peer))
            .await
            .is_err()
        {
            if let Err(e) = peer.close().await {
                tracing::debug!("Failed to close discarded peer link: {}", e);
            }
            return Err(RealtimeError::Closed);
        }

        for track in tracks {
            if let Err(e) = peer.add_track(track).await {
                return Err(self.fail(e).await);
            }
        }

        if self.role == CallRole::Caller {
            let offer = match peer.create_offer().await {
                Ok(offer) => offer,
                Err(e) => return Err(self.fail(e).await),
            };
            if self.shared.is_closed() {
                return Err(RealtimeError::Closed);
            }
            if !connection.send(&SignalingFrame::Offer { sdp: offer.sdp }) {
                let error = RealtimeError::Signaling("failed to send offer".to_string());
                return Err(self.fail(error).await);
            }
            tracing::debug!("Call {} sent offer", self.call_id());
            self.shared.transition(CallState::AwaitingRemoteDescription);
        }

        let driver = CallDriver::new(
            Arc::clone(&self.shared),
            self.role,
            &self.config,
            connection,
            signals,
            peer,
            peer_events,
        );

        let mut tasks = self.shared.tasks.lock().await;
        if self.shared.is_closed() {
            return Err(RealtimeError::Closed);
        }
        tasks.spawn(driver.run());
        Ok(())
    }

    /// Mutes or unmutes the local microphone. Idempotent.
    pub async fn set_muted(&self, muted: bool) -> Result<()> {
        let media = self.shared.media.lock().await;
        match media.as_ref() {
            Some(media) if media.set_audio_enabled(!muted) => Ok(()),
            Some(_) => Err(RealtimeError::InvalidState(
                "no local audio track".to_string(),
            )),
            None => Err(RealtimeError::InvalidState("no local media".to_string())),
        }
    }

    /// Turns the local camera on or off. Idempotent.
    pub async fn set_camera_enabled(&self, enabled: bool) -> Result<()> {
        let media = self.shared.media.lock().await;
        match media.as_ref() {
            Some(media) if media.set_video_enabled(enabled) => Ok(()),
            Some(_) => Err(RealtimeError::InvalidState(
                "no local video track".to_string(),
            )),
            None => Err(RealtimeError::InvalidState("no local media".to_string())),
        }
    }

    pub async fn is_muted(&self) -> bool {
        match self.shared.media.lock().await.as_ref() {
            Some(media) => !media.is_audio_enabled(),
            None => false,
        }
    }

    pub async fn remote_tracks(&self) -> Vec<Arc<dyn MediaTrack>> {
        match self.shared.media.lock().await.as_ref() {
            Some(media) => media.remote_tracks(),
            None => Vec::new(),
        }
    }

    /// Tells the remote side the call is over (best effort), then cleans up.
    pub async fn end_call(&self) {
        if self.shared.is_closed() {
            return;
        }
        let connection = self.shared.connection.lock().await.clone();
        if let Some(connection) = connection {
            if !connection.send(&SignalingFrame::CallEnd) {
                tracing::debug!("Signaling not open, call_end not sent");
            }
        }
        self.cleanup().await;
    }

    /// Releases local media, remote receivers, the peer link and the
    /// signaling socket. Safe to call repeatedly and concurrently with `start`.
    pub async fn cleanup(&self) {
        if !self.shared.mark_closed() {
            return;
        }
        self.shared.tasks.lock().await.abort_all();
        self.shared.release().await;
        self.shared.conclude(Outcome::Ended(EndReason::Local));
    }

    async fn fail(&self, error: RealtimeError) -> RealtimeError {
        if self.shared.finish(Outcome::Failed(error.to_string())).await {
            error
        } else {
            RealtimeError::Closed
        }
    }
}

impl Drop for CallSession {
    fn drop(&mut self) {
        if !self.shared.mark_closed() {
            return;
        }
        tracing::debug!("Call {} dropped without cleanup", self.shared.call_id);

        if let Ok(mut tasks) = self.shared.tasks.try_lock() {
            tasks.abort_all();
        }
        let shared = Arc::clone(&self.shared);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    shared.tasks.lock().await.abort_all();
                    shared.release().await;
                    shared.conclude(Outcome::Ended(EndReason::Local));
                });
            }
            Err(_) => shared.release_now(),
        }
    }
}

impl std::fmt::Debug for CallSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallSession")
            .field("call_id", &self.shared.call_id)
            .field("role", &self.role)
            .field("state", &self.state())
            .finish()
    }
}

async fn wait_for_open(signals: &mut mpsc::UnboundedReceiver<ConnectionEvent>) -> Result<()> {
    loop {
        match signals.recv().await {
            Some(ConnectionEvent::Opened) => return Ok(()),
            Some(ConnectionEvent::Error(error)) => {
                tracing::debug!("Signaling error before open: {}", error);
            }
            Some(ConnectionEvent::Closed { cause, .. }) => {
                return Err(RealtimeError::Signaling(format!(
                    "signaling channel failed to open: {:?}",
                    cause
                )));
            }
            Some(ConnectionEvent::Message(_)) => {}
            None => {
                return Err(RealtimeError::Signaling(
                    "signaling channel closed".to_string(),
                ));
            }
        }
    }
}
