//! Owns the single duplex connection to the hub and keeps it alive.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use domain::{ConnectionState, FrameTransport};

use super::connector::{Connector, Link};
use super::endpoint::Endpoint;

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

pub type MessageCallback = Arc<dyn Fn(Vec<u8>) + Send + Sync>;
pub type StatusCallback = Arc<dyn Fn(bool) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub delay: Duration,
    /// Retries after the first attempt before giving up
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay: DEFAULT_RECONNECT_DELAY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

struct Inner {
    endpoint: Endpoint,
    connector: Arc<dyn Connector>,
    policy: ReconnectPolicy,
    state: Mutex<ConnectionState>,
    outgoing: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    session: Mutex<Option<CancellationToken>>,
    on_message: Mutex<Option<MessageCallback>>,
    on_status: Mutex<Option<StatusCallback>>,
    reported: Mutex<bool>,
}

/// Reconnecting client for the hub socket.
///
/// `connect` starts a background session that opens the socket, pumps
/// inbound messages to the message callback and retries on a fixed delay.
/// After `max_attempts` failed retries the manager parks in `Failed` until
/// `connect` is called again.
#[derive(Clone)]
pub struct TransportManager {
    inner: Arc<Inner>,
}

impl TransportManager {
    pub fn new(endpoint: Endpoint, connector: Arc<dyn Connector>, policy: ReconnectPolicy) -> Self {
        Self {
            inner: Arc::new(Inner {
                endpoint,
                connector,
                policy,
                state: Mutex::new(ConnectionState::Disconnected),
                outgoing: Mutex::new(None),
                session: Mutex::new(None),
                on_message: Mutex::new(None),
                on_status: Mutex::new(None),
                reported: Mutex::new(false),
            }),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.inner.endpoint
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.lock()
    }

    /// Replaces the inbound message subscriber
    pub fn on_message<F>(&self, callback: F)
    where
        F: Fn(Vec<u8>) + Send + Sync + 'static,
    {
        *self.inner.on_message.lock() = Some(Arc::new(callback));
    }

    /// Replaces the status subscriber. Called once per connected/disconnected
    /// change.
    pub fn on_status<F>(&self, callback: F)
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        *self.inner.on_status.lock() = Some(Arc::new(callback));
    }

    /// Starts a session unless one is already connecting, connected or
    /// waiting out a backoff. Must be called within a tokio runtime.
    pub fn connect(&self) {
        let token = {
            let mut state = self.inner.state.lock();
            if !state.can_connect() {
                debug!(state = ?*state, "Connect ignored");
                return;
            }
            let Ok(next) = state.to_connecting() else {
                return;
            };
            *state = next;

            let token = CancellationToken::new();
            if let Some(previous) = self.inner.session.lock().replace(token.clone()) {
                previous.cancel();
            }
            token
        };

        info!(url = %self.inner.endpoint, "🔌 Connecting to hub");
        let inner = self.inner.clone();
        tokio::spawn(async move { inner.run(token).await });
    }

    /// Closes the socket and stops any pending reconnect
    pub fn disconnect(&self) {
        {
            let mut state = self.inner.state.lock();
            if let Some(token) = self.inner.session.lock().take() {
                token.cancel();
            }
            *state = state.to_disconnected();
        }
        self.inner.outgoing.lock().take();
        self.inner.report(false);
        info!("🔌 Transport disconnected");
    }
}

impl FrameTransport for TransportManager {
    fn send(&self, frame: &[u8]) -> bool {
        if !self.state().is_connected() {
            return false;
        }
        self.inner
            .outgoing
            .lock()
            .as_ref()
            .is_some_and(|tx| tx.send(frame.to_vec()).is_ok())
    }

    fn connection_state(&self) -> ConnectionState {
        self.state()
    }
}

impl Inner {
    async fn run(&self, cancel: CancellationToken) {
        let mut attempts: u32 = 0;
        let url = self.endpoint.url();

        loop {
            let opened = tokio::select! {
                _ = cancel.cancelled() => return,
                result = self.connector.open(&url) => result,
            };

            match opened {
                Ok(link) => {
                    attempts = 0;
                    if !self.session_opened(&cancel, &link) {
                        return;
                    }
                    self.pump(&cancel, link).await;
                    if cancel.is_cancelled() {
                        return;
                    }
                    self.outgoing.lock().take();
                    if !self.transition(&cancel, |state| Ok(state.to_disconnected())) {
                        return;
                    }
                    warn!(url = %url, "⚠️ Connection lost");
                    self.report(false);
                }
                Err(e) => {
                    warn!(url = %url, attempt = attempts, error = %e, "❌ Connection attempt failed");
                }
            }

            if attempts >= self.policy.max_attempts {
                if self.transition(&cancel, |state| Ok(state.to_failed())) {
                    error!(attempts, "⛔ Reconnect attempts exhausted");
                }
                return;
            }
            attempts += 1;

            if !self.transition(&cancel, |state| state.to_reconnecting()) {
                return;
            }
            debug!(attempt = attempts, delay_ms = self.policy.delay.as_millis() as u64, "⏳ Reconnect scheduled");

            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(self.policy.delay) => {}
            }

            if !self.transition(&cancel, |state| state.to_connecting()) {
                return;
            }
        }
    }

    fn session_opened(&self, cancel: &CancellationToken, link: &Link) -> bool {
        {
            let mut state = self.state.lock();
            if cancel.is_cancelled() {
                return false;
            }
            match state.to_connected() {
                Ok(next) => *state = next,
                Err(reason) => {
                    warn!(state = ?*state, reason, "Unexpected transport transition");
                    return false;
                }
            }
            *self.outgoing.lock() = Some(link.outgoing.clone());
        }
        info!(url = %self.endpoint, "✅ Connected to hub");
        self.report(true);
        true
    }

    async fn pump(&self, cancel: &CancellationToken, mut link: Link) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                message = link.incoming.recv() => match message {
                    Some(bytes) => {
                        let callback = self.on_message.lock().clone();
                        if let Some(callback) = callback {
                            callback(bytes);
                        }
                    }
                    None => break,
                },
            }
        }
    }

    /// Applies a state change unless the session was cancelled meanwhile
    fn transition<F>(&self, cancel: &CancellationToken, next: F) -> bool
    where
        F: FnOnce(ConnectionState) -> Result<ConnectionState, &'static str>,
    {
        let mut state = self.state.lock();
        if cancel.is_cancelled() {
            return false;
        }
        match next(*state) {
            Ok(next) => {
                *state = next;
                true
            }
            Err(reason) => {
                warn!(state = ?*state, reason, "Unexpected transport transition");
                false
            }
        }
    }

    fn report(&self, connected: bool) {
        {
            let mut reported = self.reported.lock();
            if *reported == connected {
                return;
            }
            *reported = connected;
        }
        let callback = self.on_status.lock().clone();
        if let Some(callback) = callback {
            callback(connected);
        }
    }
}
