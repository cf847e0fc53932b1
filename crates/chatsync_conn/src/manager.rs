//! Connection lifecycle state machine.
//!
//! `ConnManager` owns the single live connection of one client instance.
//! It serializes writes and state transitions under one lock, classifies
//! connect failures, and reports lifecycle transitions to a listener.
//! The lock is never held across a listener callback, so listeners may
//! call back into the manager. Retry policy lives with the caller; the
//! manager only says whether a retry is allowed.

use crate::config::ConnConfig;
use crate::error::{ConnError, ConnResult};
use crate::transport::{Connection, Dialer};
use chatsync_proto::{classify, encode_frame, ConnectParams, FailureClass, FrameEnvelope, FrameOptions};
use crossbeam_channel::Sender;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Raw status code for an expired auth token.
const CODE_TOKEN_EXPIRED: u32 = 1501;

/// Lifecycle states of the managed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// No connect attempt has been made yet.
    Idle,
    /// A connect attempt is in flight.
    Connecting,
    /// A live connection is established.
    Connected,
    /// The connection is down; reconnect is allowed.
    Disconnected,
    /// A fatal auth failure occurred; terminal.
    Failed,
    /// A newer login displaced this session; terminal.
    KickedOffline,
}

impl ConnState {
    /// Returns true for states no reconnect may leave.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnState::Failed | ConnState::KickedOffline)
    }

    fn name(&self) -> &'static str {
        match self {
            ConnState::Idle => "Idle",
            ConnState::Connecting => "Connecting",
            ConnState::Connected => "Connected",
            ConnState::Disconnected => "Disconnected",
            ConnState::Failed => "Failed",
            ConnState::KickedOffline => "KickedOffline",
        }
    }
}

/// Observer of connection lifecycle transitions.
///
/// Every method has a no-op default so implementors override only what
/// they care about.
pub trait ConnListener: Send + Sync {
    /// A connect attempt started.
    fn on_connecting(&self) {}

    /// A connect attempt succeeded.
    fn on_connect_success(&self) {}

    /// A connect attempt failed, with the server code when one was given.
    fn on_connect_failed(&self, _code: Option<u32>, _message: &str) {}

    /// The auth token expired; the caller must obtain a fresh one.
    fn on_user_token_expired(&self) {}

    /// A newer login displaced this session.
    fn on_kicked_offline(&self) {}
}

struct NoopConnListener;

impl ConnListener for NoopConnListener {}

/// Signals the sync layer about connect attempts that never reached the
/// server, so it can surface a begin/failed pair to its own observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncSignal {
    /// A sync pass is about to start.
    Begin,
    /// The sync pass failed before any data moved.
    Failed,
}

struct Inner {
    state: ConnState,
    conn: Option<Box<dyn Connection>>,
}

/// Owns the single live connection of one client instance.
pub struct ConnManager<D: Dialer> {
    config: ConnConfig,
    dialer: D,
    inner: Mutex<Inner>,
    listener: RwLock<Arc<dyn ConnListener>>,
    sync_tx: Mutex<Option<Sender<SyncSignal>>>,
}

impl<D: Dialer> ConnManager<D> {
    /// Creates a manager in the `Idle` state.
    pub fn new(config: ConnConfig, dialer: D) -> Self {
        Self {
            config,
            dialer,
            inner: Mutex::new(Inner {
                state: ConnState::Idle,
                conn: None,
            }),
            listener: RwLock::new(Arc::new(NoopConnListener)),
            sync_tx: Mutex::new(None),
        }
    }

    /// Replaces the lifecycle listener.
    pub fn set_listener(&self, listener: Arc<dyn ConnListener>) {
        *self.listener.write() = listener;
    }

    /// Wires up the channel that receives sync begin/failed signals.
    pub fn set_sync_channel(&self, tx: Sender<SyncSignal>) {
        *self.sync_tx.lock() = Some(tx);
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnState {
        self.inner.lock().state
    }

    fn listener(&self) -> Arc<dyn ConnListener> {
        Arc::clone(&self.listener.read())
    }

    fn signal_sync(&self, signal: SyncSignal) {
        if let Some(tx) = self.sync_tx.lock().as_ref() {
            let _ = tx.send(signal);
        }
    }

    fn frame_options(&self) -> FrameOptions {
        FrameOptions::default()
            .with_compression(self.config.compression)
            .with_max_frame_len(self.config.max_frame_len)
    }

    /// Establishes a connection, replacing any existing one.
    ///
    /// Errors with [`ConnError::Terminal`] from a terminal state. On a
    /// failed dial the listener's `on_connect_failed` always fires, then
    /// the failure is classified: fatal auth codes end the session in
    /// `Failed`, a kick ends it in `KickedOffline`, anything else leaves
    /// the manager in `Disconnected` for the caller's retry policy.
    pub fn connect(&self, operation_id: &str) -> ConnResult<()> {
        // Transitions happen under the lock; the guard is dropped before
        // every listener callback so a listener may re-enter the manager.
        {
            let mut inner = self.inner.lock();
            if inner.state.is_terminal() {
                return Err(ConnError::Terminal {
                    state: inner.state.name(),
                });
            }
            if let Some(mut old) = inner.conn.take() {
                debug!(operation_id, "closing previous connection before dial");
                let _ = old.close();
            }
            inner.state = ConnState::Connecting;
        }
        self.listener().on_connecting();

        let params = ConnectParams {
            user_id: self.config.user_id.clone(),
            token: self.config.token.clone(),
            platform_id: self.config.platform_id,
            operation_id: operation_id.to_string(),
            compression: self.config.compression,
        };
        match self.dialer.dial(&params, self.config.dial_timeout) {
            Ok(mut conn) => {
                conn.set_read_limit(self.config.read_limit);
                {
                    let mut inner = self.inner.lock();
                    inner.conn = Some(conn);
                    inner.state = ConnState::Connected;
                }
                info!(operation_id, addr = %self.config.addr, "connected");
                self.listener().on_connect_success();
                Ok(())
            }
            Err(failure) => {
                warn!(
                    operation_id,
                    code = ?failure.code,
                    message = %failure.message,
                    "connect failed"
                );
                let class = classify(failure.code);
                let next = match class {
                    FailureClass::FatalAuth => ConnState::Failed,
                    FailureClass::Kicked => ConnState::KickedOffline,
                    FailureClass::Transient => ConnState::Disconnected,
                };
                self.inner.lock().state = next;

                let listener = self.listener();
                listener.on_connect_failed(failure.code, &failure.message);
                match class {
                    FailureClass::FatalAuth => {
                        let code = failure.code.unwrap_or_default();
                        if code == CODE_TOKEN_EXPIRED {
                            listener.on_user_token_expired();
                        }
                        Err(ConnError::FatalAuth {
                            code,
                            message: failure.message,
                        })
                    }
                    FailureClass::Kicked => {
                        listener.on_kicked_offline();
                        Err(ConnError::KickedOffline)
                    }
                    FailureClass::Transient => {
                        if failure.code.is_none() {
                            // The server was never reached. Surface an
                            // immediate begin/failed pair so sync observers
                            // see the attempt rather than silence.
                            self.signal_sync(SyncSignal::Begin);
                            self.signal_sync(SyncSignal::Failed);
                        }
                        Err(ConnError::ConnectFailed {
                            code: failure.code,
                            message: failure.message,
                        })
                    }
                }
            }
        }
    }

    /// Encodes and writes one frame on the live connection.
    ///
    /// Oversized frames are rejected before any bytes reach the wire. A
    /// transport failure drops the connection and moves to `Disconnected`.
    pub fn send(&self, envelope: &FrameEnvelope) -> ConnResult<()> {
        let bytes = encode_frame(envelope, &self.frame_options())?;
        let mut inner = self.inner.lock();
        let conn = inner.conn.as_mut().ok_or(ConnError::NotConnected)?;
        match conn.send(&bytes, self.config.write_timeout) {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(error = %err, "write failed, dropping connection");
                inner.conn = None;
                inner.state = ConnState::Disconnected;
                Err(err)
            }
        }
    }

    /// Sends one heartbeat ping on the live connection.
    pub fn heartbeat(&self) -> ConnResult<()> {
        let mut inner = self.inner.lock();
        let conn = inner.conn.as_mut().ok_or(ConnError::NotConnected)?;
        match conn.ping(self.config.write_timeout) {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(error = %err, "heartbeat failed, dropping connection");
                inner.conn = None;
                inner.state = ConnState::Disconnected;
                Err(err)
            }
        }
    }

    /// Closes the connection and moves to `Disconnected`.
    ///
    /// Terminal states are preserved.
    pub fn close(&self) -> ConnResult<()> {
        let mut inner = self.inner.lock();
        if let Some(mut conn) = inner.conn.take() {
            conn.close()?;
        }
        if !inner.state.is_terminal() {
            inner.state = ConnState::Disconnected;
        }
        Ok(())
    }
}
