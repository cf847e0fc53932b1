//! Transport boundary.
//!
//! The concrete streaming socket library is an external collaborator;
//! these traits are the seam it plugs into. `MockDialer` and
//! `MockConnection` back the tests.

use crate::error::{ConnError, ConnResult};
use chatsync_proto::ConnectParams;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// A live streaming connection.
pub trait Connection: Send {
    /// Writes one encoded frame within the deadline.
    fn send(&mut self, bytes: &[u8], timeout: Duration) -> ConnResult<()>;

    /// Sends a heartbeat ping within the deadline.
    fn ping(&mut self, timeout: Duration) -> ConnResult<()>;

    /// Closes the connection gracefully.
    fn close(&mut self) -> ConnResult<()>;

    /// Applies an inbound read limit.
    fn set_read_limit(&mut self, limit: usize);
}

/// A failed dial attempt, optionally carrying a server status code.
#[derive(Debug, Clone)]
pub struct DialFailure {
    /// Server status code, absent when the failure was purely transport.
    pub code: Option<u32>,
    /// Failure message.
    pub message: String,
}

impl DialFailure {
    /// Creates a failure with a status code.
    pub fn with_code(code: u32, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }

    /// Creates a codeless transport failure.
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }
}

/// Establishes streaming connections.
pub trait Dialer: Send + Sync {
    /// Dials the server with the given query parameters.
    fn dial(
        &self,
        params: &ConnectParams,
        timeout: Duration,
    ) -> Result<Box<dyn Connection>, DialFailure>;
}

/// Shared observable state of a [`MockConnection`].
#[derive(Debug, Default)]
pub struct MockConnState {
    /// Frames written so far.
    pub sent: Vec<Vec<u8>>,
    /// Pings issued so far.
    pub pings: usize,
    /// Whether `close` was called.
    pub closed: bool,
    /// Read limit last applied.
    pub read_limit: Option<usize>,
    /// When set, the next ping or send fails.
    pub fail_transport: bool,
}

/// A scriptable connection for tests.
pub struct MockConnection {
    state: Arc<Mutex<MockConnState>>,
}

impl MockConnection {
    /// Creates a connection and a handle to observe it.
    pub fn new() -> (Self, Arc<Mutex<MockConnState>>) {
        let state = Arc::new(Mutex::new(MockConnState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            state,
        )
    }
}

impl Connection for MockConnection {
    fn send(&mut self, bytes: &[u8], _timeout: Duration) -> ConnResult<()> {
        let mut state = self.state.lock();
        if state.fail_transport {
            return Err(ConnError::Transport("send failed".into()));
        }
        state.sent.push(bytes.to_vec());
        Ok(())
    }

    fn ping(&mut self, _timeout: Duration) -> ConnResult<()> {
        let mut state = self.state.lock();
        if state.fail_transport {
            return Err(ConnError::Transport("ping failed".into()));
        }
        state.pings += 1;
        Ok(())
    }

    fn close(&mut self) -> ConnResult<()> {
        self.state.lock().closed = true;
        Ok(())
    }

    fn set_read_limit(&mut self, limit: usize) {
        self.state.lock().read_limit = Some(limit);
    }
}

/// Outcome of one scripted dial attempt.
pub enum DialOutcome {
    /// Dial succeeds; the handle observes the returned connection.
    Success(Arc<Mutex<MockConnState>>),
    /// Dial fails.
    Failure(DialFailure),
}

/// A dialer that replays scripted outcomes in order.
#[derive(Default)]
pub struct MockDialer {
    outcomes: Mutex<VecDeque<DialOutcome>>,
    dialed: Mutex<Vec<ConnectParams>>,
}

impl MockDialer {
    /// Creates a dialer with no scripted outcomes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts a successful dial; returns the observation handle.
    pub fn push_success(&self) -> Arc<Mutex<MockConnState>> {
        let state = Arc::new(Mutex::new(MockConnState::default()));
        self.outcomes
            .lock()
            .push_back(DialOutcome::Success(Arc::clone(&state)));
        state
    }

    /// Scripts a failed dial.
    pub fn push_failure(&self, failure: DialFailure) {
        self.outcomes.lock().push_back(DialOutcome::Failure(failure));
    }

    /// Parameters of every dial attempt so far.
    pub fn dialed(&self) -> Vec<ConnectParams> {
        self.dialed.lock().clone()
    }
}

impl Dialer for MockDialer {
    fn dial(
        &self,
        params: &ConnectParams,
        _timeout: Duration,
    ) -> Result<Box<dyn Connection>, DialFailure> {
        self.dialed.lock().push(params.clone());
        match self.outcomes.lock().pop_front() {
            Some(DialOutcome::Success(state)) => Ok(Box::new(MockConnection { state })),
            Some(DialOutcome::Failure(failure)) => Err(failure),
            None => Err(DialFailure::transport("no scripted outcome")),
        }
    }
}
