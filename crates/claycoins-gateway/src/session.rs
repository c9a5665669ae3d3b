use std::fmt;

use tracing::{debug, info, warn};
use uuid::Uuid;

/// Lifecycle of one socket connection. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Why a session left `Open`. Only affects logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Client sent a Close frame.
    ClientClosed,
    /// Stream ended or a write failed without a Close frame.
    Disconnected,
    /// No Pong within one heartbeat period.
    HeartbeatTimeout,
    /// The hub dropped this subscriber for falling behind.
    Evicted,
    /// Protocol error or a task died.
    Fault,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ClientClosed => "client closed",
            Self::Disconnected => "disconnected",
            Self::HeartbeatTimeout => "heartbeat timeout",
            Self::Evicted => "evicted by hub",
            Self::Fault => "fault",
        };
        f.write_str(s)
    }
}

pub struct Session {
    id: Uuid,
    state: SessionState,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Connecting,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    /// Connecting -> Open. Returns false from any other state.
    pub fn open(&mut self) -> bool {
        if self.state != SessionState::Connecting {
            return false;
        }
        self.state = SessionState::Open;
        debug!("Session {} open", self.id);
        true
    }

    /// Connecting | Open -> Closing. Returns false if already closing or
    /// closed.
    pub fn close(&mut self, reason: CloseReason) -> bool {
        match self.state {
            SessionState::Connecting | SessionState::Open => {}
            SessionState::Closing | SessionState::Closed => return false,
        }
        self.state = SessionState::Closing;

        match reason {
            CloseReason::ClientClosed | CloseReason::Disconnected => {
                info!("Session {} closing: {}", self.id, reason)
            }
            CloseReason::HeartbeatTimeout | CloseReason::Evicted | CloseReason::Fault => {
                warn!("Session {} closing: {}", self.id, reason)
            }
        }
        true
    }

    /// Closing -> Closed.
    pub fn finish(&mut self) -> bool {
        if self.state != SessionState::Closing {
            return false;
        }
        self.state = SessionState::Closed;
        debug!("Session {} closed", self.id);
        true
    }
}
