//! Server lifecycle: `Created → Listening → ShuttingDown → Terminated`,
//! and how its outcome maps onto a process exit code.

use std::{fmt, time::Duration};

use parking_lot::Mutex;
use rama::{error::BoxError, telemetry::tracing};

/// Time in-flight requests get to finish once shutdown started.
pub const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Exit code used when the server stopped because of an interrupt.
pub const EXIT_CODE_INTERRUPTED: i32 = 2;

/// Exit code used for fatal runtime errors (bind, serve, shutdown).
pub const EXIT_CODE_FAILURE: i32 = 1;

/// Exit code used for invalid startup arguments.
pub const EXIT_CODE_INVALID_ARGS: i32 = 127;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ServerState {
    Created,
    Listening,
    ShuttingDown,
    Terminated,
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerState::Created => write!(f, "created"),
            ServerState::Listening => write!(f, "listening"),
            ServerState::ShuttingDown => write!(f, "shutting down"),
            ServerState::Terminated => write!(f, "terminated"),
        }
    }
}

/// Process wide server state, only ever moving forward.
///
/// States may be skipped: a server that fails to bind
/// goes from created straight to shutting down.
#[derive(Debug)]
pub struct ServerLifecycle {
    state: Mutex<ServerState>,
}

impl Default for ServerLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerLifecycle {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ServerState::Created),
        }
    }

    pub fn state(&self) -> ServerState {
        *self.state.lock()
    }

    /// Move to the next state, returning the previous one.
    pub fn advance(&self, next: ServerState) -> Result<ServerState, LifecycleError> {
        let mut state = self.state.lock();
        let current = *state;
        if next <= current {
            return Err(LifecycleError { current, next });
        }
        *state = next;
        tracing::debug!("server lifecycle: {current} -> {next}");
        Ok(current)
    }
}

#[derive(Debug)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub struct LifecycleError {
    current: ServerState,
    next: ServerState,
}

impl LifecycleError {
    pub fn current(&self) -> ServerState {
        self.current
    }
}

impl fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid server lifecycle transition: {} -> {}",
            self.current, self.next
        )
    }
}

impl std::error::Error for LifecycleError {}

/// What caused the graceful shutdown to start.
#[derive(Debug)]
pub enum ShutdownTrigger {
    Interrupt,
    Fatal(BoxError),
}

/// How the server terminated, when it terminated without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Stopped by an interrupt after draining in-flight requests in time.
    Interrupted { delay: Duration },
}

impl Termination {
    pub fn exit_code(self) -> i32 {
        match self {
            Termination::Interrupted { .. } => EXIT_CODE_INTERRUPTED,
        }
    }
}
