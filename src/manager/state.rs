//! Connection lifecycle states.
//!
//! ```text
//! Uninitialized --connection()--> Connecting
//! Connecting --success--> Ready
//! Connecting --failure--> Uninitialized
//! Ready --not live / idle release / disconnect--> Disconnected
//! Disconnected --connection()--> Connecting
//! ```

use std::fmt;

/// Lifecycle state of a [`super::ConnectionManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No connection has been made, or the last attempt failed.
    #[default]
    Uninitialized,
    /// An attempt is in flight.
    Connecting,
    /// A live handle is cached.
    Ready,
    /// The cached handle was torn down.
    Disconnected,
}

impl ConnectionState {
    /// Returns `true` for [`ConnectionState::Ready`].
    #[inline]
    #[must_use]
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Connecting => "connecting",
            Self::Ready => "ready",
            Self::Disconnected => "disconnected",
        };
        f.write_str(name)
    }
}
