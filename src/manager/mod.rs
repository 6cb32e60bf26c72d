//! Connection lifecycle management.
//!
//! [`ConnectionManager`] is the single owner of the node session. Consumers
//! call [`ConnectionManager::connection`] and get a shared
//! [`ConnectionHandle`]; a timer or [`IdleReaper`] releases the session once
//! it has been idle.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | [`ConnectionManagerBuilder`] |
//! | `config` | [`EndpointConfig`] and [`ManagerOptions`] |
//! | `core` | [`ConnectionManager`] |
//! | `handle` | [`ConnectionHandle`] |
//! | `reaper` | [`IdleReaper`] |
//! | `state` | [`ConnectionState`] |

// ============================================================================
// Submodules
// ============================================================================

/// Builder pattern for manager configuration.
pub mod builder;

/// Endpoint and timing configuration.
pub mod config;

/// Connection manager implementation.
pub mod core;

/// Shared connection handle.
pub mod handle;

/// Background idle teardown.
pub mod reaper;

/// Lifecycle states.
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ConnectionManagerBuilder;
pub use config::{DEFAULT_ENDPOINT, ENDPOINT_ENV, EndpointConfig, ManagerOptions};
pub use core::ConnectionManager;
pub use handle::{Api, ConnectionHandle};
pub use reaper::IdleReaper;
pub use state::ConnectionState;
