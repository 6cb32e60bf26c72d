//! Custom on-chain type definitions.
//!
//! Type registration extends the node client's decoder with the Subsocial
//! runtime's data shapes. The manager runs it once, before the first
//! connection attempt.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `registry` | [`TypeRegistry`] and [`TypeDef`] |
//! | `subsocial` | The Subsocial type bundle |

// ============================================================================
// Submodules
// ============================================================================

/// Type registry and definitions.
pub mod registry;

/// Subsocial runtime types.
pub mod subsocial;

// ============================================================================
// Re-exports
// ============================================================================

pub use registry::{TypeDef, TypeRegistry, Variant};
pub use subsocial::{register_subsocial_types, subsocial_types};
