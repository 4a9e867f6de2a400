//! Core state management
//!
//! Provides the authoritative device state cell and its guarded transition operation.

pub mod state;

pub use state::{StateCell, TransitionOrigin, TransitionOutcome};
