//! Guarded device state cell
//!
//! The controller owns one [`StateCell`]; every writer, local or remote, goes
//! through [`StateCell::request_transition`]. Readers only ever get a copy.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::data::DeviceState;
use crate::error::ControllerError;
use crate::event_bus::{AppEvent, DeviceEvent, ErrorEvent, EventBus};

/// Who asked for a state change
///
/// Attached to every published `StateChanged` event so a component can
/// recognise (and drop) the echo of its own request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransitionOrigin {
    /// The owning controller (user or transport driven)
    Controller,
    /// The job streamer
    Streamer,
}

impl fmt::Display for TransitionOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Controller => write!(f, "controller"),
            Self::Streamer => write!(f, "streamer"),
        }
    }
}

/// Result of an accepted transition request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The state changed
    Applied {
        /// Previous state.
        from: DeviceState,
        /// New state.
        to: DeviceState,
    },
    /// The cell already held the requested state
    Unchanged,
}

/// Owned, lock-protected device state
pub struct StateCell {
    state: RwLock<DeviceState>,
    bus: Arc<EventBus>,
}

impl StateCell {
    /// Create a cell holding `initial` that publishes changes on `bus`
    pub fn new(initial: DeviceState, bus: Arc<EventBus>) -> Self {
        Self {
            state: RwLock::new(initial),
            bus,
        }
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> DeviceState {
        *self.state.read()
    }

    /// Request a transition to `target`.
    ///
    /// Pause and Stop are refused while disconnected; the refusal is logged,
    /// published as an [`ErrorEvent::TransitionRejected`] and returned as an
    /// error the caller may ignore. The lock is released before any event is
    /// published so handlers can read the new state.
    pub fn request_transition(
        &self,
        target: DeviceState,
        origin: TransitionOrigin,
    ) -> Result<TransitionOutcome, ControllerError> {
        let outcome = {
            let mut state = self.state.write();
            let current = *state;
            if !current.can_transition_to(target) {
                Err(current)
            } else if current == target {
                Ok(TransitionOutcome::Unchanged)
            } else {
                *state = target;
                Ok(TransitionOutcome::Applied {
                    from: current,
                    to: target,
                })
            }
        };

        match outcome {
            Ok(TransitionOutcome::Applied { from, to }) => {
                tracing::debug!("State changed from [{}] to [{}] by {}", from, to, origin);
                self.bus
                    .publish(AppEvent::Device(DeviceEvent::StateChanged { from, to, origin }))
                    .ok();
                Ok(TransitionOutcome::Applied { from, to })
            }
            Ok(TransitionOutcome::Unchanged) => Ok(TransitionOutcome::Unchanged),
            Err(current) => {
                tracing::warn!(
                    "Rejected {} request for {} while {}: serial not connected",
                    origin,
                    target,
                    current
                );
                self.bus
                    .publish(AppEvent::Error(ErrorEvent::TransitionRejected {
                        current,
                        requested: target,
                    }))
                    .ok();
                Err(ControllerError::InvalidStateTransition {
                    current,
                    requested: target,
                })
            }
        }
    }
}

impl fmt::Debug for StateCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateCell")
            .field("state", &self.snapshot())
            .finish()
    }
}
