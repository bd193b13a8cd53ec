//! Connection State Machine
//!
//! Defines the transitions the link manager drives. Every transition is
//! reported to the listener, including ones that land in the current state.

use crate::ConnectionState;

/// Events that trigger state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// `start()` called (also on construction)
    Start,
    /// `connect()` called
    Connect,
    /// Connector handed over an open transport
    Opened,
    /// `stop()` called, directly or after a failure or loss
    Stop,
}

/// Result of a state transition attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionResult {
    /// Transition is part of the table
    Success(ConnectionState),
    /// Transition is not expected from the current state
    Invalid {
        from: ConnectionState,
        event: LinkEvent,
    },
}

/// Get the next state for an event, if the transition is valid
pub fn next_state(from: ConnectionState, event: LinkEvent) -> TransitionResult {
    use ConnectionState::*;
    use LinkEvent::*;

    let to = match (from, event) {
        // start() and stop() are idempotent from anywhere
        (_, Start) => Some(Listening),
        (_, Stop) => Some(None),

        // A later connect supersedes whatever was in flight
        (_, Connect) => Some(Connecting),

        // Only an attempt in progress can complete
        (Connecting, Opened) => Some(Connected),

        _ => Option::None,
    };

    match to {
        Some(state) => TransitionResult::Success(state),
        Option::None => TransitionResult::Invalid { from, event },
    }
}

/// Check if a state change is one the manager can ever make
pub fn is_valid_transition(from: ConnectionState, to: ConnectionState) -> bool {
    use ConnectionState::*;

    match (from, to) {
        // Same state is reported but harmless
        (a, b) if a == b => true,

        (_, None) | (_, Listening) | (_, Connecting) => true,
        (Connecting, Connected) => true,

        _ => false,
    }
}
