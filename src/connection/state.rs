//! Per-direction message state machine.

use crate::error::{Error, Result};

/// Whether a direction is between messages or inside one.
///
/// `start` moves `Idle` to `InMessage`, `end` moves it back. Data may only
/// flow while `InMessage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StreamState {
    /// Between messages.
    #[default]
    Idle,
    /// A message has been started and not yet ended.
    InMessage,
}

impl StreamState {
    /// Check if a message is in progress.
    #[must_use]
    #[inline]
    pub const fn is_in_message(&self) -> bool {
        matches!(self, StreamState::InMessage)
    }

    /// `Idle` to `InMessage`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::State`] if a message is already in progress.
    pub fn begin(&mut self, op: &str) -> Result<()> {
        match self {
            StreamState::Idle => {
                *self = StreamState::InMessage;
                Ok(())
            }
            StreamState::InMessage => Err(Error::State(format!(
                "{op} called while a message is in progress"
            ))),
        }
    }

    /// Require `InMessage` without changing state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::State`] when idle.
    pub fn expect_in_message(&self, op: &str) -> Result<()> {
        match self {
            StreamState::InMessage => Ok(()),
            StreamState::Idle => Err(Error::State(format!(
                "{op} called outside a message"
            ))),
        }
    }

    /// `InMessage` to `Idle`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::State`] when idle.
    pub fn end(&mut self, op: &str) -> Result<()> {
        self.expect_in_message(op)?;
        *self = StreamState::Idle;
        Ok(())
    }
}

impl std::fmt::Display for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamState::Idle => write!(f, "Idle"),
            StreamState::InMessage => write!(f, "InMessage"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        assert_eq!(StreamState::default(), StreamState::Idle);
    }

    #[test]
    fn test_transitions() {
        let mut state = StreamState::Idle;
        state.begin("start").unwrap();
        assert!(state.is_in_message());
        state.expect_in_message("data").unwrap();
        state.end("end").unwrap();
        assert_eq!(state, StreamState::Idle);
    }

    #[test]
    fn test_invalid_transitions() {
        let mut state = StreamState::Idle;
        assert!(matches!(state.expect_in_message("data"), Err(Error::State(_))));
        assert!(matches!(state.end("end"), Err(Error::State(_))));

        state.begin("start").unwrap();
        let err = state.begin("start").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid state: start called while a message is in progress"
        );
        assert!(state.is_in_message());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(StreamState::Idle.to_string(), "Idle");
        assert_eq!(StreamState::InMessage.to_string(), "InMessage");
    }
}
