use std::time::Duration;

use crate::error::TelemetryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Authenticated,
    ChannelOpen,
    Subscribed,
    Reconnecting,
}

impl ConnectionState {
    /// Whether a push channel is currently usable.
    pub const fn is_live(self) -> bool {
        matches!(self, Self::ChannelOpen | Self::Subscribed)
    }

    /// Whether a session token is held in this state.
    pub const fn has_session(self) -> bool {
        !matches!(self, Self::Disconnected | Self::Connecting)
    }

    fn can_transition_to(self, to: Self) -> bool {
        use ConnectionState::*;
        match (self, to) {
            (_, Disconnected) => true,
            (Disconnected, Connecting) => true,
            (Connecting, Authenticated | ChannelOpen | Reconnecting) => true,
            (Authenticated, Connecting | ChannelOpen | Reconnecting) => true,
            (ChannelOpen, Subscribed | Reconnecting) => true,
            (Subscribed, Reconnecting) => true,
            (Reconnecting, Connecting) => true,
            _ => false,
        }
    }
}

/// Validated connection lifecycle:
///
/// ```text
/// disconnected -> connecting -> authenticated -> channel-open -> subscribed
///                     ^                              |              |
///                     +-------- reconnecting <-------+--------------+
/// ```
///
/// Every state may drop back to `disconnected` (retries exhausted, teardown).
#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    state: ConnectionState,
}

impl Default for ConnectionMachine {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
        }
    }
}

impl ConnectionMachine {
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Move to `to`, returning the previous state. Self-transitions are accepted as no-ops.
    pub fn transition(&mut self, to: ConnectionState) -> Result<ConnectionState, TelemetryError> {
        let from = self.state;
        if from == to {
            return Ok(from);
        }
        if !from.can_transition_to(to) {
            return Err(TelemetryError::InvalidTransition { from, to });
        }
        self.state = to;
        Ok(from)
    }
}

/// Exponential reconnect delay: `base * 2^(n-1)`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectBackoff {
    base: Duration,
    max: Duration,
    consecutive_failures: u32,
}

impl ReconnectBackoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            consecutive_failures: 0,
        }
    }

    pub fn delay_for(&self, consecutive_failures: u32) -> Duration {
        let exponent = consecutive_failures.saturating_sub(1).min(16);
        self.base
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max)
            .min(self.max)
    }

    /// Record a failure and return how long to wait before the next attempt.
    pub fn next_delay(&mut self) -> Duration {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.delay_for(self.consecutive_failures)
    }

    pub fn attempts(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn reset(&mut self) {
        self.consecutive_failures = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::ConnectionState::*;
    use super::*;

    #[test]
    fn happy_path_reaches_subscribed() {
        let mut machine = ConnectionMachine::default();
        for to in [Connecting, Authenticated, ChannelOpen, Subscribed] {
            machine.transition(to).expect("valid transition");
        }
        assert_eq!(machine.state(), Subscribed);
        assert!(machine.state().is_live());
    }

    #[test]
    fn close_loops_through_reconnecting() {
        let mut machine = ConnectionMachine::default();
        for to in [Connecting, Authenticated, ChannelOpen, Reconnecting, Connecting, ChannelOpen, Subscribed, Reconnecting] {
            machine.transition(to).expect("valid transition");
        }
        assert_eq!(machine.state(), Reconnecting);
        assert!(!machine.state().is_live());
        assert!(machine.state().has_session());
    }

    #[test]
    fn exhausted_retries_return_to_disconnected() {
        let mut machine = ConnectionMachine::default();
        machine.transition(Connecting).expect("valid transition");
        assert_eq!(machine.transition(Disconnected), Ok(Connecting));
        assert_eq!(machine.state(), Disconnected);
    }

    #[test]
    fn invalid_transitions_are_rejected_without_changing_state() {
        let mut machine = ConnectionMachine::default();
        assert_eq!(
            machine.transition(Subscribed),
            Err(TelemetryError::InvalidTransition {
                from: Disconnected,
                to: Subscribed
            })
        );
        assert_eq!(machine.state(), Disconnected);
        machine.transition(Connecting).expect("valid transition");
        assert!(machine.transition(Subscribed).is_err());
        assert!(machine.transition(Reconnecting).is_ok());
        assert!(machine.transition(ChannelOpen).is_err());
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let mut backoff = ReconnectBackoff::new(Duration::from_millis(500), Duration::from_millis(10_000));
        let delays: Vec<_> = (0..8).map(|_| backoff.next_delay().as_millis()).collect();
        assert_eq!(delays, vec![500, 1_000, 2_000, 4_000, 8_000, 10_000, 10_000, 10_000]);
        assert_eq!(backoff.attempts(), 8);
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(500));
    }
}
