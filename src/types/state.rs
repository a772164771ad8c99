//! Request lifecycle state machine

use serde::{Deserialize, Serialize};

/// Lifecycle state of a burn request as it moves through the pipeline.
///
/// Linear progression `Received → Validated → WeatherAssessed → Predicted
/// → Scheduled → Alerted → Done`, with `Rejected` and `Failed` reachable
/// from any non-terminal state. Terminal states are immutable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    #[default]
    Received,
    Validated,
    WeatherAssessed,
    Predicted,
    Scheduled,
    Alerted,
    Done,
    /// Terminal: input rejected (validation, auth, numeric failure)
    Rejected,
    /// Terminal: retries exhausted or deadline exceeded
    Failed,
}

impl RequestState {
    /// Whether this state admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Rejected | Self::Failed)
    }

    /// The state reached after the current stage succeeds, if any.
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Received => Some(Self::Validated),
            Self::Validated => Some(Self::WeatherAssessed),
            Self::WeatherAssessed => Some(Self::Predicted),
            Self::Predicted => Some(Self::Scheduled),
            Self::Scheduled => Some(Self::Alerted),
            Self::Alerted => Some(Self::Done),
            Self::Done | Self::Rejected | Self::Failed => None,
        }
    }

    /// Whether `to` is a legal transition from this state.
    pub fn can_transition_to(&self, to: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        if matches!(to, Self::Rejected | Self::Failed) {
            return true;
        }
        self.next() == Some(to)
    }

    /// Short code for logging.
    pub fn short_code(&self) -> &'static str {
        match self {
            Self::Received => "RECV",
            Self::Validated => "VALD",
            Self::WeatherAssessed => "WTHR",
            Self::Predicted => "PRED",
            Self::Scheduled => "SCHD",
            Self::Alerted => "ALRT",
            Self::Done => "DONE",
            Self::Rejected => "REJ",
            Self::Failed => "FAIL",
        }
    }
}

impl std::fmt::Display for RequestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::Validated => "validated",
            Self::WeatherAssessed => "weather_assessed",
            Self::Predicted => "predicted",
            Self::Scheduled => "scheduled",
            Self::Alerted => "alerted",
            Self::Done => "done",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_walks_to_done() {
        let mut state = RequestState::Received;
        let mut hops = 0;
        while let Some(next) = state.next() {
            assert!(state.can_transition_to(next));
            state = next;
            hops += 1;
        }
        assert_eq!(state, RequestState::Done);
        assert_eq!(hops, 6);
    }

    #[test]
    fn terminal_states_are_immutable() {
        for terminal in [RequestState::Done, RequestState::Rejected, RequestState::Failed] {
            assert!(terminal.is_terminal());
            assert!(!terminal.can_transition_to(RequestState::Failed));
            assert_eq!(terminal.next(), None);
        }
    }

    #[test]
    fn any_active_state_can_fail_or_reject() {
        for state in [
            RequestState::Received,
            RequestState::WeatherAssessed,
            RequestState::Scheduled,
        ] {
            assert!(state.can_transition_to(RequestState::Rejected));
            assert!(state.can_transition_to(RequestState::Failed));
        }
    }

    #[test]
    fn skipping_stages_is_illegal() {
        assert!(!RequestState::Received.can_transition_to(RequestState::Predicted));
        assert!(!RequestState::Validated.can_transition_to(RequestState::Done));
    }
}
