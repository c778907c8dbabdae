//! Retry and reauthentication state machine.
//!
//! [`RetryController`] is pure: it reads an [`OutcomeKind`], updates the caller-owned
//! [`RunState`] and returns a [`Decision`]. It never sleeps, sends requests or touches
//! credentials; the harvester acts on the decision.

use serde::Serialize;

use crate::outcome::OutcomeKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    #[default]
    Normal,
    ReauthPending,
    Done,
    Aborted,
}

/// Why a pass ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassStop {
    /// Every unit of the source was dispatched.
    Exhausted,
    RequestLimit,
    TimeoutCeiling,
    FailureCeiling,
}

impl PassStop {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exhausted => "exhausted",
            Self::RequestLimit => "request_limit",
            Self::TimeoutCeiling => "timeout_ceiling",
            Self::FailureCeiling => "failure_ceiling",
        }
    }

    pub const fn is_degraded(self) -> bool {
        !matches!(self, Self::Exhausted)
    }
}

/// Counters of one pass. Reset at the start of every pass and never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunState {
    pub request_count: u64,
    pub consecutive_timeouts: u32,
    pub consecutive_failures: u32,
    pub reauth_attempted: bool,
    pub state: ControllerState,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh unit was pulled from the source; any reauthentication episode is over.
    pub fn begin_unit(&mut self) {
        self.reauth_attempted = false;
        if self.state == ControllerState::ReauthPending {
            self.state = ControllerState::Normal;
        }
    }

    fn end_episode(&mut self) {
        self.reauth_attempted = false;
        self.state = ControllerState::Normal;
    }
}

/// What the harvester does next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Hand the payload to the sink and advance.
    Deliver,
    /// Refresh the credential and re-issue the same unit.
    Reauthenticate,
    /// Recoverable failure below the ceiling: requeue or re-issue, then continue.
    Skip,
    /// End the pass cleanly.
    Stop(PassStop),
    /// Authorization failed again after a refresh.
    Abort,
    /// The response broke the API contract.
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryController {
    timeout_ceiling: Option<u32>,
    failure_ceiling: Option<u32>,
    request_limit: Option<u64>,
}

impl RetryController {
    /// Ceilings of `None` never stop the pass.
    pub const fn new(
        timeout_ceiling: Option<u32>,
        failure_ceiling: Option<u32>,
        request_limit: Option<u64>,
    ) -> Self {
        Self {
            timeout_ceiling,
            failure_ceiling,
            request_limit,
        }
    }

    pub const fn request_limit(&self) -> Option<u64> {
        self.request_limit
    }

    /// Check the request limit before sending; counts the request when admitted.
    pub fn admit(&self, run: &mut RunState) -> bool {
        if let Some(limit) = self.request_limit {
            if run.request_count >= limit {
                run.state = ControllerState::Done;
                return false;
            }
        }
        run.request_count = run.request_count.saturating_add(1);
        true
    }

    pub fn on_outcome(&self, run: &mut RunState, outcome: OutcomeKind) -> Decision {
        match outcome {
            OutcomeKind::Success | OutcomeKind::EmptyResult => {
                run.end_episode();
                run.consecutive_timeouts = 0;
                run.consecutive_failures = 0;
                Decision::Deliver
            }
            OutcomeKind::AuthExpired => {
                run.consecutive_timeouts = 0;
                if run.reauth_attempted {
                    run.state = ControllerState::Aborted;
                    Decision::Abort
                } else {
                    run.reauth_attempted = true;
                    run.state = ControllerState::ReauthPending;
                    Decision::Reauthenticate
                }
            }
            OutcomeKind::Timeout => {
                run.consecutive_timeouts = run.consecutive_timeouts.saturating_add(1);
                if reached(self.timeout_ceiling, run.consecutive_timeouts) {
                    run.state = ControllerState::Done;
                    Decision::Stop(PassStop::TimeoutCeiling)
                } else {
                    Decision::Skip
                }
            }
            OutcomeKind::TransientServerError => {
                run.end_episode();
                run.consecutive_timeouts = 0;
                run.consecutive_failures = run.consecutive_failures.saturating_add(1);
                if reached(self.failure_ceiling, run.consecutive_failures) {
                    run.state = ControllerState::Done;
                    Decision::Stop(PassStop::FailureCeiling)
                } else {
                    Decision::Skip
                }
            }
            OutcomeKind::Fatal => {
                run.state = ControllerState::Aborted;
                Decision::Reject
            }
        }
    }
}

fn reached(ceiling: Option<u32>, count: u32) -> bool {
    ceiling.is_some_and(|ceiling| count >= ceiling)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_auth_failure_in_one_episode_aborts() {
        let controller = RetryController::default();
        let mut run = RunState::new();

        assert_eq!(
            controller.on_outcome(&mut run, OutcomeKind::AuthExpired),
            Decision::Reauthenticate
        );
        assert_eq!(run.state, ControllerState::ReauthPending);
        assert_eq!(
            controller.on_outcome(&mut run, OutcomeKind::AuthExpired),
            Decision::Abort
        );
        assert_eq!(run.state, ControllerState::Aborted);
    }

    #[test]
    fn any_response_ends_the_reauthentication_episode() {
        let controller = RetryController::default();
        let mut run = RunState::new();

        controller.on_outcome(&mut run, OutcomeKind::AuthExpired);
        assert_eq!(
            controller.on_outcome(&mut run, OutcomeKind::TransientServerError),
            Decision::Skip
        );
        assert!(!run.reauth_attempted);
        assert_eq!(
            controller.on_outcome(&mut run, OutcomeKind::AuthExpired),
            Decision::Reauthenticate
        );
    }

    #[test]
    fn timeout_keeps_the_episode_open() {
        let controller = RetryController::default();
        let mut run = RunState::new();

        controller.on_outcome(&mut run, OutcomeKind::AuthExpired);
        controller.on_outcome(&mut run, OutcomeKind::Timeout);
        assert!(run.reauth_attempted);
        assert_eq!(
            controller.on_outcome(&mut run, OutcomeKind::AuthExpired),
            Decision::Abort
        );
    }

    #[test]
    fn new_unit_ends_the_episode() {
        let controller = RetryController::default();
        let mut run = RunState::new();

        controller.on_outcome(&mut run, OutcomeKind::AuthExpired);
        controller.on_outcome(&mut run, OutcomeKind::Timeout);
        run.begin_unit();
        assert_eq!(run.state, ControllerState::Normal);
        assert_eq!(
            controller.on_outcome(&mut run, OutcomeKind::AuthExpired),
            Decision::Reauthenticate
        );
    }

    #[test]
    fn failure_ceiling_stops_on_the_nth_consecutive_failure() {
        let controller = RetryController::new(None, Some(3), None);
        let mut run = RunState::new();

        assert_eq!(
            controller.on_outcome(&mut run, OutcomeKind::TransientServerError),
            Decision::Skip
        );
        assert_eq!(
            controller.on_outcome(&mut run, OutcomeKind::TransientServerError),
            Decision::Skip
        );
        assert_eq!(
            controller.on_outcome(&mut run, OutcomeKind::TransientServerError),
            Decision::Stop(PassStop::FailureCeiling)
        );
        assert_eq!(run.state, ControllerState::Done);
    }

    #[test]
    fn success_resets_consecutive_counters() {
        let controller = RetryController::new(Some(2), Some(2), None);
        let mut run = RunState::new();

        controller.on_outcome(&mut run, OutcomeKind::Timeout);
        controller.on_outcome(&mut run, OutcomeKind::TransientServerError);
        assert_eq!(run.consecutive_timeouts, 0);
        assert_eq!(
            controller.on_outcome(&mut run, OutcomeKind::EmptyResult),
            Decision::Deliver
        );
        assert_eq!(run.consecutive_failures, 0);
        assert_eq!(
            controller.on_outcome(&mut run, OutcomeKind::Timeout),
            Decision::Skip
        );
        assert_eq!(
            controller.on_outcome(&mut run, OutcomeKind::Timeout),
            Decision::Stop(PassStop::TimeoutCeiling)
        );
    }

    #[test]
    fn unbounded_ceilings_never_stop() {
        let controller = RetryController::default();
        let mut run = RunState::new();

        for _ in 0..1_000 {
            assert_eq!(
                controller.on_outcome(&mut run, OutcomeKind::Timeout),
                Decision::Skip
            );
        }
    }

    #[test]
    fn request_limit_is_checked_before_each_request() {
        let controller = RetryController::new(None, None, Some(2));
        let mut run = RunState::new();

        assert!(controller.admit(&mut run));
        assert!(controller.admit(&mut run));
        assert!(!controller.admit(&mut run));
        assert_eq!(run.request_count, 2);
        assert_eq!(run.state, ControllerState::Done);
    }

    #[test]
    fn fatal_outcome_is_rejected() {
        let controller = RetryController::default();
        let mut run = RunState::new();

        assert_eq!(
            controller.on_outcome(&mut run, OutcomeKind::Fatal),
            Decision::Reject
        );
        assert_eq!(run.state, ControllerState::Aborted);
    }
}
