//! Finite state machine for a deploy attempt

use serde::{Deserialize, Serialize};

/// Total number of steps in a deploy attempt
pub const TOTAL_STEPS: usize = 6;

/// Deploy phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployPhase {
    /// Initial state, nothing started
    Idle,

    /// Verifying the build output and target paths
    Precheck,

    /// Running and verifying the build step
    Build,

    /// Capturing a backup of the live directory
    Backup,

    /// Swapping the new version into place
    Swap,

    /// Probing the environment URL
    HealthCheck,

    /// Removing leftover entries for this attempt
    Cleanup,

    /// Deploy finished successfully
    Completed,

    /// A step failed, restoring the previous version
    RollingBack,

    /// Deploy failed after rollback
    Failed,
}

/// Deploy event
#[derive(Debug, Clone)]
pub enum DeployEvent {
    /// Start the attempt
    Begin,

    /// Current step finished, move to the next
    Advance,

    /// Current step failed
    Fail(String),

    /// Rollback attempt finished (successfully or not)
    RollbackComplete,
}

/// Deploy FSM.
///
/// The step sequence is linear; the only branch is the rollback transition,
/// reachable from failure at any step.
#[derive(Debug, Clone)]
pub struct DeployFsm {
    phase: DeployPhase,
    error: Option<String>,
}

impl DeployFsm {
    /// Create a new FSM in idle state
    pub fn new() -> Self {
        Self {
            phase: DeployPhase::Idle,
            error: None,
        }
    }

    /// Get current phase
    pub fn phase(&self) -> &DeployPhase {
        &self.phase
    }

    /// Get error message if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Step number and description for the current phase, for progress logs
    pub fn step_label(&self) -> Option<(usize, &'static str)> {
        match self.phase {
            DeployPhase::Precheck => Some((1, "Running prechecks")),
            DeployPhase::Build => Some((2, "Verifying build output")),
            DeployPhase::Backup => Some((3, "Backing up current version")),
            DeployPhase::Swap => Some((4, "Deploying new version")),
            DeployPhase::HealthCheck => Some((5, "Running health checks")),
            DeployPhase::Cleanup => Some((6, "Cleaning up")),
            _ => None,
        }
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: DeployEvent) -> Result<(), String> {
        let next = match (&self.phase, &event) {
            (DeployPhase::Idle, DeployEvent::Begin) => DeployPhase::Precheck,

            (DeployPhase::Precheck, DeployEvent::Advance) => DeployPhase::Build,
            (DeployPhase::Build, DeployEvent::Advance) => DeployPhase::Backup,
            (DeployPhase::Backup, DeployEvent::Advance) => DeployPhase::Swap,
            (DeployPhase::Swap, DeployEvent::Advance) => DeployPhase::HealthCheck,
            (DeployPhase::HealthCheck, DeployEvent::Advance) => DeployPhase::Cleanup,
            (DeployPhase::Cleanup, DeployEvent::Advance) => DeployPhase::Completed,

            // Rollback is reachable from failure at any step
            (
                DeployPhase::Precheck
                | DeployPhase::Build
                | DeployPhase::Backup
                | DeployPhase::Swap
                | DeployPhase::HealthCheck
                | DeployPhase::Cleanup,
                DeployEvent::Fail(err),
            ) => {
                self.error = Some(err.clone());
                DeployPhase::RollingBack
            }

            (DeployPhase::RollingBack, DeployEvent::RollbackComplete) => DeployPhase::Failed,

            // Invalid transitions
            (phase, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", phase, event));
            }
        };

        self.phase = next;
        Ok(())
    }
}

impl Default for DeployFsm {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fsm_success_flow() {
        let mut fsm = DeployFsm::new();
        assert_eq!(fsm.phase(), &DeployPhase::Idle);

        fsm.process(DeployEvent::Begin).unwrap();
        assert_eq!(fsm.phase(), &DeployPhase::Precheck);
        assert_eq!(fsm.step_label(), Some((1, "Running prechecks")));

        for expected in [
            DeployPhase::Build,
            DeployPhase::Backup,
            DeployPhase::Swap,
            DeployPhase::HealthCheck,
            DeployPhase::Cleanup,
            DeployPhase::Completed,
        ] {
            fsm.process(DeployEvent::Advance).unwrap();
            assert_eq!(fsm.phase(), &expected);
        }

        assert!(fsm.error().is_none());
        assert!(fsm.step_label().is_none());
    }

    #[test]
    fn test_fsm_failure_from_any_step() {
        for steps_before_failure in 0..TOTAL_STEPS {
            let mut fsm = DeployFsm::new();
            fsm.process(DeployEvent::Begin).unwrap();

            for _ in 0..steps_before_failure {
                fsm.process(DeployEvent::Advance).unwrap();
            }

            fsm.process(DeployEvent::Fail("boom".to_string())).unwrap();
            assert_eq!(fsm.phase(), &DeployPhase::RollingBack);
            assert_eq!(fsm.error(), Some("boom"));

            fsm.process(DeployEvent::RollbackComplete).unwrap();
            assert_eq!(fsm.phase(), &DeployPhase::Failed);
        }
    }

    #[test]
    fn test_fsm_invalid_transitions() {
        let mut fsm = DeployFsm::new();

        // Cannot advance before beginning
        assert!(fsm.process(DeployEvent::Advance).is_err());

        // Cannot fail a completed attempt
        fsm.process(DeployEvent::Begin).unwrap();
        for _ in 0..TOTAL_STEPS {
            fsm.process(DeployEvent::Advance).unwrap();
        }
        assert_eq!(fsm.phase(), &DeployPhase::Completed);
        assert!(fsm.process(DeployEvent::Fail("late".to_string())).is_err());

        // Cannot begin twice
        let mut fsm = DeployFsm::new();
        fsm.process(DeployEvent::Begin).unwrap();
        assert!(fsm.process(DeployEvent::Begin).is_err());
    }
}
