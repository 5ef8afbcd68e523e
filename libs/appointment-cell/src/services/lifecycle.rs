use tracing::{debug, warn};

use crate::models::AppointmentStatus;

/// Owns the appointment state machine: Scheduled -> {Completed, Cancelled},
/// both of which are terminal.
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Get all valid next statuses for a given current status
    pub fn valid_transitions(&self, current: &AppointmentStatus) -> Vec<AppointmentStatus> {
        match current {
            AppointmentStatus::Scheduled => vec![
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
            ],
            // Terminal states - no transitions out
            AppointmentStatus::Completed => vec![],
            AppointmentStatus::Cancelled => vec![],
        }
    }

    pub fn can_transition(&self, current: &AppointmentStatus, next: &AppointmentStatus) -> bool {
        self.valid_transitions(current).contains(next)
    }

    /// Decide what a requested status change amounts to. Re-marking a
    /// terminal appointment, or asking for the status it already has, is
    /// a deliberate no-op rather than an error; the reference workflow
    /// tolerates repeated cancels from stale dashboards.
    pub fn plan_transition(
        &self,
        current: &AppointmentStatus,
        requested: &AppointmentStatus,
    ) -> TransitionPlan {
        if current == requested {
            debug!("Appointment already {}, nothing to do", current);
            return TransitionPlan::NoOp;
        }

        if current.is_terminal() {
            warn!(
                "Ignoring status change {} -> {} on a terminal appointment",
                current, requested
            );
            return TransitionPlan::NoOp;
        }

        if self.can_transition(current, requested) {
            TransitionPlan::Apply(*requested)
        } else {
            TransitionPlan::Rejected
        }
    }
}

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPlan {
    /// Write the new status.
    Apply(AppointmentStatus),
    /// Leave the record untouched and report success.
    NoOp,
    /// The edge is not in the state machine.
    Rejected,
}
