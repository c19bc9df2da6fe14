use crate::{
    model::StepType,
    runtime::{EnrollmentStatus, StepRunStatus},
};

#[derive(Debug, Clone, PartialEq)]
pub enum EnrollmentEvent {
    Started,
    StepExecuted(StepExecutedEvent),
    Waiting(WaitingEvent),
    Completed,
    /// Ended by a reply timeout configured to stop.
    Stopped,
    Failed(String),
    Cancelled(String),
}

impl EnrollmentEvent {
    pub fn str(&self) -> &str {
        match self {
            EnrollmentEvent::Started => "Started",
            EnrollmentEvent::StepExecuted(_) => "StepExecuted",
            EnrollmentEvent::Waiting(_) => "Waiting",
            EnrollmentEvent::Completed => "Completed",
            EnrollmentEvent::Stopped => "Stopped",
            EnrollmentEvent::Failed(_) => "Failed",
            EnrollmentEvent::Cancelled(_) => "Cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepExecutedEvent {
    pub index: usize,
    pub step_type: StepType,
    pub status: StepRunStatus,
    pub result: Option<String>,
}

/// Emitted when an enrollment parks on a deadline.
#[derive(Debug, Clone, PartialEq)]
pub struct WaitingEvent {
    pub status: EnrollmentStatus,
    pub until: i64,
}
