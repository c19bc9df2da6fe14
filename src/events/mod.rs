//! Event types for enrollment execution.
//!
//! Events are emitted while an enrollment walks its sequence to notify
//! subscribers about step executions, waits and terminal outcomes.

mod enrollment;

pub use enrollment::*;

use crate::runtime::EnrollmentId;

/// Generic event wrapper.
#[derive(Debug, Clone)]
pub struct Event<T> {
    inner: T,
}

/// Event message carrying the enrollment context.
#[derive(Debug, Clone)]
pub struct Message {
    /// Enrollment that generated this event.
    pub eid: EnrollmentId,
    /// Sequence the enrollment runs.
    pub sid: String,
    /// Enrolled lead.
    pub lead_id: String,
    /// The actual event data.
    pub event: EnrollmentEvent,
}

impl<T> std::ops::Deref for Event<T>
where
    T: std::fmt::Debug + Clone,
{
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T> Event<T>
where
    T: std::fmt::Debug + Clone,
{
    pub fn new(inner: &T) -> Self {
        Self {
            inner: inner.clone(),
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl EnrollmentEvent {
    /// Finished without error, either through the last step or a stop on timeout.
    pub fn is_complete(&self) -> bool {
        matches!(self, EnrollmentEvent::Completed | EnrollmentEvent::Stopped)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, EnrollmentEvent::Failed(_))
    }

    pub fn is_terminal(&self) -> bool {
        self.is_complete() || self.is_error() || matches!(self, EnrollmentEvent::Cancelled(_))
    }
}
