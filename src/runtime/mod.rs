mod channel;
mod context;
mod enrollment;

pub use channel::{Channel, ChannelEvent, ChannelOptions};
pub use context::Context;
pub use enrollment::{Enrollment, EnrollmentId, EnrollmentStatus, StepRun, StepRunStatus};
