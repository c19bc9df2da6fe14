mod enrollment;
mod event;
mod sequence;
mod step_run;

pub use enrollment::Enrollment;
pub use event::Event;
pub use sequence::Sequence;
pub use step_run::StepRun;
