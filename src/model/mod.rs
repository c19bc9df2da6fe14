mod lead;
mod sequence;

pub use lead::{Lead, LeadStatus, TimelineNote};
pub use sequence::{SequenceModel, StepModel, StepType};
