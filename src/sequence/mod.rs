//! Sequence definitions: step configs, templates, the editor model and
//! the per-step actions the engine runs.

pub(crate) mod actions;
pub mod config;
mod editor;
mod snapshot;
mod service;
pub mod template;

pub use config::StepConfig;
pub use editor::{Direction, SERVICE_ERROR_MESSAGE, SaveError, SequenceBuilder, Step, StepKey};
pub use snapshot::{Sequence, SequenceStep};
pub use service::SequenceService;
