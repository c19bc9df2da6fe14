//! # Leadflow
//!
//! Leadflow is a lightweight, event-driven outreach sequence engine written in Rust.
//! It walks CRM leads through ordered automation scripts: send a message, wait,
//! wait for a reply, classify it, branch, update the lead and take notes.
//!
//! ## Core Features
//!
//! - **Suspendable Enrollments**: Each lead's run is a persisted state machine woken by a scheduler or a reply
//! - **Async Execution**: Powered by `tokio`, with gateways and classifiers as async traits
//! - **Pluggable Storage**: Supports in-memory storage (testing) and PostgreSQL (production)
//! - **Sequence Editor**: A builder model with stable step keys, validation and typed step configs
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use leadflow::{EngineBuilder, SequenceModel};
//!
//! let engine = EngineBuilder::new().leads(leads).build()?;
//! engine.launch();
//!
//! let sequence = engine.create_sequence(&SequenceModel::from_json(json_str)?)?;
//! engine.start_enrollment(&sequence.id, "lead-1")?;
//! ```

mod builder;
pub mod classifier;
mod common;
mod config;
mod dispatcher;
mod engine;
mod error;
pub mod events;
pub mod gateway;
pub mod lead;
mod model;
mod runtime;
pub mod sequence;
mod store;
mod utils;

use std::sync::{Arc, RwLock};

pub use builder::EngineBuilder;
pub use common::Vars;
pub use config::{ClassifierConfig, Config, EvolutionConfig, GatewaysConfig, OpenAiConfig, PostgresConfig, SchedulerConfig, StoreConfig, StoreType, TwilioConfig};
pub use engine::{ENROLLMENT_ALREADY_ACTIVE, Engine, SEQUENCE_INACTIVE, SEQUENCE_NOT_FOUND, SEQUENCE_WITHOUT_STEPS};
pub use error::LeadflowError;
pub use model::*;
pub use runtime::{Channel, ChannelEvent, ChannelOptions, Enrollment, EnrollmentId, EnrollmentStatus, StepRun, StepRunStatus};
pub use sequence::{Direction, SaveError, SequenceBuilder, SequenceService, Step, StepConfig, StepKey};
pub use utils::time::{Clock, ManualClock, SystemClock};

/// Result type alias for Leadflow operations.
pub type Result<T> = std::result::Result<T, LeadflowError>;

/// Thread-safe shared lock wrapper using Arc<RwLock<T>>.
pub(crate) type ShareLock<T> = Arc<RwLock<T>>;
