//! Sequence engine - the main entry point for Leadflow.
//!
//! The engine manages sequences and the enrollments walking them, including:
//! - Creating, updating, toggling and deleting sequence definitions
//! - Starting, cancelling and resuming enrollments
//! - Running the scheduler, the event channel and the event log
//! - Graceful shutdown coordination

mod monitor;
mod scheduler;

use std::{
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::runtime::Runtime;
use tracing::{info, warn};

use crate::{
    Config, LeadflowError, Result, StoreType,
    classifier::ResponseClassifier,
    common::Shutdown,
    dispatcher::Dispatcher,
    events::EnrollmentEvent,
    gateway::Gateways,
    lead::LeadDirectory,
    model::{SequenceModel, StepModel},
    runtime::{Channel, Context, Enrollment, EnrollmentId},
    sequence::{SequenceService, StepConfig},
    store::{DbStore, MemStore, PostgresStore, Store},
    utils::{self, time::Clock},
};

use monitor::Monitor;
use scheduler::Scheduler;

/// Number of enrollments returned by `list_enrollments`.
const ENROLLMENT_LIST_LIMIT: usize = 100;

pub const SEQUENCE_NOT_FOUND: &str = "Sequência não encontrada.";
pub const SEQUENCE_INACTIVE: &str = "Sequência está desativada.";
pub const SEQUENCE_WITHOUT_STEPS: &str = "Sequência não possui steps.";
pub const ENROLLMENT_ALREADY_ACTIVE: &str = "Já existe uma execução ativa para este lead nesta sequência.";

/// The main sequence engine.
///
/// Engine is the central coordinator for Leadflow, responsible for:
/// - Managing the tokio runtime for async execution
/// - Coordinating the event channel for pub/sub messaging
/// - Storing sequence definitions and enrollment state
/// - Scheduling enrollments whose deadlines have passed
///
/// # Example
///
/// ```rust,ignore
/// let engine = EngineBuilder::new().leads(leads).build()?;
/// engine.launch();
///
/// let sequence = engine.create_sequence(&model)?;
/// let enrollment = engine.start_enrollment(&sequence.id, "lead-1")?;
///
/// // later, when the lead answers
/// engine.record_reply("lead-1", "Tenho interesse")?;
///
/// engine.shutdown();
/// ```
pub struct Engine {
    /// Collaborators shared by every step evaluation.
    ctx: Arc<Context>,
    /// Event channel for broadcasting enrollment events.
    channel: Arc<Channel>,
    /// Persistent storage for sequences and enrollments.
    store: Arc<Store>,
    /// Background monitor for event persistence.
    monitor: Monitor,
    /// Walks enrollments.
    dispatcher: Arc<Dispatcher>,
    /// Polls due enrollments and consumes the wake queue.
    scheduler: Scheduler,
    /// Serializes the duplicate check and the insert of new enrollments.
    enrolling: Mutex<()>,

    /// Flag indicating if the engine is running.
    running: Arc<AtomicBool>,
    /// Tokio runtime for async task execution.
    runtime: Arc<Runtime>,
    /// Shutdown coordinator for graceful termination.
    shutdown: Arc<Shutdown>,
}

impl Engine {
    /// Creates a new engine.
    ///
    /// This initializes:
    /// - The storage backend (memory or PostgreSQL)
    /// - The event channel and monitor
    /// - The dispatcher and scheduler
    pub(crate) fn new(
        config: &Config,
        runtime: Arc<Runtime>,
        gateways: Arc<Gateways>,
        classifier: Arc<dyn ResponseClassifier>,
        leads: Arc<dyn LeadDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let store = Store::new();
        let db: Box<dyn DbStore> = match config.store.store_type {
            StoreType::Mem => Box::new(MemStore::new()),
            StoreType::Postgres => {
                let postgres = config.store.postgres.as_ref().ok_or_else(|| LeadflowError::Config("Postgres configuration is required when store type is Postgres".to_string()))?;
                Box::new(PostgresStore::new(&postgres.database_url, runtime.clone())?)
            }
        };
        db.init(&store)?;
        let store = Arc::new(store);

        let channel = Arc::new(Channel::new(runtime.clone()));
        let ctx = Arc::new(Context::new(gateways, classifier, leads, clock, channel.clone()));
        let shutdown = Arc::new(Shutdown::new());

        let monitor = Monitor::new(store.clone(), ctx.clone(), runtime.clone(), shutdown.clone());
        let dispatcher = Arc::new(Dispatcher::new(ctx.clone(), store.clone(), config.scheduler.max_steps_per_wake));
        let scheduler = Scheduler::new(
            dispatcher.clone(),
            store.clone(),
            Duration::from_secs(config.scheduler.poll_interval_secs.max(1)),
            runtime.clone(),
            shutdown.clone(),
        );

        Ok(Self {
            ctx,
            channel,
            store,
            monitor,
            dispatcher,
            scheduler,
            enrolling: Mutex::new(()),
            running: Arc::new(AtomicBool::new(false)),
            runtime,
            shutdown,
        })
    }

    /// Starts the engine and begins processing events.
    ///
    /// This method:
    /// - Starts the event monitor for persistence
    /// - Begins listening on the event channel
    /// - Starts the scheduler's poll and wake tasks
    pub fn launch(&self) {
        if self.running.swap(true, Ordering::Relaxed) {
            return;
        }

        // Subscribe the monitor before listening so no event is missed
        self.monitor.monitor();
        self.channel.listen();
        self.scheduler.start();
        info!("engine launched");
    }

    /// Gracefully shuts down the engine.
    ///
    /// Background tasks stop; enrollment state stays in the store and is
    /// resumed by the next launch.
    pub fn shutdown(&self) {
        if !self.running.swap(false, Ordering::Relaxed) {
            return;
        }

        self.shutdown.shutdown();
        self.channel.shutdown();
        info!("engine shut down");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Walk every due enrollment once. Returns how many were advanced.
    pub fn tick(&self) -> Result<usize> {
        utils::block_on(&self.runtime, self.scheduler.run_due())
    }

    /// Returns a reference to the event channel.
    pub fn channel(&self) -> Arc<Channel> {
        self.channel.clone()
    }

    // ==================== sequences ====================

    /// All sequences, newest first, with their active enrollment counts.
    pub fn list_sequences(&self) -> Result<Vec<SequenceModel>> {
        let mut models = self.store.list_sequence_models()?;
        for model in models.iter_mut() {
            model.execution_count = self.store.count_active_enrollments(&model.id)?;
        }
        Ok(models)
    }

    pub fn get_sequence(
        &self,
        id: &str,
    ) -> Result<SequenceModel> {
        if !self.store.sequences().exists(id)? {
            return Err(LeadflowError::Sequence(SEQUENCE_NOT_FOUND.to_string()));
        }
        let mut model = self.store.load_sequence_model(id)?;
        model.execution_count = self.store.count_active_enrollments(id)?;
        Ok(model)
    }

    /// Store a new sequence. An empty id is replaced by a fresh one.
    pub fn create_sequence(
        &self,
        model: &SequenceModel,
    ) -> Result<SequenceModel> {
        validate(model)?;
        let mut model = model.clone();
        if model.id.is_empty() {
            model.id = utils::guid();
        }
        model.execution_count = 0;
        self.store.save_sequence(&model, self.ctx.now())?;
        info!("sequence {} created with {} steps", model.id, model.steps.len());
        Ok(model)
    }

    /// Replace name, description, active flag and all steps of `id`.
    pub fn update_sequence(
        &self,
        id: &str,
        model: &SequenceModel,
    ) -> Result<SequenceModel> {
        if !self.store.sequences().exists(id)? {
            return Err(LeadflowError::Sequence(SEQUENCE_NOT_FOUND.to_string()));
        }
        validate(model)?;
        let mut model = model.clone();
        model.id = id.to_string();
        self.store.save_sequence(&model, self.ctx.now())?;
        info!("sequence {} updated with {} steps", id, model.steps.len());

        model.execution_count = self.store.count_active_enrollments(id)?;
        Ok(model)
    }

    /// Delete a sequence after cancelling its active enrollments.
    pub fn delete_sequence(
        &self,
        id: &str,
    ) -> Result<bool> {
        for eid in self.store.active_enrollments(Some(id), None)? {
            utils::block_on(&self.runtime, self.dispatcher.cancel(&eid, "sequence deleted"))?;
        }
        let deleted = self.store.delete_sequence(id)?;
        if deleted {
            info!("sequence {} deleted", id);
        }
        Ok(deleted)
    }

    /// Flip the active flag. Inactive sequences accept no enrollments and
    /// cancel running ones on their next wake.
    pub fn toggle_active(
        &self,
        id: &str,
    ) -> Result<SequenceModel> {
        let mut model = self.get_sequence(id)?;
        model.active = !model.active;
        self.store.save_sequence(&model, self.ctx.now())?;
        info!("sequence {} is now {}", id, if model.active { "active" } else { "inactive" });
        Ok(model)
    }

    // ==================== enrollments ====================

    /// Enroll a lead into a sequence and queue its first walk.
    pub fn start_enrollment(
        &self,
        sequence_id: &str,
        lead_id: &str,
    ) -> Result<Enrollment> {
        if !self.store.sequences().exists(sequence_id)? {
            return Err(LeadflowError::Enrollment(SEQUENCE_NOT_FOUND.to_string()));
        }
        let model = self.store.load_sequence_model(sequence_id)?;
        if !model.active {
            return Err(LeadflowError::Enrollment(SEQUENCE_INACTIVE.to_string()));
        }
        if model.steps.is_empty() {
            return Err(LeadflowError::Enrollment(SEQUENCE_WITHOUT_STEPS.to_string()));
        }

        let now = self.ctx.now();
        let mut enrollment = Enrollment::new(sequence_id, lead_id, now);
        enrollment.start(now);
        {
            let _enrolling = self.enrolling.lock().unwrap_or_else(PoisonError::into_inner);
            if !self.store.active_enrollments(Some(sequence_id), Some(lead_id))?.is_empty() {
                return Err(LeadflowError::Enrollment(ENROLLMENT_ALREADY_ACTIVE.to_string()));
            }
            self.store.save_enrollment(&mut enrollment)?;
        }
        info!("lead {} enrolled in sequence {} as {}", lead_id, sequence_id, enrollment.id);
        self.ctx.emit(&enrollment, EnrollmentEvent::Started);

        if self.is_running() {
            self.scheduler.wake(&enrollment.id);
        }
        Ok(enrollment)
    }

    /// Enroll many leads. Leads that cannot be enrolled are skipped with a warning.
    pub fn start_bulk<I, S>(
        &self,
        sequence_id: &str,
        lead_ids: I,
    ) -> Vec<Enrollment>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut enrollments = Vec::new();
        for lead_id in lead_ids {
            match self.start_enrollment(sequence_id, lead_id.as_ref()) {
                Ok(enrollment) => enrollments.push(enrollment),
                Err(e) => warn!("skipping lead {} for sequence {}: {}", lead_id.as_ref(), sequence_id, e),
            }
        }
        enrollments
    }

    /// Cancel an enrollment. Returns `false` when it had already ended.
    pub fn cancel_enrollment(
        &self,
        id: &str,
    ) -> Result<bool> {
        utils::block_on(&self.runtime, self.dispatcher.cancel(id, "cancelled by user"))
    }

    /// Deliver a lead's reply to every enrollment of the lead waiting for one.
    ///
    /// Returns the number of enrollments resumed.
    pub fn record_reply(
        &self,
        lead_id: &str,
        text: &str,
    ) -> Result<usize> {
        let mut resumed = 0;
        for eid in self.store.waiting_reply_enrollments(lead_id)? {
            match utils::block_on(&self.runtime, self.dispatcher.reply(&eid, text)) {
                Ok(true) => resumed += 1,
                Ok(false) => {}
                Err(e) => warn!("failed to deliver reply to enrollment {}: {}", eid, e),
            }
        }
        Ok(resumed)
    }

    pub fn get_enrollment(
        &self,
        id: &EnrollmentId,
    ) -> Result<Enrollment> {
        self.store.load_enrollment(id)
    }

    /// Newest enrollments with their step runs, optionally for one sequence.
    pub fn list_enrollments(
        &self,
        sequence_id: Option<&str>,
    ) -> Result<Vec<Enrollment>> {
        self.store.list_enrollments(sequence_id, ENROLLMENT_LIST_LIMIT)
    }
}

#[async_trait]
impl SequenceService for Engine {
    async fn get_sequence(
        &self,
        id: &str,
    ) -> Result<SequenceModel> {
        Engine::get_sequence(self, id)
    }

    async fn create_sequence(
        &self,
        model: &SequenceModel,
    ) -> Result<SequenceModel> {
        Engine::create_sequence(self, model)
    }

    async fn update_sequence(
        &self,
        id: &str,
        model: &SequenceModel,
    ) -> Result<SequenceModel> {
        Engine::update_sequence(self, id, model)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Reject models the engine cannot run; config problems are only logged.
fn validate(model: &SequenceModel) -> Result<()> {
    if model.name.trim().is_empty() {
        return Err(LeadflowError::Sequence("sequence name is required".to_string()));
    }
    if !model.has_dense_orders() {
        return Err(LeadflowError::Sequence("step orders must run from 1 to the number of steps".to_string()));
    }
    for StepModel {
        order,
        step_type,
        config,
    } in model.steps.iter()
    {
        for warning in StepConfig::lint(*step_type, config.as_deref()) {
            warn!("sequence '{}' step {}: {}", model.name, order, warning);
        }
    }
    Ok(())
}
