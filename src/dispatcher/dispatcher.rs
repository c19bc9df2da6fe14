//! Enrollment dispatcher.
//!
//! The dispatcher is responsible for:
//! - Claiming an enrollment so only one task walks it at a time
//! - Evaluating steps until the enrollment suspends or ends
//! - Applying step transitions and persisting after every step
//! - Publishing enrollment events once the state is durable

use std::{sync::Arc, time::Duration};

use tracing::{debug, error, info, warn};

use crate::{
    LeadflowError, Result,
    common::MemCache,
    dispatcher::InFlight,
    events::{EnrollmentEvent, StepExecutedEvent, WaitingEvent},
    model::StepType,
    runtime::{Context, Enrollment, EnrollmentId, EnrollmentStatus},
    sequence::{
        Sequence,
        actions::{self, ActionOutput, StepInput, Transition, consts::CLASSIFICATION_KEY},
    },
    store::Store,
};

/// Attempts to claim a busy enrollment before giving up on a reply or cancel.
const CLAIM_ATTEMPTS: usize = 50;
const CLAIM_RETRY_INTERVAL: Duration = Duration::from_millis(20);

/// Walks enrollments through their sequences.
pub struct Dispatcher {
    /// Collaborators for step evaluation.
    ctx: Arc<Context>,
    /// Persistent storage for sequences and enrollments.
    store: Arc<Store>,
    /// Enrollments currently being walked.
    in_flight: Arc<MemCache<EnrollmentId, i64>>,
    /// Step evaluations allowed per wake.
    max_steps_per_wake: usize,
}

impl Dispatcher {
    pub fn new(
        ctx: Arc<Context>,
        store: Arc<Store>,
        max_steps_per_wake: usize,
    ) -> Self {
        Self {
            ctx,
            store,
            in_flight: Arc::new(MemCache::new()),
            max_steps_per_wake,
        }
    }

    pub fn ctx(&self) -> &Context {
        &self.ctx
    }

    /// Advance a due enrollment. Returns `false` when it is busy or not due.
    pub async fn process(
        &self,
        eid: &str,
    ) -> Result<bool> {
        let Some(_guard) = InFlight::claim(&self.in_flight, eid, self.ctx.now()) else {
            debug!("enrollment {} already in flight", eid);
            return Ok(false);
        };

        let mut enrollment = self.store.load_enrollment(eid)?;
        if !is_runnable(&enrollment, false, self.ctx.now()) {
            return Ok(false);
        }
        self.walk(&mut enrollment, None).await?;
        Ok(true)
    }

    /// Deliver a reply to an enrollment parked on `WaitingReply` and resume it.
    ///
    /// Returns `false` when the enrollment is no longer waiting for a reply.
    pub async fn reply(
        &self,
        eid: &str,
        text: &str,
    ) -> Result<bool> {
        let _guard = self.claim_blocking(eid).await?;

        let mut enrollment = self.store.load_enrollment(eid)?;
        if enrollment.status != EnrollmentStatus::WaitingReply {
            return Ok(false);
        }
        let now = self.ctx.now();
        enrollment.last_reply = Some(text.to_string());
        enrollment.updated_at = now;
        info!("enrollment {} received a reply", eid);

        self.walk(&mut enrollment, Some(text)).await?;
        Ok(true)
    }

    /// Cancel an enrollment. Ended enrollments are left untouched.
    pub async fn cancel(
        &self,
        eid: &str,
        reason: &str,
    ) -> Result<bool> {
        let _guard = self.claim_blocking(eid).await?;

        let mut enrollment = self.store.load_enrollment(eid)?;
        if enrollment.status.is_terminal() {
            return Ok(false);
        }
        enrollment.cancel(reason, self.ctx.now());
        self.store.save_enrollment(&mut enrollment)?;
        info!("enrollment {} cancelled: {}", eid, reason);
        self.ctx.emit(&enrollment, EnrollmentEvent::Cancelled(reason.to_string()));
        Ok(true)
    }

    async fn claim_blocking(
        &self,
        eid: &str,
    ) -> Result<InFlight> {
        for _ in 0..CLAIM_ATTEMPTS {
            if let Some(guard) = InFlight::claim(&self.in_flight, eid, self.ctx.now()) {
                return Ok(guard);
            }
            tokio::time::sleep(CLAIM_RETRY_INTERVAL).await;
        }
        Err(LeadflowError::Enrollment(format!("enrollment '{}' is busy", eid)))
    }

    /// Evaluate steps until the enrollment suspends, ends or hits the step guard.
    async fn walk(
        &self,
        enrollment: &mut Enrollment,
        mut reply: Option<&str>,
    ) -> Result<()> {
        let sequence = match self.load_sequence(&enrollment.sequence_id)? {
            Some(sequence) if sequence.active => sequence,
            Some(_) => return self.end(enrollment, EnrollmentEvent::Cancelled("sequence is inactive".to_string())),
            None => return self.end(enrollment, EnrollmentEvent::Cancelled("sequence not found".to_string())),
        };

        let mut steps = 0;
        loop {
            let now = self.ctx.now();
            if !is_runnable(enrollment, reply.is_some(), now) {
                return Ok(());
            }

            let index = enrollment.current_step_index;
            let Some(step) = sequence.step(index) else {
                return self.end(enrollment, EnrollmentEvent::Completed);
            };

            if steps >= self.max_steps_per_wake {
                let reason = format!("exceeded {} steps in one wake", self.max_steps_per_wake);
                return self.end(enrollment, EnrollmentEvent::Failed(reason));
            }
            steps += 1;

            let lead = match self.ctx.leads().find(&enrollment.lead_id).await {
                Ok(lead) => lead,
                Err(e) => return self.end(enrollment, EnrollmentEvent::Failed(e.to_string())),
            };

            let action = actions::build(&step.config);
            let input = StepInput {
                enrollment: &*enrollment,
                lead: &lead,
                sequence: &sequence,
                reply,
            };
            let result = action.run(&self.ctx, &input).await;
            let output = match result {
                Ok(output) => output,
                Err(e) => return self.end(enrollment, EnrollmentEvent::Failed(e.to_string())),
            };
            reply = None;

            let events = self.apply(enrollment, index, action.step_type(), output);
            self.store.save_enrollment(enrollment)?;
            for event in events {
                self.ctx.emit(enrollment, event);
            }
        }
    }

    /// Apply one step outcome to the enrollment, returning the events to publish.
    fn apply(
        &self,
        enrollment: &mut Enrollment,
        index: usize,
        step_type: StepType,
        output: ActionOutput,
    ) -> Vec<EnrollmentEvent> {
        let now = self.ctx.now();
        let mut events = Vec::new();

        if let Some(classification) = output.outputs.get_text(CLASSIFICATION_KEY) {
            enrollment.last_classification = Some(classification);
        }

        if let Some((status, result)) = output.record {
            info!("enrollment {} step {} {:?}: {}", enrollment.id, index + 1, status, result.as_deref().unwrap_or_default());
            enrollment.add_step_run(index, status, result.clone(), now);
            events.push(EnrollmentEvent::StepExecuted(StepExecutedEvent {
                index,
                step_type,
                status,
                result,
            }));
        }

        match output.transition {
            Transition::Next => {
                enrollment.advance_to(index + 1, now);
                enrollment.set_running(now);
            }
            Transition::Goto(target) => {
                enrollment.advance_to(target, now);
                enrollment.set_running(now);
            }
            Transition::WaitDelay(until) => {
                enrollment.set_waiting_delay(until, now);
                events.push(EnrollmentEvent::Waiting(WaitingEvent {
                    status: EnrollmentStatus::WaitingDelay,
                    until,
                }));
            }
            Transition::WaitReply(until) => {
                enrollment.set_waiting_reply(until, now);
                events.push(EnrollmentEvent::Waiting(WaitingEvent {
                    status: EnrollmentStatus::WaitingReply,
                    until,
                }));
            }
            Transition::Finish(EnrollmentStatus::Stopped) => {
                enrollment.stop(now);
                info!("enrollment {} stopped", enrollment.id);
                events.push(EnrollmentEvent::Stopped);
            }
            Transition::Finish(_) => {
                enrollment.complete(now);
                info!("enrollment {} completed", enrollment.id);
                events.push(EnrollmentEvent::Completed);
            }
            Transition::Fail(reason) => {
                warn!("enrollment {} send failed: {}", enrollment.id, reason);
                enrollment.fail(&reason, now);
                events.push(EnrollmentEvent::Failed(reason));
            }
        }
        events
    }

    /// Move the enrollment to the terminal state carried by `event`, persist and publish.
    fn end(
        &self,
        enrollment: &mut Enrollment,
        event: EnrollmentEvent,
    ) -> Result<()> {
        let now = self.ctx.now();
        match &event {
            EnrollmentEvent::Completed => {
                enrollment.complete(now);
                info!("enrollment {} completed", enrollment.id);
            }
            EnrollmentEvent::Cancelled(reason) => {
                enrollment.cancel(reason, now);
                info!("enrollment {} cancelled: {}", enrollment.id, reason);
            }
            EnrollmentEvent::Failed(reason) => {
                enrollment.fail(reason, now);
                error!("enrollment {} failed: {}", enrollment.id, reason);
            }
            _ => {}
        }
        self.store.save_enrollment(enrollment)?;
        self.ctx.emit(enrollment, event);
        Ok(())
    }

    fn load_sequence(
        &self,
        sid: &str,
    ) -> Result<Option<Sequence>> {
        if !self.store.sequences().exists(sid)? {
            return Ok(None);
        }
        let model = self.store.load_sequence_model(sid)?;
        Sequence::try_from(&model).map(Some)
    }
}

/// Whether a walk may evaluate the current step at `now`.
fn is_runnable(
    enrollment: &Enrollment,
    has_reply: bool,
    now: i64,
) -> bool {
    match enrollment.status {
        EnrollmentStatus::Running => true,
        EnrollmentStatus::WaitingDelay => enrollment.is_due(now),
        EnrollmentStatus::WaitingReply => has_reply || enrollment.is_due(now),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::{
        classifier::FallbackClassifier,
        gateway::Gateways,
        lead::MemLeadDirectory,
        model::{Lead, SequenceModel, StepModel, StepType},
        runtime::{Channel, ChannelEvent, ChannelOptions, StepRunStatus},
        store::{DbStore, MemStore},
        utils::time::{HOUR_MILLIS, ManualClock},
    };

    const NOW: i64 = 10_000;

    struct Harness {
        runtime: Arc<tokio::runtime::Runtime>,
        store: Arc<Store>,
        clock: Arc<ManualClock>,
        dispatcher: Dispatcher,
        events: Arc<Mutex<Vec<String>>>,
    }

    fn harness(max_steps: usize) -> Harness {
        let runtime = Arc::new(tokio::runtime::Runtime::new().unwrap());
        let store = Store::new();
        MemStore::new().init(&store).unwrap();
        let store = Arc::new(store);

        let leads = Arc::new(MemLeadDirectory::new());
        leads.insert(Lead {
            id: "l1".to_string(),
            razao_social: "Padaria Sol LTDA".to_string(),
            ..Default::default()
        });
        let clock = Arc::new(ManualClock::new(NOW));
        let channel = Arc::new(Channel::new(runtime.clone()));

        let events = Arc::new(Mutex::new(Vec::new()));
        let seen = events.clone();
        ChannelEvent::channel(channel.clone(), ChannelOptions::default()).unwrap().on_event(move |e| {
            seen.lock().unwrap().push(e.event.str().to_string());
        });
        channel.listen();

        let ctx = Arc::new(Context::new(Arc::new(Gateways::new()), Arc::new(FallbackClassifier), leads, clock.clone(), channel));
        let dispatcher = Dispatcher::new(ctx, store.clone(), max_steps);
        Harness {
            runtime,
            store,
            clock,
            dispatcher,
            events,
        }
    }

    fn save_sequence(
        store: &Store,
        steps: &[(StepType, &str)],
    ) {
        let model = SequenceModel {
            id: "s1".to_string(),
            name: "seq".to_string(),
            description: None,
            active: true,
            steps: steps
                .iter()
                .enumerate()
                .map(|(i, (step_type, config))| StepModel {
                    order: i as u32 + 1,
                    step_type: *step_type,
                    config: Some(config.to_string()),
                })
                .collect(),
            execution_count: 0,
        };
        store.save_sequence(&model, NOW).unwrap();
    }

    fn enroll(store: &Store) -> EnrollmentId {
        let mut enrollment = Enrollment::new("s1", "l1", NOW);
        enrollment.start(NOW);
        store.save_enrollment(&mut enrollment).unwrap();
        enrollment.id
    }

    #[test]
    fn test_walk_to_completion() {
        let h = harness(100);
        save_sequence(&h.store, &[(StepType::AddNote, "{}"), (StepType::UpdateStatus, r#"{"status":2}"#)]);
        let eid = enroll(&h.store);

        assert!(h.runtime.block_on(h.dispatcher.process(&eid)).unwrap());
        let enrollment = h.store.load_enrollment(&eid).unwrap();
        assert_eq!(enrollment.status, EnrollmentStatus::Completed);
        assert_eq!(enrollment.current_step_index, 2);
        assert_eq!(enrollment.step_runs.len(), 2);
        assert!(enrollment.step_runs.iter().all(|r| r.status == StepRunStatus::Executed));

        // ended enrollments are not walked again
        assert!(!h.runtime.block_on(h.dispatcher.process(&eid)).unwrap());

        h.runtime.block_on(async { tokio::time::sleep(Duration::from_millis(100)).await });
        assert_eq!(*h.events.lock().unwrap(), vec!["StepExecuted", "StepExecuted", "Completed"]);
    }

    #[test]
    fn test_wait_resumes_after_deadline() {
        let h = harness(100);
        save_sequence(&h.store, &[(StepType::Wait, r#"{"hours":2}"#), (StepType::AddNote, "{}")]);
        let eid = enroll(&h.store);

        h.runtime.block_on(h.dispatcher.process(&eid)).unwrap();
        let enrollment = h.store.load_enrollment(&eid).unwrap();
        assert_eq!(enrollment.status, EnrollmentStatus::WaitingDelay);
        assert_eq!(enrollment.next_action_at, Some(NOW + 2 * HOUR_MILLIS));

        h.clock.advance_hours(1);
        assert!(!h.runtime.block_on(h.dispatcher.process(&eid)).unwrap());

        h.clock.advance_hours(1);
        assert!(h.runtime.block_on(h.dispatcher.process(&eid)).unwrap());
        let enrollment = h.store.load_enrollment(&eid).unwrap();
        assert_eq!(enrollment.status, EnrollmentStatus::Completed);
        assert_eq!(enrollment.step_runs.len(), 2);
    }

    #[test]
    fn test_reply_resumes_waiting_enrollment() {
        let h = harness(100);
        save_sequence(&h.store, &[(StepType::WaitForReply, "{}"), (StepType::ClassifyResponse, "{}")]);
        let eid = enroll(&h.store);

        h.runtime.block_on(h.dispatcher.process(&eid)).unwrap();
        assert_eq!(h.store.load_enrollment(&eid).unwrap().status, EnrollmentStatus::WaitingReply);

        assert!(h.runtime.block_on(h.dispatcher.reply(&eid, "quanto custa?")).unwrap());
        let enrollment = h.store.load_enrollment(&eid).unwrap();
        assert_eq!(enrollment.status, EnrollmentStatus::Completed);
        assert_eq!(enrollment.last_reply.as_deref(), Some("quanto custa?"));
        assert_eq!(enrollment.last_classification.as_deref(), Some("curioso"));
        assert_eq!(enrollment.step_runs[0].result.as_deref(), Some("reply received"));

        // no longer waiting
        assert!(!h.runtime.block_on(h.dispatcher.reply(&eid, "oi")).unwrap());
    }

    #[test]
    fn test_step_guard_fails_loops() {
        let h = harness(5);
        save_sequence(&h.store, &[(StepType::Condition, r#"{"field":"classification","branches":[{"value":"default","label":"loop","goToStep":1}]}"#)]);
        let eid = enroll(&h.store);

        h.runtime.block_on(h.dispatcher.process(&eid)).unwrap();
        let enrollment = h.store.load_enrollment(&eid).unwrap();
        assert_eq!(enrollment.status, EnrollmentStatus::Failed);
        assert_eq!(enrollment.step_runs.len(), 5);
        assert!(enrollment.error.unwrap().contains("5 steps"));
    }

    #[test]
    fn test_missing_lead_fails() {
        let h = harness(100);
        save_sequence(&h.store, &[(StepType::AddNote, "{}")]);
        let mut enrollment = Enrollment::new("s1", "ghost", NOW);
        enrollment.start(NOW);
        h.store.save_enrollment(&mut enrollment).unwrap();

        h.runtime.block_on(h.dispatcher.process(&enrollment.id)).unwrap();
        let enrollment = h.store.load_enrollment(&enrollment.id).unwrap();
        assert_eq!(enrollment.status, EnrollmentStatus::Failed);
        assert!(enrollment.step_runs.is_empty());
    }

    #[test]
    fn test_inactive_sequence_cancels() {
        let h = harness(100);
        save_sequence(&h.store, &[(StepType::AddNote, "{}")]);
        let mut model = h.store.load_sequence_model("s1").unwrap();
        model.active = false;
        h.store.save_sequence(&model, NOW).unwrap();
        let eid = enroll(&h.store);

        h.runtime.block_on(h.dispatcher.process(&eid)).unwrap();
        let enrollment = h.store.load_enrollment(&eid).unwrap();
        assert_eq!(enrollment.status, EnrollmentStatus::Cancelled);
        assert_eq!(enrollment.error.as_deref(), Some("sequence is inactive"));
    }

    #[test]
    fn test_cancel() {
        let h = harness(100);
        save_sequence(&h.store, &[(StepType::Wait, "{}")]);
        let eid = enroll(&h.store);
        h.runtime.block_on(h.dispatcher.process(&eid)).unwrap();

        assert!(h.runtime.block_on(h.dispatcher.cancel(&eid, "manual")).unwrap());
        assert_eq!(h.store.load_enrollment(&eid).unwrap().status, EnrollmentStatus::Cancelled);
        assert!(!h.runtime.block_on(h.dispatcher.cancel(&eid, "again")).unwrap());
    }

    #[test]
    fn test_busy_enrollment_is_skipped() {
        let h = harness(100);
        save_sequence(&h.store, &[(StepType::AddNote, "{}")]);
        let eid = enroll(&h.store);

        let guard = InFlight::claim(&h.dispatcher.in_flight, &eid, NOW);
        assert!(!h.runtime.block_on(h.dispatcher.process(&eid)).unwrap());
        drop(guard);
        assert!(h.runtime.block_on(h.dispatcher.process(&eid)).unwrap());
    }
}
