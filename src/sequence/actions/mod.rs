//! Per-step behaviour.
//!
//! Each step type has a [`StepAction`] that looks at the enrollment and
//! returns an [`ActionOutput`]: the run to record and the [`Transition`]
//! the dispatcher applies. Actions never mutate the enrollment themselves.

pub mod consts;

mod add_note;
mod classify_response;
mod condition;
mod send_message;
mod update_status;
mod wait;
mod wait_for_reply;

use async_trait::async_trait;

use crate::{
    Result,
    common::Vars,
    model::{Lead, StepType},
    runtime::{Context, Enrollment, EnrollmentStatus, StepRunStatus},
    sequence::{Sequence, StepConfig},
};

pub use add_note::AddNoteAction;
pub use classify_response::ClassifyResponseAction;
pub use condition::ConditionAction;
pub use send_message::SendMessageAction;
pub use update_status::UpdateStatusAction;
pub use wait::WaitAction;
pub use wait_for_reply::WaitForReplyAction;

use consts::*;

/// What the dispatcher does with the enrollment after a step.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Advance to the following step.
    Next,
    /// Jump to the step at this position.
    Goto(usize),
    /// Park in `WaitingDelay` until the deadline.
    WaitDelay(i64),
    /// Park in `WaitingReply` until a reply or the deadline.
    WaitReply(i64),
    /// End with a terminal status.
    Finish(EnrollmentStatus),
    /// End as failed with the reason.
    Fail(String),
}

/// Output returned by a step action.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutput {
    pub transition: Transition,
    /// Step run to record, if the step produced one.
    pub record: Option<(StepRunStatus, Option<String>)>,
    /// Values the dispatcher copies onto the enrollment (e.g. the classification).
    pub outputs: Vars,
}

impl ActionOutput {
    pub fn new(
        transition: Transition,
        record: Option<(StepRunStatus, Option<String>)>,
    ) -> Self {
        Self {
            transition,
            record,
            outputs: Vars::new(),
        }
    }

    /// Record an executed run and advance.
    pub fn executed(result: Option<String>) -> Self {
        Self::new(Transition::Next, Some((StepRunStatus::Executed, result)))
    }

    pub fn with_outputs(
        mut self,
        outputs: Vars,
    ) -> Self {
        self.outputs = outputs;
        self
    }
}

/// Everything a step may look at.
#[derive(Debug)]
pub struct StepInput<'a> {
    pub enrollment: &'a Enrollment,
    pub lead: &'a Lead,
    pub sequence: &'a Sequence,
    /// Reply delivered with this wake, if any.
    pub reply: Option<&'a str>,
}

impl StepInput<'_> {
    /// Lead snapshot plus `classification` and `lastReply` when known.
    pub fn vars(&self) -> Vars {
        let mut vars = self.lead.vars();
        if let Some(classification) = &self.enrollment.last_classification {
            vars.set(CLASSIFICATION_KEY, classification.as_str());
        }
        if let Some(reply) = &self.enrollment.last_reply {
            vars.set(LAST_REPLY_KEY, reply.as_str());
        }
        vars
    }
}

#[async_trait]
pub trait StepAction: Send + Sync {
    fn step_type(&self) -> StepType;

    async fn run(
        &self,
        ctx: &Context,
        input: &StepInput<'_>,
    ) -> Result<ActionOutput>;
}

/// Action for a decoded step config.
pub fn build(config: &StepConfig) -> Box<dyn StepAction> {
    match config {
        StepConfig::SendMessage(c) => Box::new(SendMessageAction::new(c.clone())),
        StepConfig::WaitForReply(c) => Box::new(WaitForReplyAction::new(c.clone())),
        StepConfig::Wait(c) => Box::new(WaitAction::new(c.clone())),
        StepConfig::ClassifyResponse => Box::new(ClassifyResponseAction),
        StepConfig::UpdateStatus(c) => Box::new(UpdateStatusAction::new(c.clone())),
        StepConfig::AddNote(c) => Box::new(AddNoteAction::new(c.clone())),
        StepConfig::Condition(c) => Box::new(ConditionAction::new(c.clone())),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    //! Fixtures shared by the action tests.

    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use crate::{
        classifier::{ClassificationResult, ResponseClassifier},
        gateway::{Gateways, MessageGateway, SendResult},
        lead::MemLeadDirectory,
        model::{Lead, SequenceModel, StepModel, StepType},
        runtime::{Channel, Context},
        sequence::{Sequence, config::MessageChannel},
        utils::time::ManualClock,
    };

    pub const NOW: i64 = 1_000_000;

    #[derive(Default)]
    pub struct RecordingGateway {
        pub sent: Mutex<Vec<(MessageChannel, String, String)>>,
        pub fail: bool,
    }

    #[async_trait]
    impl MessageGateway for RecordingGateway {
        async fn send_text(
            &self,
            channel: MessageChannel,
            phone: &str,
            content: &str,
        ) -> SendResult {
            self.sent.lock().unwrap().push((channel, phone.to_string(), content.to_string()));
            if self.fail {
                SendResult::failed("rejected")
            } else {
                SendResult::ok()
            }
        }
    }

    pub struct FixedClassifier(pub &'static str);

    #[async_trait]
    impl ResponseClassifier for FixedClassifier {
        async fn classify(
            &self,
            _lead_name: &str,
            _message: &str,
        ) -> ClassificationResult {
            ClassificationResult {
                classification: self.0.to_string(),
                confidence: 0.9,
            }
        }
    }

    pub struct Fixture {
        pub runtime: Arc<tokio::runtime::Runtime>,
        pub ctx: Context,
        pub leads: Arc<MemLeadDirectory>,
        pub gateway: Arc<RecordingGateway>,
    }

    pub fn lead() -> Lead {
        Lead {
            id: "l1".to_string(),
            cnpj: "12.345.678/0001-90".to_string(),
            razao_social: "Padaria Sol LTDA".to_string(),
            nome_fantasia: Some("Padaria Sol".to_string()),
            cidade: Some("Natal".to_string()),
            uf: Some("RN".to_string()),
            telefone: Some("+5584999990000".to_string()),
            ..Default::default()
        }
    }

    pub fn fixture(gateway: RecordingGateway) -> Fixture {
        let runtime = Arc::new(tokio::runtime::Runtime::new().unwrap());
        let leads = Arc::new(MemLeadDirectory::new());
        leads.insert(lead());
        let gateway = Arc::new(gateway);
        let mut gateways = Gateways::new();
        gateways.register(crate::sequence::config::Provider::Evolution, gateway.clone());
        gateways.register(crate::sequence::config::Provider::Twilio, gateway.clone());
        let ctx = Context::new(
            Arc::new(gateways),
            Arc::new(FixedClassifier("interesse")),
            leads.clone(),
            Arc::new(ManualClock::new(NOW)),
            Arc::new(Channel::new(runtime.clone())),
        );
        Fixture {
            runtime,
            ctx,
            leads,
            gateway,
        }
    }

    /// Sequence whose steps carry the given types and raw configs, orders 1..N.
    pub fn sequence(steps: &[(StepType, &str)]) -> Sequence {
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
        Sequence::try_from(&model).unwrap()
    }
}
