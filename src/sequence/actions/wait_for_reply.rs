use async_trait::async_trait;

use crate::{
    Result,
    model::StepType,
    runtime::{Context, EnrollmentStatus, StepRunStatus},
    sequence::{
        actions::{ActionOutput, StepAction, StepInput, Transition, consts::REPLY_RECEIVED},
        config::{OnTimeout, WaitForReplyConfig},
    },
    utils::time::HOUR_MILLIS,
};

/// Parks the enrollment until the lead replies or the timeout passes.
pub struct WaitForReplyAction {
    config: WaitForReplyConfig,
}

impl WaitForReplyAction {
    pub fn new(config: WaitForReplyConfig) -> Self {
        Self {
            config,
        }
    }
}

#[async_trait]
impl StepAction for WaitForReplyAction {
    fn step_type(&self) -> StepType {
        StepType::WaitForReply
    }

    async fn run(
        &self,
        ctx: &Context,
        input: &StepInput<'_>,
    ) -> Result<ActionOutput> {
        if input.enrollment.status != EnrollmentStatus::WaitingReply {
            let until = ctx.now() + self.config.timeout_hours as i64 * HOUR_MILLIS;
            return Ok(ActionOutput::new(Transition::WaitReply(until), None));
        }

        if input.reply.is_some() {
            return Ok(ActionOutput::executed(Some(REPLY_RECEIVED.to_string())));
        }

        let transition = match self.config.on_timeout {
            OnTimeout::Stop => Transition::Finish(EnrollmentStatus::Stopped),
            OnTimeout::Next => Transition::Next,
        };
        Ok(ActionOutput::new(transition, Some((StepRunStatus::TimedOut, None))))
    }
}
