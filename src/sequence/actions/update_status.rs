use async_trait::async_trait;

use crate::{
    Result,
    model::StepType,
    runtime::Context,
    sequence::{
        actions::{ActionOutput, StepAction, StepInput},
        config::UpdateStatusConfig,
    },
};

/// Moves the lead to a pipeline status.
pub struct UpdateStatusAction {
    config: UpdateStatusConfig,
}

impl UpdateStatusAction {
    pub fn new(config: UpdateStatusConfig) -> Self {
        Self {
            config,
        }
    }
}

#[async_trait]
impl StepAction for UpdateStatusAction {
    fn step_type(&self) -> StepType {
        StepType::UpdateStatus
    }

    async fn run(
        &self,
        ctx: &Context,
        input: &StepInput<'_>,
    ) -> Result<ActionOutput> {
        ctx.leads().set_status(&input.lead.id, self.config.status).await?;
        Ok(ActionOutput::executed(Some(format!("status {}", self.config.status.as_ref()))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::LeadStatus,
        runtime::{Enrollment, StepRunStatus},
        sequence::actions::{Transition, tests::*},
    };

    #[test]
    fn test_update_status() {
        let f = fixture(RecordingGateway::default());
        let sequence = sequence(&[(StepType::UpdateStatus, r#"{"status":3}"#)]);
        let lead = lead();
        let enrollment = Enrollment::new("s1", "l1", NOW);
        let input = StepInput {
            enrollment: &enrollment,
            lead: &lead,
            sequence: &sequence,
            reply: None,
        };
        let action = UpdateStatusAction::new(UpdateStatusConfig {
            status: LeadStatus::Qualificado,
        });

        let output = f.runtime.block_on(action.run(&f.ctx, &input)).unwrap();
        assert_eq!(output.transition, Transition::Next);
        assert_eq!(output.record.map(|(s, _)| s), Some(StepRunStatus::Executed));
        assert_eq!(f.leads.lead("l1").unwrap().status, LeadStatus::Qualificado);
    }

    #[test]
    fn test_update_status_missing_lead() {
        let f = fixture(RecordingGateway::default());
        let sequence = sequence(&[(StepType::UpdateStatus, "{}")]);
        let mut lead = lead();
        lead.id = "ghost".to_string();
        let enrollment = Enrollment::new("s1", "ghost", NOW);
        let input = StepInput {
            enrollment: &enrollment,
            lead: &lead,
            sequence: &sequence,
            reply: None,
        };
        let action = UpdateStatusAction::new(UpdateStatusConfig::default());
        assert!(f.runtime.block_on(action.run(&f.ctx, &input)).is_err());
    }
}
