use async_trait::async_trait;

use crate::{
    Result,
    common::Vars,
    model::StepType,
    runtime::{Context, StepRunStatus},
    sequence::actions::{
        ActionOutput, StepAction, StepInput, Transition,
        consts::{CLASSIFICATION_KEY, CONFIDENCE_KEY, NO_REPLY_TO_CLASSIFY},
    },
};

/// Labels the last reply with the configured classifier.
pub struct ClassifyResponseAction;

#[async_trait]
impl StepAction for ClassifyResponseAction {
    fn step_type(&self) -> StepType {
        StepType::ClassifyResponse
    }

    async fn run(
        &self,
        ctx: &Context,
        input: &StepInput<'_>,
    ) -> Result<ActionOutput> {
        let Some(reply) = input.enrollment.last_reply.as_deref() else {
            return Ok(ActionOutput::new(Transition::Next, Some((StepRunStatus::Skipped, Some(NO_REPLY_TO_CLASSIFY.to_string())))));
        };

        let result = ctx.classifier().classify(&input.lead.razao_social, reply).await;
        let outputs = Vars::new().with(CLASSIFICATION_KEY, result.classification.as_str()).with(CONFIDENCE_KEY, result.confidence);
        Ok(ActionOutput::executed(Some(serde_json::to_string(&result)?)).with_outputs(outputs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{runtime::Enrollment, sequence::actions::tests::*};

    fn run(
        f: &Fixture,
        enrollment: &Enrollment,
    ) -> ActionOutput {
        let sequence = sequence(&[(StepType::ClassifyResponse, "{}")]);
        let lead = lead();
        let input = StepInput {
            enrollment,
            lead: &lead,
            sequence: &sequence,
            reply: None,
        };
        f.runtime.block_on(ClassifyResponseAction.run(&f.ctx, &input)).unwrap()
    }

    #[test]
    fn test_classify_without_reply_is_skipped() {
        let f = fixture(RecordingGateway::default());
        let enrollment = Enrollment::new("s1", "l1", NOW);

        let output = run(&f, &enrollment);
        assert_eq!(output.transition, Transition::Next);
        assert_eq!(output.record, Some((StepRunStatus::Skipped, Some(NO_REPLY_TO_CLASSIFY.to_string()))));
        assert!(output.outputs.is_empty());
    }

    #[test]
    fn test_classify_reply() {
        let f = fixture(RecordingGateway::default());
        let mut enrollment = Enrollment::new("s1", "l1", NOW);
        enrollment.last_reply = Some("quero saber o preço".to_string());

        let output = run(&f, &enrollment);
        assert_eq!(output.transition, Transition::Next);
        assert_eq!(output.outputs.get_text(CLASSIFICATION_KEY).as_deref(), Some("interesse"));
        let (status, result) = output.record.unwrap();
        assert_eq!(status, StepRunStatus::Executed);
        assert!(result.unwrap().contains("\"classification\":\"interesse\""));
    }
}
