use async_trait::async_trait;

use crate::{
    Result,
    model::StepType,
    runtime::{Context, EnrollmentStatus},
    sequence::{
        actions::{ActionOutput, StepAction, StepInput, Transition},
        config::WaitConfig,
    },
    utils::time::HOUR_MILLIS,
};

/// Parks the enrollment for a fixed number of hours.
pub struct WaitAction {
    config: WaitConfig,
}

impl WaitAction {
    pub fn new(config: WaitConfig) -> Self {
        Self {
            config,
        }
    }
}

#[async_trait]
impl StepAction for WaitAction {
    fn step_type(&self) -> StepType {
        StepType::Wait
    }

    async fn run(
        &self,
        ctx: &Context,
        input: &StepInput<'_>,
    ) -> Result<ActionOutput> {
        if input.enrollment.status == EnrollmentStatus::WaitingDelay {
            return Ok(ActionOutput::executed(None));
        }
        let until = ctx.now() + self.config.hours as i64 * HOUR_MILLIS;
        Ok(ActionOutput::new(Transition::WaitDelay(until), None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        runtime::{Enrollment, StepRunStatus},
        sequence::actions::tests::*,
    };

    #[test]
    fn test_wait_parks_then_advances() {
        let f = fixture(RecordingGateway::default());
        let sequence = sequence(&[(StepType::Wait, r#"{"hours":2}"#)]);
        let lead = lead();
        let mut enrollment = Enrollment::new("s1", "l1", NOW);
        enrollment.start(NOW);
        let action = WaitAction::new(WaitConfig {
            hours: 2,
        });

        let input = StepInput {
            enrollment: &enrollment,
            lead: &lead,
            sequence: &sequence,
            reply: None,
        };
        let output = f.runtime.block_on(action.run(&f.ctx, &input)).unwrap();
        assert_eq!(output.transition, Transition::WaitDelay(NOW + 2 * HOUR_MILLIS));
        assert_eq!(output.record, None);

        enrollment.set_waiting_delay(NOW + 2 * HOUR_MILLIS, NOW);
        let input = StepInput {
            enrollment: &enrollment,
            lead: &lead,
            sequence: &sequence,
            reply: None,
        };
        let output = f.runtime.block_on(action.run(&f.ctx, &input)).unwrap();
        assert_eq!(output.transition, Transition::Next);
        assert_eq!(output.record, Some((StepRunStatus::Executed, None)));
    }
}
