use async_trait::async_trait;

use crate::{
    Result,
    model::StepType,
    runtime::{Context, StepRunStatus},
    sequence::{
        actions::{
            ActionOutput, StepAction, StepInput, Transition,
            consts::{DEFAULT_BRANCH_RESULT, NO_VALUE},
        },
        config::ConditionConfig,
    },
};

/// Routes to the step named by the matching branch.
pub struct ConditionAction {
    config: ConditionConfig,
}

impl ConditionAction {
    pub fn new(config: ConditionConfig) -> Self {
        Self {
            config,
        }
    }
}

#[async_trait]
impl StepAction for ConditionAction {
    fn step_type(&self) -> StepType {
        StepType::Condition
    }

    async fn run(
        &self,
        _ctx: &Context,
        input: &StepInput<'_>,
    ) -> Result<ActionOutput> {
        let value = input.vars().get_text(&self.config.field).filter(|v| !v.trim().is_empty()).unwrap_or_else(|| NO_VALUE.to_string());

        let target = self.config.select(&value).map(|b| b.go_to_step).unwrap_or(0);
        if target == 0 {
            return Ok(ActionOutput::executed(Some(DEFAULT_BRANCH_RESULT.to_string())));
        }

        match input.sequence.index_of_order(target) {
            Some(index) => Ok(ActionOutput::new(Transition::Goto(index), Some((StepRunStatus::Executed, Some(format!("Branching to step {}", target)))))),
            None => Ok(ActionOutput::executed(Some(format!("branch target not found: step {}", target)))),
        }
    }
}
