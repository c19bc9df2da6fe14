use crate::{
    LeadflowError, Result,
    model::{SequenceModel, StepType},
    sequence::config::StepConfig,
};

/// Decoded step as seen by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceStep {
    pub order: u32,
    pub config: StepConfig,
}

impl SequenceStep {
    pub fn step_type(&self) -> StepType {
        self.config.step_type()
    }
}

/// Snapshot of a sequence taken at the start of a wake, steps sorted by order.
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    pub id: String,
    pub name: String,
    pub active: bool,
    pub steps: Vec<SequenceStep>,
}

impl Sequence {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step(
        &self,
        index: usize,
    ) -> Option<&SequenceStep> {
        self.steps.get(index)
    }

    /// Position of the step carrying `order`.
    pub fn index_of_order(
        &self,
        order: u32,
    ) -> Option<usize> {
        self.steps.iter().position(|s| s.order == order)
    }
}

impl TryFrom<&SequenceModel> for Sequence {
    type Error = LeadflowError;

    fn try_from(model: &SequenceModel) -> Result<Self> {
        if model.id.is_empty() {
            return Err(LeadflowError::Sequence("missing id in sequence".into()));
        }
        let steps = model
            .ordered_steps()
            .into_iter()
            .map(|s| SequenceStep {
                order: s.order,
                config: StepConfig::decode(s.step_type, s.config.as_deref()),
            })
            .collect();

        Ok(Self {
            id: model.id.clone(),
            name: model.name.clone(),
            active: model.active,
            steps,
        })
    }
}
