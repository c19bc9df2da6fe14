use async_trait::async_trait;

use crate::{
    Result,
    model::{StepType, TimelineNote},
    runtime::Context,
    sequence::{
        actions::{ActionOutput, StepAction, StepInput},
        config::AddNoteConfig,
    },
};

/// Appends an automatic note to the lead's timeline.
pub struct AddNoteAction {
    config: AddNoteConfig,
}

impl AddNoteAction {
    pub fn new(config: AddNoteConfig) -> Self {
        Self {
            config,
        }
    }
}

#[async_trait]
impl StepAction for AddNoteAction {
    fn step_type(&self) -> StepType {
        StepType::AddNote
    }

    async fn run(
        &self,
        ctx: &Context,
        input: &StepInput<'_>,
    ) -> Result<ActionOutput> {
        let note = TimelineNote::automatic_note(&self.config.note_content, ctx.now());
        ctx.leads().append_note(&input.lead.id, note).await?;
        Ok(ActionOutput::executed(None))
    }
}
