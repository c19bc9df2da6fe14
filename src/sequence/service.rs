use async_trait::async_trait;

use crate::{Result, model::SequenceModel};

/// Persistence backend the sequence editor saves through.
///
/// [`Engine`](crate::Engine) implements it on top of its store; front ends
/// may provide their own (for example an HTTP client).
#[async_trait]
pub trait SequenceService: Send + Sync {
    async fn get_sequence(
        &self,
        id: &str,
    ) -> Result<SequenceModel>;

    /// Create a sequence, returning it with its assigned id.
    async fn create_sequence(
        &self,
        model: &SequenceModel,
    ) -> Result<SequenceModel>;

    /// Replace name, description, active flag and all steps of `id`.
    async fn update_sequence(
        &self,
        id: &str,
        model: &SequenceModel,
    ) -> Result<SequenceModel>;
}
