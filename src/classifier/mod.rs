//! Reply classification.

mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use openai::OpenAiClassifier;

/// Classification used when no model answer is available.
pub const FALLBACK_CLASSIFICATION: &str = "curioso";
pub const FALLBACK_CONFIDENCE: f64 = 0.5;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub classification: String,
    pub confidence: f64,
}

impl Default for ClassificationResult {
    fn default() -> Self {
        Self {
            classification: FALLBACK_CLASSIFICATION.to_string(),
            confidence: FALLBACK_CONFIDENCE,
        }
    }
}

/// Labels a lead reply as interesse, duvida, sem_interesse or spam.
///
/// Implementations never fail: any problem yields the fallback result.
#[async_trait]
pub trait ResponseClassifier: Send + Sync {
    async fn classify(
        &self,
        lead_name: &str,
        message: &str,
    ) -> ClassificationResult;
}

/// Classifier that always answers with the fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackClassifier;

#[async_trait]
impl ResponseClassifier for FallbackClassifier {
    async fn classify(
        &self,
        _lead_name: &str,
        _message: &str,
    ) -> ClassificationResult {
        ClassificationResult::default()
    }
}
