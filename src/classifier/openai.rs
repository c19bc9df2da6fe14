use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, warn};

use crate::{
    LeadflowError, Result,
    classifier::{ClassificationResult, ResponseClassifier},
    config::OpenAiConfig,
};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const TIMEOUT: Duration = Duration::from_secs(30);
const SYSTEM_PROMPT: &str = "Você é um assistente de qualificação de leads B2B.";

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Classifier backed by the OpenAI chat completions api in JSON mode.
pub struct OpenAiClassifier {
    config: OpenAiConfig,
    client: reqwest::Client,
}

impl OpenAiClassifier {
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn prompt(
        lead_name: &str,
        message: &str,
    ) -> String {
        format!(
            "Aja como um SDR experiente. Classifique a resposta do lead '{lead_name}' abaixo.\n\
             Resposta do Lead: \"{message}\"\n\n\
             Classificações possíveis:\n\
             - 'interesse': Lead deseja saber mais, agendar call, ou demonstra forte interesse.\n\
             - 'duvida': Lead fez uma pergunta técnica ou de negócio.\n\
             - 'sem_interesse': Lead disse que não quer ou pediu para ser removido.\n\
             - 'spam': Respostas sem sentido ou automáticas.\n\n\
             Responda APENAS em formato JSON:\n\
             {{\"classification\": \"categoria\", \"confidence\": 0.XX}}"
        )
    }

    fn body(
        &self,
        lead_name: &str,
        message: &str,
    ) -> serde_json::Value {
        json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": Self::prompt(lead_name, message) }
            ],
            "response_format": { "type": "json_object" },
            "temperature": 0
        })
    }

    /// Pull the classification out of a chat completion body.
    fn parse(body: &str) -> Result<ClassificationResult> {
        let response = serde_json::from_str::<ChatResponse>(body)?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| LeadflowError::Classifier("empty completion".to_string()))?;
        Ok(serde_json::from_str::<ClassificationResult>(&content)?)
    }

    async fn request(
        &self,
        lead_name: &str,
        message: &str,
    ) -> Result<ClassificationResult> {
        let base = self.config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let res = self
            .client
            .post(format!("{}/chat/completions", base.trim_end_matches('/')))
            .bearer_auth(&self.config.api_key)
            .json(&self.body(lead_name, message))
            .timeout(TIMEOUT)
            .send()
            .await
            .map_err(|e| LeadflowError::Classifier(e.to_string()))?;

        let status = res.status();
        let text = res.text().await.map_err(|e| LeadflowError::Classifier(e.to_string()))?;
        if !status.is_success() {
            return Err(LeadflowError::Classifier(format!("OpenAI API Error: {} - {}", status, text)));
        }
        Self::parse(&text)
    }
}

#[async_trait]
impl ResponseClassifier for OpenAiClassifier {
    async fn classify(
        &self,
        lead_name: &str,
        message: &str,
    ) -> ClassificationResult {
        if self.config.api_key.is_empty() {
            warn!("openai api key is missing, using default classification");
            return ClassificationResult::default();
        }
        match self.request(lead_name, message).await {
            Ok(result) => result,
            Err(e) => {
                error!("classification failed: {}", e);
                ClassificationResult::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_completion() {
        let body = r#"{"choices":[{"message":{"content":"{\"classification\":\"interesse\",\"confidence\":0.91}"}}]}"#;
        let result = OpenAiClassifier::parse(body).unwrap();
        assert_eq!(result.classification, "interesse");
        assert_eq!(result.confidence, 0.91);

        assert!(OpenAiClassifier::parse(r#"{"choices":[]}"#).is_err());
        assert!(OpenAiClassifier::parse("not json").is_err());
    }

    #[test]
    fn test_request_body() {
        let classifier = OpenAiClassifier::new(OpenAiConfig::default());
        let body = classifier.body("ACME", "Quero saber o preço");
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert!(body["messages"][1]["content"].as_str().unwrap().contains("Quero saber o preço"));
    }

    #[test]
    fn test_missing_key_falls_back() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let classifier = OpenAiClassifier::new(OpenAiConfig::default());
        assert_eq!(runtime.block_on(classifier.classify("ACME", "oi")), ClassificationResult::default());
    }
}
