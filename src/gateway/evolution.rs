use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::{error, info};

use crate::{
    config::EvolutionConfig,
    gateway::{MessageGateway, SendResult},
    sequence::config::MessageChannel,
};

const TIMEOUT: Duration = Duration::from_secs(30);

/// WhatsApp delivery through an Evolution API instance.
pub struct EvolutionGateway {
    config: EvolutionConfig,
    client: reqwest::Client,
}

impl EvolutionGateway {
    pub fn new(config: EvolutionConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self) -> String {
        format!("{}/message/sendText/{}", self.config.base_url.trim_end_matches('/'), self.config.instance_name)
    }

    fn payload(
        phone: &str,
        content: &str,
    ) -> serde_json::Value {
        json!({
            "number": phone,
            "options": {
                "delay": 1200,
                "presence": "composing",
                "linkPreview": false
            },
            "textMessage": {
                "text": content
            }
        })
    }
}

#[async_trait]
impl MessageGateway for EvolutionGateway {
    /// Evolution only speaks WhatsApp, the channel is ignored.
    async fn send_text(
        &self,
        _channel: MessageChannel,
        phone: &str,
        content: &str,
    ) -> SendResult {
        if self.config.base_url.is_empty() || self.config.api_key.is_empty() || self.config.instance_name.is_empty() {
            return SendResult::failed("Evolution API configuration is missing.");
        }

        let res = self.client.post(self.url()).header("apikey", &self.config.api_key).json(&Self::payload(phone, content)).timeout(TIMEOUT).send().await;
        match res {
            Ok(res) if res.status().is_success() => {
                info!("message sent to {} via evolution", phone);
                SendResult::ok()
            }
            Ok(res) => {
                let status = res.status();
                let body = res.text().await.unwrap_or_default();
                error!("evolution send to {} failed: {} {}", phone, status, body);
                SendResult::failed(format!("API Error: {}. {}", status, body))
            }
            Err(e) => {
                error!("evolution send to {} failed: {}", phone, e);
                SendResult::failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let gateway = EvolutionGateway::new(EvolutionConfig {
            base_url: "http://evo.local/".to_string(),
            api_key: "k".to_string(),
            instance_name: "main".to_string(),
        });
        assert_eq!(gateway.url(), "http://evo.local/message/sendText/main");

        let payload = EvolutionGateway::payload("+5511999", "Oi");
        assert_eq!(payload["number"], "+5511999");
        assert_eq!(payload["options"]["delay"], 1200);
        assert_eq!(payload["textMessage"]["text"], "Oi");
    }

    #[test]
    fn test_missing_config() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let gateway = EvolutionGateway::new(EvolutionConfig::default());
        let result = runtime.block_on(gateway.send_text(MessageChannel::Whatsapp, "+55", "Oi"));
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Evolution API configuration is missing."));
    }
}
