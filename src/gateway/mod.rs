//! Outbound messaging.
//!
//! A [`MessageGateway`] delivers text (and optionally media) to a lead's
//! phone. Delivery problems are reported in [`SendResult`], never as errors,
//! so a step can record the failure and move the enrollment to `Failed`.

mod evolution;
mod twilio;

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    config::GatewaysConfig,
    sequence::config::{MessageChannel, Provider},
};

pub use evolution::EvolutionGateway;
pub use twilio::TwilioGateway;

/// Outcome of one delivery attempt.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SendResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SendResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

#[async_trait]
pub trait MessageGateway: Send + Sync {
    async fn send_text(
        &self,
        channel: MessageChannel,
        phone: &str,
        content: &str,
    ) -> SendResult;

    /// Send content with an attached media url. Gateways without native media
    /// support append the url to the text.
    async fn send_media(
        &self,
        channel: MessageChannel,
        phone: &str,
        content: &str,
        media_url: &str,
    ) -> SendResult {
        self.send_text(channel, phone, &format!("{}\n\n{}", content, media_url)).await
    }
}

/// Gateways by provider.
#[derive(Clone, Default)]
pub struct Gateways {
    gateways: HashMap<Provider, Arc<dyn MessageGateway>>,
}

impl Gateways {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the HTTP gateways present in the configuration.
    pub fn from_config(config: &GatewaysConfig) -> Self {
        let mut gateways = Self::new();
        if let Some(evolution) = &config.evolution {
            gateways.register(Provider::Evolution, Arc::new(EvolutionGateway::new(evolution.clone())));
        }
        if let Some(twilio) = &config.twilio {
            gateways.register(Provider::Twilio, Arc::new(TwilioGateway::new(twilio.clone())));
        }
        gateways
    }

    pub fn register(
        &mut self,
        provider: Provider,
        gateway: Arc<dyn MessageGateway>,
    ) {
        self.gateways.insert(provider, gateway);
    }

    pub fn get(
        &self,
        provider: Provider,
    ) -> Option<Arc<dyn MessageGateway>> {
        self.gateways.get(&provider).cloned()
    }

    /// Send through `provider`. A provider without a gateway yields a failed result.
    pub async fn send(
        &self,
        provider: Provider,
        channel: MessageChannel,
        phone: &str,
        content: &str,
        media_url: Option<&str>,
    ) -> SendResult {
        let Some(gateway) = self.get(provider) else {
            return SendResult::failed(format!("gateway '{}' not configured", provider.as_ref()));
        };
        match media_url {
            Some(url) if !url.trim().is_empty() => gateway.send_media(channel, phone, content, url.trim()).await,
            _ => gateway.send_text(channel, phone, content).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<(MessageChannel, String, String)>>,
    }

    #[async_trait]
    impl MessageGateway for Recorder {
        async fn send_text(
            &self,
            channel: MessageChannel,
            phone: &str,
            content: &str,
        ) -> SendResult {
            self.sent.lock().unwrap().push((channel, phone.to_string(), content.to_string()));
            SendResult::ok()
        }
    }

    #[test]
    fn test_registry_dispatch() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let recorder = Arc::new(Recorder::default());
        let mut gateways = Gateways::new();
        gateways.register(Provider::Evolution, recorder.clone());

        runtime.block_on(async {
            assert!(gateways.send(Provider::Evolution, MessageChannel::Whatsapp, "+55", "Oi", None).await.success);
            assert!(gateways.send(Provider::Evolution, MessageChannel::Whatsapp, "+55", "Oi", Some("https://x/y.png")).await.success);

            let missing = gateways.send(Provider::Twilio, MessageChannel::Sms, "+55", "Oi", None).await;
            assert!(!missing.success);
            assert_eq!(missing.error.as_deref(), Some("gateway 'twilio' not configured"));
        });

        let sent = recorder.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].2, "Oi\n\nhttps://x/y.png");
    }

    #[test]
    fn test_from_config() {
        let gateways = Gateways::from_config(&GatewaysConfig::default());
        assert!(gateways.get(Provider::Evolution).is_none());
        assert!(gateways.get(Provider::Twilio).is_none());
    }
}
