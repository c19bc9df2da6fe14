use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info};

use crate::{
    config::TwilioConfig,
    gateway::{MessageGateway, SendResult},
    sequence::config::MessageChannel,
};

const DEFAULT_BASE_URL: &str = "https://api.twilio.com";
const TIMEOUT: Duration = Duration::from_secs(30);

/// SMS and WhatsApp delivery through the Twilio messages API.
pub struct TwilioGateway {
    config: TwilioConfig,
    client: reqwest::Client,
}

impl TwilioGateway {
    pub fn new(config: TwilioConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self) -> String {
        let base = self.config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        format!("{}/2010-04-01/Accounts/{}/Messages.json", base.trim_end_matches('/'), self.config.account_sid)
    }

    /// Authenticated form POST for one message.
    fn request(
        &self,
        form: &[(&'static str, String)],
    ) -> reqwest::RequestBuilder {
        self.client.post(self.url()).basic_auth(&self.config.account_sid, Some(&self.config.auth_token)).form(form).timeout(TIMEOUT)
    }

    /// Form fields for one message, or the reason it cannot be sent.
    fn form(
        &self,
        channel: MessageChannel,
        phone: &str,
        content: &str,
        media_url: Option<&str>,
    ) -> Result<Vec<(&'static str, String)>, String> {
        if self.config.account_sid.is_empty() || self.config.auth_token.is_empty() {
            return Err("Twilio configuration (Sid/Token) is missing.".to_string());
        }
        let whatsapp = channel == MessageChannel::Whatsapp;
        let from = match whatsapp {
            true => self.config.whatsapp_from_number.as_deref(),
            false => self.config.from_number.as_deref(),
        }
        .filter(|from| !from.is_empty())
        .ok_or_else(|| format!("Twilio 'From' number for {} is missing.", channel.as_ref()))?;

        let (to, from) = match whatsapp {
            true => (format!("whatsapp:{}", phone), format!("whatsapp:{}", from)),
            false => (phone.to_string(), from.to_string()),
        };
        let mut form = vec![("To", to), ("From", from), ("Body", content.to_string())];
        if let Some(url) = media_url {
            form.push(("MediaUrl", url.to_string()));
        }
        Ok(form)
    }

    async fn send(
        &self,
        channel: MessageChannel,
        phone: &str,
        content: &str,
        media_url: Option<&str>,
    ) -> SendResult {
        let form = match self.form(channel, phone, content, media_url) {
            Ok(form) => form,
            Err(e) => return SendResult::failed(e),
        };

        let res = self.request(&form).send().await;
        match res {
            Ok(res) if res.status().is_success() => {
                info!("message sent to {} via twilio {}", phone, channel.as_ref());
                SendResult::ok()
            }
            Ok(res) => {
                let status = res.status();
                let body = res.text().await.unwrap_or_default();
                error!("twilio send to {} failed: {} {}", phone, status, body);
                SendResult::failed(format!("Twilio Error: {}. {}", status, body))
            }
            Err(e) => {
                error!("twilio send to {} failed: {}", phone, e);
                SendResult::failed(e.to_string())
            }
        }
    }
}

#[async_trait]
impl MessageGateway for TwilioGateway {
    async fn send_text(
        &self,
        channel: MessageChannel,
        phone: &str,
        content: &str,
    ) -> SendResult {
        self.send(channel, phone, content, None).await
    }

    async fn send_media(
        &self,
        channel: MessageChannel,
        phone: &str,
        content: &str,
        media_url: &str,
    ) -> SendResult {
        self.send(channel, phone, content, Some(media_url)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> TwilioGateway {
        TwilioGateway::new(TwilioConfig {
            account_sid: "AC1".to_string(),
            auth_token: "tok".to_string(),
            from_number: Some("+1555".to_string()),
            whatsapp_from_number: Some("+1666".to_string()),
            base_url: None,
        })
    }

    #[test]
    fn test_form_by_channel() {
        let gateway = gateway();
        assert_eq!(gateway.url(), "https://api.twilio.com/2010-04-01/Accounts/AC1/Messages.json");

        let form = gateway.form(MessageChannel::Whatsapp, "+5511", "Oi", None).unwrap();
        let request = gateway.request(&form).build().unwrap();
        assert_eq!(request.headers()["authorization"], "Basic QUMxOnRvaw==");
        assert_eq!(request.headers()["content-type"], "application/x-www-form-urlencoded");
        assert_eq!(form[0], ("To", "whatsapp:+5511".to_string()));
        assert_eq!(form[1], ("From", "whatsapp:+1666".to_string()));

        let form = gateway.form(MessageChannel::Sms, "+5511", "Oi", Some("https://x/a.png")).unwrap();
        assert_eq!(form[1], ("From", "+1555".to_string()));
        assert_eq!(form[3], ("MediaUrl", "https://x/a.png".to_string()));
    }

    #[test]
    fn test_form_missing_config() {
        let mut gateway = gateway();
        gateway.config.whatsapp_from_number = None;
        assert_eq!(gateway.form(MessageChannel::Whatsapp, "+55", "Oi", None).unwrap_err(), "Twilio 'From' number for whatsapp is missing.");

        gateway.config.auth_token.clear();
        assert!(gateway.form(MessageChannel::Sms, "+55", "Oi", None).is_err());
    }
}
