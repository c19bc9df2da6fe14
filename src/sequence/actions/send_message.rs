use async_trait::async_trait;
use tracing::warn;

use crate::{
    Result,
    gateway::SendResult,
    model::{StepType, TimelineNote},
    runtime::{Context, StepRunStatus},
    sequence::{
        actions::{ActionOutput, StepAction, StepInput, Transition},
        config::{MessageChannel, Provider, SendMessageConfig},
        template,
    },
};

/// Renders the message template and sends it to the lead's phone.
pub struct SendMessageAction {
    config: SendMessageConfig,
}

impl SendMessageAction {
    pub fn new(config: SendMessageConfig) -> Self {
        Self {
            config,
        }
    }

    fn channel(&self) -> MessageChannel {
        match self.config.provider {
            Provider::Evolution => MessageChannel::Whatsapp,
            Provider::Twilio => self.config.channel,
        }
    }
}

#[async_trait]
impl StepAction for SendMessageAction {
    fn step_type(&self) -> StepType {
        StepType::SendMessage
    }

    async fn run(
        &self,
        ctx: &Context,
        input: &StepInput<'_>,
    ) -> Result<ActionOutput> {
        let content = template::render(&self.config.content, &input.vars());
        let phone = input.lead.telefone.as_deref().map(str::trim).unwrap_or_default();

        let result = if phone.is_empty() {
            SendResult::failed("lead has no phone number")
        } else {
            ctx.gateways().send(self.config.provider, self.channel(), phone, &content, self.config.media_url.as_deref()).await
        };
        let text = serde_json::to_string(&result)?;

        if !result.success {
            let reason = result.error.unwrap_or_else(|| "send failed".to_string());
            return Ok(ActionOutput::new(Transition::Fail(reason), Some((StepRunStatus::Failed, Some(text)))));
        }

        if let Err(e) = ctx.leads().append_note(&input.lead.id, TimelineNote::message_sent(&content, ctx.now())).await {
            warn!("failed to record sent message on lead {}: {}", input.lead.id, e);
        }
        Ok(ActionOutput::executed(Some(text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{runtime::Enrollment, sequence::actions::tests::*};

    fn config(
        provider: Provider,
        channel: MessageChannel,
    ) -> SendMessageConfig {
        SendMessageConfig {
            content: "Olá {{nomeFantasia}} de {{cidade}}!".to_string(),
            media_url: None,
            provider,
            channel,
        }
    }

    fn run(
        f: &Fixture,
        action: &SendMessageAction,
        lead: &crate::model::Lead,
    ) -> ActionOutput {
        let sequence = sequence(&[(StepType::SendMessage, "{}")]);
        let mut enrollment = Enrollment::new("s1", &lead.id, NOW);
        enrollment.start(NOW);
        let input = StepInput {
            enrollment: &enrollment,
            lead,
            sequence: &sequence,
            reply: None,
        };
        f.runtime.block_on(action.run(&f.ctx, &input)).unwrap()
    }

    #[test]
    fn test_send_message_renders_and_records() {
        let f = fixture(RecordingGateway::default());
        let action = SendMessageAction::new(config(Provider::Evolution, MessageChannel::Sms));

        let output = run(&f, &action, &lead());
        assert_eq!(output.transition, Transition::Next);
        assert_eq!(output.record.as_ref().map(|(s, _)| *s), Some(StepRunStatus::Executed));

        let sent = f.gateway.sent.lock().unwrap().clone();
        assert_eq!(sent, vec![(MessageChannel::Whatsapp, "+5584999990000".to_string(), "Olá Padaria Sol de Natal!".to_string())]);

        let notes = f.leads.notes("l1");
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, "Mensagem Enviada");
        assert!(notes[0].body.contains("Olá Padaria Sol de Natal!"));
    }

    #[test]
    fn test_send_message_twilio_keeps_channel() {
        let f = fixture(RecordingGateway::default());
        let action = SendMessageAction::new(config(Provider::Twilio, MessageChannel::Sms));
        run(&f, &action, &lead());
        assert_eq!(f.gateway.sent.lock().unwrap()[0].0, MessageChannel::Sms);
    }

    #[test]
    fn test_send_message_gateway_failure() {
        let f = fixture(RecordingGateway {
            fail: true,
            ..Default::default()
        });
        let action = SendMessageAction::new(config(Provider::Evolution, MessageChannel::Whatsapp));

        let output = run(&f, &action, &lead());
        assert_eq!(output.transition, Transition::Fail("rejected".to_string()));
        assert_eq!(output.record.as_ref().map(|(s, _)| *s), Some(StepRunStatus::Failed));
        assert!(f.leads.notes("l1").is_empty());
    }

    #[test]
    fn test_send_message_without_phone() {
        let f = fixture(RecordingGateway::default());
        let action = SendMessageAction::new(config(Provider::Evolution, MessageChannel::Whatsapp));
        let mut lead = lead();
        lead.telefone = Some("  ".to_string());

        let output = run(&f, &action, &lead);
        assert!(matches!(output.transition, Transition::Fail(_)));
        assert!(f.gateway.sent.lock().unwrap().is_empty());
    }
}
