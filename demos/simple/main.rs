use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use leadflow::{
    ChannelEvent, ChannelOptions, Config, EngineBuilder, EnrollmentStatus, Lead, SequenceModel,
    gateway::{Gateways, MessageGateway, SendResult},
    lead::MemLeadDirectory,
    sequence::config::{MessageChannel, Provider},
};
use tracing_subscriber::EnvFilter;

/// Prints messages instead of sending them.
struct ConsoleGateway;

#[async_trait]
impl MessageGateway for ConsoleGateway {
    async fn send_text(
        &self,
        channel: MessageChannel,
        phone: &str,
        content: &str,
    ) -> SendResult {
        println!("[{}] -> {}: {}", channel.as_ref(), phone, content);
        SendResult::ok()
    }
}

fn main() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).init();

    let config = Config::load_from_str(include_str!("./config.toml")).unwrap();

    let leads = Arc::new(MemLeadDirectory::new());
    leads.insert(Lead {
        id: "lead-1".to_string(),
        cnpj: "12.345.678/0001-90".to_string(),
        razao_social: "Padaria Sol LTDA".to_string(),
        nome_fantasia: Some("Padaria Sol".to_string()),
        cidade: Some("Natal".to_string()),
        uf: Some("RN".to_string()),
        telefone: Some("+5584999990000".to_string()),
        ..Default::default()
    });

    let mut gateways = Gateways::new();
    gateways.register(Provider::Evolution, Arc::new(ConsoleGateway));

    let engine = EngineBuilder::new().config(config).gateways(gateways).leads(leads.clone()).build().unwrap();
    engine.launch();

    let model = SequenceModel::from_json(include_str!("./sequence.json")).unwrap();
    let sequence = engine.create_sequence(&model).unwrap();

    ChannelEvent::channel(engine.channel(), ChannelOptions::with_sid(sequence.id.clone())).unwrap().on_complete(move |eid| {
        println!("Enrollment completed, eid: {}", eid);
    });

    ChannelEvent::channel(engine.channel(), ChannelOptions::with_sid(sequence.id.clone())).unwrap().on_error(move |e| {
        println!("Enrollment failed: {:?}", e);
    });

    let enrollment = engine.start_enrollment(&sequence.id, "lead-1").unwrap();

    // wait for the first message to go out
    while engine.get_enrollment(&enrollment.id).unwrap().status != EnrollmentStatus::WaitingReply {
        std::thread::sleep(Duration::from_millis(100));
    }

    let resumed = engine.record_reply("lead-1", "Tenho interesse, qual o preço?").unwrap();
    println!("Reply delivered to {} enrollment(s)", resumed);

    let enrollment = engine.get_enrollment(&enrollment.id).unwrap();
    println!("Final status: {:?}", enrollment.status);
    for run in &enrollment.step_runs {
        println!("  step {} {:?} {}", run.step_index + 1, run.status, run.result.as_deref().unwrap_or_default());
    }
    println!("Lead: {:#?}", leads.lead("lead-1"));
    println!("Timeline: {:#?}", leads.notes("lead-1"));

    engine.shutdown();
}
