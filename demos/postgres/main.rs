use std::{sync::Arc, time::Duration};

use leadflow::{ChannelEvent, ChannelOptions, Config, EngineBuilder, Lead, SequenceModel, lead::MemLeadDirectory};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).init();

    let config = Config::load_from_str(include_str!("./config.toml")).unwrap();

    let leads = Arc::new(MemLeadDirectory::new());
    for (id, name, phone) in [("lead-1", "Padaria Sol", "+5584999990000"), ("lead-2", "Mercado Lua", "+5584988880000")] {
        leads.insert(Lead {
            id: id.to_string(),
            razao_social: format!("{} LTDA", name),
            nome_fantasia: Some(name.to_string()),
            telefone: Some(phone.to_string()),
            ..Default::default()
        });
    }

    let engine = EngineBuilder::new().config(config).leads(leads).build().unwrap();
    engine.launch();

    let model = SequenceModel::from_json(include_str!("../simple/sequence.json")).unwrap();
    let sequence = engine.create_sequence(&model).unwrap();

    ChannelEvent::channel(engine.channel(), ChannelOptions::default()).unwrap().on_event(move |e| {
        println!("{} {} {:?}", e.eid, e.lead_id, e.event);
    });

    let started = engine.start_bulk(&sequence.id, ["lead-1", "lead-2"]);
    println!("Started {} enrollment(s)", started.len());

    std::thread::sleep(Duration::from_secs(10));

    for enrollment in engine.list_enrollments(Some(&sequence.id)).unwrap() {
        println!("{} {:?} at step {}", enrollment.lead_id, enrollment.status, enrollment.current_step_index + 1);
    }

    engine.shutdown();
}
