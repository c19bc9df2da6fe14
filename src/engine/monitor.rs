use std::sync::Arc;

use tokio::{runtime::Runtime, sync::broadcast::error::RecvError};
use tracing::warn;

use crate::{
    common::Shutdown,
    runtime::Context,
    store::{Store, data},
    utils,
};

/// Persists every enrollment event to the store's event log.
pub struct Monitor {
    store: Arc<Store>,
    ctx: Arc<Context>,

    runtime: Arc<Runtime>,
    shutdown: Arc<Shutdown>,
}

impl Monitor {
    pub fn new(
        store: Arc<Store>,
        ctx: Arc<Context>,
        runtime: Arc<Runtime>,
        shutdown: Arc<Shutdown>,
    ) -> Self {
        Self {
            store,
            ctx,
            runtime,
            shutdown,
        }
    }

    pub fn monitor(&self) {
        let store = self.store.clone();
        let ctx = self.ctx.clone();
        let shutdown = self.shutdown.clone();
        let mut event_queue = ctx.channel().event_queue().subscribe();

        self.runtime.spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = shutdown.wait() => break,
                    event = event_queue.recv() => event,
                };
                let event = match event {
                    Ok(event) => event,
                    Err(RecvError::Lagged(n)) => {
                        warn!("event monitor lagged, {} events not persisted", n);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };

                let record = data::Event {
                    id: utils::longid(),
                    eid: event.eid.clone(),
                    sid: event.sid.clone(),
                    name: event.event.str().to_string(),
                    message: format!("{:?}", event.event),
                    timestamp: ctx.now(),
                };
                if let Err(e) = store.events().create(&record) {
                    warn!("failed to persist event {} of enrollment {}: {}", record.name, record.eid, e);
                }
            }
        });
    }
}
