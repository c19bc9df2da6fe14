use std::{sync::Arc, time::Duration};

use tokio::{runtime::Runtime, time::MissedTickBehavior};
use tracing::{debug, error, warn};

use crate::{
    Result,
    common::{Queue, Shutdown},
    dispatcher::Dispatcher,
    runtime::EnrollmentId,
    store::Store,
};

/// Size of the queue of enrollments waiting for a walk.
const WAKE_QUEUE_SIZE: usize = 4096;

/// Feeds due enrollments to the dispatcher.
///
/// A poll task pushes the store's due enrollments into the wake queue every
/// `poll_interval`; a consumer task walks each queued enrollment on its own task.
pub struct Scheduler {
    dispatcher: Arc<Dispatcher>,
    store: Arc<Store>,
    wake_queue: Arc<Queue<EnrollmentId>>,
    poll_interval: Duration,

    runtime: Arc<Runtime>,
    shutdown: Arc<Shutdown>,
}

impl Scheduler {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        store: Arc<Store>,
        poll_interval: Duration,
        runtime: Arc<Runtime>,
        shutdown: Arc<Shutdown>,
    ) -> Self {
        Self {
            dispatcher,
            store,
            wake_queue: Queue::new(WAKE_QUEUE_SIZE),
            poll_interval,
            runtime,
            shutdown,
        }
    }

    pub fn start(&self) {
        let store = self.store.clone();
        let dispatcher = self.dispatcher.clone();
        let wake_queue = self.wake_queue.clone();
        let shutdown = self.shutdown.clone();
        let poll_interval = self.poll_interval;
        self.runtime.spawn(async move {
            let mut interval = tokio::time::interval(poll_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    _ = interval.tick() => {
                        let due = match store.due_enrollments(dispatcher.ctx().now()) {
                            Ok(due) => due,
                            Err(e) => {
                                error!("failed to poll due enrollments: {}", e);
                                continue;
                            }
                        };
                        debug!("scheduler found {} due enrollments", due.len());
                        for eid in due {
                            if let Err(e) = wake_queue.send_async(eid).await {
                                warn!("failed to queue enrollment: {}", e);
                            }
                        }
                    }
                }
            }
        });

        let dispatcher = self.dispatcher.clone();
        let wake_queue = self.wake_queue.clone();
        let shutdown = self.shutdown.clone();
        let runtime = self.runtime.clone();
        self.runtime.spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    Some(eid) = wake_queue.next_async() => {
                        let dispatcher = dispatcher.clone();
                        runtime.spawn(async move {
                            if let Err(e) = dispatcher.process(&eid).await {
                                error!("failed to process enrollment {}: {}", eid, e);
                            }
                        });
                    }
                }
            }
        });
    }

    /// Queue an enrollment for an immediate walk.
    pub fn wake(
        &self,
        eid: &str,
    ) {
        if let Err(e) = self.wake_queue.try_send(eid.to_string()) {
            warn!("failed to wake enrollment {}: {}", eid, e);
        }
    }

    /// Walk every due enrollment once on the calling task. Returns how many were advanced.
    pub async fn run_due(&self) -> Result<usize> {
        let due = self.store.due_enrollments(self.dispatcher.ctx().now())?;
        let mut advanced = 0;
        for eid in due {
            match self.dispatcher.process(&eid).await {
                Ok(true) => advanced += 1,
                Ok(false) => {}
                Err(e) => error!("failed to process enrollment {}: {}", eid, e),
            }
        }
        Ok(advanced)
    }
}
