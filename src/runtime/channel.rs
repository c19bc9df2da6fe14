use std::sync::{Arc, RwLock};

use futures::future::BoxFuture;
use globset::{Glob, GlobMatcher};
use tokio::runtime::Runtime;

use crate::{
    LeadflowError, Result, ShareLock,
    common::{BroadcastQueue, Shutdown},
    events::{Event, Message},
    runtime::EnrollmentId,
};

macro_rules! dispatch_event {
    ($handles:expr, $(&$item:ident), +) => {
        let handlers = $handles.read().unwrap();
        for handle in handlers.iter() {
            (handle)($(&$item),+);
        }
    };
}

macro_rules! dispatch_event_async {
    ($handles:expr, $(&$item:ident), +) => {
        let handles = $handles.clone();

        tokio::spawn(async move {
            let handlers = handles.read().unwrap().clone();
            for handle in handlers.iter() {
                (handle)($(&$item),+).await;
            }
        });
    };
}

const EVENT_QUEUE_SIZE: usize = 2048;

pub type EnrollmentEventHandle = Arc<dyn Fn(&Event<Message>) + Send + Sync>;
pub type EnrollmentEventHandleAsync = Arc<dyn Fn(&Event<Message>) -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct ChannelOptions {
    /// use the glob pattern to match the enrollment id
    /// eg. 5f0c*
    pub eid: String,

    /// use the glob pattern to match the sequence id
    /// eg. seq-*
    pub sid: String,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            eid: "*".to_string(),
            sid: "*".to_string(),
        }
    }
}

impl ChannelOptions {
    pub fn new(
        eid: String,
        sid: String,
    ) -> Self {
        Self {
            eid,
            sid,
        }
    }

    pub fn with_eid(eid: String) -> Self {
        Self {
            eid,
            sid: "*".to_string(),
        }
    }

    pub fn with_sid(sid: String) -> Self {
        Self {
            eid: "*".to_string(),
            sid,
        }
    }
}

/// Broadcast bus for enrollment events.
#[derive(Clone)]
pub struct Channel {
    event_queue: Arc<BroadcastQueue<Event<Message>>>,

    events: ShareLock<Vec<EnrollmentEventHandle>>,
    events_async: ShareLock<Vec<EnrollmentEventHandleAsync>>,

    runtime: Arc<Runtime>,
    shutdown: Arc<Shutdown>,
}

impl Channel {
    pub(crate) fn new(runtime: Arc<Runtime>) -> Self {
        Self {
            event_queue: BroadcastQueue::new(EVENT_QUEUE_SIZE),
            events: Arc::new(RwLock::new(Vec::new())),
            events_async: Arc::new(RwLock::new(Vec::new())),
            runtime,
            shutdown: Arc::new(Shutdown::new()),
        }
    }

    pub(crate) fn event_queue(&self) -> Arc<BroadcastQueue<Event<Message>>> {
        self.event_queue.clone()
    }

    pub(crate) fn emit(
        &self,
        message: Message,
    ) {
        let _ = self.event_queue.send(Event::new(&message));
    }

    pub(crate) fn listen(&self) {
        let mut event_queue = self.event_queue.subscribe();
        let events = self.events.clone();
        let events_async = self.events_async.clone();

        let shutdown = self.shutdown.clone();
        self.runtime.spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    Ok(e) = event_queue.recv() => {
                        let evt = e.clone();
                        dispatch_event!(events, &evt);
                        dispatch_event_async!(events_async, &e);
                    }
                }
            }
        });
    }

    pub(crate) fn shutdown(&self) {
        self.shutdown.shutdown();
    }
}

/// Subscription handle filtering events by enrollment and sequence id.
#[derive(Clone)]
pub struct ChannelEvent {
    channel: Arc<Channel>,

    glob: (GlobMatcher, GlobMatcher),
}

impl ChannelEvent {
    pub fn channel(
        channel: Arc<Channel>,
        options: ChannelOptions,
    ) -> Result<Self> {
        let matcher = |pattern: &str| Glob::new(pattern).map(|g| g.compile_matcher()).map_err(|e| LeadflowError::Config(format!("invalid channel pattern '{}': {}", pattern, e)));
        Ok(Self {
            channel,
            glob: (matcher(&options.eid)?, matcher(&options.sid)?),
        })
    }

    /// Called when an enrollment completes or stops on a reply timeout.
    pub fn on_complete(
        &self,
        f: impl Fn(EnrollmentId) + Send + Sync + 'static,
    ) {
        let glob = self.glob.clone();

        self.channel.events.write().unwrap().push(Arc::new(move |e| {
            if e.event.is_complete() && is_match(&glob, e) {
                f(e.eid.clone());
            }
        }));
    }

    pub fn on_error(
        &self,
        f: impl Fn(&Event<Message>) + Send + Sync + 'static,
    ) {
        let glob = self.glob.clone();

        self.channel.events.write().unwrap().push(Arc::new(move |e| {
            if e.event.is_error() && is_match(&glob, e) {
                f(e);
            }
        }));
    }

    pub fn on_event(
        &self,
        f: impl Fn(&Event<Message>) + Send + Sync + 'static,
    ) {
        let glob = self.glob.clone();

        self.channel.events.write().unwrap().push(Arc::new(move |e| {
            if is_match(&glob, e) {
                f(e);
            }
        }));
    }

    pub fn on_event_async<F>(
        &self,
        f: F,
    ) where
        F: Fn(&Event<Message>) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        let glob = self.glob.clone();

        self.channel.events_async.write().unwrap().push(Arc::new(move |e| {
            if is_match(&glob, e) {
                f(e)
            } else {
                Box::pin(async {})
            }
        }));
    }
}

fn is_match(
    glob: &(GlobMatcher, GlobMatcher),
    e: &Event<Message>,
) -> bool {
    let (pat_eid, pat_sid) = glob;
    pat_eid.is_match(&e.eid) && pat_sid.is_match(&e.sid)
}

#[cfg(test)]
mod tests {
    use std::{sync::Mutex, time::Duration};

    use super::*;
    use crate::events::EnrollmentEvent;

    fn message(
        eid: &str,
        sid: &str,
        event: EnrollmentEvent,
    ) -> Message {
        Message {
            eid: eid.to_string(),
            sid: sid.to_string(),
            lead_id: "l1".to_string(),
            event,
        }
    }

    #[test]
    fn test_channel_filters() {
        let runtime = Arc::new(tokio::runtime::Runtime::new().unwrap());
        let channel = Arc::new(Channel::new(runtime.clone()));

        let completed = Arc::new(Mutex::new(Vec::new()));
        let errors = Arc::new(Mutex::new(Vec::new()));
        let seen = completed.clone();
        ChannelEvent::channel(channel.clone(), ChannelOptions::with_sid("seq-a*".to_string())).unwrap().on_complete(move |eid| {
            seen.lock().unwrap().push(eid);
        });
        let seen = errors.clone();
        ChannelEvent::channel(channel.clone(), ChannelOptions::default()).unwrap().on_error(move |e| {
            seen.lock().unwrap().push(e.eid.clone());
        });
        channel.listen();

        channel.emit(message("e1", "seq-a1", EnrollmentEvent::Completed));
        channel.emit(message("e2", "seq-b1", EnrollmentEvent::Stopped));
        channel.emit(message("e3", "seq-a2", EnrollmentEvent::Stopped));
        channel.emit(message("e4", "seq-b1", EnrollmentEvent::Failed("boom".to_string())));

        runtime.block_on(async { tokio::time::sleep(Duration::from_millis(100)).await });
        assert_eq!(*completed.lock().unwrap(), vec!["e1".to_string(), "e3".to_string()]);
        assert_eq!(*errors.lock().unwrap(), vec!["e4".to_string()]);
        channel.shutdown();
    }

    #[test]
    fn test_invalid_pattern() {
        let runtime = Arc::new(tokio::runtime::Runtime::new().unwrap());
        let channel = Arc::new(Channel::new(runtime));
        assert!(matches!(ChannelEvent::channel(channel, ChannelOptions::with_eid("[".to_string())), Err(LeadflowError::Config(_))));
    }
}
