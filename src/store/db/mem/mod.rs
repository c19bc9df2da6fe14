mod collect;
mod r#impl;

use std::{collections::HashMap, sync::Arc};

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value as JsonValue;

use crate::{
    Result,
    store::{DbCollection, DbStore, Store, data::*},
};
pub use collect::Collect;

#[derive(Debug, Clone)]
pub struct MemStore {
    sequences: Arc<Collect<Sequence>>,
    enrollments: Arc<Collect<Enrollment>>,
    step_runs: Arc<Collect<StepRun>>,
    events: Arc<Collect<Event>>,
}

/// Record that can be matched by a query: `doc` exposes the filterable fields.
trait DbDocument: Serialize + DeserializeOwned {
    fn id(&self) -> &str;
    fn doc(&self) -> Result<HashMap<String, JsonValue>>;
}

impl DbStore for MemStore {
    fn init(
        &self,
        s: &Store,
    ) -> Result<()> {
        s.register(self.sequences());
        s.register(self.enrollments());
        s.register(self.step_runs());
        s.register(self.events());
        Ok(())
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            sequences: Arc::new(Collect::new("sequences")),
            enrollments: Arc::new(Collect::new("enrollments")),
            step_runs: Arc::new(Collect::new("step_runs")),
            events: Arc::new(Collect::new("events")),
        }
    }

    pub fn sequences(&self) -> Arc<dyn DbCollection<Item = Sequence> + Send + Sync> {
        self.sequences.clone()
    }

    pub fn enrollments(&self) -> Arc<dyn DbCollection<Item = Enrollment> + Send + Sync> {
        self.enrollments.clone()
    }

    pub fn step_runs(&self) -> Arc<dyn DbCollection<Item = StepRun> + Send + Sync> {
        self.step_runs.clone()
    }

    pub fn events(&self) -> Arc<dyn DbCollection<Item = Event> + Send + Sync> {
        self.events.clone()
    }
}
