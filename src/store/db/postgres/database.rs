use std::sync::Arc;

use tokio::runtime::Runtime;

use crate::{
    Result,
    store::{DbCollection, DbStore, Store, data::*},
};

use super::{DbInit, collection::*, synclient::SynClient};

pub struct PostgresStore {
    sequences: Arc<SequenceCollection>,
    enrollments: Arc<EnrollmentCollection>,
    step_runs: Arc<StepRunCollection>,
    events: Arc<EventCollection>,
}

impl DbStore for PostgresStore {
    fn init(
        &self,
        s: &Store,
    ) -> Result<()> {
        self.sequences.init()?;
        self.enrollments.init()?;
        self.step_runs.init()?;
        self.events.init()?;

        s.register(self.sequences());
        s.register(self.enrollments());
        s.register(self.step_runs());
        s.register(self.events());
        Ok(())
    }
}

impl PostgresStore {
    pub fn new(
        db_url: &str,
        runtime: Arc<Runtime>,
    ) -> Result<Self> {
        let conn = Arc::new(SynClient::connect(db_url, runtime.clone())?);

        Ok(Self {
            sequences: Arc::new(SequenceCollection::new(&conn)),
            enrollments: Arc::new(EnrollmentCollection::new(&conn)),
            step_runs: Arc::new(StepRunCollection::new(&conn)),
            events: Arc::new(EventCollection::new(&conn, runtime)),
        })
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
