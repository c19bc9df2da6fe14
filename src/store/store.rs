use std::{
    any::Any,
    collections::HashMap,
    convert::AsRef,
    sync::{Arc, RwLock},
};

use tracing::trace;

use crate::{
    LeadflowError, Result, ShareLock,
    model::SequenceModel,
    runtime::{Enrollment, EnrollmentId, EnrollmentStatus, StepRun},
};

use super::{
    DbCollection, DbCollectionIden, StoreIden,
    data::{self, *},
    query::{Expr, Query, UNLIMITED},
};

#[derive(Clone)]
pub struct DynDbSetRef<T>(Arc<dyn DbCollection<Item = T>>);

/// Registry of collections plus the domain-level reads and writes built on them.
pub struct Store {
    collections: ShareLock<HashMap<StoreIden, Arc<dyn Any + Send + Sync + 'static>>>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

fn active_codes() -> Vec<i32> {
    EnrollmentStatus::active().iter().map(|s| s.code() as i32).collect()
}

impl Store {
    pub fn new() -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn collection<DATA>(&self) -> Arc<dyn DbCollection<Item = DATA>>
    where
        DATA: DbCollectionIden + Send + Sync + 'static,
    {
        let collections = self.collections.read().unwrap();

        #[allow(clippy::expect_fun_call)]
        let collection = collections.get(&DATA::iden()).expect(&format!("fail to get collection: {}", DATA::iden().as_ref()));

        #[allow(clippy::expect_fun_call)]
        collection.downcast_ref::<DynDbSetRef<DATA>>().map(|v| v.0.clone()).expect(&format!("fail to get collection: {}", DATA::iden().as_ref()))
    }

    pub fn register<DATA>(
        &self,
        collection: Arc<dyn DbCollection<Item = DATA> + Send + Sync + 'static>,
    ) where
        DATA: DbCollectionIden + 'static,
    {
        let mut collections = self.collections.write().unwrap();
        collections.insert(DATA::iden(), Arc::new(DynDbSetRef::<DATA>(collection)));
    }

    pub fn sequences(&self) -> Arc<dyn DbCollection<Item = Sequence>> {
        self.collection()
    }

    pub fn enrollments(&self) -> Arc<dyn DbCollection<Item = data::Enrollment>> {
        self.collection()
    }

    pub fn step_runs(&self) -> Arc<dyn DbCollection<Item = data::StepRun>> {
        self.collection()
    }

    pub fn events(&self) -> Arc<dyn DbCollection<Item = Event>> {
        self.collection()
    }

    // ==================== sequences ====================

    /// Insert or replace a sequence. The model must carry an id.
    pub fn save_sequence(
        &self,
        model: &SequenceModel,
        now: i64,
    ) -> Result<()> {
        trace!("store::save_sequence({})", model.id);
        if model.id.is_empty() {
            return Err(LeadflowError::Sequence("missing id in sequence".into()));
        }
        let mut stored = model.clone();
        stored.execution_count = 0;
        let text = serde_json::to_string(&stored)?;

        let sequences = self.sequences();
        let existing = match sequences.exists(&model.id)? {
            true => Some(sequences.find(&model.id)?),
            false => None,
        };
        let data = Sequence {
            id: model.id.clone(),
            name: model.name.clone(),
            description: model.description.clone(),
            active: model.active,
            data: text,
            create_time: existing.as_ref().map(|s| s.create_time).unwrap_or(now),
            update_time: now,
        };
        match existing {
            Some(_) => sequences.update(&data)?,
            None => sequences.create(&data)?,
        };
        Ok(())
    }

    pub fn load_sequence_model(
        &self,
        id: &str,
    ) -> Result<SequenceModel> {
        trace!("store::load_sequence_model({})", id);
        Self::sequence_model(self.sequences().find(id)?)
    }

    /// All sequences, newest first.
    pub fn list_sequence_models(&self) -> Result<Vec<SequenceModel>> {
        let page = self.sequences().query(&Query::new().push_order("create_time", true).set_limit(UNLIMITED))?;
        page.rows.into_iter().map(Self::sequence_model).collect()
    }

    pub fn delete_sequence(
        &self,
        id: &str,
    ) -> Result<bool> {
        trace!("store::delete_sequence({})", id);
        self.sequences().delete(id)
    }

    fn sequence_model(data: Sequence) -> Result<SequenceModel> {
        let mut model = SequenceModel::from_json(&data.data)?;
        model.id = data.id;
        model.name = data.name;
        model.description = data.description;
        model.active = data.active;
        Ok(model)
    }

    // ==================== enrollments ====================

    /// Write the enrollment row and any step runs recorded since the last save.
    pub fn save_enrollment(
        &self,
        enrollment: &mut Enrollment,
    ) -> Result<()> {
        trace!("store::save_enrollment({}, {:?})", enrollment.id, enrollment.status);
        let enrollments = self.enrollments();
        let data = enrollment.to_data();
        if !enrollments.update(&data)? {
            enrollments.create(&data)?;
        }

        let step_runs = self.step_runs();
        for (seq, run) in enrollment.unsaved_runs() {
            step_runs.create(&run.to_data(seq))?;
        }
        enrollment.mark_saved();
        Ok(())
    }

    /// Load an enrollment with its run history.
    pub fn load_enrollment(
        &self,
        id: &str,
    ) -> Result<Enrollment> {
        let enrollments = self.enrollments();
        if !enrollments.exists(id)? {
            return Err(LeadflowError::Enrollment(format!("enrollment '{}' not found", id)));
        }
        let data = enrollments.find(id)?;
        let runs = self.load_step_runs(id)?;
        Enrollment::from_data(data, runs)
    }

    pub fn load_step_runs(
        &self,
        eid: &str,
    ) -> Result<Vec<StepRun>> {
        let page = self.step_runs().query(&Query::new().filter(Expr::eq("eid", eid)).push_order("seq", false).set_limit(UNLIMITED))?;
        page.rows.into_iter().map(StepRun::from_data).collect()
    }

    /// Newest enrollments first, optionally for one sequence, with their run history.
    pub fn list_enrollments(
        &self,
        sid: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Enrollment>> {
        let mut q = Query::new().push_order("create_time", true).set_limit(limit);
        if let Some(sid) = sid {
            q = q.filter(Expr::eq("sid", sid));
        }
        let page = self.enrollments().query(&q)?;
        page.rows
            .into_iter()
            .map(|data| {
                let runs = self.load_step_runs(&data.id)?;
                Enrollment::from_data(data, runs)
            })
            .collect()
    }

    /// Ids of enrollments the scheduler should advance at `now`, oldest first.
    pub fn due_enrollments(
        &self,
        now: i64,
    ) -> Result<Vec<EnrollmentId>> {
        let running = EnrollmentStatus::Running.code() as i32;
        let walkable = [running, EnrollmentStatus::WaitingReply.code() as i32, EnrollmentStatus::WaitingDelay.code() as i32];
        let due = Expr::eq("status", running).and(Expr::is_null("next_action_at")).or(Expr::le("next_action_at", now).and(Expr::is_in("status", walkable)));

        let page = self.enrollments().query(&Query::new().filter(due).push_order("update_time", false).set_limit(UNLIMITED))?;
        Ok(page.rows.into_iter().map(|e| e.id).collect())
    }

    /// Ids of in-progress enrollments matching the optional sequence and lead.
    pub fn active_enrollments(
        &self,
        sid: Option<&str>,
        lead_id: Option<&str>,
    ) -> Result<Vec<EnrollmentId>> {
        let mut q = Query::new().filter(Expr::is_in("status", active_codes())).set_limit(UNLIMITED);
        if let Some(sid) = sid {
            q = q.filter(Expr::eq("sid", sid));
        }
        if let Some(lead_id) = lead_id {
            q = q.filter(Expr::eq("lead_id", lead_id));
        }
        Ok(self.enrollments().query(&q)?.rows.into_iter().map(|e| e.id).collect())
    }

    pub fn count_active_enrollments(
        &self,
        sid: &str,
    ) -> Result<usize> {
        let q = Query::new().filter(Expr::eq("sid", sid)).filter(Expr::is_in("status", active_codes())).set_limit(1);
        Ok(self.enrollments().query(&q)?.count)
    }

    /// Ids of the lead's enrollments parked on a reply.
    pub fn waiting_reply_enrollments(
        &self,
        lead_id: &str,
    ) -> Result<Vec<EnrollmentId>> {
        let q = Query::new()
            .filter(Expr::eq("lead_id", lead_id))
            .filter(Expr::eq("status", EnrollmentStatus::WaitingReply.code() as i32))
            .push_order("create_time", false)
            .set_limit(UNLIMITED);
        Ok(self.enrollments().query(&q)?.rows.into_iter().map(|e| e.id).collect())
    }
}
