use serde::{Deserialize, Serialize};

use crate::store::{DbCollectionIden, StoreIden};

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct StepRun {
    pub id: String,
    pub eid: String,
    /// Position in the enrollment's run history.
    pub seq: i64,

    pub step_index: i64,
    pub status: i32,
    pub result: Option<String>,
    pub executed_at: i64,
}

impl DbCollectionIden for StepRun {
    fn iden() -> StoreIden {
        StoreIden::StepRuns
    }
}
