use serde::{Deserialize, Serialize};

use crate::store::{DbCollectionIden, StoreIden};

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Enrollment {
    pub id: String,
    pub sid: String,
    pub lead_id: String,

    pub step_index: i64,
    pub status: i32,
    pub next_action_at: Option<i64>,
    pub last_reply: Option<String>,
    pub last_classification: Option<String>,
    pub err: Option<String>,
    pub create_time: i64,
    pub update_time: i64,
}

impl DbCollectionIden for Enrollment {
    fn iden() -> StoreIden {
        StoreIden::Enrollments
    }
}
