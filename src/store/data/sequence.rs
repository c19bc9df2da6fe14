use serde::{Deserialize, Serialize};

use crate::store::{DbCollectionIden, StoreIden};

/// Stored sequence. `data` holds the full wire model as JSON.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Sequence {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
    pub data: String,
    pub create_time: i64,
    pub update_time: i64,
}

impl DbCollectionIden for Sequence {
    fn iden() -> StoreIden {
        StoreIden::Sequences
    }
}
