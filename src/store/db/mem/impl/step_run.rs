use std::collections::HashMap;

use serde_json::{Value as JsonValue, json};

use crate::{
    Result,
    store::{data::StepRun, db::mem::DbDocument},
};

impl DbDocument for StepRun {
    fn id(&self) -> &str {
        &self.id
    }

    fn doc(&self) -> Result<HashMap<String, JsonValue>> {
        let mut map = HashMap::new();
        map.insert("id".to_string(), json!(self.id.clone()));
        map.insert("eid".to_string(), json!(self.eid.clone()));
        map.insert("seq".to_string(), json!(self.seq));
        map.insert("step_index".to_string(), json!(self.step_index));
        map.insert("status".to_string(), json!(self.status));
        map.insert("executed_at".to_string(), json!(self.executed_at));
        Ok(map)
    }
}
