use std::collections::HashMap;

use serde_json::{Value as JsonValue, json};

use crate::{
    Result,
    store::{data::Enrollment, db::mem::DbDocument},
};

impl DbDocument for Enrollment {
    fn id(&self) -> &str {
        &self.id
    }

    fn doc(&self) -> Result<HashMap<String, JsonValue>> {
        let mut map = HashMap::new();
        map.insert("id".to_string(), json!(self.id.clone()));
        map.insert("sid".to_string(), json!(self.sid.clone()));
        map.insert("lead_id".to_string(), json!(self.lead_id.clone()));
        map.insert("step_index".to_string(), json!(self.step_index));
        map.insert("status".to_string(), json!(self.status));
        map.insert("next_action_at".to_string(), json!(self.next_action_at));
        map.insert("last_classification".to_string(), json!(self.last_classification.clone()));
        map.insert("create_time".to_string(), json!(self.create_time));
        map.insert("update_time".to_string(), json!(self.update_time));
        Ok(map)
    }
}
