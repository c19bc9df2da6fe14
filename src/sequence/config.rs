//! Typed per-step configuration and its JSON codec.
//!
//! Configs travel as opaque JSON text. Decoding is lenient: malformed text
//! degrades to an empty object and every missing or invalid field takes its
//! per-type default, so a stored sequence can always be loaded.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::{
    model::{LeadStatus, StepType},
    sequence::template,
};

/// Smallest accepted wait, in hours.
pub const MIN_HOURS: u32 = 1;
/// Largest accepted wait, in hours (30 days).
pub const MAX_HOURS: u32 = 720;
/// Wait used when none (or a non-positive one) is configured.
pub const DEFAULT_HOURS: u32 = 24;
/// Field a condition inspects when none is configured.
pub const DEFAULT_CONDITION_FIELD: &str = "classification";
/// Branch value taken when no other branch matches.
pub const DEFAULT_BRANCH: &str = "default";
/// Message inserted by the editor for a new SendMessage step.
pub const DEFAULT_MESSAGE: &str = "Olá {{nomeFantasia}}! Sou da equipe Dominus. Podemos conversar?";
/// Note inserted by the editor for a new AddNote step.
pub const DEFAULT_NOTE: &str = "Contato automático realizado.";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Provider {
    #[default]
    Evolution,
    Twilio,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum MessageChannel {
    #[default]
    Whatsapp,
    Sms,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum OnTimeout {
    #[default]
    Next,
    Stop,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageConfig {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    pub provider: Provider,
    pub channel: MessageChannel,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WaitForReplyConfig {
    pub timeout_hours: u32,
    pub on_timeout: OnTimeout,
}

impl Default for WaitForReplyConfig {
    fn default() -> Self {
        Self {
            timeout_hours: DEFAULT_HOURS,
            on_timeout: OnTimeout::Next,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WaitConfig {
    pub hours: u32,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            hours: DEFAULT_HOURS,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct UpdateStatusConfig {
    pub status: LeadStatus,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AddNoteConfig {
    pub note_content: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConditionBranch {
    pub value: String,
    pub label: String,
    /// 1-based order of the target step; 0 means fall through.
    pub go_to_step: u32,
}

impl ConditionBranch {
    pub fn new(
        value: &str,
        label: &str,
    ) -> Self {
        Self {
            value: value.to_string(),
            label: label.to_string(),
            go_to_step: 0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ConditionConfig {
    pub field: String,
    pub branches: Vec<ConditionBranch>,
}

impl Default for ConditionConfig {
    fn default() -> Self {
        Self {
            field: DEFAULT_CONDITION_FIELD.to_string(),
            branches: Vec::new(),
        }
    }
}

impl ConditionConfig {
    /// Pick the branch for `value`: first case-insensitive match, else the `default` branch.
    pub fn select(
        &self,
        value: &str,
    ) -> Option<&ConditionBranch> {
        let value = value.trim().to_lowercase();
        self.branches
            .iter()
            .find(|b| b.value.trim().to_lowercase() == value)
            .or_else(|| self.branches.iter().find(|b| b.value.trim().eq_ignore_ascii_case(DEFAULT_BRANCH)))
    }
}

/// Decoded configuration of one step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepConfig {
    SendMessage(SendMessageConfig),
    WaitForReply(WaitForReplyConfig),
    Wait(WaitConfig),
    ClassifyResponse,
    UpdateStatus(UpdateStatusConfig),
    AddNote(AddNoteConfig),
    Condition(ConditionConfig),
}

impl StepConfig {
    pub fn step_type(&self) -> StepType {
        match self {
            StepConfig::SendMessage(_) => StepType::SendMessage,
            StepConfig::WaitForReply(_) => StepType::WaitForReply,
            StepConfig::Wait(_) => StepType::Wait,
            StepConfig::ClassifyResponse => StepType::ClassifyResponse,
            StepConfig::UpdateStatus(_) => StepType::UpdateStatus,
            StepConfig::AddNote(_) => StepType::AddNote,
            StepConfig::Condition(_) => StepType::Condition,
        }
    }

    /// Per-type defaults, the result of decoding `{}`.
    pub fn defaults(step_type: StepType) -> Self {
        match step_type {
            StepType::SendMessage => StepConfig::SendMessage(SendMessageConfig::default()),
            StepType::WaitForReply => StepConfig::WaitForReply(WaitForReplyConfig::default()),
            StepType::Wait => StepConfig::Wait(WaitConfig::default()),
            StepType::ClassifyResponse => StepConfig::ClassifyResponse,
            StepType::UpdateStatus => StepConfig::UpdateStatus(UpdateStatusConfig::default()),
            StepType::AddNote => StepConfig::AddNote(AddNoteConfig::default()),
            StepType::Condition => StepConfig::Condition(ConditionConfig::default()),
        }
    }

    /// Config an editor inserts for a freshly added step.
    pub fn template(step_type: StepType) -> Self {
        match step_type {
            StepType::SendMessage => StepConfig::SendMessage(SendMessageConfig {
                content: DEFAULT_MESSAGE.to_string(),
                ..Default::default()
            }),
            StepType::UpdateStatus => StepConfig::UpdateStatus(UpdateStatusConfig {
                status: LeadStatus::Contatado,
            }),
            StepType::AddNote => StepConfig::AddNote(AddNoteConfig {
                note_content: DEFAULT_NOTE.to_string(),
            }),
            StepType::Condition => StepConfig::Condition(ConditionConfig {
                field: DEFAULT_CONDITION_FIELD.to_string(),
                branches: vec![
                    ConditionBranch::new("interesse", "Interesse"),
                    ConditionBranch::new("duvida", "Dúvida"),
                    ConditionBranch::new("sem_interesse", "Sem Interesse"),
                ],
            }),
            other => Self::defaults(other),
        }
    }

    /// Decode raw config text for `step_type`. Never fails.
    pub fn decode(
        step_type: StepType,
        raw: Option<&str>,
    ) -> Self {
        Self::from_object(step_type, &parse_config_object(raw))
    }

    /// Decode an already parsed config object. Never fails.
    pub fn from_object(
        step_type: StepType,
        obj: &Map<String, Value>,
    ) -> Self {
        match step_type {
            StepType::SendMessage => StepConfig::SendMessage(SendMessageConfig {
                content: read_string(obj, "content").unwrap_or_default(),
                media_url: read_string(obj, "mediaUrl").filter(|url| !url.trim().is_empty()),
                provider: read_enum(obj, "provider"),
                channel: read_enum(obj, "channel"),
            }),
            StepType::WaitForReply => StepConfig::WaitForReply(WaitForReplyConfig {
                timeout_hours: normalize_hours(read_int(obj, "timeoutHours")),
                on_timeout: read_enum(obj, "onTimeout"),
            }),
            StepType::Wait => StepConfig::Wait(WaitConfig {
                hours: normalize_hours(read_int(obj, "hours")),
            }),
            StepType::ClassifyResponse => StepConfig::ClassifyResponse,
            StepType::UpdateStatus => StepConfig::UpdateStatus(UpdateStatusConfig {
                status: read_int(obj, "status").map(LeadStatus::from_code).unwrap_or_default(),
            }),
            StepType::AddNote => StepConfig::AddNote(AddNoteConfig {
                note_content: read_string(obj, "noteContent").unwrap_or_default(),
            }),
            StepType::Condition => {
                let field = read_string(obj, "field").filter(|f| !f.trim().is_empty()).unwrap_or_else(|| DEFAULT_CONDITION_FIELD.to_string());
                let branches = obj.get("branches").and_then(Value::as_array).map(|items| items.iter().filter_map(read_branch).collect()).unwrap_or_default();
                StepConfig::Condition(ConditionConfig {
                    field,
                    branches,
                })
            }
        }
    }

    /// Canonical JSON object of this config.
    pub fn to_object(&self) -> Map<String, Value> {
        let value = match self {
            StepConfig::SendMessage(c) => serde_json::to_value(c),
            StepConfig::WaitForReply(c) => serde_json::to_value(c),
            StepConfig::Wait(c) => serde_json::to_value(c),
            StepConfig::ClassifyResponse => Ok(json!({})),
            StepConfig::UpdateStatus(c) => serde_json::to_value(c),
            StepConfig::AddNote(c) => serde_json::to_value(c),
            StepConfig::Condition(c) => serde_json::to_value(c),
        };
        match value {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// Canonical JSON text of this config.
    pub fn encode(&self) -> String {
        Value::Object(self.to_object()).to_string()
    }

    /// Check raw config text against the per-type schema.
    ///
    /// Returns human readable warnings; an empty list means the config is clean.
    pub fn lint(
        step_type: StepType,
        raw: Option<&str>,
    ) -> Vec<String> {
        let mut warnings = Vec::new();
        let instance = match raw.map(str::trim).filter(|s| !s.is_empty()) {
            None => Value::Object(Map::new()),
            Some(text) => match serde_json::from_str::<Value>(text) {
                Ok(value @ Value::Object(_)) => value,
                Ok(_) => {
                    warnings.push("config is not a JSON object, defaults will be used".to_string());
                    return warnings;
                }
                Err(e) => {
                    warnings.push(format!("config is not valid JSON ({}), defaults will be used", e));
                    return warnings;
                }
            },
        };

        match jsonschema::validator_for(&schema(step_type)) {
            Ok(validator) => {
                for error in validator.iter_errors(&instance) {
                    warnings.push(error.to_string());
                }
            }
            Err(e) => warnings.push(format!("invalid schema for {}: {}", step_type.as_ref(), e)),
        }

        if let StepConfig::SendMessage(c) = Self::decode(step_type, raw) {
            if c.provider == Provider::Evolution && c.channel == MessageChannel::Sms {
                warnings.push("sms channel is only available with the twilio provider, whatsapp will be used".to_string());
            }
            for name in template::unknown_placeholders(&c.content) {
                warnings.push(format!("unknown variable {{{{{}}}}} will be sent as written", name));
            }
        }

        warnings
    }
}

/// Parse raw config text into a JSON object; anything else yields `{}`.
pub fn parse_config_object(raw: Option<&str>) -> Map<String, Value> {
    match raw.map(str::trim).filter(|s| !s.is_empty()).map(serde_json::from_str::<Value>) {
        Some(Ok(Value::Object(map))) => map,
        _ => Map::new(),
    }
}

/// JSON schema of the config object for `step_type`.
pub fn schema(step_type: StepType) -> Value {
    let hours = json!({ "type": "integer", "minimum": MIN_HOURS, "maximum": MAX_HOURS });
    match step_type {
        StepType::SendMessage => json!({
            "type": "object",
            "required": ["content"],
            "properties": {
                "content": { "type": "string", "minLength": 1 },
                "mediaUrl": { "type": ["string", "null"] },
                "provider": { "enum": ["evolution", "twilio"] },
                "channel": { "enum": ["whatsapp", "sms"] }
            }
        }),
        StepType::WaitForReply => json!({
            "type": "object",
            "properties": {
                "timeoutHours": hours,
                "onTimeout": { "enum": ["next", "stop"] }
            }
        }),
        StepType::Wait => json!({
            "type": "object",
            "properties": {
                "hours": hours
            }
        }),
        StepType::ClassifyResponse => json!({
            "type": "object"
        }),
        StepType::UpdateStatus => json!({
            "type": "object",
            "required": ["status"],
            "properties": {
                "status": { "type": "integer", "minimum": 1, "maximum": 6 }
            }
        }),
        StepType::AddNote => json!({
            "type": "object",
            "properties": {
                "noteContent": { "type": "string" }
            }
        }),
        StepType::Condition => json!({
            "type": "object",
            "properties": {
                "field": { "type": "string" },
                "branches": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["value"],
                        "properties": {
                            "value": { "type": "string" },
                            "label": { "type": "string" },
                            "goToStep": { "type": "integer", "minimum": 0 }
                        }
                    }
                }
            }
        }),
    }
}

fn normalize_hours(hours: Option<i64>) -> u32 {
    match hours {
        Some(h) if h >= MAX_HOURS as i64 => MAX_HOURS,
        Some(h) if h >= MIN_HOURS as i64 => h as u32,
        _ => DEFAULT_HOURS,
    }
}

fn read_branch(value: &Value) -> Option<ConditionBranch> {
    let obj = value.as_object()?;
    let value = read_string(obj, "value").unwrap_or_default();
    let label = read_string(obj, "label").filter(|l| !l.is_empty()).unwrap_or_else(|| value.clone());
    let go_to_step = read_int(obj, "goToStep").filter(|n| *n > 0).and_then(|n| u32::try_from(n).ok()).unwrap_or(0);
    Some(ConditionBranch {
        value,
        label,
        go_to_step,
    })
}

fn read_string(
    obj: &Map<String, Value>,
    key: &str,
) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn read_int(
    obj: &Map<String, Value>,
    key: &str,
) -> Option<i64> {
    match obj.get(key)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn read_enum<T>(
    obj: &Map<String, Value>,
    key: &str,
) -> T
where
    T: std::str::FromStr + Default,
{
    read_string(obj, key).and_then(|s| s.trim().parse::<T>().ok()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    // ==================== decode tests ====================

    #[test]
    fn test_parse_malformed_config_is_empty_object() {
        assert!(parse_config_object(Some("{not json")).is_empty());
        assert!(parse_config_object(Some("[1,2]")).is_empty());
        assert!(parse_config_object(Some("")).is_empty());
        assert!(parse_config_object(None).is_empty());
        assert_eq!(parse_config_object(Some(r#"{"a":1}"#)).len(), 1);
    }

    #[test]
    fn test_decode_every_type_from_garbage_gives_defaults() {
        for step_type in StepType::iter() {
            assert_eq!(StepConfig::decode(step_type, Some("{not json")), StepConfig::defaults(step_type));
            assert_eq!(StepConfig::decode(step_type, None), StepConfig::defaults(step_type));
        }
    }

    #[test]
    fn test_decode_wait_for_reply_defaults() {
        let config = StepConfig::decode(StepType::WaitForReply, Some("{}"));
        assert_eq!(
            config,
            StepConfig::WaitForReply(WaitForReplyConfig {
                timeout_hours: 24,
                on_timeout: OnTimeout::Next,
            })
        );
    }

    #[test]
    fn test_decode_hours_bounds() {
        let hours = |raw: &str| match StepConfig::decode(StepType::Wait, Some(raw)) {
            StepConfig::Wait(c) => c.hours,
            _ => unreachable!(),
        };
        assert_eq!(hours(r#"{"hours": 0}"#), 24);
        assert_eq!(hours(r#"{"hours": -5}"#), 24);
        assert_eq!(hours(r#"{"hours": 1}"#), 1);
        assert_eq!(hours(r#"{"hours": 720}"#), 720);
        assert_eq!(hours(r#"{"hours": 9000}"#), 720);
        assert_eq!(hours(r#"{"hours": "48"}"#), 48);
        assert_eq!(hours(r#"{"hours": "abc"}"#), 24);
    }

    #[test]
    fn test_decode_unknown_enums_fall_back() {
        let config = StepConfig::decode(StepType::SendMessage, Some(r#"{"content":"Oi","provider":"carrier-pigeon","channel":"SMS"}"#));
        let StepConfig::SendMessage(c) = config else {
            panic!("expected send message");
        };
        assert_eq!(c.provider, Provider::Evolution);
        assert_eq!(c.channel, MessageChannel::Sms);
        assert_eq!(c.media_url, None);

        let config = StepConfig::decode(StepType::WaitForReply, Some(r#"{"timeoutHours":2,"onTimeout":"explode"}"#));
        assert_eq!(
            config,
            StepConfig::WaitForReply(WaitForReplyConfig {
                timeout_hours: 2,
                on_timeout: OnTimeout::Next,
            })
        );
    }

    #[test]
    fn test_decode_status_out_of_range() {
        assert_eq!(
            StepConfig::decode(StepType::UpdateStatus, Some(r#"{"status": 9}"#)),
            StepConfig::UpdateStatus(UpdateStatusConfig {
                status: LeadStatus::Novo,
            })
        );
        assert_eq!(
            StepConfig::decode(StepType::UpdateStatus, Some(r#"{"status": 4}"#)),
            StepConfig::UpdateStatus(UpdateStatusConfig {
                status: LeadStatus::Proposta,
            })
        );
    }

    #[test]
    fn test_decode_condition_branches() {
        let raw = r#"{"branches":[{"value":"interesse","goToStep":2},{"value":"duvida","label":"Dúvida","goToStep":-1},"junk"]}"#;
        let StepConfig::Condition(c) = StepConfig::decode(StepType::Condition, Some(raw)) else {
            panic!("expected condition");
        };
        assert_eq!(c.field, "classification");
        assert_eq!(c.branches.len(), 2);
        assert_eq!(c.branches[0].label, "interesse");
        assert_eq!(c.branches[0].go_to_step, 2);
        assert_eq!(c.branches[1].go_to_step, 0);
    }

    // ==================== encode tests ====================

    #[test]
    fn test_encode_then_decode_keeps_config() {
        for step_type in StepType::iter() {
            let config = StepConfig::template(step_type);
            assert_eq!(StepConfig::decode(step_type, Some(&config.encode())), config);
        }
    }

    #[test]
    fn test_encode_uses_wire_names() {
        let config = StepConfig::WaitForReply(WaitForReplyConfig {
            timeout_hours: 12,
            on_timeout: OnTimeout::Stop,
        });
        let value: Value = serde_json::from_str(&config.encode()).unwrap();
        assert_eq!(value, json!({"timeoutHours": 12, "onTimeout": "stop"}));
        assert_eq!(StepConfig::ClassifyResponse.encode(), "{}");
    }

    #[test]
    fn test_templates() {
        let StepConfig::SendMessage(c) = StepConfig::template(StepType::SendMessage) else {
            panic!("expected send message");
        };
        assert_eq!(c.content, DEFAULT_MESSAGE);

        let StepConfig::Condition(c) = StepConfig::template(StepType::Condition) else {
            panic!("expected condition");
        };
        assert_eq!(c.branches.iter().map(|b| b.value.as_str()).collect::<Vec<_>>(), vec!["interesse", "duvida", "sem_interesse"]);
        assert!(c.branches.iter().all(|b| b.go_to_step == 0));

        assert_eq!(
            StepConfig::template(StepType::UpdateStatus),
            StepConfig::UpdateStatus(UpdateStatusConfig {
                status: LeadStatus::Contatado,
            })
        );
    }

    // ==================== condition tests ====================

    #[test]
    fn test_condition_select() {
        let mut config = ConditionConfig::default();
        config.branches.push(ConditionBranch::new("Interesse", "Interesse"));
        assert!(config.select("interesse").is_some());
        assert!(config.select("spam").is_none());

        config.branches.push(ConditionBranch::new("default", "Outro"));
        assert_eq!(config.select("spam").map(|b| b.label.as_str()), Some("Outro"));
    }

    // ==================== lint tests ====================

    #[test]
    fn test_lint_reports_problems() {
        assert!(StepConfig::lint(StepType::Wait, Some(r#"{"hours": 5}"#)).is_empty());
        assert_eq!(StepConfig::lint(StepType::Wait, Some(r#"{"hours": 900}"#)).len(), 1);
        assert_eq!(StepConfig::lint(StepType::Wait, Some("{oops")).len(), 1);
        assert!(!StepConfig::lint(StepType::SendMessage, Some("{}")).is_empty());
        assert_eq!(StepConfig::lint(StepType::SendMessage, Some(r#"{"content":"Oi","channel":"sms"}"#)).len(), 1);
        assert!(StepConfig::lint(StepType::SendMessage, Some(r#"{"content":"Oi","provider":"twilio","channel":"sms"}"#)).is_empty());

        let warnings = StepConfig::lint(StepType::SendMessage, Some(r#"{"content":"Oi {{ nomeFantasia }} {{apelido}}"}"#));
        assert_eq!(warnings, vec!["unknown variable {{apelido}} will be sent as written".to_string()]);
    }
}
