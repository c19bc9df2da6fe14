use serde::{Deserialize, Serialize};

use crate::{LeadflowError, Result};

/// Kind of a sequence step. The wire form is the integer discriminant.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, strum::AsRefStr, strum::EnumIter)]
#[serde(try_from = "u8", into = "u8")]
#[strum(serialize_all = "snake_case")]
pub enum StepType {
    SendMessage = 1,
    WaitForReply = 2,
    Wait = 3,
    ClassifyResponse = 4,
    UpdateStatus = 5,
    AddNote = 6,
    Condition = 7,
}

impl StepType {
    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// Label shown by editors.
    pub fn label(&self) -> &'static str {
        match self {
            StepType::SendMessage => "Enviar Mensagem",
            StepType::WaitForReply => "Aguardar Resposta",
            StepType::Wait => "Aguardar",
            StepType::ClassifyResponse => "Classificar Resposta",
            StepType::UpdateStatus => "Atualizar Status",
            StepType::AddNote => "Adicionar Nota",
            StepType::Condition => "Condição",
        }
    }
}

impl TryFrom<u8> for StepType {
    type Error = LeadflowError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Self::SendMessage),
            2 => Ok(Self::WaitForReply),
            3 => Ok(Self::Wait),
            4 => Ok(Self::ClassifyResponse),
            5 => Ok(Self::UpdateStatus),
            6 => Ok(Self::AddNote),
            7 => Ok(Self::Condition),
            v => Err(LeadflowError::Convert(format!("unknown step type {}", v))),
        }
    }
}

impl From<StepType> for u8 {
    fn from(step_type: StepType) -> Self {
        step_type as u8
    }
}

/// Wire form of a step. `config` is the opaque JSON text.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StepModel {
    pub order: u32,
    #[serde(rename = "type")]
    pub step_type: StepType,
    #[serde(default)]
    pub config: Option<String>,
}

/// Wire form of a sequence as exchanged with the persistence service.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SequenceModel {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "descricao", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "isActive", default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub steps: Vec<StepModel>,
    /// Number of enrollments still in progress. Filled by listing queries.
    #[serde(rename = "executionCount", default, skip_serializing_if = "is_zero")]
    pub execution_count: usize,
}

fn default_active() -> bool {
    true
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

impl SequenceModel {
    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str::<SequenceModel>(s).map_err(|e| LeadflowError::Convert(format!("{}", e)))
    }

    /// Steps sorted by their `order`.
    pub fn ordered_steps(&self) -> Vec<&StepModel> {
        let mut steps = self.steps.iter().collect::<Vec<_>>();
        steps.sort_by_key(|s| s.order);
        steps
    }

    /// Orders must be exactly `1..=N` in array position.
    pub fn has_dense_orders(&self) -> bool {
        self.steps.iter().enumerate().all(|(i, s)| s.order as usize == i + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_model_wire_names() {
        let text = r#"{
            "nome": "Prospecção",
            "descricao": "primeiro contato",
            "isActive": false,
            "steps": [
                {"order": 1, "type": 1, "config": "{\"content\":\"Oi\"}"},
                {"order": 2, "type": 3}
            ]
        }"#;
        let model = SequenceModel::from_json(text).unwrap();
        assert_eq!(model.name, "Prospecção");
        assert_eq!(model.description.as_deref(), Some("primeiro contato"));
        assert!(!model.active);
        assert_eq!(model.steps[0].step_type, StepType::SendMessage);
        assert_eq!(model.steps[1].config, None);
        assert!(model.has_dense_orders());

        let value = serde_json::to_value(&model).unwrap();
        assert_eq!(value["steps"][1]["type"], 3);
        assert!(value.get("id").is_none());
        assert!(value.get("executionCount").is_none());
    }

    #[test]
    fn test_unknown_step_type_rejected() {
        let text = r#"{"nome": "x", "steps": [{"order": 1, "type": 8}]}"#;
        assert!(matches!(SequenceModel::from_json(text), Err(LeadflowError::Convert(_))));
    }

    #[test]
    fn test_active_defaults_true() {
        let model = SequenceModel::from_json(r#"{"nome": "x"}"#).unwrap();
        assert!(model.active);
        assert!(model.steps.is_empty());
    }
}
