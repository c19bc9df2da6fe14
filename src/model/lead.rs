use serde::{Deserialize, Serialize};

use crate::{LeadflowError, Result, common::Vars};

/// Pipeline status of a lead.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash, strum::AsRefStr)]
#[serde(try_from = "u8", into = "u8")]
pub enum LeadStatus {
    #[default]
    Novo = 1,
    Contatado = 2,
    Qualificado = 3,
    Proposta = 4,
    Fechado = 5,
    Descartado = 6,
}

impl LeadStatus {
    /// Map a raw code, falling back to `Novo` outside `1..=6`.
    pub fn from_code(code: i64) -> Self {
        u8::try_from(code).ok().and_then(|c| Self::try_from(c).ok()).unwrap_or_default()
    }

    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl TryFrom<u8> for LeadStatus {
    type Error = LeadflowError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Self::Novo),
            2 => Ok(Self::Contatado),
            3 => Ok(Self::Qualificado),
            4 => Ok(Self::Proposta),
            5 => Ok(Self::Fechado),
            6 => Ok(Self::Descartado),
            v => Err(LeadflowError::Convert(format!("unknown lead status {}", v))),
        }
    }
}

impl From<LeadStatus> for u8 {
    fn from(status: LeadStatus) -> Self {
        status as u8
    }
}

/// CRM prospect as seen by the engine.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: String,
    #[serde(default)]
    pub cnpj: String,
    #[serde(default)]
    pub razao_social: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nome_fantasia: Option<String>,
    #[serde(default)]
    pub cidade: Option<String>,
    #[serde(default)]
    pub uf: Option<String>,
    #[serde(default)]
    pub telefone: Option<String>,
    #[serde(default)]
    pub status: LeadStatus,
}

impl Lead {
    /// Name used when talking to the lead: trade name, else legal name.
    pub fn display_name(&self) -> &str {
        match self.nome_fantasia.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.razao_social,
        }
    }

    /// Snapshot of the lead fields exposed to templates and conditions.
    pub fn vars(&self) -> Vars {
        Vars::new()
            .with("cnpj", self.cnpj.as_str())
            .with("razaoSocial", self.razao_social.as_str())
            .with("nomeFantasia", self.display_name())
            .with("cidade", self.cidade.clone().unwrap_or_default())
            .with("uf", self.uf.clone().unwrap_or_default())
            .with("telefone", self.telefone.clone().unwrap_or_default())
            .with("status", self.status.code())
    }
}

/// Entry appended to a lead's timeline.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TimelineNote {
    pub kind: String,
    pub title: String,
    pub body: String,
    pub icon: String,
    pub color: String,
    pub timestamp: i64,
}

impl TimelineNote {
    pub fn message_sent(
        content: &str,
        timestamp: i64,
    ) -> Self {
        Self {
            kind: "message".to_string(),
            title: "Mensagem Enviada".to_string(),
            body: format!("Sequência automação: {}", content),
            icon: "send".to_string(),
            color: "#10b981".to_string(),
            timestamp,
        }
    }

    pub fn automatic_note(
        content: &str,
        timestamp: i64,
    ) -> Self {
        let body = if content.trim().is_empty() {
            "Registrado via automação".to_string()
        } else {
            content.to_string()
        };
        Self {
            kind: "note".to_string(),
            title: "Nota Automática".to_string(),
            body,
            icon: "sticky-note".to_string(),
            color: "#f59e0b".to_string(),
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lead_status_codes() {
        assert_eq!(LeadStatus::from_code(3), LeadStatus::Qualificado);
        assert_eq!(LeadStatus::from_code(0), LeadStatus::Novo);
        assert_eq!(LeadStatus::from_code(7), LeadStatus::Novo);
        assert_eq!(LeadStatus::from_code(-1), LeadStatus::Novo);
        assert!(serde_json::from_str::<LeadStatus>("9").is_err());
        assert_eq!(serde_json::to_string(&LeadStatus::Fechado).unwrap(), "5");
    }

    #[test]
    fn test_lead_vars_fall_back_to_razao_social() {
        let lead = Lead {
            id: "l1".to_string(),
            razao_social: "Acme LTDA".to_string(),
            nome_fantasia: Some("  ".to_string()),
            cidade: Some("Recife".to_string()),
            ..Default::default()
        };
        let vars = lead.vars();
        assert_eq!(vars.get_text("nomeFantasia").as_deref(), Some("Acme LTDA"));
        assert_eq!(vars.get_text("cidade").as_deref(), Some("Recife"));
        assert_eq!(vars.get_text("uf").as_deref(), Some(""));
    }

    #[test]
    fn test_automatic_note_default_body() {
        let note = TimelineNote::automatic_note("  ", 10);
        assert_eq!(note.body, "Registrado via automação");
        assert_eq!(note.color, "#f59e0b");

        let sent = TimelineNote::message_sent("Oi", 10);
        assert_eq!(sent.body, "Sequência automação: Oi");
        assert_eq!(sent.title, "Mensagem Enviada");
    }
}
