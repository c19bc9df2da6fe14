use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use async_trait::async_trait;

use crate::{
    LeadflowError, Result, ShareLock,
    lead::LeadDirectory,
    model::{Lead, LeadStatus, TimelineNote},
};

/// In-memory lead directory.
#[derive(Debug, Clone, Default)]
pub struct MemLeadDirectory {
    leads: ShareLock<HashMap<String, Lead>>,
    notes: ShareLock<HashMap<String, Vec<TimelineNote>>>,
}

impl MemLeadDirectory {
    pub fn new() -> Self {
        Self {
            leads: Arc::new(RwLock::new(HashMap::new())),
            notes: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Add or replace a lead.
    pub fn insert(
        &self,
        lead: Lead,
    ) {
        self.leads.write().unwrap().insert(lead.id.clone(), lead);
    }

    pub fn lead(
        &self,
        lead_id: &str,
    ) -> Option<Lead> {
        self.leads.read().unwrap().get(lead_id).cloned()
    }

    /// Timeline notes appended to the lead, oldest first.
    pub fn notes(
        &self,
        lead_id: &str,
    ) -> Vec<TimelineNote> {
        self.notes.read().unwrap().get(lead_id).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl LeadDirectory for MemLeadDirectory {
    async fn find(
        &self,
        lead_id: &str,
    ) -> Result<Lead> {
        self.lead(lead_id).ok_or_else(|| LeadflowError::Lead(format!("lead '{}' not found", lead_id)))
    }

    async fn set_status(
        &self,
        lead_id: &str,
        status: LeadStatus,
    ) -> Result<()> {
        let mut leads = self.leads.write().unwrap();
        let lead = leads.get_mut(lead_id).ok_or_else(|| LeadflowError::Lead(format!("lead '{}' not found", lead_id)))?;
        lead.status = status;
        Ok(())
    }

    async fn append_note(
        &self,
        lead_id: &str,
        note: TimelineNote,
    ) -> Result<()> {
        if !self.leads.read().unwrap().contains_key(lead_id) {
            return Err(LeadflowError::Lead(format!("lead '{}' not found", lead_id)));
        }
        self.notes.write().unwrap().entry(lead_id.to_string()).or_default().push(note);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mem_directory() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let leads = MemLeadDirectory::new();
        leads.insert(Lead {
            id: "l1".to_string(),
            razao_social: "ACME LTDA".to_string(),
            ..Default::default()
        });

        runtime.block_on(async {
            assert_eq!(leads.find("l1").await.unwrap().status, LeadStatus::Novo);
            leads.set_status("l1", LeadStatus::Qualificado).await.unwrap();
            leads.append_note("l1", TimelineNote::automatic_note("", 1)).await.unwrap();

            assert!(matches!(leads.find("nope").await, Err(LeadflowError::Lead(_))));
            assert!(leads.append_note("nope", TimelineNote::automatic_note("x", 1)).await.is_err());
        });

        assert_eq!(leads.lead("l1").unwrap().status, LeadStatus::Qualificado);
        assert_eq!(leads.notes("l1")[0].body, "Registrado via automação");
    }
}
