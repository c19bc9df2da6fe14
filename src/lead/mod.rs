//! Access to the CRM leads an enrollment works on.

mod mem;

use async_trait::async_trait;

use crate::{
    Result,
    model::{Lead, LeadStatus, TimelineNote},
};

pub use mem::MemLeadDirectory;

/// Lead storage owned by the host CRM.
#[async_trait]
pub trait LeadDirectory: Send + Sync {
    /// Fetch a lead. A missing lead is a `LeadflowError::Lead`.
    async fn find(
        &self,
        lead_id: &str,
    ) -> Result<Lead>;

    async fn set_status(
        &self,
        lead_id: &str,
        status: LeadStatus,
    ) -> Result<()>;

    async fn append_note(
        &self,
        lead_id: &str,
        note: TimelineNote,
    ) -> Result<()>;
}
