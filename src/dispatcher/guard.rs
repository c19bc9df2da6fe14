use std::sync::Arc;

use crate::{common::MemCache, runtime::EnrollmentId};

/// Claim on an enrollment being walked. Released on drop.
pub(crate) struct InFlight {
    cache: Arc<MemCache<EnrollmentId, i64>>,
    eid: EnrollmentId,
}

impl InFlight {
    /// Claim `eid`, or `None` when another task already holds it.
    pub(crate) fn claim(
        cache: &Arc<MemCache<EnrollmentId, i64>>,
        eid: &str,
        now: i64,
    ) -> Option<Self> {
        if !cache.insert_if_absent(eid.to_string(), now) {
            return None;
        }
        Some(Self {
            cache: cache.clone(),
            eid: eid.to_string(),
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.cache.remove(&self.eid);
    }
}
