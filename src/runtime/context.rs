use std::sync::Arc;

use crate::{
    classifier::ResponseClassifier,
    events::{EnrollmentEvent, Message},
    gateway::Gateways,
    lead::LeadDirectory,
    runtime::{Channel, Enrollment},
    utils::time::Clock,
};

/// Collaborators shared by every step evaluation.
#[derive(Clone)]
pub struct Context {
    gateways: Arc<Gateways>,
    classifier: Arc<dyn ResponseClassifier>,
    leads: Arc<dyn LeadDirectory>,
    clock: Arc<dyn Clock>,
    channel: Arc<Channel>,
}

impl Context {
    pub fn new(
        gateways: Arc<Gateways>,
        classifier: Arc<dyn ResponseClassifier>,
        leads: Arc<dyn LeadDirectory>,
        clock: Arc<dyn Clock>,
        channel: Arc<Channel>,
    ) -> Self {
        Self {
            gateways,
            classifier,
            leads,
            clock,
            channel,
        }
    }

    pub fn gateways(&self) -> &Gateways {
        &self.gateways
    }

    pub fn classifier(&self) -> &dyn ResponseClassifier {
        self.classifier.as_ref()
    }

    pub fn leads(&self) -> &dyn LeadDirectory {
        self.leads.as_ref()
    }

    pub fn now(&self) -> i64 {
        self.clock.now_millis()
    }

    pub fn channel(&self) -> Arc<Channel> {
        self.channel.clone()
    }

    pub fn emit(
        &self,
        enrollment: &Enrollment,
        event: EnrollmentEvent,
    ) {
        self.channel.emit(Message {
            eid: enrollment.id.clone(),
            sid: enrollment.sequence_id.clone(),
            lead_id: enrollment.lead_id.clone(),
            event,
        });
    }
}
