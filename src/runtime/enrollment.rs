use serde::{Deserialize, Serialize};

use crate::{LeadflowError, Result, store::data, utils};

pub type EnrollmentId = String;

/// Lifecycle of a lead's run through a sequence.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash, strum::AsRefStr)]
#[serde(try_from = "u8", into = "u8")]
pub enum EnrollmentStatus {
    #[default]
    Pending = 1,
    Running = 2,
    WaitingReply = 3,
    WaitingDelay = 4,
    /// Decoded from stored rows only; the engine never pauses nor resumes.
    Paused = 5,
    Completed = 6,
    Failed = 7,
    Cancelled = 8,
    /// Ended by a reply timeout configured to stop.
    Stopped = 9,
}

impl EnrollmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled | Self::Stopped)
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self, Self::WaitingReply | Self::WaitingDelay)
    }

    /// Statuses that count as an in-progress enrollment.
    pub fn active() -> [EnrollmentStatus; 4] {
        [Self::Pending, Self::Running, Self::WaitingReply, Self::WaitingDelay]
    }

    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl TryFrom<u8> for EnrollmentStatus {
    type Error = LeadflowError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Self::Pending),
            2 => Ok(Self::Running),
            3 => Ok(Self::WaitingReply),
            4 => Ok(Self::WaitingDelay),
            5 => Ok(Self::Paused),
            6 => Ok(Self::Completed),
            7 => Ok(Self::Failed),
            8 => Ok(Self::Cancelled),
            9 => Ok(Self::Stopped),
            v => Err(LeadflowError::Convert(format!("unknown enrollment status {}", v))),
        }
    }
}

impl From<EnrollmentStatus> for u8 {
    fn from(status: EnrollmentStatus) -> Self {
        status as u8
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, strum::AsRefStr)]
#[serde(try_from = "u8", into = "u8")]
pub enum StepRunStatus {
    Executed = 1,
    Skipped = 2,
    Failed = 3,
    TimedOut = 4,
}

impl TryFrom<u8> for StepRunStatus {
    type Error = LeadflowError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Self::Executed),
            2 => Ok(Self::Skipped),
            3 => Ok(Self::Failed),
            4 => Ok(Self::TimedOut),
            v => Err(LeadflowError::Convert(format!("unknown step run status {}", v))),
        }
    }
}

impl From<StepRunStatus> for u8 {
    fn from(status: StepRunStatus) -> Self {
        status as u8
    }
}

/// One recorded evaluation of a step.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepRun {
    pub id: String,
    pub enrollment_id: EnrollmentId,
    pub step_index: usize,
    pub status: StepRunStatus,
    pub executed_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

/// A lead's live execution of a sequence.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub sequence_id: String,
    pub lead_id: String,
    /// 0-based position of the step to evaluate next.
    pub current_step_index: usize,
    pub status: EnrollmentStatus,
    /// Deadline in unix milliseconds while waiting.
    pub next_action_at: Option<i64>,
    pub last_reply: Option<String>,
    pub last_classification: Option<String>,
    pub error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default)]
    pub step_runs: Vec<StepRun>,

    /// Runs already written to the store.
    #[serde(skip)]
    pub(crate) persisted_runs: usize,
}

impl Enrollment {
    pub fn new(
        sequence_id: &str,
        lead_id: &str,
        now: i64,
    ) -> Self {
        Self {
            id: utils::guid(),
            sequence_id: sequence_id.to_string(),
            lead_id: lead_id.to_string(),
            current_step_index: 0,
            status: EnrollmentStatus::Pending,
            next_action_at: None,
            last_reply: None,
            last_classification: None,
            error: None,
            created_at: now,
            updated_at: now,
            step_runs: Vec::new(),
            persisted_runs: 0,
        }
    }

    pub fn start(
        &mut self,
        now: i64,
    ) {
        self.set_running(now);
    }

    pub fn advance_to(
        &mut self,
        index: usize,
        now: i64,
    ) {
        self.current_step_index = index;
        self.updated_at = now;
    }

    pub fn set_running(
        &mut self,
        now: i64,
    ) {
        self.status = EnrollmentStatus::Running;
        self.next_action_at = None;
        self.updated_at = now;
    }

    pub fn set_waiting_reply(
        &mut self,
        until: i64,
        now: i64,
    ) {
        self.status = EnrollmentStatus::WaitingReply;
        self.next_action_at = Some(until);
        self.updated_at = now;
    }

    pub fn set_waiting_delay(
        &mut self,
        until: i64,
        now: i64,
    ) {
        self.status = EnrollmentStatus::WaitingDelay;
        self.next_action_at = Some(until);
        self.updated_at = now;
    }

    pub fn complete(
        &mut self,
        now: i64,
    ) {
        self.finish(EnrollmentStatus::Completed, now);
    }

    pub fn stop(
        &mut self,
        now: i64,
    ) {
        self.finish(EnrollmentStatus::Stopped, now);
    }

    pub fn fail(
        &mut self,
        reason: &str,
        now: i64,
    ) {
        self.error = Some(reason.to_string());
        self.finish(EnrollmentStatus::Failed, now);
    }

    pub fn cancel(
        &mut self,
        reason: &str,
        now: i64,
    ) {
        self.error = Some(reason.to_string());
        self.finish(EnrollmentStatus::Cancelled, now);
    }

    pub fn add_step_run(
        &mut self,
        step_index: usize,
        status: StepRunStatus,
        result: Option<String>,
        now: i64,
    ) -> &StepRun {
        self.step_runs.push(StepRun {
            id: utils::guid(),
            enrollment_id: self.id.clone(),
            step_index,
            status,
            executed_at: now,
            result,
        });
        self.updated_at = now;
        &self.step_runs[self.step_runs.len() - 1]
    }

    /// Step runs recorded since the last save, with their position in the history.
    pub(crate) fn unsaved_runs(&self) -> impl Iterator<Item = (usize, &StepRun)> {
        self.step_runs.iter().enumerate().skip(self.persisted_runs)
    }

    pub(crate) fn mark_saved(&mut self) {
        self.persisted_runs = self.step_runs.len();
    }

    /// Whether the scheduler should pick this enrollment up at `now`.
    pub fn is_due(
        &self,
        now: i64,
    ) -> bool {
        match (self.status, self.next_action_at) {
            (EnrollmentStatus::Running, None) => true,
            (EnrollmentStatus::Running | EnrollmentStatus::WaitingDelay | EnrollmentStatus::WaitingReply, Some(at)) => at <= now,
            _ => false,
        }
    }

    pub(crate) fn to_data(&self) -> data::Enrollment {
        data::Enrollment {
            id: self.id.clone(),
            sid: self.sequence_id.clone(),
            lead_id: self.lead_id.clone(),
            step_index: self.current_step_index as i64,
            status: self.status.code() as i32,
            next_action_at: self.next_action_at,
            last_reply: self.last_reply.clone(),
            last_classification: self.last_classification.clone(),
            err: self.error.clone(),
            create_time: self.created_at,
            update_time: self.updated_at,
        }
    }

    pub(crate) fn from_data(
        data: data::Enrollment,
        runs: Vec<StepRun>,
    ) -> Result<Self> {
        let status = u8::try_from(data.status).map_err(|e| LeadflowError::Convert(e.to_string())).and_then(EnrollmentStatus::try_from)?;
        let persisted_runs = runs.len();
        Ok(Self {
            id: data.id,
            sequence_id: data.sid,
            lead_id: data.lead_id,
            current_step_index: usize::try_from(data.step_index).unwrap_or(0),
            status,
            next_action_at: data.next_action_at,
            last_reply: data.last_reply,
            last_classification: data.last_classification,
            error: data.err,
            created_at: data.create_time,
            updated_at: data.update_time,
            step_runs: runs,
            persisted_runs,
        })
    }

    fn finish(
        &mut self,
        status: EnrollmentStatus,
        now: i64,
    ) {
        self.status = status;
        self.next_action_at = None;
        self.updated_at = now;
    }
}

impl StepRun {
    pub(crate) fn to_data(
        &self,
        seq: usize,
    ) -> data::StepRun {
        data::StepRun {
            id: self.id.clone(),
            eid: self.enrollment_id.clone(),
            seq: seq as i64,
            step_index: self.step_index as i64,
            status: u8::from(self.status) as i32,
            result: self.result.clone(),
            executed_at: self.executed_at,
        }
    }

    pub(crate) fn from_data(data: data::StepRun) -> Result<Self> {
        let status = u8::try_from(data.status).map_err(|e| LeadflowError::Convert(e.to_string())).and_then(StepRunStatus::try_from)?;
        Ok(Self {
            id: data.id,
            enrollment_id: data.eid,
            step_index: usize::try_from(data.step_index).unwrap_or(0),
            status,
            executed_at: data.executed_at,
            result: data.result,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_due_rules() {
        let mut e = Enrollment::new("s1", "l1", 0);
        assert!(!e.is_due(0));

        e.start(0);
        assert!(e.is_due(0));

        e.set_waiting_delay(100, 0);
        assert!(!e.is_due(99));
        assert!(e.is_due(100));

        e.set_waiting_reply(200, 100);
        assert!(!e.is_due(150));
        assert!(e.is_due(250));

        e.stop(250);
        assert!(!e.is_due(1_000));
        assert_eq!(e.next_action_at, None);
    }

    #[test]
    fn test_terminal_statuses() {
        let terminal = [EnrollmentStatus::Completed, EnrollmentStatus::Failed, EnrollmentStatus::Cancelled, EnrollmentStatus::Stopped];
        for status in terminal {
            assert!(status.is_terminal());
            assert!(!EnrollmentStatus::active().contains(&status));
        }
        for status in EnrollmentStatus::active() {
            assert!(!status.is_terminal());
        }
        assert!(!EnrollmentStatus::active().contains(&EnrollmentStatus::Paused));
        assert_eq!(serde_json::to_string(&EnrollmentStatus::Stopped).unwrap(), "9");
    }

    #[test]
    fn test_step_runs_track_saved() {
        let mut e = Enrollment::new("s1", "l1", 0);
        e.add_step_run(0, StepRunStatus::Executed, None, 1);
        assert_eq!(e.unsaved_runs().count(), 1);
        e.mark_saved();
        assert_eq!(e.unsaved_runs().count(), 0);
        e.add_step_run(1, StepRunStatus::TimedOut, Some("no reply".to_string()), 2);
        let (seq, run) = e.unsaved_runs().next().unwrap();
        assert_eq!(seq, 1);
        assert_eq!(run.status, StepRunStatus::TimedOut);
    }

    #[test]
    fn test_data_conversion() {
        let mut e = Enrollment::new("s1", "l1", 5);
        e.start(5);
        e.fail("boom", 6);
        let restored = Enrollment::from_data(e.to_data(), Vec::new()).unwrap();
        assert_eq!(restored.status, EnrollmentStatus::Failed);
        assert_eq!(restored.error.as_deref(), Some("boom"));
        assert_eq!(restored.updated_at, 6);

        let mut bad = e.to_data();
        bad.status = 42;
        assert!(Enrollment::from_data(bad, Vec::new()).is_err());
    }
}
