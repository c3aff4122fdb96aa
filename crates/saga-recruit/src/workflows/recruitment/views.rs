use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::departments::Department;
use super::domain::{
    Applicant, ApplicantId, Application, ApplicationId, ApplicationStatus, InterviewScore,
    Interviewer,
};
use super::transitions::{PreconditionFailure, WorkflowAction};

/// One line of the staff application listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicationRow {
    pub id: ApplicationId,
    pub applicant_id: ApplicantId,
    pub applicant_name: String,
    pub applicant_email: String,
    pub handle_by: Department,
    pub department_name: &'static str,
    pub status: ApplicationStatus,
    pub status_label: &'static str,
    pub writing_task_deadline: DateTime<Utc>,
    pub interview_time: Option<DateTime<Utc>>,
    pub writing_task_score: Option<f64>,
    pub average_interview_score: Option<f64>,
    pub total_score: Option<f64>,
    #[serde(skip)]
    pub created_at: DateTime<Utc>,
}

impl ApplicationRow {
    pub fn new(application: &Application, applicant: Option<&Applicant>) -> Self {
        Self {
            id: application.id,
            applicant_id: application.applicant_id,
            applicant_name: applicant
                .map(|applicant| applicant.name.clone())
                .unwrap_or_default(),
            applicant_email: applicant
                .map(|applicant| applicant.email.clone())
                .unwrap_or_default(),
            handle_by: application.handle_by,
            department_name: application.handle_by.display_name(),
            status: application.status,
            status_label: application.status.label(),
            writing_task_deadline: application.writing_task_deadline,
            interview_time: application.interview_time,
            writing_task_score: application.writing_task_score.map(|score| score.value()),
            average_interview_score: application.average_interview_score,
            total_score: application.total_score(),
            created_at: application.created_at,
        }
    }
}

/// Full record as shown on the staff detail page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicationDetail {
    pub application: Application,
    pub applicant_name: String,
    pub status_label: &'static str,
    pub total_score: Option<f64>,
    pub interviewer: Option<Interviewer>,
    pub scores: Vec<InterviewScore>,
}

/// Listing filters for applicants.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicantQuery {
    #[serde(default)]
    pub search: Option<String>,
}

impl ApplicantQuery {
    /// Case-insensitive substring match over name, school and major.
    pub fn matches(&self, applicant: &Applicant) -> bool {
        match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => {
                let term = term.to_lowercase();
                [&applicant.name, &applicant.school, &applicant.major]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&term))
            }
        }
    }
}

/// Listing filters for applications.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicationQuery {
    #[serde(default)]
    pub department: Option<Department>,
    #[serde(default)]
    pub status: Option<ApplicationStatus>,
}

impl ApplicationQuery {
    pub fn matches(&self, application: &Application) -> bool {
        self.department
            .map_or(true, |department| application.handle_by == department)
            && self
                .status
                .map_or(true, |status| application.status == status)
    }
}

/// A record the action did not advance, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordIssue {
    pub application_id: ApplicationId,
    pub reason: String,
}

/// Per-record results of a bulk send action.
///
/// Successful sends stay applied when other records fail; nothing is rolled back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub action: WorkflowAction,
    /// Distinct ids in the selection.
    pub requested: usize,
    pub succeeded: Vec<ApplicationId>,
    pub skipped: Vec<RecordIssue>,
    pub failed: Vec<RecordIssue>,
    pub all_succeeded: bool,
}

impl BatchReport {
    pub fn new(action: WorkflowAction, requested: usize) -> Self {
        Self {
            action,
            requested,
            succeeded: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
            all_succeeded: true,
        }
    }

    pub fn record_success(&mut self, application_id: ApplicationId) {
        self.succeeded.push(application_id);
    }

    pub fn record_skip(&mut self, application_id: ApplicationId, reason: &PreconditionFailure) {
        self.all_succeeded = false;
        self.skipped.push(RecordIssue {
            application_id,
            reason: reason.to_string(),
        });
    }

    pub fn record_failure(&mut self, application_id: ApplicationId, reason: impl ToString) {
        self.all_succeeded = false;
        self.failed.push(RecordIssue {
            application_id,
            reason: reason.to_string(),
        });
    }

    pub fn failure_count(&self) -> usize {
        self.skipped.len() + self.failed.len()
    }
}

/// Which applications an expiry sweep should consider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case", tag = "scope", content = "application_ids")]
pub enum Selection {
    /// Every application visible to the actor.
    Visible,
    Ids(Vec<ApplicationId>),
}

/// Outcome of an expiry sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpiryReport {
    pub examined: usize,
    pub expired: Vec<ApplicationId>,
}
