use chrono::{DateTime, Utc};

use super::domain::{
    Applicant, ApplicantId, Application, ApplicationId, ApplicationStatus, ApplicationUpdate,
    InterviewScore, InterviewScoreId, Interviewer, InterviewerId, NewApplication,
    NewInterviewScore, NewInterviewer, Score,
};

/// Storage abstraction so the service can be exercised against any backing store.
///
/// Every score mutation must refresh the owning application's interview average (see
/// [`super::aggregator::recompute`]) inside the same atomic unit as the mutation itself.
pub trait RecruitmentRepository: Send + Sync {
    fn insert_applicant(&self, applicant: Applicant) -> Result<Applicant, RepositoryError>;
    fn fetch_applicant(&self, id: &ApplicantId) -> Result<Option<Applicant>, RepositoryError>;
    fn list_applicants(&self) -> Result<Vec<Applicant>, RepositoryError>;
    /// Removes the applicant together with its applications and their scores.
    fn delete_applicant(&self, id: &ApplicantId) -> Result<(), RepositoryError>;

    /// Rejects a second application for the same applicant and department.
    fn insert_application(
        &self,
        application: NewApplication,
    ) -> Result<Application, RepositoryError>;
    fn fetch_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<Application>, RepositoryError>;
    /// Applies a staff edit to the stored record. A referenced interviewer must exist at the
    /// moment the edit lands.
    fn apply_update(
        &self,
        id: &ApplicationId,
        update: ApplicationUpdate,
        now: DateTime<Utc>,
    ) -> Result<Application, RepositoryError>;
    /// Replaces the writing-task deadline while the record is still `NEW_APPLICATION`.
    /// Returns `false` without writing once the status has moved on.
    fn refresh_writing_task_deadline(
        &self,
        id: &ApplicationId,
        deadline: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;
    /// Compare-and-set on the status: `next` is written only while the record is `expected`.
    fn advance_status(
        &self,
        id: &ApplicationId,
        expected: ApplicationStatus,
        next: ApplicationStatus,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;
    fn list_applications(&self) -> Result<Vec<Application>, RepositoryError>;
    /// Bulk conditional update: among `candidates`, every record in `WRITING_TASK_EMAIL_SENT`
    /// with a deadline before `now` becomes `WRITING_TASK_EXPIRED`. Returns the ids changed.
    fn expire_writing_tasks(
        &self,
        candidates: &[ApplicationId],
        now: DateTime<Utc>,
    ) -> Result<Vec<ApplicationId>, RepositoryError>;

    fn insert_interviewer(&self, interviewer: NewInterviewer)
        -> Result<Interviewer, RepositoryError>;
    fn fetch_interviewer(
        &self,
        id: &InterviewerId,
    ) -> Result<Option<Interviewer>, RepositoryError>;
    fn update_interviewer(&self, interviewer: Interviewer) -> Result<(), RepositoryError>;
    fn list_interviewers(&self) -> Result<Vec<Interviewer>, RepositoryError>;
    /// Removes the interviewer and clears it from any application that referenced it.
    fn delete_interviewer(&self, id: &InterviewerId) -> Result<(), RepositoryError>;

    /// Rejects a second score from the same interviewer on the same application.
    fn insert_score(&self, score: NewInterviewScore) -> Result<InterviewScore, RepositoryError>;
    fn update_score(
        &self,
        id: &InterviewScoreId,
        score: Score,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<InterviewScore, RepositoryError>;
    fn delete_score(&self, id: &InterviewScoreId, now: DateTime<Utc>)
        -> Result<(), RepositoryError>;
    fn fetch_score(
        &self,
        id: &InterviewScoreId,
    ) -> Result<Option<InterviewScore>, RepositoryError>;
    fn scores_for(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Vec<InterviewScore>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("{0} already exists")]
    Conflict(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("interviewer {0} does not exist")]
    UnknownInterviewer(InterviewerId),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

impl RepositoryError {
    pub(crate) fn application_not_found(id: &ApplicationId) -> Self {
        Self::NotFound(format!("application {id}"))
    }

    pub(crate) fn applicant_not_found(id: &ApplicantId) -> Self {
        Self::NotFound(format!("applicant {id}"))
    }

    pub(crate) fn interviewer_not_found(id: &InterviewerId) -> Self {
        Self::NotFound(format!("interviewer {id}"))
    }

    pub(crate) fn score_not_found(id: &InterviewScoreId) -> Self {
        Self::NotFound(format!("interview score {id}"))
    }
}
