use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::NotificationConfig;

use super::access::AccessContext;
use super::departments::Department;
use super::domain::{
    Applicant, ApplicantId, ApplicantSubmission, Application, ApplicationId, ApplicationStatus,
    ApplicationUpdate, InterviewScore, InterviewScoreId, Interviewer, InterviewerId,
    NewApplication, NewInterviewScore, NewInterviewer, Score, ScoreOutOfRange,
};
use super::export;
use super::intake::{IntakeGuard, IntakeViolation};
use super::notifications::{Mailer, NotificationTemplate};
use super::repository::{RecruitmentRepository, RepositoryError};
use super::transitions::{self, PreconditionFailure, WorkflowAction};
use super::views::{
    ApplicantQuery, ApplicationDetail, ApplicationQuery, ApplicationRow, BatchReport,
    ExpiryReport, Selection,
};

const INTERVIEWER_NAME_MAX_CHARS: usize = 10;

/// Service composing intake, access scoping, the status machine and score aggregation.
pub struct RecruitmentService<R, M> {
    repository: Arc<R>,
    mailer: Arc<M>,
    settings: NotificationConfig,
    intake: IntakeGuard,
    in_flight: InFlight,
}

/// Result of driving one record through a send action.
enum RecordOutcome {
    Advanced(ApplicationStatus),
    Skipped(PreconditionFailure),
    Failed(String),
}

impl<R, M> RecruitmentService<R, M>
where
    R: RecruitmentRepository + 'static,
    M: Mailer + 'static,
{
    pub fn new(repository: Arc<R>, mailer: Arc<M>, settings: NotificationConfig) -> Self {
        Self {
            repository,
            mailer,
            settings,
            intake: IntakeGuard,
            in_flight: InFlight::default(),
        }
    }

    pub fn settings(&self) -> &NotificationConfig {
        &self.settings
    }

    /// Public sign-up. No actor is involved.
    pub fn submit_applicant(
        &self,
        submission: ApplicantSubmission,
        now: DateTime<Utc>,
    ) -> Result<Applicant, RecruitmentError> {
        let applicant = self.intake.applicant_from_submission(submission, now)?;
        let stored = self.repository.insert_applicant(applicant)?;
        info!(applicant = %stored.id, first_choice = %stored.first_choice, "applicant submitted");
        Ok(stored)
    }

    pub fn list_applicants(
        &self,
        ctx: &AccessContext,
        query: &ApplicantQuery,
    ) -> Result<Vec<Applicant>, RecruitmentError> {
        let scope = ctx.scope();
        Ok(self
            .repository
            .list_applicants()?
            .into_iter()
            .filter(|applicant| scope.admits_applicant(applicant) && query.matches(applicant))
            .collect())
    }

    pub fn get_applicant(
        &self,
        ctx: &AccessContext,
        id: &ApplicantId,
    ) -> Result<Applicant, RecruitmentError> {
        let applicant = self
            .repository
            .fetch_applicant(id)?
            .ok_or_else(|| RepositoryError::applicant_not_found(id))?;
        if !ctx.scope().admits_applicant(&applicant) {
            return Err(RecruitmentError::out_of_scope(format!("applicant {id}")));
        }
        Ok(applicant)
    }

    /// Removes the applicant with every application and score it owns.
    pub fn delete_applicant(
        &self,
        ctx: &AccessContext,
        id: &ApplicantId,
    ) -> Result<(), RecruitmentError> {
        self.get_applicant(ctx, id)?;
        self.repository.delete_applicant(id)?;
        info!(applicant = %id, "applicant deleted");
        Ok(())
    }

    /// Open a department's evaluation track with the default writing-task deadline.
    pub fn open_application(
        &self,
        ctx: &AccessContext,
        applicant_id: &ApplicantId,
        department: Department,
        now: DateTime<Utc>,
    ) -> Result<Application, RecruitmentError> {
        if !ctx.scope().covers(department) {
            return Err(RecruitmentError::out_of_scope(format!(
                "department {department}"
            )));
        }
        let application = self.repository.insert_application(NewApplication {
            applicant_id: *applicant_id,
            handle_by: department,
            writing_task_deadline: transitions::writing_task_deadline(
                now,
                self.settings.local_offset(),
            ),
            created_at: now,
        })?;
        info!(application = %application.id, department = %department, "application opened");
        Ok(application)
    }

    /// Visible applications ordered by department, status, then creation time.
    pub fn list_applications(
        &self,
        ctx: &AccessContext,
        query: &ApplicationQuery,
    ) -> Result<Vec<ApplicationRow>, RecruitmentError> {
        let scope = ctx.scope();
        let applicants: HashMap<ApplicantId, Applicant> = self
            .repository
            .list_applicants()?
            .into_iter()
            .map(|applicant| (applicant.id, applicant))
            .collect();

        let mut rows: Vec<ApplicationRow> = scope
            .filter_applications(self.repository.list_applications()?)
            .iter()
            .filter(|application| query.matches(application))
            .map(|application| {
                ApplicationRow::new(application, applicants.get(&application.applicant_id))
            })
            .collect();
        rows.sort_by(|a, b| {
            a.handle_by
                .cmp(&b.handle_by)
                .then(a.status.cmp(&b.status))
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        Ok(rows)
    }

    pub fn get_application(
        &self,
        ctx: &AccessContext,
        id: &ApplicationId,
    ) -> Result<ApplicationDetail, RecruitmentError> {
        let application = self.visible_application(ctx, id)?;
        let applicant_name = self
            .repository
            .fetch_applicant(&application.applicant_id)?
            .map(|applicant| applicant.name)
            .unwrap_or_default();
        let interviewer = match application.interviewer_id {
            Some(interviewer_id) => self.repository.fetch_interviewer(&interviewer_id)?,
            None => None,
        };
        let scores = self.repository.scores_for(id)?;

        Ok(ApplicationDetail {
            status_label: application.status.label(),
            total_score: application.total_score(),
            applicant_name,
            interviewer,
            scores,
            application,
        })
    }

    /// Staff edit. Scope-defining fields are not part of `ApplicationUpdate`.
    pub fn update_application(
        &self,
        ctx: &AccessContext,
        id: &ApplicationId,
        update: ApplicationUpdate,
        now: DateTime<Utc>,
    ) -> Result<Application, RecruitmentError> {
        let previous = self.visible_application(ctx, id)?.status;
        let application = self
            .repository
            .apply_update(id, update, now)
            .map_err(|err| match err {
                RepositoryError::UnknownInterviewer(interviewer_id) => {
                    RecruitmentError::UnknownInterviewer(interviewer_id)
                }
                other => RecruitmentError::Repository(other),
            })?;

        if previous != application.status {
            info!(
                application = %id,
                from = %previous,
                to = %application.status,
                "status set manually"
            );
        }
        Ok(application)
    }

    pub fn create_interviewer(
        &self,
        ctx: &AccessContext,
        interviewer: NewInterviewer,
    ) -> Result<Interviewer, RecruitmentError> {
        if !ctx.scope().covers(interviewer.department) {
            return Err(RecruitmentError::out_of_scope(format!(
                "department {}",
                interviewer.department
            )));
        }
        let interviewer = validate_interviewer(interviewer)?;
        Ok(self.repository.insert_interviewer(interviewer)?)
    }

    pub fn list_interviewers(
        &self,
        ctx: &AccessContext,
    ) -> Result<Vec<Interviewer>, RecruitmentError> {
        let scope = ctx.scope();
        Ok(self
            .repository
            .list_interviewers()?
            .into_iter()
            .filter(|interviewer| scope.covers(interviewer.department))
            .collect())
    }

    pub fn update_interviewer(
        &self,
        ctx: &AccessContext,
        id: &InterviewerId,
        changes: NewInterviewer,
    ) -> Result<Interviewer, RecruitmentError> {
        let existing = self.visible_interviewer(ctx, id)?;
        if !ctx.scope().covers(changes.department) {
            return Err(RecruitmentError::out_of_scope(format!(
                "department {}",
                changes.department
            )));
        }
        let changes = validate_interviewer(changes)?;
        let updated = Interviewer {
            id: existing.id,
            name: changes.name,
            department: changes.department,
            meeting_link: changes.meeting_link,
        };
        self.repository.update_interviewer(updated.clone())?;
        Ok(updated)
    }

    pub fn delete_interviewer(
        &self,
        ctx: &AccessContext,
        id: &InterviewerId,
    ) -> Result<(), RecruitmentError> {
        self.visible_interviewer(ctx, id)?;
        self.repository.delete_interviewer(id)?;
        Ok(())
    }

    /// Record one interviewer's mark; the application's average is refreshed by the store.
    pub fn record_score(
        &self,
        ctx: &AccessContext,
        application_id: &ApplicationId,
        interviewer: &str,
        score: f64,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<InterviewScore, RecruitmentError> {
        self.visible_application(ctx, application_id)?;
        let interviewer = interviewer.trim();
        if interviewer.is_empty() {
            return Err(RecruitmentError::InvalidInput(
                "interviewer name is required".to_string(),
            ));
        }
        if interviewer.chars().count() > INTERVIEWER_NAME_MAX_CHARS {
            return Err(RecruitmentError::InvalidInput(format!(
                "interviewer name exceeds {INTERVIEWER_NAME_MAX_CHARS} characters"
            )));
        }
        let score = Score::new(score)?;

        let stored = self.repository.insert_score(NewInterviewScore {
            application_id: *application_id,
            interviewer: interviewer.to_string(),
            score,
            comment: normalize_text(comment),
            created_at: now,
        })?;
        debug!(application = %application_id, score = %stored.id, "interview score recorded");
        Ok(stored)
    }

    pub fn update_score(
        &self,
        ctx: &AccessContext,
        id: &InterviewScoreId,
        score: f64,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<InterviewScore, RecruitmentError> {
        self.visible_score(ctx, id)?;
        let score = Score::new(score)?;
        Ok(self
            .repository
            .update_score(id, score, normalize_text(comment), now)?)
    }

    pub fn delete_score(
        &self,
        ctx: &AccessContext,
        id: &InterviewScoreId,
        now: DateTime<Utc>,
    ) -> Result<(), RecruitmentError> {
        self.visible_score(ctx, id)?;
        self.repository.delete_score(id, now)?;
        Ok(())
    }

    /// Invite `NEW_APPLICATION` records to the writing task.
    ///
    /// The refreshed deadline is persisted before the mail goes out, so a failed send still
    /// leaves the new deadline in place while the status stays `NEW_APPLICATION`.
    pub fn send_writing_task_emails(
        &self,
        ctx: &AccessContext,
        ids: &[ApplicationId],
        now: DateTime<Utc>,
    ) -> Result<BatchReport, RecruitmentError> {
        self.run_batch(ctx, WorkflowAction::SendWritingTask, ids, |id| {
            self.send_writing_task_email(id, now)
        })
    }

    /// Move overdue writing tasks to `WRITING_TASK_EXPIRED`. Sends nothing.
    pub fn expire_writing_tasks(
        &self,
        ctx: &AccessContext,
        selection: &Selection,
        now: DateTime<Utc>,
    ) -> Result<ExpiryReport, RecruitmentError> {
        let candidates: Vec<ApplicationId> = match selection {
            Selection::Visible => ctx
                .scope()
                .filter_applications(self.repository.list_applications()?)
                .into_iter()
                .map(|application| application.id)
                .collect(),
            Selection::Ids(ids) => {
                self.authorize_selection(ctx, ids)?;
                ids.clone()
            }
        };

        let expired = self.repository.expire_writing_tasks(&candidates, now)?;
        info!(
            action = WorkflowAction::ExpireWritingTasks.label(),
            examined = candidates.len(),
            expired = expired.len(),
            "writing-task expiry checked"
        );
        Ok(ExpiryReport {
            examined: candidates.len(),
            expired,
        })
    }

    pub fn send_interview_emails(
        &self,
        ctx: &AccessContext,
        ids: &[ApplicationId],
        now: DateTime<Utc>,
    ) -> Result<BatchReport, RecruitmentError> {
        self.run_batch(ctx, WorkflowAction::SendInterview, ids, |id| {
            self.send_interview_email(id, now)
        })
    }

    /// Notify internal verdicts. Requires the decision-send capability.
    pub fn send_decision_emails(
        &self,
        ctx: &AccessContext,
        ids: &[ApplicationId],
        now: DateTime<Utc>,
    ) -> Result<BatchReport, RecruitmentError> {
        if !ctx.can_send_decision {
            warn!(
                action = WorkflowAction::SendDecision.label(),
                "actor lacks decision-send capability"
            );
            return Err(RecruitmentError::PermissionDenied(
                WorkflowAction::SendDecision.label(),
            ));
        }
        self.run_batch(ctx, WorkflowAction::SendDecision, ids, |id| {
            self.send_decision_email(id, now)
        })
    }

    /// CSV rendering of the visible application listing.
    pub fn export_applications(
        &self,
        ctx: &AccessContext,
        query: &ApplicationQuery,
    ) -> Result<String, RecruitmentError> {
        let rows = self.list_applications(ctx, query)?;
        let bytes = export::applications_csv(&rows, self.settings.local_offset())?;
        String::from_utf8(bytes).map_err(|err| RecruitmentError::Export(err.to_string()))
    }

    fn run_batch<F>(
        &self,
        ctx: &AccessContext,
        action: WorkflowAction,
        ids: &[ApplicationId],
        per_record: F,
    ) -> Result<BatchReport, RecruitmentError>
    where
        F: Fn(ApplicationId) -> RecordOutcome,
    {
        self.authorize_selection(ctx, ids)?;

        let mut seen = HashSet::with_capacity(ids.len());
        let unique: Vec<ApplicationId> =
            ids.iter().copied().filter(|id| seen.insert(*id)).collect();
        let mut report = BatchReport::new(action, unique.len());
        for id in unique {
            match per_record(id) {
                RecordOutcome::Advanced(status) => {
                    debug!(application = %id, to = %status, action = action.label(), "transition applied");
                    report.record_success(id);
                }
                RecordOutcome::Skipped(reason) => {
                    debug!(application = %id, %reason, action = action.label(), "transition skipped");
                    report.record_skip(id, &reason);
                }
                RecordOutcome::Failed(reason) => {
                    warn!(application = %id, %reason, action = action.label(), "transition failed");
                    report.record_failure(id, reason);
                }
            }
        }

        info!(
            action = action.label(),
            requested = report.requested,
            succeeded = report.succeeded.len(),
            unsuccessful = report.failure_count(),
            "batch action finished"
        );
        Ok(report)
    }

    fn send_writing_task_email(&self, id: ApplicationId, now: DateTime<Utc>) -> RecordOutcome {
        let Some(_claim) = self.in_flight.claim(id) else {
            return RecordOutcome::Skipped(PreconditionFailure::Busy);
        };
        let (application, applicant) = match self.load_with_applicant(&id) {
            Ok(loaded) => loaded,
            Err(err) => return RecordOutcome::Failed(err.to_string()),
        };
        if let Err(reason) = transitions::check_writing_task(&application) {
            return RecordOutcome::Skipped(reason);
        }

        let deadline = transitions::writing_task_deadline(now, self.settings.local_offset());
        match self
            .repository
            .refresh_writing_task_deadline(&id, deadline, now)
        {
            Ok(true) => {}
            Ok(false) => return RecordOutcome::Skipped(PreconditionFailure::StatusChanged),
            Err(err) => return RecordOutcome::Failed(err.to_string()),
        }

        let template = NotificationTemplate::WritingTaskInvite {
            applicant_id: applicant.id,
            applicant_name: applicant.name.clone(),
            department: application.handle_by,
            deadline,
        };
        self.deliver_and_advance(
            &application,
            &applicant,
            template,
            ApplicationStatus::WritingTaskEmailSent,
            now,
        )
    }

    fn send_interview_email(&self, id: ApplicationId, now: DateTime<Utc>) -> RecordOutcome {
        let Some(_claim) = self.in_flight.claim(id) else {
            return RecordOutcome::Skipped(PreconditionFailure::Busy);
        };
        let (application, applicant) = match self.load_with_applicant(&id) {
            Ok(loaded) => loaded,
            Err(err) => return RecordOutcome::Failed(err.to_string()),
        };
        if let Err(reason) = transitions::check_interview(&application) {
            return RecordOutcome::Skipped(reason);
        }
        let (Some(interview_time), Some(interviewer_id)) =
            (application.interview_time, application.interviewer_id)
        else {
            return RecordOutcome::Skipped(PreconditionFailure::MissingInterviewer);
        };
        let interviewer = match self.repository.fetch_interviewer(&interviewer_id) {
            Ok(Some(interviewer)) => interviewer,
            Ok(None) => return RecordOutcome::Skipped(PreconditionFailure::MissingInterviewer),
            Err(err) => return RecordOutcome::Failed(err.to_string()),
        };

        let template = NotificationTemplate::InterviewInvite {
            applicant_name: applicant.name.clone(),
            department: application.handle_by,
            interview_time,
            meeting_link: interviewer.meeting_link,
        };
        self.deliver_and_advance(
            &application,
            &applicant,
            template,
            ApplicationStatus::InterviewEmailSent,
            now,
        )
    }

    fn send_decision_email(&self, id: ApplicationId, now: DateTime<Utc>) -> RecordOutcome {
        let Some(_claim) = self.in_flight.claim(id) else {
            return RecordOutcome::Skipped(PreconditionFailure::Busy);
        };
        let (application, applicant) = match self.load_with_applicant(&id) {
            Ok(loaded) => loaded,
            Err(err) => return RecordOutcome::Failed(err.to_string()),
        };
        let decision = match transitions::check_decision(&application) {
            Ok(decision) => decision,
            Err(reason) => return RecordOutcome::Skipped(reason),
        };

        let template = match decision {
            transitions::Decision::Accept => NotificationTemplate::Accepted {
                applicant_name: applicant.name.clone(),
                department: application.handle_by,
            },
            transitions::Decision::Reject => NotificationTemplate::Rejected {
                applicant_name: applicant.name.clone(),
                department: application.handle_by,
            },
        };
        self.deliver_and_advance(
            &application,
            &applicant,
            template,
            decision.notified_status(),
            now,
        )
    }

    /// Sends the mail, then advances the status only if no one changed it meanwhile. The
    /// write touches the status alone.
    fn deliver_and_advance(
        &self,
        application: &Application,
        applicant: &Applicant,
        template: NotificationTemplate,
        next: ApplicationStatus,
        now: DateTime<Utc>,
    ) -> RecordOutcome {
        let email = template.compose(&applicant.email, &self.settings);
        if let Err(err) = self.mailer.send(&email) {
            warn!(application = %application.id, error = %err, "notification not delivered");
            return RecordOutcome::Failed(err.to_string());
        }

        match self
            .repository
            .advance_status(&application.id, application.status, next, now)
        {
            Ok(true) => RecordOutcome::Advanced(next),
            Ok(false) => {
                warn!(
                    application = %application.id,
                    "notification delivered but status changed before it could advance"
                );
                RecordOutcome::Failed(PreconditionFailure::StatusChanged.to_string())
            }
            Err(err) => RecordOutcome::Failed(err.to_string()),
        }
    }

    fn load_with_applicant(
        &self,
        id: &ApplicationId,
    ) -> Result<(Application, Applicant), RepositoryError> {
        let application = self
            .repository
            .fetch_application(id)?
            .ok_or_else(|| RepositoryError::application_not_found(id))?;
        let applicant = self
            .repository
            .fetch_applicant(&application.applicant_id)?
            .ok_or_else(|| RepositoryError::applicant_not_found(&application.applicant_id))?;
        Ok((application, applicant))
    }

    /// Every id must exist and be visible before any record is touched.
    fn authorize_selection(
        &self,
        ctx: &AccessContext,
        ids: &[ApplicationId],
    ) -> Result<(), RecruitmentError> {
        for id in ids {
            self.visible_application(ctx, id)?;
        }
        Ok(())
    }

    fn visible_application(
        &self,
        ctx: &AccessContext,
        id: &ApplicationId,
    ) -> Result<Application, RecruitmentError> {
        let application = self
            .repository
            .fetch_application(id)?
            .ok_or_else(|| RepositoryError::application_not_found(id))?;
        if !ctx.scope().admits_application(&application) {
            warn!(application = %id, "access outside actor scope refused");
            return Err(RecruitmentError::out_of_scope(format!("application {id}")));
        }
        Ok(application)
    }

    fn visible_interviewer(
        &self,
        ctx: &AccessContext,
        id: &InterviewerId,
    ) -> Result<Interviewer, RecruitmentError> {
        let interviewer = self
            .repository
            .fetch_interviewer(id)?
            .ok_or_else(|| RepositoryError::interviewer_not_found(id))?;
        if !ctx.scope().covers(interviewer.department) {
            return Err(RecruitmentError::out_of_scope(format!("interviewer {id}")));
        }
        Ok(interviewer)
    }

    fn visible_score(
        &self,
        ctx: &AccessContext,
        id: &InterviewScoreId,
    ) -> Result<InterviewScore, RecruitmentError> {
        let score = self
            .repository
            .fetch_score(id)?
            .ok_or_else(|| RepositoryError::score_not_found(id))?;
        self.visible_application(ctx, &score.application_id)?;
        Ok(score)
    }
}

fn validate_interviewer(interviewer: NewInterviewer) -> Result<NewInterviewer, RecruitmentError> {
    let name = interviewer.name.trim().to_string();
    if name.is_empty() || name.chars().count() > INTERVIEWER_NAME_MAX_CHARS {
        return Err(RecruitmentError::InvalidInput(format!(
            "interviewer name must be 1-{INTERVIEWER_NAME_MAX_CHARS} characters"
        )));
    }
    let meeting_link = interviewer.meeting_link.trim().to_string();
    if !(meeting_link.starts_with("https://") || meeting_link.starts_with("http://")) {
        return Err(RecruitmentError::InvalidInput(
            "meeting link must be an http(s) URL".to_string(),
        ));
    }
    Ok(NewInterviewer {
        name,
        department: interviewer.department,
        meeting_link,
    })
}

fn normalize_text(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

/// Records currently inside a send action. A second action on the same record is skipped.
#[derive(Debug, Default)]
struct InFlight {
    ids: Mutex<HashSet<ApplicationId>>,
}

impl InFlight {
    fn claim(&self, id: ApplicationId) -> Option<Claim<'_>> {
        let mut ids = self.ids.lock().ok()?;
        if ids.insert(id) {
            Some(Claim { owner: self, id })
        } else {
            None
        }
    }
}

struct Claim<'a> {
    owner: &'a InFlight,
    id: ApplicationId,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        if let Ok(mut ids) = self.owner.ids.lock() {
            ids.remove(&self.id);
        }
    }
}

/// Error raised by the recruitment service.
#[derive(Debug, thiserror::Error)]
pub enum RecruitmentError {
    #[error(transparent)]
    Intake(#[from] IntakeViolation),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    InvalidScore(#[from] ScoreOutOfRange),
    #[error("{0}")]
    InvalidInput(String),
    #[error("interviewer {0} does not exist")]
    UnknownInterviewer(InterviewerId),
    #[error("{resource} is outside the actor's access scope")]
    OutOfScope { resource: String },
    #[error("actor may not {0}")]
    PermissionDenied(&'static str),
    #[error("export failed: {0}")]
    Export(String),
}

impl RecruitmentError {
    fn out_of_scope(resource: String) -> Self {
        Self::OutOfScope { resource }
    }
}

impl From<csv::Error> for RecruitmentError {
    fn from(value: csv::Error) -> Self {
        Self::Export(value.to_string())
    }
}
