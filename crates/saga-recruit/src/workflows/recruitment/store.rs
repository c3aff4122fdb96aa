use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::aggregator;
use super::domain::{
    Applicant, ApplicantId, Application, ApplicationId, ApplicationStatus, ApplicationUpdate,
    InterviewScore, InterviewScoreId, Interviewer, InterviewerId, NewApplication,
    NewInterviewScore, NewInterviewer, Score,
};
use super::repository::{RecruitmentRepository, RepositoryError};
use super::transitions;

/// Process-local store. One mutex guards every table, so each trait call is atomic.
#[derive(Debug, Default)]
pub struct InMemoryRecruitmentStore {
    state: Mutex<StoreState>,
}

#[derive(Debug, Default)]
struct StoreState {
    applicants: HashMap<ApplicantId, Applicant>,
    applications: BTreeMap<ApplicationId, Application>,
    interviewers: BTreeMap<InterviewerId, Interviewer>,
    scores: BTreeMap<InterviewScoreId, InterviewScore>,
    last_application_id: u64,
    last_interviewer_id: u64,
    last_score_id: u64,
}

impl StoreState {
    fn refresh_average(
        &mut self,
        application_id: &ApplicationId,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let scores = &self.scores;
        let application = self
            .applications
            .get_mut(application_id)
            .ok_or_else(|| RepositoryError::application_not_found(application_id))?;
        aggregator::recompute(
            application,
            scores
                .values()
                .filter(|score| score.application_id == *application_id),
        );
        application.modified_at = now;
        Ok(())
    }
}

impl InMemoryRecruitmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
    }
}

impl RecruitmentRepository for InMemoryRecruitmentStore {
    fn insert_applicant(&self, applicant: Applicant) -> Result<Applicant, RepositoryError> {
        let mut state = self.lock()?;
        if state.applicants.contains_key(&applicant.id) {
            return Err(RepositoryError::Conflict(format!("applicant {}", applicant.id)));
        }
        state.applicants.insert(applicant.id, applicant.clone());
        Ok(applicant)
    }

    fn fetch_applicant(&self, id: &ApplicantId) -> Result<Option<Applicant>, RepositoryError> {
        Ok(self.lock()?.applicants.get(id).cloned())
    }

    fn list_applicants(&self) -> Result<Vec<Applicant>, RepositoryError> {
        let state = self.lock()?;
        let mut applicants: Vec<_> = state.applicants.values().cloned().collect();
        applicants.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(applicants)
    }

    fn delete_applicant(&self, id: &ApplicantId) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if state.applicants.remove(id).is_none() {
            return Err(RepositoryError::applicant_not_found(id));
        }
        let owned: Vec<ApplicationId> = state
            .applications
            .values()
            .filter(|application| application.applicant_id == *id)
            .map(|application| application.id)
            .collect();
        for application_id in &owned {
            state.applications.remove(application_id);
        }
        state
            .scores
            .retain(|_, score| !owned.contains(&score.application_id));
        Ok(())
    }

    fn insert_application(
        &self,
        application: NewApplication,
    ) -> Result<Application, RepositoryError> {
        let mut state = self.lock()?;
        if !state.applicants.contains_key(&application.applicant_id) {
            return Err(RepositoryError::applicant_not_found(&application.applicant_id));
        }
        let duplicate = state.applications.values().any(|existing| {
            existing.applicant_id == application.applicant_id
                && existing.handle_by == application.handle_by
        });
        if duplicate {
            return Err(RepositoryError::Conflict(format!(
                "application of {} for {}",
                application.applicant_id, application.handle_by
            )));
        }

        state.last_application_id += 1;
        let record = Application {
            id: ApplicationId(state.last_application_id),
            applicant_id: application.applicant_id,
            handle_by: application.handle_by,
            status: ApplicationStatus::NewApplication,
            writing_task_deadline: application.writing_task_deadline,
            writing_task_file: None,
            writing_task_video_link: None,
            interview_time: None,
            interviewer_id: None,
            interview_notes_archived: false,
            writing_task_score: None,
            writing_task_comment: None,
            average_interview_score: None,
            remark: None,
            created_at: application.created_at,
            modified_at: application.created_at,
        };
        state.applications.insert(record.id, record.clone());
        Ok(record)
    }

    fn fetch_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<Application>, RepositoryError> {
        Ok(self.lock()?.applications.get(id).cloned())
    }

    fn apply_update(
        &self,
        id: &ApplicationId,
        update: ApplicationUpdate,
        now: DateTime<Utc>,
    ) -> Result<Application, RepositoryError> {
        let mut state = self.lock()?;
        if !state.applications.contains_key(id) {
            return Err(RepositoryError::application_not_found(id));
        }
        if let Some(Some(interviewer_id)) = update.interviewer_id {
            if !state.interviewers.contains_key(&interviewer_id) {
                return Err(RepositoryError::UnknownInterviewer(interviewer_id));
            }
        }
        let application = state
            .applications
            .get_mut(id)
            .ok_or_else(|| RepositoryError::application_not_found(id))?;
        update.apply(application);
        application.modified_at = now;
        Ok(application.clone())
    }

    fn refresh_writing_task_deadline(
        &self,
        id: &ApplicationId,
        deadline: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.lock()?;
        let application = state
            .applications
            .get_mut(id)
            .ok_or_else(|| RepositoryError::application_not_found(id))?;
        if application.status != ApplicationStatus::NewApplication {
            return Ok(false);
        }
        application.writing_task_deadline = deadline;
        application.modified_at = now;
        Ok(true)
    }

    fn advance_status(
        &self,
        id: &ApplicationId,
        expected: ApplicationStatus,
        next: ApplicationStatus,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.lock()?;
        let application = state
            .applications
            .get_mut(id)
            .ok_or_else(|| RepositoryError::application_not_found(id))?;
        if application.status != expected {
            return Ok(false);
        }
        application.status = next;
        application.modified_at = now;
        Ok(true)
    }

    fn list_applications(&self) -> Result<Vec<Application>, RepositoryError> {
        Ok(self.lock()?.applications.values().cloned().collect())
    }

    fn expire_writing_tasks(
        &self,
        candidates: &[ApplicationId],
        now: DateTime<Utc>,
    ) -> Result<Vec<ApplicationId>, RepositoryError> {
        let mut state = self.lock()?;
        let mut expired = Vec::new();
        for id in candidates {
            if let Some(application) = state.applications.get_mut(id) {
                if transitions::is_expired(application, now) {
                    application.status = ApplicationStatus::WritingTaskExpired;
                    application.modified_at = now;
                    expired.push(*id);
                }
            }
        }
        Ok(expired)
    }

    fn insert_interviewer(
        &self,
        interviewer: NewInterviewer,
    ) -> Result<Interviewer, RepositoryError> {
        let mut state = self.lock()?;
        state.last_interviewer_id += 1;
        let record = Interviewer {
            id: InterviewerId(state.last_interviewer_id),
            name: interviewer.name,
            department: interviewer.department,
            meeting_link: interviewer.meeting_link,
        };
        state.interviewers.insert(record.id, record.clone());
        Ok(record)
    }

    fn fetch_interviewer(
        &self,
        id: &InterviewerId,
    ) -> Result<Option<Interviewer>, RepositoryError> {
        Ok(self.lock()?.interviewers.get(id).cloned())
    }

    fn update_interviewer(&self, interviewer: Interviewer) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        let existing = state
            .interviewers
            .get_mut(&interviewer.id)
            .ok_or_else(|| RepositoryError::interviewer_not_found(&interviewer.id))?;
        *existing = interviewer;
        Ok(())
    }

    fn list_interviewers(&self) -> Result<Vec<Interviewer>, RepositoryError> {
        let state = self.lock()?;
        let mut interviewers: Vec<_> = state.interviewers.values().cloned().collect();
        interviewers.sort_by(|a, b| a.department.cmp(&b.department).then(a.id.cmp(&b.id)));
        Ok(interviewers)
    }

    fn delete_interviewer(&self, id: &InterviewerId) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if state.interviewers.remove(id).is_none() {
            return Err(RepositoryError::interviewer_not_found(id));
        }
        for application in state.applications.values_mut() {
            if application.interviewer_id == Some(*id) {
                application.interviewer_id = None;
            }
        }
        Ok(())
    }

    fn insert_score(&self, score: NewInterviewScore) -> Result<InterviewScore, RepositoryError> {
        let mut state = self.lock()?;
        if !state.applications.contains_key(&score.application_id) {
            return Err(RepositoryError::application_not_found(&score.application_id));
        }
        let duplicate = state.scores.values().any(|existing| {
            existing.application_id == score.application_id
                && existing.interviewer == score.interviewer
        });
        if duplicate {
            return Err(RepositoryError::Conflict(format!(
                "score from {} on application {}",
                score.interviewer, score.application_id
            )));
        }

        state.last_score_id += 1;
        let record = InterviewScore {
            id: InterviewScoreId(state.last_score_id),
            application_id: score.application_id,
            interviewer: score.interviewer,
            score: score.score,
            comment: score.comment,
            created_at: score.created_at,
            modified_at: score.created_at,
        };
        state.scores.insert(record.id, record.clone());
        state.refresh_average(&record.application_id, record.created_at)?;
        Ok(record)
    }

    fn update_score(
        &self,
        id: &InterviewScoreId,
        score: Score,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<InterviewScore, RepositoryError> {
        let mut state = self.lock()?;
        let existing = state
            .scores
            .get_mut(id)
            .ok_or_else(|| RepositoryError::score_not_found(id))?;
        existing.score = score;
        existing.comment = comment;
        existing.modified_at = now;
        let updated = existing.clone();
        state.refresh_average(&updated.application_id, now)?;
        Ok(updated)
    }

    fn delete_score(&self, id: &InterviewScoreId, now: DateTime<Utc>) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        let removed = state
            .scores
            .remove(id)
            .ok_or_else(|| RepositoryError::score_not_found(id))?;
        state.refresh_average(&removed.application_id, now)
    }

    fn fetch_score(
        &self,
        id: &InterviewScoreId,
    ) -> Result<Option<InterviewScore>, RepositoryError> {
        Ok(self.lock()?.scores.get(id).cloned())
    }

    fn scores_for(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Vec<InterviewScore>, RepositoryError> {
        let state = self.lock()?;
        let mut scores: Vec<_> = state
            .scores
            .values()
            .filter(|score| score.application_id == *application_id)
            .cloned()
            .collect();
        scores.sort_by(|a, b| a.interviewer.cmp(&b.interviewer));
        Ok(scores)
    }
}
