use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use axum::body::to_bytes;
use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::config::NotificationConfig;
use crate::workflows::recruitment::domain::{
    Applicant, ApplicantId, ApplicantSubmission, Application, ApplicationId, ApplicationStatus,
    ApplicationUpdate, InterviewScore, InterviewScoreId, Interviewer, InterviewerId,
    NewApplication, NewInterviewScore, NewInterviewer, Score, Sex, YearInSchool,
};
use crate::workflows::recruitment::{
    AccessContext, Department, InMemoryRecruitmentStore, MailError, Mailer, OutboundEmail,
    RecruitmentRepository, RecruitmentService, RepositoryError,
};

pub(super) type MemoryService = RecruitmentService<InMemoryRecruitmentStore, MemoryMailer>;

/// 10:00 in UTC+8 on 1 September 2025.
pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 1, 2, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn later(days: i64) -> DateTime<Utc> {
    now() + Duration::days(days)
}

pub(super) fn settings() -> NotificationConfig {
    NotificationConfig::default()
}

pub(super) fn submission(name: &str, first: Department) -> ApplicantSubmission {
    ApplicantSubmission {
        name: name.to_string(),
        email: format!("{}@mail.example.com", name.to_lowercase()),
        phone: "13800138000".to_string(),
        school: "Fudan".to_string(),
        major: "Economics".to_string(),
        grade: YearInSchool::SecondYear,
        sex: Sex::Other,
        wechat: format!("wx_{}", name.to_lowercase()),
        first_choice: first,
        second_choice: None,
        third_choice: None,
        preferred_subject: None,
        self_intro: "Keen to help run the programme.".to_string(),
        disposable_time: 3,
        source: None,
    }
}

#[derive(Default)]
pub(super) struct MemoryMailer {
    sent: Mutex<Vec<OutboundEmail>>,
    failing: Mutex<HashSet<String>>,
}

impl MemoryMailer {
    pub(super) fn fail_for(&self, recipient: &str) {
        self.failing
            .lock()
            .expect("mailer mutex poisoned")
            .insert(recipient.to_string());
    }

    pub(super) fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().expect("mailer mutex poisoned").clone()
    }
}

impl Mailer for MemoryMailer {
    fn send(&self, email: &OutboundEmail) -> Result<(), MailError> {
        if self
            .failing
            .lock()
            .expect("mailer mutex poisoned")
            .contains(&email.recipient)
        {
            return Err(MailError::Transport(format!(
                "connection refused for {}",
                email.recipient
            )));
        }
        self.sent
            .lock()
            .expect("mailer mutex poisoned")
            .push(email.clone());
        Ok(())
    }
}

type StoreEdit = Box<dyn FnOnce(&InMemoryRecruitmentStore) + Send>;

/// Mailer that runs one edit against the store while a message is in flight, standing in for
/// a staff member working on the same record during a slow send.
pub(super) struct EditingMailer {
    store: Arc<InMemoryRecruitmentStore>,
    edit: Mutex<Option<StoreEdit>>,
}

impl EditingMailer {
    pub(super) fn new(store: Arc<InMemoryRecruitmentStore>) -> Self {
        Self {
            store,
            edit: Mutex::new(None),
        }
    }

    pub(super) fn during_next_send<F>(&self, edit: F)
    where
        F: FnOnce(&InMemoryRecruitmentStore) + Send + 'static,
    {
        *self.edit.lock().expect("mailer mutex poisoned") = Some(Box::new(edit));
    }
}

impl Mailer for EditingMailer {
    fn send(&self, _email: &OutboundEmail) -> Result<(), MailError> {
        let edit = self.edit.lock().expect("mailer mutex poisoned").take();
        if let Some(edit) = edit {
            edit(&self.store);
        }
        Ok(())
    }
}

pub(super) fn build_service() -> (
    Arc<MemoryService>,
    Arc<InMemoryRecruitmentStore>,
    Arc<MemoryMailer>,
) {
    let store = Arc::new(InMemoryRecruitmentStore::new());
    let mailer = Arc::new(MemoryMailer::default());
    let service = Arc::new(RecruitmentService::new(
        store.clone(),
        mailer.clone(),
        settings(),
    ));
    (service, store, mailer)
}

/// Submit an applicant and open one application in `department`, then force its status.
pub(super) fn seed_application(
    service: &MemoryService,
    name: &str,
    department: Department,
    status: ApplicationStatus,
) -> (Applicant, Application) {
    let admin = AccessContext::superuser();
    let applicant = service
        .submit_applicant(submission(name, department), now())
        .expect("applicant accepted");
    let application = service
        .open_application(&admin, &applicant.id, department, now())
        .expect("application opened");
    let application = if status == ApplicationStatus::NewApplication {
        application
    } else {
        service
            .update_application(
                &admin,
                &application.id,
                ApplicationUpdate {
                    status: Some(status),
                    ..ApplicationUpdate::default()
                },
                now(),
            )
            .expect("status set")
    };
    (applicant, application)
}

pub(super) fn add_interviewer(service: &MemoryService, department: Department) -> Interviewer {
    service
        .create_interviewer(
            &AccessContext::superuser(),
            NewInterviewer {
                name: "Lin".to_string(),
                department,
                meeting_link: "https://meet.example.com/lin".to_string(),
            },
        )
        .expect("interviewer created")
}

pub(super) async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("json body")
}

pub(super) fn score(value: f64) -> Score {
    Score::new(value).expect("score in range")
}

/// Store whose every call fails, for exercising the 500 path.
pub(super) struct UnavailableRepository;

fn unavailable<T>() -> Result<T, RepositoryError> {
    Err(RepositoryError::Unavailable("database offline".to_string()))
}

impl RecruitmentRepository for UnavailableRepository {
    fn insert_applicant(&self, _applicant: Applicant) -> Result<Applicant, RepositoryError> {
        unavailable()
    }

    fn fetch_applicant(&self, _id: &ApplicantId) -> Result<Option<Applicant>, RepositoryError> {
        unavailable()
    }

    fn list_applicants(&self) -> Result<Vec<Applicant>, RepositoryError> {
        unavailable()
    }

    fn delete_applicant(&self, _id: &ApplicantId) -> Result<(), RepositoryError> {
        unavailable()
    }

    fn insert_application(
        &self,
        _application: NewApplication,
    ) -> Result<Application, RepositoryError> {
        unavailable()
    }

    fn fetch_application(
        &self,
        _id: &ApplicationId,
    ) -> Result<Option<Application>, RepositoryError> {
        unavailable()
    }

    fn apply_update(
        &self,
        _id: &ApplicationId,
        _update: ApplicationUpdate,
        _now: DateTime<Utc>,
    ) -> Result<Application, RepositoryError> {
        unavailable()
    }

    fn refresh_writing_task_deadline(
        &self,
        _id: &ApplicationId,
        _deadline: DateTime<Utc>,
        _now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        unavailable()
    }

    fn advance_status(
        &self,
        _id: &ApplicationId,
        _expected: ApplicationStatus,
        _next: ApplicationStatus,
        _now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        unavailable()
    }

    fn list_applications(&self) -> Result<Vec<Application>, RepositoryError> {
        unavailable()
    }

    fn expire_writing_tasks(
        &self,
        _candidates: &[ApplicationId],
        _now: DateTime<Utc>,
    ) -> Result<Vec<ApplicationId>, RepositoryError> {
        unavailable()
    }

    fn insert_interviewer(
        &self,
        _interviewer: NewInterviewer,
    ) -> Result<Interviewer, RepositoryError> {
        unavailable()
    }

    fn fetch_interviewer(
        &self,
        _id: &InterviewerId,
    ) -> Result<Option<Interviewer>, RepositoryError> {
        unavailable()
    }

    fn update_interviewer(&self, _interviewer: Interviewer) -> Result<(), RepositoryError> {
        unavailable()
    }

    fn list_interviewers(&self) -> Result<Vec<Interviewer>, RepositoryError> {
        unavailable()
    }

    fn delete_interviewer(&self, _id: &InterviewerId) -> Result<(), RepositoryError> {
        unavailable()
    }

    fn insert_score(&self, _score: NewInterviewScore) -> Result<InterviewScore, RepositoryError> {
        unavailable()
    }

    fn update_score(
        &self,
        _id: &InterviewScoreId,
        _score: Score,
        _comment: Option<String>,
        _now: DateTime<Utc>,
    ) -> Result<InterviewScore, RepositoryError> {
        unavailable()
    }

    fn delete_score(
        &self,
        _id: &InterviewScoreId,
        _now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        unavailable()
    }

    fn fetch_score(
        &self,
        _id: &InterviewScoreId,
    ) -> Result<Option<InterviewScore>, RepositoryError> {
        unavailable()
    }

    fn scores_for(
        &self,
        _application_id: &ApplicationId,
    ) -> Result<Vec<InterviewScore>, RepositoryError> {
        unavailable()
    }
}
