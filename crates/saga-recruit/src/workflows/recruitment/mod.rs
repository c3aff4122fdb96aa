//! Recruitment pipeline: applicant intake, per-department evaluation tracks, interview scoring
//! and the notification-driven status machine.
//!
//! Every staff operation takes an explicit [`AccessContext`]; records outside its scope are
//! invisible and unmodifiable.

pub mod access;
pub mod aggregator;
pub mod departments;
pub mod domain;
pub mod export;
pub(crate) mod intake;
pub mod notifications;
pub mod repository;
pub mod router;
pub mod service;
pub mod store;
pub mod transitions;
pub mod views;

#[cfg(test)]
mod tests;

pub use access::{AccessContext, AccessScope, SEND_DECISION_PERMISSION};
pub use departments::{Department, DepartmentEntry, UnknownDepartment, UNIVERSAL_MEMBERSHIP};
pub use domain::{
    Applicant, ApplicantId, ApplicantSubmission, Application, ApplicationId, ApplicationStatus,
    ApplicationUpdate, InterviewScore, InterviewScoreId, Interviewer, InterviewerId,
    NewInterviewer, Score, ScoreOutOfRange, Sex, Subject, YearInSchool,
};
pub use intake::IntakeViolation;
pub use notifications::{MailError, MailSender, Mailer, NotificationTemplate, OutboundEmail};
pub use repository::{RecruitmentRepository, RepositoryError};
pub use router::{
    recruitment_router, Actor, ACTOR_GROUPS_HEADER, ACTOR_PERMISSIONS_HEADER,
    ACTOR_SUPERUSER_HEADER,
};
pub use service::{RecruitmentError, RecruitmentService};
pub use store::InMemoryRecruitmentStore;
pub use transitions::{PreconditionFailure, WorkflowAction};
pub use views::{
    ApplicantQuery, ApplicationDetail, ApplicationQuery, ApplicationRow, BatchReport,
    ExpiryReport, RecordIssue, Selection,
};
