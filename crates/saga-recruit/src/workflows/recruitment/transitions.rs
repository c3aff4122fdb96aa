//! Guard rules for the automated status transitions.
//!
//! Only three transitions are driven by actions (writing-task mail, interview mail, decision
//! mail) plus the expiry sweep. Every other status change is a manual staff edit.

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Utc};
use serde::Serialize;

use super::domain::{Application, ApplicationStatus};

/// Days an applicant has to hand in the writing task.
pub const WRITING_TASK_WINDOW_DAYS: i64 = 7;

/// Seven days from `now`, pinned to 23:59:59 on the local wall clock.
pub fn writing_task_deadline(now: DateTime<Utc>, offset: FixedOffset) -> DateTime<Utc> {
    let local_day = (now.with_timezone(&offset) + Duration::days(WRITING_TASK_WINDOW_DAYS))
        .date_naive();
    let local_end_of_day =
        local_day.and_time(NaiveTime::default()) + Duration::days(1) - Duration::seconds(1);
    let utc_end_of_day =
        local_end_of_day - Duration::seconds(i64::from(offset.local_minus_utc()));
    Utc.from_utc_datetime(&utc_end_of_day)
}

/// Bulk actions an operator can run over a selection of applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowAction {
    SendWritingTask,
    ExpireWritingTasks,
    SendInterview,
    SendDecision,
}

impl WorkflowAction {
    pub const fn label(self) -> &'static str {
        match self {
            Self::SendWritingTask => "send writing-task email",
            Self::ExpireWritingTasks => "expire writing tasks",
            Self::SendInterview => "send interview email",
            Self::SendDecision => "send decision email",
        }
    }
}

/// Reason a record was left untouched by an action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PreconditionFailure {
    #[error("status is {actual}, action requires {expected}")]
    UnexpectedStatus {
        expected: &'static str,
        actual: ApplicationStatus,
    },
    #[error("interview time is not set")]
    MissingInterviewTime,
    #[error("no interviewer is assigned")]
    MissingInterviewer,
    #[error("application is closed ({0})")]
    Closed(ApplicationStatus),
    #[error("record is being processed by another action")]
    Busy,
    #[error("status changed while the action was running")]
    StatusChanged,
}

pub fn check_writing_task(application: &Application) -> Result<(), PreconditionFailure> {
    expect_status(application, ApplicationStatus::NewApplication)
}

/// Interview mail needs the slot and the interviewer; the interviewer record is resolved later.
pub fn check_interview(application: &Application) -> Result<(), PreconditionFailure> {
    expect_status(application, ApplicationStatus::InterviewPending)?;
    if application.interview_time.is_none() {
        return Err(PreconditionFailure::MissingInterviewTime);
    }
    if application.interviewer_id.is_none() {
        return Err(PreconditionFailure::MissingInterviewer);
    }
    Ok(())
}

/// Internal verdict awaiting notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Reject,
}

impl Decision {
    pub const fn notified_status(self) -> ApplicationStatus {
        match self {
            Decision::Accept => ApplicationStatus::Accepted,
            Decision::Reject => ApplicationStatus::Rejected,
        }
    }
}

pub fn check_decision(application: &Application) -> Result<Decision, PreconditionFailure> {
    match application.status {
        ApplicationStatus::InternalAccepted => Ok(Decision::Accept),
        ApplicationStatus::InternalRejected => Ok(Decision::Reject),
        actual if actual.is_terminal() => Err(PreconditionFailure::Closed(actual)),
        actual => Err(PreconditionFailure::UnexpectedStatus {
            expected: "INTERNAL_ACCEPTED or INTERNAL_REJECTED",
            actual,
        }),
    }
}

/// Writing task went out and the deadline is strictly in the past.
pub fn is_expired(application: &Application, now: DateTime<Utc>) -> bool {
    application.status == ApplicationStatus::WritingTaskEmailSent
        && application.writing_task_deadline < now
}

fn expect_status(
    application: &Application,
    expected: ApplicationStatus,
) -> Result<(), PreconditionFailure> {
    if application.status == expected {
        Ok(())
    } else if application.status.is_terminal() {
        Err(PreconditionFailure::Closed(application.status))
    } else {
        Err(PreconditionFailure::UnexpectedStatus {
            expected: expected.code(),
            actual: application.status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::recruitment::departments::Department;
    use crate::workflows::recruitment::domain::{ApplicantId, ApplicationId};

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s)
            .single()
            .expect("valid timestamp")
    }

    fn sample_application(status: ApplicationStatus) -> Application {
        let created = utc(2025, 3, 1, 4, 0, 0);
        Application {
            id: ApplicationId(7),
            applicant_id: ApplicantId::new(),
            handle_by: Department::Hr,
            status,
            writing_task_deadline: created,
            writing_task_file: None,
            writing_task_video_link: None,
            interview_time: None,
            interviewer_id: None,
            interview_notes_archived: false,
            writing_task_score: None,
            writing_task_comment: None,
            average_interview_score: None,
            remark: None,
            created_at: created,
            modified_at: created,
        }
    }

    #[test]
    fn deadline_is_end_of_local_day_a_week_out() {
        let offset = FixedOffset::east_opt(8 * 3600).expect("valid offset");
        let now = utc(2025, 3, 1, 4, 30, 0);
        assert_eq!(
            writing_task_deadline(now, offset),
            utc(2025, 3, 8, 15, 59, 59)
        );
    }

    #[test]
    fn deadline_follows_local_date_not_utc_date() {
        let offset = FixedOffset::east_opt(8 * 3600).expect("valid offset");
        // 20:00 UTC on 1 March is already 2 March in UTC+8.
        let now = utc(2025, 3, 1, 20, 0, 0);
        assert_eq!(
            writing_task_deadline(now, offset),
            utc(2025, 3, 9, 15, 59, 59)
        );
    }

    #[test]
    fn deadline_in_utc_zone() {
        let offset = FixedOffset::east_opt(0).expect("valid offset");
        let now = utc(2025, 12, 28, 9, 0, 0);
        assert_eq!(
            writing_task_deadline(now, offset),
            utc(2026, 1, 4, 23, 59, 59)
        );
    }

    #[test]
    fn closed_records_are_reported_as_closed() {
        let mut application = sample_application(ApplicationStatus::Accepted);
        assert_eq!(
            check_decision(&application),
            Err(PreconditionFailure::Closed(ApplicationStatus::Accepted))
        );
        application.status = ApplicationStatus::WritingTaskExpired;
        assert_eq!(
            check_writing_task(&application),
            Err(PreconditionFailure::Closed(ApplicationStatus::WritingTaskExpired))
        );
        application.status = ApplicationStatus::Pending;
        assert!(matches!(
            check_interview(&application),
            Err(PreconditionFailure::UnexpectedStatus { .. })
        ));
    }

    #[test]
    fn decision_maps_internal_verdicts() {
        assert_eq!(
            Decision::Accept.notified_status(),
            ApplicationStatus::Accepted
        );
        assert_eq!(
            Decision::Reject.notified_status(),
            ApplicationStatus::Rejected
        );
    }
}
