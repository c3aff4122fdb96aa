use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::departments::Department;

/// Opaque token handed to applicants; doubles as the upload reference in writing-task mail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicantId(pub Uuid);

impl ApplicantId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ApplicantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ApplicantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InterviewerId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InterviewScoreId(pub u64);

macro_rules! display_numeric_id {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        })*
    };
}

display_numeric_id!(ApplicationId, InterviewerId, InterviewScoreId);

/// A mark on the 0-100 scale used for writing tasks and interviews.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Score(f64);

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("score must be between 0 and 100 (found {0})")]
pub struct ScoreOutOfRange(pub f64);

impl Score {
    pub const MIN: f64 = 0.0;
    pub const MAX: f64 = 100.0;

    pub fn new(value: f64) -> Result<Self, ScoreOutOfRange> {
        if value.is_finite() && (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ScoreOutOfRange(value))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Score {
    type Error = ScoreOutOfRange;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Score> for f64 {
    fn from(score: Score) -> Self {
        score.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum YearInSchool {
    #[serde(rename = "UG1")]
    FirstYear,
    #[serde(rename = "UG2")]
    SecondYear,
    #[serde(rename = "UG3")]
    ThirdYear,
    #[serde(rename = "UG4")]
    FourthYear,
    #[serde(rename = "UGGRAD")]
    UndergraduateAlumnus,
    #[serde(rename = "PG")]
    Postgraduate,
    #[serde(rename = "PGGRAD")]
    PostgraduateAlumnus,
    #[serde(rename = "OTHER")]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Sex {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
    #[default]
    #[serde(rename = "O")]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Subject {
    #[serde(rename = "MATH")]
    Mathematics,
    #[serde(rename = "CHI")]
    Chinese,
    #[serde(rename = "ENG")]
    English,
}

/// Raw applicant form as posted by the public sign-up page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicantSubmission {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub school: String,
    pub major: String,
    pub grade: YearInSchool,
    #[serde(default)]
    pub sex: Sex,
    pub wechat: String,
    pub first_choice: Department,
    #[serde(default)]
    pub second_choice: Option<Department>,
    #[serde(default)]
    pub third_choice: Option<Department>,
    #[serde(default)]
    pub preferred_subject: Option<Subject>,
    pub self_intro: String,
    pub disposable_time: u8,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Applicant {
    pub id: ApplicantId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub school: String,
    pub major: String,
    pub grade: YearInSchool,
    pub sex: Sex,
    pub wechat: String,
    pub first_choice: Department,
    pub second_choice: Option<Department>,
    pub third_choice: Option<Department>,
    pub preferred_subject: Option<Subject>,
    pub self_intro: String,
    pub disposable_time: u8,
    pub source: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Applicant {
    pub fn choices(&self) -> impl Iterator<Item = Department> + '_ {
        std::iter::once(self.first_choice)
            .chain(self.second_choice)
            .chain(self.third_choice)
    }
}

/// Lifecycle of one department's evaluation track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    NewApplication,
    WritingTaskEmailSent,
    WritingTaskSubmitted,
    WritingTaskReviewed,
    InterviewPending,
    InterviewEmailSent,
    Pending,
    SendToOtherDept,
    InternalAccepted,
    InternalRejected,
    Accepted,
    Rejected,
    WritingTaskExpired,
}

impl ApplicationStatus {
    pub const fn code(self) -> &'static str {
        match self {
            Self::NewApplication => "NEW_APPLICATION",
            Self::WritingTaskEmailSent => "WRITING_TASK_EMAIL_SENT",
            Self::WritingTaskSubmitted => "WRITING_TASK_SUBMITTED",
            Self::WritingTaskReviewed => "WRITING_TASK_REVIEWED",
            Self::InterviewPending => "INTERVIEW_PENDING",
            Self::InterviewEmailSent => "INTERVIEW_EMAIL_SENT",
            Self::Pending => "PENDING",
            Self::SendToOtherDept => "SEND_TO_OTHER_DEPT",
            Self::InternalAccepted => "INTERNAL_ACCEPTED",
            Self::InternalRejected => "INTERNAL_REJECTED",
            Self::Accepted => "ACCEPTED",
            Self::Rejected => "REJECTED",
            Self::WritingTaskExpired => "WRITING_TASK_EXPIRED",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::NewApplication => "New application",
            Self::WritingTaskEmailSent => "Writing task sent",
            Self::WritingTaskSubmitted => "Writing task submitted",
            Self::WritingTaskReviewed => "Writing task reviewed",
            Self::InterviewPending => "Awaiting interview",
            Self::InterviewEmailSent => "Interview invitation sent",
            Self::Pending => "Interviewed, awaiting decision",
            Self::SendToOtherDept => "Referred to another department",
            Self::InternalAccepted => "Accept decided",
            Self::InternalRejected => "Reject decided",
            Self::Accepted => "Offer sent",
            Self::Rejected => "Rejection sent",
            Self::WritingTaskExpired => "Writing task expired",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Accepted | Self::Rejected | Self::SendToOtherDept | Self::WritingTaskExpired
        )
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub applicant_id: ApplicantId,
    pub handle_by: Department,
    pub status: ApplicationStatus,
    pub writing_task_deadline: DateTime<Utc>,
    pub writing_task_file: Option<String>,
    pub writing_task_video_link: Option<String>,
    pub interview_time: Option<DateTime<Utc>>,
    pub interviewer_id: Option<InterviewerId>,
    pub interview_notes_archived: bool,
    pub writing_task_score: Option<Score>,
    pub writing_task_comment: Option<String>,
    pub average_interview_score: Option<f64>,
    pub remark: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Application {
    /// Writing-task score plus interview average; absent unless both halves exist.
    pub fn total_score(&self) -> Option<f64> {
        match (self.writing_task_score, self.average_interview_score) {
            (Some(writing), Some(average)) => Some(writing.value() + average),
            _ => None,
        }
    }
}

/// Fields supplied when staff open a new evaluation track.
#[derive(Debug, Clone, PartialEq)]
pub struct NewApplication {
    pub applicant_id: ApplicantId,
    pub handle_by: Department,
    pub writing_task_deadline: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Staff edit of an existing application.
///
/// Handling department and applicant are fixed once the record exists. The interview average
/// is derived and the writing-task upload fields belong to the applicant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApplicationUpdate {
    #[serde(default)]
    pub status: Option<ApplicationStatus>,
    #[serde(default)]
    pub writing_task_deadline: Option<DateTime<Utc>>,
    #[serde(default, with = "double_option")]
    pub interview_time: Option<Option<DateTime<Utc>>>,
    #[serde(default, with = "double_option")]
    pub interviewer_id: Option<Option<InterviewerId>>,
    #[serde(default)]
    pub interview_notes_archived: Option<bool>,
    #[serde(default, with = "double_option")]
    pub writing_task_score: Option<Option<Score>>,
    #[serde(default, with = "double_option")]
    pub writing_task_comment: Option<Option<String>>,
    #[serde(default, with = "double_option")]
    pub remark: Option<Option<String>>,
}

impl ApplicationUpdate {
    pub fn apply(self, application: &mut Application) {
        if let Some(status) = self.status {
            application.status = status;
        }
        if let Some(deadline) = self.writing_task_deadline {
            application.writing_task_deadline = deadline;
        }
        if let Some(time) = self.interview_time {
            application.interview_time = time;
        }
        if let Some(interviewer) = self.interviewer_id {
            application.interviewer_id = interviewer;
        }
        if let Some(archived) = self.interview_notes_archived {
            application.interview_notes_archived = archived;
        }
        if let Some(score) = self.writing_task_score {
            application.writing_task_score = score;
        }
        if let Some(comment) = self.writing_task_comment {
            application.writing_task_comment = comment;
        }
        if let Some(remark) = self.remark {
            application.remark = remark;
        }
    }
}

/// Distinguishes "field omitted" from "field explicitly set to null" in PATCH bodies.
mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<T, S>(value: &Option<Option<T>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: Serializer,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interviewer {
    pub id: InterviewerId,
    pub name: String,
    pub department: Department,
    pub meeting_link: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewInterviewer {
    pub name: String,
    pub department: Department,
    pub meeting_link: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewScore {
    pub id: InterviewScoreId,
    pub application_id: ApplicationId,
    pub interviewer: String,
    pub score: Score,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewInterviewScore {
    pub application_id: ApplicationId,
    pub interviewer: String,
    pub score: Score,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn application() -> Application {
        let created = Utc
            .with_ymd_and_hms(2025, 3, 1, 4, 0, 0)
            .single()
            .expect("valid timestamp");
        Application {
            id: ApplicationId(1),
            applicant_id: ApplicantId::new(),
            handle_by: Department::Law,
            status: ApplicationStatus::NewApplication,
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
    fn total_score_requires_both_components() {
        let mut application = application();
        assert_eq!(application.total_score(), None);

        application.writing_task_score = Some(Score::new(70.0).expect("in range"));
        assert_eq!(application.total_score(), None);

        application.average_interview_score = Some(82.5);
        assert_eq!(application.total_score(), Some(152.5));

        application.writing_task_score = None;
        assert_eq!(application.total_score(), None);
    }

    #[test]
    fn score_rejects_values_outside_scale() {
        assert!(Score::new(0.0).is_ok());
        assert!(Score::new(100.0).is_ok());
        assert_eq!(Score::new(100.5), Err(ScoreOutOfRange(100.5)));
        assert!(Score::new(-1.0).is_err());
        assert!(Score::new(f64::NAN).is_err());
        assert!(serde_json::from_str::<Score>("101").is_err());
    }

    #[test]
    fn status_codes_match_serde_representation() {
        for status in [
            ApplicationStatus::NewApplication,
            ApplicationStatus::WritingTaskExpired,
            ApplicationStatus::SendToOtherDept,
            ApplicationStatus::InternalAccepted,
        ] {
            let json = serde_json::to_string(&status).expect("serializes");
            assert_eq!(json, format!("\"{}\"", status.code()));
        }
    }

    #[test]
    fn terminal_states_are_the_four_endpoints() {
        assert!(ApplicationStatus::Accepted.is_terminal());
        assert!(ApplicationStatus::Rejected.is_terminal());
        assert!(ApplicationStatus::SendToOtherDept.is_terminal());
        assert!(ApplicationStatus::WritingTaskExpired.is_terminal());
        assert!(!ApplicationStatus::InternalAccepted.is_terminal());
        assert!(!ApplicationStatus::NewApplication.is_terminal());
    }

    #[test]
    fn update_distinguishes_null_from_missing() {
        let mut application = application();
        application.remark = Some("call back".to_string());
        application.interviewer_id = Some(InterviewerId(4));

        let update: ApplicationUpdate =
            serde_json::from_str(r#"{"remark": null, "status": "INTERVIEW_PENDING"}"#)
                .expect("valid patch");
        update.apply(&mut application);

        assert_eq!(application.remark, None);
        assert_eq!(application.interviewer_id, Some(InterviewerId(4)));
        assert_eq!(application.status, ApplicationStatus::InterviewPending);
    }

    #[test]
    fn update_refuses_scope_fields() {
        let result = serde_json::from_str::<ApplicationUpdate>(r#"{"handle_by": "IT"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn applicant_choices_skip_missing_entries() {
        let submission_time = Utc::now();
        let applicant = Applicant {
            id: ApplicantId::new(),
            name: "Lin".to_string(),
            email: "lin@example.org".to_string(),
            phone: "13800000000".to_string(),
            school: "Fudan".to_string(),
            major: "Law".to_string(),
            grade: YearInSchool::SecondYear,
            sex: Sex::Other,
            wechat: "lin_w".to_string(),
            first_choice: Department::Law,
            second_choice: None,
            third_choice: Some(Department::Hr),
            preferred_subject: None,
            self_intro: "hello".to_string(),
            disposable_time: 3,
            source: None,
            created_at: submission_time,
            modified_at: submission_time,
        };
        let choices: Vec<_> = applicant.choices().collect();
        assert_eq!(choices, vec![Department::Law, Department::Hr]);
    }
}
