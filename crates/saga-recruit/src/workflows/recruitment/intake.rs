use chrono::{DateTime, Utc};

use super::departments::Department;
use super::domain::{Applicant, ApplicantId, ApplicantSubmission};

/// Validation errors raised while turning a sign-up form into an applicant record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntakeViolation {
    #[error("{field} is required")]
    MissingField { field: &'static str },
    #[error("{field} exceeds {max} characters")]
    TooLong { field: &'static str, max: usize },
    #[error("email address '{0}' is not valid")]
    InvalidEmail(String),
    #[error("phone number must be 11 digits")]
    InvalidPhone,
    #[error("weekly availability must be between 1 and 5 (found {0})")]
    AvailabilityOutOfRange(u8),
    #[error("department {0} was chosen more than once")]
    DuplicateChoice(Department),
}

const NAME_MAX_CHARS: usize = 10;
const EMAIL_MAX_CHARS: usize = 30;
const TEXT_MAX_CHARS: usize = 30;
const PHONE_DIGITS: usize = 11;

/// Guard responsible for producing `Applicant` records from public submissions.
#[derive(Debug, Clone, Default)]
pub struct IntakeGuard;

impl IntakeGuard {
    pub fn applicant_from_submission(
        &self,
        submission: ApplicantSubmission,
        now: DateTime<Utc>,
    ) -> Result<Applicant, IntakeViolation> {
        let name = bounded("name", &submission.name, NAME_MAX_CHARS)?;
        let email = bounded("email", &submission.email, EMAIL_MAX_CHARS)?;
        if !looks_like_email(&email) {
            return Err(IntakeViolation::InvalidEmail(email));
        }

        let phone = required("phone", &submission.phone)?;
        if phone.chars().count() != PHONE_DIGITS || !phone.chars().all(|c| c.is_ascii_digit()) {
            return Err(IntakeViolation::InvalidPhone);
        }

        let school = bounded("school", &submission.school, TEXT_MAX_CHARS)?;
        let major = bounded("major", &submission.major, TEXT_MAX_CHARS)?;
        let wechat = bounded("wechat", &submission.wechat, TEXT_MAX_CHARS)?;
        let self_intro = required("self_intro", &submission.self_intro)?;

        if !(1..=5).contains(&submission.disposable_time) {
            return Err(IntakeViolation::AvailabilityOutOfRange(
                submission.disposable_time,
            ));
        }

        let source = match submission.source.as_deref().map(str::trim) {
            Some("") | None => None,
            Some(raw) => Some(bounded("source", raw, TEXT_MAX_CHARS)?),
        };

        let applicant = Applicant {
            id: ApplicantId::new(),
            name,
            email,
            phone,
            school,
            major,
            grade: submission.grade,
            sex: submission.sex,
            wechat,
            first_choice: submission.first_choice,
            second_choice: submission.second_choice,
            third_choice: submission.third_choice,
            preferred_subject: submission.preferred_subject,
            self_intro,
            disposable_time: submission.disposable_time,
            source,
            created_at: now,
            modified_at: now,
        };

        let mut seen = Vec::with_capacity(3);
        for choice in applicant.choices() {
            if seen.contains(&choice) {
                return Err(IntakeViolation::DuplicateChoice(choice));
            }
            seen.push(choice);
        }
        Ok(applicant)
    }
}

fn required(field: &'static str, raw: &str) -> Result<String, IntakeViolation> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(IntakeViolation::MissingField { field });
    }
    Ok(trimmed.to_string())
}

fn bounded(field: &'static str, raw: &str, max: usize) -> Result<String, IntakeViolation> {
    let value = required(field, raw)?;
    if value.chars().count() > max {
        return Err(IntakeViolation::TooLong { field, max });
    }
    Ok(value)
}

fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !value.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::recruitment::domain::{Sex, YearInSchool};

    #[test]
    fn email_shape_check() {
        assert!(looks_like_email("wu@saga.org"));
        assert!(!looks_like_email("wu@saga"));
        assert!(!looks_like_email("@saga.org"));
        assert!(!looks_like_email("wu@@saga.org"));
        assert!(!looks_like_email("wu saga@x.org"));
    }

    fn form(first: Department) -> ApplicantSubmission {
        ApplicantSubmission {
            name: " Wu ".to_string(),
            email: "wu@saga.org".to_string(),
            phone: "13900000000".to_string(),
            school: "Tongji".to_string(),
            major: "Finance".to_string(),
            grade: YearInSchool::FirstYear,
            sex: Sex::Female,
            wechat: "wu_saga".to_string(),
            first_choice: first,
            second_choice: None,
            third_choice: None,
            preferred_subject: None,
            self_intro: "Treasurer of the debate club".to_string(),
            disposable_time: 2,
            source: Some("  ".to_string()),
        }
    }

    #[test]
    fn repeated_department_choice_is_rejected() {
        let mut submission = form(Department::Fin);
        submission.second_choice = Some(Department::Hr);
        submission.third_choice = Some(Department::Hr);
        let err = IntakeGuard
            .applicant_from_submission(submission, Utc::now())
            .expect_err("HR chosen twice");
        assert_eq!(err, IntakeViolation::DuplicateChoice(Department::Hr));
    }

    #[test]
    fn accepted_form_is_trimmed() {
        let mut submission = form(Department::Fin);
        submission.second_choice = Some(Department::Pre);
        let applicant = IntakeGuard
            .applicant_from_submission(submission, Utc::now())
            .expect("valid form");
        assert_eq!(applicant.name, "Wu");
        assert_eq!(applicant.source, None);
        assert_eq!(
            applicant.choices().collect::<Vec<_>>(),
            vec![Department::Fin, Department::Pre]
        );
    }
}
