use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::config::NotificationConfig;

use super::departments::Department;
use super::domain::ApplicantId;

/// Mailbox a message goes out from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MailSender {
    /// Invitations that expect no reply.
    NoReply,
    /// Decisions, sent from a mailbox HR can follow up on.
    HumanResources,
}

/// Fully rendered message handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundEmail {
    pub sender: MailSender,
    pub from: String,
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

/// Transport seam. Success or failure is the whole contract; retries are the operator's call.
pub trait Mailer: Send + Sync {
    fn send(&self, email: &OutboundEmail) -> Result<(), MailError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MailError {
    #[error("mail transport unavailable: {0}")]
    Transport(String),
    #[error("recipient rejected: {0}")]
    Rejected(String),
}

/// Notification kinds with the fields each template needs.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationTemplate {
    WritingTaskInvite {
        applicant_id: ApplicantId,
        applicant_name: String,
        department: Department,
        deadline: DateTime<Utc>,
    },
    InterviewInvite {
        applicant_name: String,
        department: Department,
        interview_time: DateTime<Utc>,
        meeting_link: String,
    },
    Accepted {
        applicant_name: String,
        department: Department,
    },
    Rejected {
        applicant_name: String,
        department: Department,
    },
}

impl NotificationTemplate {
    pub fn sender(&self) -> MailSender {
        match self {
            Self::WritingTaskInvite { .. } | Self::InterviewInvite { .. } => MailSender::NoReply,
            Self::Accepted { .. } | Self::Rejected { .. } => MailSender::HumanResources,
        }
    }

    pub fn subject(&self, campaign: &str) -> String {
        let topic = match self {
            Self::WritingTaskInvite { .. } => "Writing Task Invitation",
            Self::InterviewInvite { .. } => "Interview Invitation",
            Self::Accepted { .. } => "Offer of Admission",
            Self::Rejected { .. } => "Application Outcome",
        };
        format!("{campaign} -- {topic}")
    }

    pub fn body(&self, settings: &NotificationConfig) -> String {
        let offset = settings.local_offset();
        match self {
            Self::WritingTaskInvite {
                applicant_id,
                applicant_name,
                department,
                deadline,
            } => format!(
                "Dear {applicant_name},\n\n\
                 Thank you for applying to the {dept} department of {campaign}. \
                 The next step is a short writing task.\n\n\
                 Please upload your work at {portal}/writing-task/{applicant_id} \
                 before {deadline}.\n\
                 Your application reference is {applicant_id}.\n\n\
                 {campaign} Recruitment",
                dept = department.display_name(),
                campaign = settings.campaign_name,
                portal = settings.portal_url,
                deadline = local_time(*deadline, offset),
            ),
            Self::InterviewInvite {
                applicant_name,
                department,
                interview_time,
                meeting_link,
            } => format!(
                "Dear {applicant_name},\n\n\
                 The {dept} department of {campaign} would like to invite you to an interview \
                 at {time}.\n\
                 Join the meeting here: {meeting_link}\n\n\
                 {campaign} Recruitment",
                dept = department.display_name(),
                campaign = settings.campaign_name,
                time = local_time(*interview_time, offset),
            ),
            Self::Accepted {
                applicant_name,
                department,
            } => format!(
                "Dear {applicant_name},\n\n\
                 Congratulations! You have been accepted into the {dept} department of \
                 {campaign}. We will be in touch shortly about onboarding.\n\n\
                 {campaign} Human Resources",
                dept = department.display_name(),
                campaign = settings.campaign_name,
            ),
            Self::Rejected {
                applicant_name,
                department,
            } => format!(
                "Dear {applicant_name},\n\n\
                 Thank you for your interest in the {dept} department of {campaign}. \
                 After careful consideration we are unable to offer you a place this round.\n\n\
                 {campaign} Human Resources",
                dept = department.display_name(),
                campaign = settings.campaign_name,
            ),
        }
    }

    pub fn compose(&self, recipient: &str, settings: &NotificationConfig) -> OutboundEmail {
        let sender = self.sender();
        let from = match sender {
            MailSender::NoReply => settings.no_reply_sender.clone(),
            MailSender::HumanResources => settings.hr_sender.clone(),
        };
        OutboundEmail {
            sender,
            from,
            recipient: recipient.to_string(),
            subject: self.subject(&settings.campaign_name),
            body: self.body(settings),
        }
    }
}

/// Render a UTC instant on the configured wall clock, e.g. `2025-03-08 23:59 (UTC+08:00)`.
pub fn local_time(instant: DateTime<Utc>, offset: FixedOffset) -> String {
    instant
        .with_timezone(&offset)
        .format("%Y-%m-%d %H:%M (UTC%:z)")
        .to_string()
}
