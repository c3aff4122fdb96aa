use crate::infra::{build_service, AppService, OutboxMailer};
use chrono::{DateTime, Duration, Utc};
use clap::Args;
use saga_recruit::config::AppConfig;
use saga_recruit::error::AppError;
use saga_recruit::workflows::recruitment::notifications::local_time;
use saga_recruit::workflows::recruitment::{
    departments, AccessContext, ApplicantSubmission, ApplicationId, ApplicationQuery,
    ApplicationStatus, ApplicationUpdate, BatchReport, Department, NewInterviewer, RecruitmentError,
    Score, Sex, YearInSchool,
};

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Department the demo applicant applies to
    #[arg(long, default_value = "IT")]
    pub(crate) department: Department,
    /// Print the full body of every email sent
    #[arg(long)]
    pub(crate) show_emails: bool,
}

pub(crate) fn print_departments() {
    println!("Departments");
    for entry in departments::registry() {
        println!("- {}: {}", entry.code, entry.display_name);
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let offset = config.notifications.local_offset();
    let (service, outbox) = build_service(config.notifications.clone());
    let department = args.department;
    let admin = AccessContext::superuser();
    let lead = AccessContext::for_departments([department]);
    let start = Utc::now();

    println!("{} recruitment demo", config.notifications.campaign_name);
    println!("Department: {} ({})", department.display_name(), department);

    let applicant = service.submit_applicant(demo_submission(department), start)?;
    println!("\n1. Applicant {} submitted ({})", applicant.name, applicant.id);

    let application = service.open_application(&lead, &applicant.id, department, start)?;
    println!(
        "2. Application {} opened, writing task due {}",
        application.id,
        local_time(application.writing_task_deadline, offset)
    );

    let report = service.send_writing_task_emails(&lead, &[application.id], start)?;
    print_step("3. Writing task invitation", &report);

    let reviewed_at = start + Duration::days(3);
    service.update_application(
        &lead,
        &application.id,
        ApplicationUpdate {
            status: Some(ApplicationStatus::InterviewPending),
            writing_task_score: Some(Some(Score::new(82.0).map_err(RecruitmentError::from)?)),
            writing_task_comment: Some(Some("Well structured argument".to_string())),
            ..ApplicationUpdate::default()
        },
        reviewed_at,
    )?;
    println!("4. Writing task reviewed, awaiting interview");

    let interviewer = service.create_interviewer(
        &lead,
        NewInterviewer {
            name: "Lin".to_string(),
            department,
            meeting_link: "https://meet.example.com/saga-lin".to_string(),
        },
    )?;
    let slot = interview_slot(start);
    service.update_application(
        &lead,
        &application.id,
        ApplicationUpdate {
            interview_time: Some(Some(slot)),
            interviewer_id: Some(Some(interviewer.id)),
            ..ApplicationUpdate::default()
        },
        reviewed_at,
    )?;
    let report = service.send_interview_emails(&lead, &[application.id], reviewed_at)?;
    print_step("5. Interview invitation", &report);

    let interviewed_at = slot + Duration::hours(1);
    for (name, mark) in [("Lin", 78.0), ("Zhou", 88.0)] {
        service.record_score(&lead, &application.id, name, mark, None, interviewed_at)?;
    }
    let detail = service.get_application(&lead, &application.id)?;
    println!(
        "6. Interview scored by {} interviewers, average {}, total {}",
        detail.scores.len(),
        format_score(detail.application.average_interview_score),
        format_score(detail.total_score)
    );

    service.update_application(
        &lead,
        &application.id,
        ApplicationUpdate {
            status: Some(ApplicationStatus::InternalAccepted),
            ..ApplicationUpdate::default()
        },
        interviewed_at,
    )?;
    let report = service.send_decision_emails(&admin, &[application.id], interviewed_at)?;
    print_step("7. Decision email", &report);

    print_listing(&service, &lead)?;
    print_outbox(&outbox, args.show_emails);
    print_final_status(&service, &lead, application.id)?;
    Ok(())
}

fn demo_submission(department: Department) -> ApplicantSubmission {
    ApplicantSubmission {
        name: "Zhang Wei".to_string(),
        email: "zhang.wei@example.edu".to_string(),
        phone: "13800138000".to_string(),
        school: "Fudan University".to_string(),
        major: "Computer Science".to_string(),
        grade: YearInSchool::SecondYear,
        sex: Sex::Other,
        wechat: "zhangwei_saga".to_string(),
        first_choice: department,
        second_choice: None,
        third_choice: None,
        preferred_subject: None,
        self_intro: "Runs the campus coding club and enjoys mentoring.".to_string(),
        disposable_time: 4,
        source: Some("campus fair".to_string()),
    }
}

fn interview_slot(start: DateTime<Utc>) -> DateTime<Utc> {
    start + Duration::days(5)
}

fn print_step(label: &str, report: &BatchReport) {
    if report.all_succeeded {
        println!("{label}: sent to {} applicant(s)", report.succeeded.len());
        return;
    }
    println!("{label}: {} issue(s)", report.failure_count());
    for issue in report.skipped.iter().chain(report.failed.iter()) {
        println!("- application {}: {}", issue.application_id, issue.reason);
    }
}

fn print_listing(service: &AppService, ctx: &AccessContext) -> Result<(), AppError> {
    println!("\nApplications visible to the department lead");
    for row in service.list_applications(ctx, &ApplicationQuery::default())? {
        println!(
            "- #{} {} | {} | {} | total {}",
            row.id,
            row.applicant_name,
            row.department_name,
            row.status_label,
            format_score(row.total_score)
        );
    }
    Ok(())
}

fn print_outbox(outbox: &OutboxMailer, show_bodies: bool) {
    let messages = outbox.messages();
    println!("\nOutbox ({} message(s))", messages.len());
    for message in messages {
        println!("- {} -> {}: {}", message.from, message.recipient, message.subject);
        if show_bodies {
            for line in message.body.lines() {
                println!("    {line}");
            }
        }
    }
}

fn print_final_status(
    service: &AppService,
    ctx: &AccessContext,
    id: ApplicationId,
) -> Result<(), AppError> {
    let detail = service.get_application(ctx, &id)?;
    println!("\nFinal status: {}", detail.status_label);
    Ok(())
}

fn format_score(value: Option<f64>) -> String {
    value
        .map(|score| format!("{score:.1}"))
        .unwrap_or_else(|| "n/a".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scores_render_with_one_decimal() {
        assert_eq!(format_score(Some(83.0)), "83.0");
        assert_eq!(format_score(None), "n/a");
    }

    #[test]
    fn demo_submission_passes_intake() {
        let (service, _) = build_service(Default::default());
        let applicant = service
            .submit_applicant(demo_submission(Department::Fin), Utc::now())
            .expect("demo applicant is valid");
        assert_eq!(applicant.first_choice, Department::Fin);
    }
}
