use chrono::FixedOffset;

use super::notifications::local_time;
use super::views::ApplicationRow;

pub(crate) const EXPORT_HEADER: [&str; 9] = [
    "id",
    "applicant",
    "email",
    "department",
    "status",
    "interview_time",
    "writing_task_score",
    "average_interview_score",
    "total_score",
];

/// Render listing rows as CSV with interview times on the campaign's local clock.
pub fn applications_csv(rows: &[ApplicationRow], offset: FixedOffset) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(EXPORT_HEADER)?;

    for row in rows {
        writer.write_record([
            row.id.to_string(),
            row.applicant_name.clone(),
            row.applicant_email.clone(),
            row.handle_by.code().to_string(),
            row.status.code().to_string(),
            row.interview_time
                .map(|time| local_time(time, offset))
                .unwrap_or_default(),
            optional_number(row.writing_task_score),
            optional_number(row.average_interview_score),
            optional_number(row.total_score),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|err| csv::Error::from(err.into_error()))
}

fn optional_number(value: Option<f64>) -> String {
    value.map(|number| format!("{number:.2}")).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_listing_still_has_header() {
        let offset = FixedOffset::east_opt(0).expect("valid offset");
        let bytes = applications_csv(&[], offset).expect("csv renders");
        let text = String::from_utf8(bytes).expect("utf8");
        assert_eq!(
            text.trim_end(),
            "id,applicant,email,department,status,interview_time,writing_task_score,average_interview_score,total_score"
        );
    }

    #[test]
    fn numbers_render_with_two_decimals() {
        assert_eq!(optional_number(Some(7.5)), "7.50");
        assert_eq!(optional_number(None), "");
    }
}
