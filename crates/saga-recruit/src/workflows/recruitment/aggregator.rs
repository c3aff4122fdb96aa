use super::domain::{Application, InterviewScore, Score};

/// Arithmetic mean of the scores, or `None` when there is nothing to average.
pub fn average_interview_score<'a, I>(scores: I) -> Option<f64>
where
    I: IntoIterator<Item = &'a Score>,
{
    let (sum, count) = scores
        .into_iter()
        .fold((0.0_f64, 0_u32), |(sum, count), score| {
            (sum + score.value(), count + 1)
        });

    if count == 0 {
        None
    } else {
        Some(sum / f64::from(count))
    }
}

/// Refresh the derived average on `application` from its live score set.
///
/// Store implementations call this from every score insert/update/delete path while still
/// holding the write lock, so the average is never observable out of date.
pub fn recompute<'a, I>(application: &mut Application, scores: I)
where
    I: IntoIterator<Item = &'a InterviewScore>,
{
    application.average_interview_score =
        average_interview_score(scores.into_iter().map(|entry| &entry.score));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(values: &[f64]) -> Vec<Score> {
        values
            .iter()
            .map(|value| Score::new(*value).expect("in range"))
            .collect()
    }

    #[test]
    fn empty_set_clears_average() {
        assert_eq!(average_interview_score(&scores(&[])), None);
    }

    #[test]
    fn mean_of_current_scores() {
        assert_eq!(average_interview_score(&scores(&[80.0])), Some(80.0));
        assert_eq!(
            average_interview_score(&scores(&[70.0, 85.0, 90.0])),
            Some(245.0 / 3.0)
        );
        assert_eq!(average_interview_score(&scores(&[0.0, 0.0])), Some(0.0));
    }
}
