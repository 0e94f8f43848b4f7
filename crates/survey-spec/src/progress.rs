use crate::spec::SurveySpec;

/// Share of the survey already behind the respondent: `index / total`.
///
/// Reaches 1 only once the survey is finished, which the player sets
/// explicitly. Unknown question ids yield `None`.
pub fn calculate_progress(survey: &SurveySpec, question_id: &str) -> Option<f64> {
    let index = survey.question_index(question_id)?;
    Some(index as f64 / survey.questions.len() as f64)
}
