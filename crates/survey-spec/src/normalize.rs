use crate::answers::AnswerValue;
use crate::spec::AnswerShape;
use crate::spec::question::QuestionType;
use crate::validate::ValidAnswer;

/// Converts validated raw input into the value stored in the response.
///
/// Multi-choice answers on questions with an "other" option keep known labels
/// as separate entries and fold every unknown token into one trailing entry,
/// joined back with commas. Empty input on an optional question becomes
/// [`skipped_value`].
pub fn normalize(answer: ValidAnswer<'_>) -> AnswerValue {
    let question = answer.question();
    let raw = answer.raw();
    if raw.is_empty() {
        return skipped_value(question.kind);
    }
    match question.kind {
        QuestionType::OpenText
        | QuestionType::MultipleChoiceSingle
        | QuestionType::Consent
        | QuestionType::Cta => AnswerValue::Text(raw.to_string()),
        QuestionType::Nps | QuestionType::Rating => match answer.number() {
            Some(number) => AnswerValue::Number(number),
            None => skipped_value(question.kind),
        },
        QuestionType::MultipleChoiceMulti => {
            let tokens = raw.split(',').map(str::to_string).collect::<Vec<_>>();
            if !question.has_other_choice() {
                return AnswerValue::List(tokens);
            }
            let (mut known, others): (Vec<String>, Vec<String>) = tokens
                .into_iter()
                .partition(|token| question.matches_choice_label(token));
            if !others.is_empty() {
                known.push(others.join(","));
            }
            AnswerValue::List(known)
        }
        QuestionType::PictureSelection => {
            AnswerValue::List(raw.split(',').map(str::to_string).collect())
        }
        QuestionType::Unknown => skipped_value(question.kind),
    }
}

/// Value stored for an optional question left empty: an empty list for
/// list-shaped questions, empty text otherwise.
pub fn skipped_value(kind: QuestionType) -> AnswerValue {
    match kind.answer_shape() {
        Some(AnswerShape::List) => AnswerValue::List(Vec::new()),
        _ => AnswerValue::Text(String::new()),
    }
}
