use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::recall::referenced_questions;
use crate::spec::question::{QuestionSpec, QuestionType};
use crate::spec::{END_DESTINATION, SurveySpec};

/// Structural problem found in a survey document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyIssue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub message: String,
    pub code: String,
}

fn issue(question: Option<&QuestionSpec>, path: String, message: String, code: &str) -> SurveyIssue {
    SurveyIssue {
        question_id: question.map(|question| question.id.clone()),
        path: Some(path),
        message,
        code: code.into(),
    }
}

/// Reports every structural problem in `survey`; empty when the document is
/// playable end to end.
pub fn check_survey(survey: &SurveySpec) -> Vec<SurveyIssue> {
    let mut issues = Vec::new();

    if survey.questions.is_empty() {
        issues.push(issue(
            None,
            "/questions".into(),
            "survey has no questions".into(),
            "empty_survey",
        ));
        return issues;
    }

    let mut seen = BTreeSet::new();
    for (index, question) in survey.questions.iter().enumerate() {
        if !seen.insert(question.id.as_str()) {
            issues.push(issue(
                Some(question),
                format!("/questions/{}/id", index),
                format!("question id '{}' is used more than once", question.id),
                "duplicate_id",
            ));
        }

        match question.kind {
            QuestionType::MultipleChoiceSingle
            | QuestionType::MultipleChoiceMulti
            | QuestionType::PictureSelection
                if question.choices.is_empty() =>
            {
                issues.push(issue(
                    Some(question),
                    format!("/questions/{}/choices", index),
                    "choice question has no choices".into(),
                    "missing_choices",
                ));
            }
            QuestionType::Rating if question.range.unwrap_or(0) == 0 => {
                issues.push(issue(
                    Some(question),
                    format!("/questions/{}/range", index),
                    "rating question needs a positive range".into(),
                    "missing_range",
                ));
            }
            _ => {}
        }

        for (rule_index, rule) in question.logic.iter().enumerate() {
            let path = format!("/questions/{}/logic/{}", index, rule_index);
            if !rule.condition.fits(question.kind) {
                issues.push(issue(
                    Some(question),
                    format!("{}/condition", path),
                    format!(
                        "condition '{}' never matches a {} question",
                        rule.condition.name(),
                        question.kind.as_str()
                    ),
                    "condition_mismatch",
                ));
            }
            if let Some(destination) = &rule.destination
                && destination != END_DESTINATION
                && survey.question(destination).is_none()
            {
                issues.push(issue(
                    Some(question),
                    format!("{}/destination", path),
                    format!("destination '{}' is not a question of this survey", destination),
                    "unknown_destination",
                ));
            }
        }

        for (field, text) in question.localized_fields() {
            let recalled = text
                .variants()
                .into_iter()
                .flat_map(referenced_questions)
                .collect::<BTreeSet<_>>();
            for id in recalled {
                if survey.question(id).is_none() {
                    issues.push(issue(
                        Some(question),
                        format!("/questions/{}/{}", index, field),
                        format!("recall refers to unknown question '{}'", id),
                        "unknown_recall",
                    ));
                }
            }
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{LogicCondition, LogicRule};

    fn survey(questions: Vec<QuestionSpec>) -> SurveySpec {
        SurveySpec {
            id: "s1".into(),
            name: String::new(),
            environment_id: String::new(),
            questions,
            thank_you_card: None,
            redirect_url: None,
            languages: Vec::new(),
        }
    }

    fn codes(issues: &[SurveyIssue]) -> Vec<&str> {
        issues.iter().map(|issue| issue.code.as_str()).collect()
    }

    #[test]
    fn empty_survey_is_reported_alone() {
        assert_eq!(codes(&check_survey(&survey(Vec::new()))), vec!["empty_survey"]);
    }

    #[test]
    fn reports_structural_problems() {
        let mut nps = QuestionSpec::new("q1", QuestionType::Nps, "How likely?");
        nps.logic = vec![
            LogicRule::new(LogicCondition::GreaterThan { value: Some(8.0) }, "q9"),
            LogicRule::new(LogicCondition::Clicked, END_DESTINATION),
        ];
        let choice = QuestionSpec::new("q2", QuestionType::MultipleChoiceSingle, "Pick");
        let rating = QuestionSpec::new("q3", QuestionType::Rating, "Rate");
        let duplicate = QuestionSpec::new("q1", QuestionType::OpenText, "Again");

        let issues = check_survey(&survey(vec![nps, choice, rating, duplicate]));
        assert_eq!(
            codes(&issues),
            vec![
                "unknown_destination",
                "condition_mismatch",
                "missing_choices",
                "missing_range",
                "duplicate_id",
            ]
        );
        assert_eq!(issues[0].path.as_deref(), Some("/questions/0/logic/0/destination"));
        assert_eq!(issues[4].question_id.as_deref(), Some("q1"));
    }

    #[test]
    fn recall_of_unknown_question_is_reported_once() {
        let name = QuestionSpec::new("name", QuestionType::OpenText, "Name?");
        let mut greeting = QuestionSpec::new("greet", QuestionType::OpenText, "");
        greeting.headline = crate::i18n::LocalizedText::localized([
            ("en", "Hi #recall:name/fallback:you#, and #recall:city/fallback:there#"),
            ("de", "Hallo #recall:city/fallback:dort#"),
        ]);

        let issues = check_survey(&survey(vec![name, greeting]));
        assert_eq!(codes(&issues), vec!["unknown_recall"]);
        assert_eq!(issues[0].path.as_deref(), Some("/questions/1/headline"));
        assert_eq!(issues[0].question_id.as_deref(), Some("greet"));
    }
}
