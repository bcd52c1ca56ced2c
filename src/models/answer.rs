use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::models::question::{MatchPairs, Question, QuestionKind};

/// One answer as it arrives on the wire: `{question, selected?, text?, data?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmittedAnswer {
    pub question: i64,
    #[serde(default)]
    pub selected: Vec<i64>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub data: Option<JsonValue>,
}

/// A submitted answer checked against its question's type.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerPayload {
    /// `single` / `true_false`: at most one choice.
    Choice(Option<i64>),
    /// `multiple`.
    Choices(BTreeSet<i64>),
    /// `short` / `long` / `code`.
    Text(Option<String>),
    /// `match`.
    Pairs(Option<MatchPairs>),
    /// `order`.
    Sequence(Option<Vec<String>>),
}

impl AnswerPayload {
    pub fn parse(question: &Question, raw: &SubmittedAnswer) -> Result<Self> {
        let kind = question.kind();
        if !kind.uses_choices() && !raw.selected.is_empty() {
            return Err(invalid(question, "does not take choice selections"));
        }
        for id in &raw.selected {
            if question.choice(*id).is_none() {
                return Err(invalid(question, &format!("has no choice {}", id)));
            }
        }

        let payload = match kind {
            QuestionKind::Single | QuestionKind::TrueFalse => {
                let picked: BTreeSet<i64> = raw.selected.iter().copied().collect();
                if picked.len() > 1 {
                    return Err(invalid(question, "accepts a single selection"));
                }
                AnswerPayload::Choice(picked.into_iter().next())
            }
            QuestionKind::Multiple => {
                AnswerPayload::Choices(raw.selected.iter().copied().collect())
            }
            QuestionKind::Short | QuestionKind::Long | QuestionKind::Code => {
                AnswerPayload::Text(raw.text.clone())
            }
            QuestionKind::Match => AnswerPayload::Pairs(structured(question, raw)?),
            QuestionKind::Order => AnswerPayload::Sequence(structured(question, raw)?),
        };
        Ok(payload)
    }

    /// True when the learner left the question blank.
    pub fn is_blank(&self) -> bool {
        match self {
            AnswerPayload::Choice(c) => c.is_none(),
            AnswerPayload::Choices(set) => set.is_empty(),
            AnswerPayload::Text(t) => t.as_deref().map_or(true, |t| t.trim().is_empty()),
            AnswerPayload::Pairs(p) => p.as_ref().map_or(true, |p| p.is_empty()),
            AnswerPayload::Sequence(s) => s.as_ref().map_or(true, |s| s.is_empty()),
        }
    }

    pub fn selected_ids(&self) -> Vec<i64> {
        match self {
            AnswerPayload::Choice(c) => c.iter().copied().collect(),
            AnswerPayload::Choices(set) => set.iter().copied().collect(),
            _ => Vec::new(),
        }
    }

    pub fn text(&self) -> Option<String> {
        match self {
            AnswerPayload::Text(t) => t.clone(),
            _ => None,
        }
    }

    pub fn data(&self) -> Option<JsonValue> {
        match self {
            AnswerPayload::Pairs(Some(pairs)) => serde_json::to_value(pairs).ok(),
            AnswerPayload::Sequence(Some(seq)) => serde_json::to_value(seq).ok(),
            _ => None,
        }
    }
}

fn structured<T: serde::de::DeserializeOwned>(
    question: &Question,
    raw: &SubmittedAnswer,
) -> Result<Option<T>> {
    match &raw.data {
        None | Some(JsonValue::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| invalid(question, &format!("has malformed data: {}", e))),
    }
}

fn invalid(question: &Question, problem: &str) -> Error {
    Error::InvalidPayload(format!(
        "question {} ({}) {}",
        question.id,
        question.kind().as_str(),
        problem
    ))
}

/// The persisted outcome for one question of one attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerAttempt {
    pub attempt_id: i64,
    pub question_id: i64,
    pub selected: Vec<i64>,
    pub text: Option<String>,
    pub data: Option<JsonValue>,
    /// `None` until determined; manual-grade types stay `None`.
    pub is_correct: Option<bool>,
    pub score_awarded: Decimal,
    pub needs_manual: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures;
    use serde_json::json;

    fn raw(question: i64, selected: Vec<i64>, data: Option<JsonValue>) -> SubmittedAnswer {
        SubmittedAnswer {
            question,
            selected,
            text: None,
            data,
        }
    }

    #[test]
    fn single_choice_rejects_two_selections() {
        let q = fixtures::single(10, 2, &[(5, true), (7, false)]);
        let err = AnswerPayload::parse(&q, &raw(10, vec![5, 7], None)).unwrap_err();
        assert!(matches!(err, Error::InvalidPayload(_)));
    }

    #[test]
    fn foreign_choice_ids_are_rejected() {
        let q = fixtures::multiple(11, 4, &[(1, true), (2, true), (3, false)]);
        assert!(AnswerPayload::parse(&q, &raw(11, vec![1, 99], None)).is_err());
    }

    #[test]
    fn match_data_must_be_a_string_map() {
        let q = fixtures::matching(12, 3, None);
        let ok = AnswerPayload::parse(&q, &raw(12, vec![], Some(json!({"a": "1"})))).unwrap();
        assert!(!ok.is_blank());
        let bad = AnswerPayload::parse(&q, &raw(12, vec![], Some(json!(["a", "1"]))));
        assert!(bad.is_err());
    }

    #[test]
    fn text_questions_do_not_take_selections() {
        let q = fixtures::short(13, 1, &["Paris"]);
        assert!(AnswerPayload::parse(&q, &raw(13, vec![1], None)).is_err());
    }

    #[test]
    fn whitespace_text_counts_as_blank() {
        assert!(AnswerPayload::Text(Some("   ".into())).is_blank());
        assert!(!AnswerPayload::Text(Some("x".into())).is_blank());
    }
}
