use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    Single,
    Multiple,
    TrueFalse,
    Short,
    Long,
    Code,
    Match,
    Order,
}

impl QuestionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionKind::Single => "single",
            QuestionKind::Multiple => "multiple",
            QuestionKind::TrueFalse => "true_false",
            QuestionKind::Short => "short",
            QuestionKind::Long => "long",
            QuestionKind::Code => "code",
            QuestionKind::Match => "match",
            QuestionKind::Order => "order",
        }
    }

    pub fn uses_choices(&self) -> bool {
        matches!(
            self,
            QuestionKind::Single | QuestionKind::Multiple | QuestionKind::TrueFalse
        )
    }
}

/// Left item key to right item key.
pub type MatchPairs = BTreeMap<String, String>;

/// Per-type grading data. The `type` tag doubles as the question type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionSpec {
    Single,
    Multiple,
    TrueFalse,
    Short {
        #[serde(default)]
        accepted: Vec<String>,
    },
    Long,
    Code {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
    Match {
        /// Keys offered on each side; shown to learners.
        #[serde(default)]
        left: Vec<String>,
        #[serde(default)]
        right: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        solution: Option<MatchPairs>,
    },
    Order {
        #[serde(default)]
        items: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        solution: Option<Vec<String>>,
    },
}

impl QuestionSpec {
    pub fn kind(&self) -> QuestionKind {
        match self {
            QuestionSpec::Single => QuestionKind::Single,
            QuestionSpec::Multiple => QuestionKind::Multiple,
            QuestionSpec::TrueFalse => QuestionKind::TrueFalse,
            QuestionSpec::Short { .. } => QuestionKind::Short,
            QuestionSpec::Long => QuestionKind::Long,
            QuestionSpec::Code { .. } => QuestionKind::Code,
            QuestionSpec::Match { .. } => QuestionKind::Match,
            QuestionSpec::Order { .. } => QuestionKind::Order,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub test_id: i64,
    pub position: i32,
    pub text: String,
    pub points: Decimal,
    pub required: bool,
    pub spec: QuestionSpec,
    pub choices: Vec<Choice>,
}

impl Question {
    pub fn kind(&self) -> QuestionKind {
        self.spec.kind()
    }

    pub fn correct_choice_ids(&self) -> Vec<i64> {
        self.choices
            .iter()
            .filter(|c| c.is_correct)
            .map(|c| c.id)
            .collect()
    }

    pub fn choice(&self, choice_id: i64) -> Option<&Choice> {
        self.choices.iter().find(|c| c.id == choice_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub id: i64,
    pub question_id: i64,
    pub label: String,
    pub is_correct: bool,
    pub position: i32,
    pub feedback: Option<String>,
}
