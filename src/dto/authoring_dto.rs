use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::question::QuestionSpec;
use crate::models::test::{FeedbackMode, Sequence, TestStatus};

/// A test graph handed over by the authoring side.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct NewTest {
    pub course_id: i64,
    pub lesson_id: i64,
    #[serde(deserialize_with = "trim_string")]
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[serde(default = "default_status")]
    pub status: TestStatus,
    pub opens_at: Option<DateTime<Utc>>,
    pub closes_at: Option<DateTime<Utc>>,
    #[validate(range(min = 1, message = "Time limit must be at least 1 second"))]
    pub time_limit_sec: Option<i32>,
    #[validate(range(min = 0, message = "Attempts allowed cannot be negative"))]
    pub attempts_allowed: Option<i32>,
    #[serde(default)]
    pub pass_mark: Decimal,
    #[serde(default)]
    pub question_order: Sequence,
    #[serde(default)]
    pub option_order: Sequence,
    #[serde(default)]
    pub feedback_mode: FeedbackMode,
    #[validate(nested)]
    #[serde(default)]
    pub questions: Vec<NewQuestion>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct NewQuestion {
    #[validate(length(min = 1))]
    pub text: String,
    #[serde(default = "default_points")]
    pub points: Decimal,
    #[serde(default)]
    pub required: bool,
    #[serde(flatten)]
    pub spec: QuestionSpec,
    #[validate(nested)]
    #[serde(default)]
    pub choices: Vec<NewChoice>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct NewChoice {
    #[validate(length(min = 1, max = 500))]
    pub label: String,
    #[serde(default)]
    pub is_correct: bool,
    pub feedback: Option<String>,
}

fn default_status() -> TestStatus {
    TestStatus::Draft
}

fn default_points() -> Decimal {
    Decimal::ONE
}

fn trim_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(raw.trim().to_string())
}
