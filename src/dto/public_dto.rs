use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use validator::Validate;

use crate::models::answer::SubmittedAnswer;
use crate::models::question::QuestionKind;
use crate::models::test::{FeedbackMode, Test};
use crate::models::test_attempt::{AttemptState, TestAttempt};
use crate::utils::time::seconds;

pub fn decimal_to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// A test as a learner may see it before submitting: no correctness data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicTest {
    pub id: i64,
    pub lesson_id: i64,
    pub title: String,
    pub opens_at: Option<DateTime<Utc>>,
    pub closes_at: Option<DateTime<Utc>>,
    pub time_limit_sec: Option<i32>,
    pub attempts_allowed: Option<i32>,
    pub pass_mark: f64,
    pub max_score: f64,
    pub feedback_mode: FeedbackMode,
    pub questions: Vec<PublicQuestion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicQuestion {
    pub id: i64,
    #[serde(rename = "type")]
    pub question_type: QuestionKind,
    pub text: String,
    pub points: f64,
    pub required: bool,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub choices: Vec<PublicChoice>,
    /// Item keys for `match` / `order`, language hint for `code`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<JsonValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicChoice {
    pub id: i64,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartAttemptResponse {
    pub attempt_id: i64,
    pub attempt_no: i32,
    pub state: AttemptState,
    pub started_at: DateTime<Utc>,
    pub pass_mark: f64,
    pub time_limit_sec: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl StartAttemptResponse {
    pub fn new(attempt: &TestAttempt, test: &Test) -> Self {
        Self {
            attempt_id: attempt.id,
            attempt_no: attempt.attempt_no,
            state: attempt.state,
            started_at: attempt.started_at,
            pass_mark: decimal_to_f64(attempt.pass_mark),
            time_limit_sec: test.time_limit_sec,
            expires_at: test
                .time_limit_sec
                .map(|limit| attempt.started_at + seconds(limit)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitAttemptRequest {
    #[validate(length(max = 1000, message = "Too many answers in one submission"))]
    #[serde(default)]
    pub answers: Vec<SubmittedAnswer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptResultResponse {
    pub attempt_id: i64,
    pub attempt_no: i32,
    pub state: AttemptState,
    pub score: f64,
    pub max_score: f64,
    pub pass_mark: f64,
    pub passed: Option<bool>,
    pub timed_out: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_sec: Option<i32>,
    pub feedback_visible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<Vec<QuestionFeedback>>,
}

impl AttemptResultResponse {
    pub fn new(attempt: &TestAttempt, breakdown: Option<Vec<QuestionFeedback>>) -> Self {
        Self {
            attempt_id: attempt.id,
            attempt_no: attempt.attempt_no,
            state: attempt.state,
            score: decimal_to_f64(attempt.score),
            max_score: decimal_to_f64(attempt.max_score),
            pass_mark: decimal_to_f64(attempt.pass_mark),
            passed: attempt.passed(),
            timed_out: attempt.timed_out,
            started_at: attempt.started_at,
            finished_at: attempt.finished_at,
            duration_sec: attempt.duration_sec,
            feedback_visible: breakdown.is_some(),
            breakdown,
        }
    }
}

/// Per-question detail revealed once the feedback policy allows it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionFeedback {
    pub question_id: i64,
    #[serde(rename = "type")]
    pub question_type: QuestionKind,
    pub score_awarded: f64,
    pub max_points: f64,
    pub is_correct: Option<bool>,
    pub needs_manual: bool,
    pub selected: Vec<i64>,
    pub text: Option<String>,
    pub data: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_choice_ids: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub choice_feedback: Vec<ChoiceFeedback>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChoiceFeedback {
    pub choice_id: i64,
    pub feedback: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptSummary {
    pub attempt_id: i64,
    pub attempt_no: i32,
    pub state: AttemptState,
    pub score: f64,
    pub max_score: f64,
    pub passed: Option<bool>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<&TestAttempt> for AttemptSummary {
    fn from(attempt: &TestAttempt) -> Self {
        Self {
            attempt_id: attempt.id,
            attempt_no: attempt.attempt_no,
            state: attempt.state,
            score: decimal_to_f64(attempt.score),
            max_score: decimal_to_f64(attempt.max_score),
            passed: attempt.passed(),
            started_at: attempt.started_at,
            finished_at: attempt.finished_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonTestCheck {
    pub has_test: bool,
    pub test_id: Option<i64>,
    pub attempts: usize,
    pub passed: bool,
    pub best_score: Option<f64>,
}
