use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;
use crate::models::test::text_enum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptState {
    Started,
    /// Finished; some answers may still wait for a human grader.
    Submitted,
    /// Finished and every answer was scored automatically.
    Graded,
}

text_enum!(AttemptState {
    Started => "started",
    Submitted => "submitted",
    Graded => "graded",
});

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestAttempt {
    pub id: i64,
    pub test_id: i64,
    pub user_id: Uuid,
    pub attempt_no: i32,
    pub state: AttemptState,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_sec: Option<i32>,
    pub score: Decimal,
    pub max_score: Decimal,
    /// Copied from the test at start so later edits don't change the outcome.
    pub pass_mark: Decimal,
    pub timed_out: bool,
}

impl TestAttempt {
    pub fn is_open(&self) -> bool {
        self.state == AttemptState::Started
    }

    /// `None` while the attempt is open or waiting for manual review.
    pub fn passed(&self) -> Option<bool> {
        let decided = match self.state {
            AttemptState::Started => false,
            AttemptState::Submitted => self.timed_out,
            AttemptState::Graded => true,
        };
        decided.then(|| self.score >= self.pass_mark)
    }
}

/// Everything the ledger needs to open a new attempt row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAttempt {
    pub test_id: i64,
    pub user_id: Uuid,
    pub attempt_no: i32,
    pub started_at: DateTime<Utc>,
    pub max_score: Decimal,
    pub pass_mark: Decimal,
}

/// Final aggregate written together with the answer batch on submit.
#[derive(Debug, Clone, PartialEq)]
pub struct Finalization {
    pub state: AttemptState,
    pub finished_at: DateTime<Utc>,
    pub duration_sec: i32,
    pub score: Decimal,
    pub max_score: Decimal,
    pub timed_out: bool,
}
