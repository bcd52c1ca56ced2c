use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::AttemptStore;
use crate::error::{Error, Result};
use crate::models::answer::AnswerAttempt;
use crate::models::test_attempt::{AttemptState, Finalization, NewAttempt, TestAttempt};

#[derive(Clone)]
pub struct PgAttemptStore {
    pool: PgPool,
}

impl PgAttemptStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const ATTEMPT_COLUMNS: &str = r#"
    id, test_id, user_id, attempt_no, state, started_at, finished_at, duration_sec,
    score, max_score, pass_mark, timed_out
"#;

#[async_trait]
impl AttemptStore for PgAttemptStore {
    async fn max_attempt_no(&self, test_id: i64, user_id: Uuid) -> Result<i32> {
        let max: Option<i32> = sqlx::query_scalar(
            "SELECT MAX(attempt_no) FROM test_attempts WHERE test_id = $1 AND user_id = $2",
        )
        .bind(test_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(max.unwrap_or(0))
    }

    async fn insert_attempt(&self, attempt: NewAttempt) -> Result<TestAttempt> {
        // uq_attempt_ordinal turns a lost race into Error::Conflict.
        let row = sqlx::query_as::<_, AttemptRow>(&format!(
            r#"
            INSERT INTO test_attempts (test_id, user_id, attempt_no, state, started_at, max_score, pass_mark)
            VALUES ($1, $2, $3, 'started', $4, $5, $6)
            RETURNING {}
            "#,
            ATTEMPT_COLUMNS
        ))
        .bind(attempt.test_id)
        .bind(attempt.user_id)
        .bind(attempt.attempt_no)
        .bind(attempt.started_at)
        .bind(attempt.max_score)
        .bind(attempt.pass_mark)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn get_attempt(&self, attempt_id: i64) -> Result<Option<TestAttempt>> {
        let row = sqlx::query_as::<_, AttemptRow>(&format!(
            "SELECT {} FROM test_attempts WHERE id = $1",
            ATTEMPT_COLUMNS
        ))
        .bind(attempt_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TestAttempt::try_from).transpose()
    }

    async fn list_attempts(&self, test_id: i64, user_id: Uuid) -> Result<Vec<TestAttempt>> {
        let rows = sqlx::query_as::<_, AttemptRow>(&format!(
            "SELECT {} FROM test_attempts WHERE test_id = $1 AND user_id = $2 ORDER BY attempt_no",
            ATTEMPT_COLUMNS
        ))
        .bind(test_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TestAttempt::try_from).collect()
    }

    async fn answers_for(&self, attempt_id: i64) -> Result<Vec<AnswerAttempt>> {
        let rows = sqlx::query_as::<_, AnswerRow>(
            r#"
            SELECT attempt_id, question_id, selected, text_answer, data, is_correct,
                   score_awarded, needs_manual
            FROM answer_attempts
            WHERE attempt_id = $1
            ORDER BY id
            "#,
        )
        .bind(attempt_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(AnswerAttempt::from).collect())
    }

    async fn finalize_attempt(
        &self,
        attempt_id: i64,
        outcome: Finalization,
        answers: Vec<AnswerAttempt>,
    ) -> Result<TestAttempt> {
        let mut tx = self.pool.begin().await?;

        // Row lock for the whole transaction; a concurrent submit waits here and
        // then observes the finished state.
        let state: Option<String> =
            sqlx::query_scalar("SELECT state FROM test_attempts WHERE id = $1 FOR UPDATE")
                .bind(attempt_id)
                .fetch_optional(&mut *tx)
                .await?;

        match state.as_deref().map(str::parse::<AttemptState>).transpose()? {
            None => return Err(Error::not_found("Attempt", attempt_id)),
            Some(AttemptState::Started) => {}
            Some(_) => return Err(Error::AlreadySubmitted(attempt_id)),
        }

        sqlx::query("DELETE FROM answer_attempts WHERE attempt_id = $1")
            .bind(attempt_id)
            .execute(&mut *tx)
            .await?;

        for answer in &answers {
            sqlx::query(
                r#"
                INSERT INTO answer_attempts (
                    attempt_id, question_id, selected, text_answer, data, is_correct,
                    score_awarded, needs_manual
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(attempt_id)
            .bind(answer.question_id)
            .bind(&answer.selected)
            .bind(&answer.text)
            .bind(&answer.data)
            .bind(answer.is_correct)
            .bind(answer.score_awarded)
            .bind(answer.needs_manual)
            .execute(&mut *tx)
            .await?;
        }

        let row = sqlx::query_as::<_, AttemptRow>(&format!(
            r#"
            UPDATE test_attempts
            SET state = $2, finished_at = $3, duration_sec = $4, score = $5, max_score = $6,
                timed_out = $7
            WHERE id = $1
            RETURNING {}
            "#,
            ATTEMPT_COLUMNS
        ))
        .bind(attempt_id)
        .bind(outcome.state.as_str())
        .bind(outcome.finished_at)
        .bind(outcome.duration_sec)
        .bind(outcome.score)
        .bind(outcome.max_score)
        .bind(outcome.timed_out)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row.try_into()
    }
}

#[derive(FromRow)]
struct AttemptRow {
    id: i64,
    test_id: i64,
    user_id: Uuid,
    attempt_no: i32,
    state: String,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    duration_sec: Option<i32>,
    score: Decimal,
    max_score: Decimal,
    pass_mark: Decimal,
    timed_out: bool,
}

impl TryFrom<AttemptRow> for TestAttempt {
    type Error = Error;

    fn try_from(row: AttemptRow) -> Result<Self> {
        Ok(TestAttempt {
            id: row.id,
            test_id: row.test_id,
            user_id: row.user_id,
            attempt_no: row.attempt_no,
            state: row.state.parse()?,
            started_at: row.started_at,
            finished_at: row.finished_at,
            duration_sec: row.duration_sec,
            score: row.score,
            max_score: row.max_score,
            pass_mark: row.pass_mark,
            timed_out: row.timed_out,
        })
    }
}

#[derive(FromRow)]
struct AnswerRow {
    attempt_id: i64,
    question_id: i64,
    selected: Vec<i64>,
    text_answer: Option<String>,
    data: Option<JsonValue>,
    is_correct: Option<bool>,
    score_awarded: Decimal,
    needs_manual: bool,
}

impl From<AnswerRow> for AnswerAttempt {
    fn from(row: AnswerRow) -> Self {
        AnswerAttempt {
            attempt_id: row.attempt_id,
            question_id: row.question_id,
            selected: row.selected,
            text: row.text_answer,
            data: row.data,
            is_correct: row.is_correct,
            score_awarded: row.score_awarded,
            needs_manual: row.needs_manual,
        }
    }
}
