use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;

use crate::database::QuestionBank;
use crate::dto::authoring_dto::NewTest;
use crate::error::{Error, Result};
use crate::models::question::{Choice, Question, QuestionSpec};
use crate::models::test::Test;

#[derive(Clone)]
pub struct PgQuestionBank {
    pool: PgPool,
}

impl PgQuestionBank {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_graph(&self, row: TestRow) -> Result<Test> {
        let questions = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT id, test_id, position, text, points, required, spec
            FROM questions
            WHERE test_id = $1
            ORDER BY position, id
            "#,
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?;

        let question_ids: Vec<i64> = questions.iter().map(|q| q.id).collect();
        let choices = sqlx::query_as::<_, ChoiceRow>(
            r#"
            SELECT id, question_id, label, is_correct, position, feedback
            FROM choices
            WHERE question_id = ANY($1)
            ORDER BY position, id
            "#,
        )
        .bind(&question_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_question: HashMap<i64, Vec<Choice>> = HashMap::new();
        for c in choices {
            by_question.entry(c.question_id).or_default().push(Choice {
                id: c.id,
                question_id: c.question_id,
                label: c.label,
                is_correct: c.is_correct,
                position: c.position,
                feedback: c.feedback,
            });
        }

        let questions = questions
            .into_iter()
            .map(|q| {
                let spec: QuestionSpec = serde_json::from_value(q.spec).map_err(|e| {
                    Error::Internal(format!("question {} has an unreadable spec: {}", q.id, e))
                })?;
                Ok(Question {
                    id: q.id,
                    test_id: q.test_id,
                    position: q.position,
                    text: q.text,
                    points: q.points,
                    required: q.required,
                    spec,
                    choices: by_question.remove(&q.id).unwrap_or_default(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Test {
            id: row.id,
            course_id: row.course_id,
            lesson_id: row.lesson_id,
            title: row.title,
            status: row.status.parse()?,
            opens_at: row.opens_at,
            closes_at: row.closes_at,
            time_limit_sec: row.time_limit_sec,
            attempts_allowed: row.attempts_allowed,
            pass_mark: row.pass_mark,
            question_order: row.question_order.parse()?,
            option_order: row.option_order.parse()?,
            feedback_mode: row.feedback_mode.parse()?,
            questions,
            created_at: row.created_at,
        })
    }
}

const TEST_COLUMNS: &str = r#"
    id, course_id, lesson_id, title, status, opens_at, closes_at, time_limit_sec,
    attempts_allowed, pass_mark, question_order, option_order, feedback_mode, created_at
"#;

#[async_trait]
impl QuestionBank for PgQuestionBank {
    async fn get_test(&self, test_id: i64) -> Result<Option<Test>> {
        let row = sqlx::query_as::<_, TestRow>(&format!(
            "SELECT {} FROM tests WHERE id = $1",
            TEST_COLUMNS
        ))
        .bind(test_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.load_graph(row).await?)),
            None => Ok(None),
        }
    }

    async fn find_published_for_lesson(&self, lesson_id: i64) -> Result<Option<Test>> {
        let row = sqlx::query_as::<_, TestRow>(&format!(
            "SELECT {} FROM tests WHERE lesson_id = $1 AND status = 'published' ORDER BY id DESC LIMIT 1",
            TEST_COLUMNS
        ))
        .bind(lesson_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.load_graph(row).await?)),
            None => Ok(None),
        }
    }

    async fn insert_test(&self, test: NewTest) -> Result<Test> {
        let mut tx = self.pool.begin().await?;

        let test_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO tests (
                course_id, lesson_id, title, status, opens_at, closes_at, time_limit_sec,
                attempts_allowed, pass_mark, question_order, option_order, feedback_mode
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id
            "#,
        )
        .bind(test.course_id)
        .bind(test.lesson_id)
        .bind(&test.title)
        .bind(test.status.as_str())
        .bind(test.opens_at)
        .bind(test.closes_at)
        .bind(test.time_limit_sec)
        .bind(test.attempts_allowed)
        .bind(test.pass_mark)
        .bind(test.question_order.as_str())
        .bind(test.option_order.as_str())
        .bind(test.feedback_mode.as_str())
        .fetch_one(&mut *tx)
        .await?;

        for (q_pos, question) in test.questions.iter().enumerate() {
            let question_id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO questions (test_id, position, question_type, text, points, required, spec)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING id
                "#,
            )
            .bind(test_id)
            .bind(q_pos as i32)
            .bind(question.spec.kind().as_str())
            .bind(&question.text)
            .bind(question.points)
            .bind(question.required)
            .bind(serde_json::to_value(&question.spec)?)
            .fetch_one(&mut *tx)
            .await?;

            for (c_pos, choice) in question.choices.iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO choices (question_id, label, is_correct, position, feedback)
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                )
                .bind(question_id)
                .bind(&choice.label)
                .bind(choice.is_correct)
                .bind(c_pos as i32)
                .bind(&choice.feedback)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;

        self.get_test(test_id)
            .await?
            .ok_or_else(|| Error::Internal(format!("test {} vanished after insert", test_id)))
    }

    async fn delete_test(&self, test_id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let removed = sqlx::query("DELETE FROM tests WHERE id = $1")
            .bind(test_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok(removed > 0)
    }
}

#[derive(FromRow)]
struct TestRow {
    id: i64,
    course_id: i64,
    lesson_id: i64,
    title: String,
    status: String,
    opens_at: Option<DateTime<Utc>>,
    closes_at: Option<DateTime<Utc>>,
    time_limit_sec: Option<i32>,
    attempts_allowed: Option<i32>,
    pass_mark: Decimal,
    question_order: String,
    option_order: String,
    feedback_mode: String,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct QuestionRow {
    id: i64,
    test_id: i64,
    position: i32,
    text: String,
    points: Decimal,
    required: bool,
    spec: JsonValue,
}

#[derive(FromRow)]
struct ChoiceRow {
    id: i64,
    question_id: i64,
    label: String,
    is_correct: bool,
    position: i32,
    feedback: Option<String>,
}
