use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::database::{AttemptStore, QuestionBank};
use crate::dto::authoring_dto::NewTest;
use crate::error::{Error, Result};
use crate::models::answer::AnswerAttempt;
use crate::models::question::{Choice, Question};
use crate::models::test::{Test, TestStatus};
use crate::models::test_attempt::{AttemptState, Finalization, NewAttempt, TestAttempt};

#[derive(Default)]
struct MemoryState {
    next_id: i64,
    tests: BTreeMap<i64, Test>,
    attempts: BTreeMap<i64, TestAttempt>,
    answers: BTreeMap<i64, Vec<AnswerAttempt>>,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Process-local store. Every operation runs under one lock, which gives the same
/// atomicity the Postgres transactions give.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuestionBank for MemoryStore {
    async fn get_test(&self, test_id: i64) -> Result<Option<Test>> {
        Ok(self.state.lock().await.tests.get(&test_id).cloned())
    }

    async fn find_published_for_lesson(&self, lesson_id: i64) -> Result<Option<Test>> {
        let state = self.state.lock().await;
        Ok(state
            .tests
            .values()
            .rev()
            .find(|t| t.lesson_id == lesson_id && t.status == TestStatus::Published)
            .cloned())
    }

    async fn insert_test(&self, test: NewTest) -> Result<Test> {
        let mut state = self.state.lock().await;
        let test_id = state.next_id();

        let mut questions = Vec::with_capacity(test.questions.len());
        for (q_pos, q) in test.questions.into_iter().enumerate() {
            let question_id = state.next_id();
            let mut choices = Vec::with_capacity(q.choices.len());
            for (c_pos, c) in q.choices.into_iter().enumerate() {
                choices.push(Choice {
                    id: state.next_id(),
                    question_id,
                    label: c.label,
                    is_correct: c.is_correct,
                    position: c_pos as i32,
                    feedback: c.feedback,
                });
            }
            questions.push(Question {
                id: question_id,
                test_id,
                position: q_pos as i32,
                text: q.text,
                points: q.points,
                required: q.required,
                spec: q.spec,
                choices,
            });
        }

        let stored = Test {
            id: test_id,
            course_id: test.course_id,
            lesson_id: test.lesson_id,
            title: test.title,
            status: test.status,
            opens_at: test.opens_at,
            closes_at: test.closes_at,
            time_limit_sec: test.time_limit_sec,
            attempts_allowed: test.attempts_allowed,
            pass_mark: test.pass_mark,
            question_order: test.question_order,
            option_order: test.option_order,
            feedback_mode: test.feedback_mode,
            questions,
            created_at: Utc::now(),
        };
        state.tests.insert(test_id, stored.clone());
        Ok(stored)
    }

    async fn delete_test(&self, test_id: i64) -> Result<bool> {
        Ok(self.state.lock().await.tests.remove(&test_id).is_some())
    }
}

#[async_trait]
impl AttemptStore for MemoryStore {
    async fn max_attempt_no(&self, test_id: i64, user_id: Uuid) -> Result<i32> {
        let state = self.state.lock().await;
        Ok(state
            .attempts
            .values()
            .filter(|a| a.test_id == test_id && a.user_id == user_id)
            .map(|a| a.attempt_no)
            .max()
            .unwrap_or(0))
    }

    async fn insert_attempt(&self, attempt: NewAttempt) -> Result<TestAttempt> {
        let mut state = self.state.lock().await;
        let taken = state.attempts.values().any(|a| {
            a.test_id == attempt.test_id
                && a.user_id == attempt.user_id
                && a.attempt_no == attempt.attempt_no
        });
        if taken {
            return Err(Error::Conflict(format!(
                "attempt {} already exists for test {}",
                attempt.attempt_no, attempt.test_id
            )));
        }

        let id = state.next_id();
        let row = TestAttempt {
            id,
            test_id: attempt.test_id,
            user_id: attempt.user_id,
            attempt_no: attempt.attempt_no,
            state: AttemptState::Started,
            started_at: attempt.started_at,
            finished_at: None,
            duration_sec: None,
            score: Default::default(),
            max_score: attempt.max_score,
            pass_mark: attempt.pass_mark,
            timed_out: false,
        };
        state.attempts.insert(id, row.clone());
        Ok(row)
    }

    async fn get_attempt(&self, attempt_id: i64) -> Result<Option<TestAttempt>> {
        Ok(self.state.lock().await.attempts.get(&attempt_id).cloned())
    }

    async fn list_attempts(&self, test_id: i64, user_id: Uuid) -> Result<Vec<TestAttempt>> {
        let state = self.state.lock().await;
        let mut rows: Vec<TestAttempt> = state
            .attempts
            .values()
            .filter(|a| a.test_id == test_id && a.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.attempt_no);
        Ok(rows)
    }

    async fn answers_for(&self, attempt_id: i64) -> Result<Vec<AnswerAttempt>> {
        let state = self.state.lock().await;
        Ok(state.answers.get(&attempt_id).cloned().unwrap_or_default())
    }

    async fn finalize_attempt(
        &self,
        attempt_id: i64,
        outcome: Finalization,
        answers: Vec<AnswerAttempt>,
    ) -> Result<TestAttempt> {
        let mut state = self.state.lock().await;
        let attempt = state
            .attempts
            .get_mut(&attempt_id)
            .ok_or_else(|| Error::not_found("Attempt", attempt_id))?;
        if attempt.state != AttemptState::Started {
            return Err(Error::AlreadySubmitted(attempt_id));
        }

        attempt.state = outcome.state;
        attempt.finished_at = Some(outcome.finished_at);
        attempt.duration_sec = Some(outcome.duration_sec);
        attempt.score = outcome.score;
        attempt.max_score = outcome.max_score;
        attempt.timed_out = outcome.timed_out;
        let updated = attempt.clone();

        state.answers.insert(attempt_id, answers);
        Ok(updated)
    }
}
