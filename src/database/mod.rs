//! Storage seams for the question bank and the attempt ledger.
//!
//! Postgres is the production backing store. [`memory::MemoryStore`] keeps the same
//! guarantees (ordinal uniqueness, compare-and-swap on submit) inside one process.

pub mod memory;
pub mod pg_attempt_store;
pub mod pg_question_bank;
pub mod pool;

use async_trait::async_trait;
use uuid::Uuid;

use crate::dto::authoring_dto::NewTest;
use crate::error::Result;
use crate::models::answer::AnswerAttempt;
use crate::models::test::Test;
use crate::models::test_attempt::{Finalization, NewAttempt, TestAttempt};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuestionBank: Send + Sync {
    /// Full graph with questions and choices in position order.
    async fn get_test(&self, test_id: i64) -> Result<Option<Test>>;

    async fn find_published_for_lesson(&self, lesson_id: i64) -> Result<Option<Test>>;

    async fn insert_test(&self, test: NewTest) -> Result<Test>;

    /// Removes the test with its questions and choices. Attempts are left alone.
    async fn delete_test(&self, test_id: i64) -> Result<bool>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Highest ordinal the user has for the test, 0 when none.
    async fn max_attempt_no(&self, test_id: i64, user_id: Uuid) -> Result<i32>;

    /// Fails with `Error::Conflict` when the ordinal is already taken.
    async fn insert_attempt(&self, attempt: NewAttempt) -> Result<TestAttempt>;

    async fn get_attempt(&self, attempt_id: i64) -> Result<Option<TestAttempt>>;

    async fn list_attempts(&self, test_id: i64, user_id: Uuid) -> Result<Vec<TestAttempt>>;

    async fn answers_for(&self, attempt_id: i64) -> Result<Vec<AnswerAttempt>>;

    /// Atomically replaces the attempt's answers and writes the aggregate.
    ///
    /// Only succeeds while the attempt is still `started`; otherwise returns
    /// `Error::AlreadySubmitted` and leaves everything untouched.
    async fn finalize_attempt(
        &self,
        attempt_id: i64,
        outcome: Finalization,
        answers: Vec<AnswerAttempt>,
    ) -> Result<TestAttempt>;
}
