use std::sync::Arc;
use uuid::Uuid;

use crate::database::AttemptStore;
use crate::dto::public_dto::{decimal_to_f64, LessonTestCheck};
use crate::error::{Error, Result};
use crate::models::test::Test;
use crate::models::test_attempt::{NewAttempt, TestAttempt};
use crate::services::test_service::TestService;
use crate::utils::retry::retry_once_on_conflict;
use crate::utils::time::Clock;

/// Creates attempts and answers questions about a learner's attempt history.
#[derive(Clone)]
pub struct AttemptLedger {
    tests: TestService,
    store: Arc<dyn AttemptStore>,
    clock: Arc<dyn Clock>,
}

impl AttemptLedger {
    pub fn new(tests: TestService, store: Arc<dyn AttemptStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            tests,
            store,
            clock,
        }
    }

    pub async fn start_attempt(&self, user_id: Uuid, test_id: i64) -> Result<(TestAttempt, Test)> {
        let now = self.clock.now();
        let test = self.tests.open_for_learner(user_id, test_id, now).await?;
        let max_score = test.max_score()?;

        let attempt = retry_once_on_conflict("start_attempt", || async {
            let next = self.store.max_attempt_no(test.id, user_id).await? + 1;
            if let Some(allowed) = test.attempt_ceiling() {
                if next > allowed {
                    return Err(Error::AttemptsExhausted { allowed });
                }
            }

            self.store
                .insert_attempt(NewAttempt {
                    test_id: test.id,
                    user_id,
                    attempt_no: next,
                    started_at: now,
                    max_score,
                    pass_mark: test.pass_mark,
                })
                .await
        })
        .await?;

        tracing::info!(
            attempt_id = attempt.id,
            test_id,
            %user_id,
            attempt_no = attempt.attempt_no,
            "attempt started"
        );
        Ok((attempt, test))
    }

    /// The learner's attempts at a test, oldest first.
    pub async fn list_attempts(&self, user_id: Uuid, test_id: i64) -> Result<Vec<TestAttempt>> {
        let test = self.tests.get_test(test_id).await?;
        self.tests.ensure_enrolled(user_id, &test).await?;
        self.store.list_attempts(test_id, user_id).await
    }

    /// Attempts belonging to someone else, or to another test, look exactly like missing ones.
    pub async fn owned_attempt(
        &self,
        user_id: Uuid,
        test_id: i64,
        attempt_id: i64,
    ) -> Result<TestAttempt> {
        match self.store.get_attempt(attempt_id).await? {
            Some(a) if a.user_id == user_id && a.test_id == test_id => Ok(a),
            _ => Err(Error::not_found("Attempt", attempt_id)),
        }
    }

    /// Progress summary for the published test attached to a lesson.
    pub async fn check_lesson(&self, user_id: Uuid, lesson_id: i64) -> Result<LessonTestCheck> {
        let Some(test) = self.tests.lesson_test(lesson_id).await? else {
            return Ok(LessonTestCheck {
                has_test: false,
                test_id: None,
                attempts: 0,
                passed: false,
                best_score: None,
            });
        };
        self.tests.ensure_enrolled(user_id, &test).await?;

        let attempts = self.store.list_attempts(test.id, user_id).await?;
        let best_score = attempts
            .iter()
            .filter(|a| !a.is_open())
            .map(|a| a.score)
            .max();

        Ok(LessonTestCheck {
            has_test: true,
            test_id: Some(test.id),
            attempts: attempts.len(),
            passed: attempts.iter().any(|a| a.passed() == Some(true)),
            best_score: best_score.map(decimal_to_f64),
        })
    }
}
