use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::database::AttemptStore;
use crate::dto::public_dto::AttemptResultResponse;
use crate::error::{Error, Result};
use crate::models::answer::{AnswerAttempt, AnswerPayload, SubmittedAnswer};
use crate::models::test::Test;
use crate::models::test_attempt::{AttemptState, Finalization, TestAttempt};
use crate::services::attempt_ledger::AttemptLedger;
use crate::services::feedback;
use crate::services::grading::grade_answer;
use crate::services::test_service::TestService;
use crate::utils::retry::retry_once_on_conflict;
use crate::utils::time::{elapsed_seconds, seconds, Clock};

/// Late submissions within this many seconds of the limit still count.
pub const TIMER_GRACE_SEC: i32 = 1;

#[derive(Clone)]
pub struct AttemptGrader {
    tests: TestService,
    ledger: AttemptLedger,
    store: Arc<dyn AttemptStore>,
    clock: Arc<dyn Clock>,
}

impl AttemptGrader {
    pub fn new(
        tests: TestService,
        ledger: AttemptLedger,
        store: Arc<dyn AttemptStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tests,
            ledger,
            store,
            clock,
        }
    }

    pub async fn submit(
        &self,
        user_id: Uuid,
        test_id: i64,
        attempt_id: i64,
        answers: &[SubmittedAnswer],
    ) -> Result<AttemptResultResponse> {
        let test = self.tests.get_test(test_id).await?;
        let attempt = self.ledger.owned_attempt(user_id, test_id, attempt_id).await?;
        self.tests.ensure_enrolled(user_id, &test).await?;
        if !attempt.is_open() {
            return Err(Error::AlreadySubmitted(attempt_id));
        }

        let now = self.clock.now();
        let max_score = test.max_score()?;
        if is_overdue(&test, &attempt, now) {
            let outcome = Finalization {
                state: AttemptState::Submitted,
                finished_at: now,
                duration_sec: elapsed_seconds(attempt.started_at, now),
                score: Decimal::ZERO,
                max_score,
                timed_out: true,
            };
            let finished = self.finalize(attempt_id, outcome, Vec::new()).await?;
            tracing::info!(
                attempt_id,
                test_id,
                %user_id,
                duration_sec = finished.duration_sec,
                "attempt submitted after its time limit"
            );
            return Ok(AttemptResultResponse::new(&finished, None));
        }

        let payloads = validate_answers(&test, answers)?;
        let rows = test
            .questions
            .iter()
            .filter_map(|q| payloads.get(&q.id).map(|p| grade_answer(attempt_id, q, p)))
            .collect::<Result<Vec<AnswerAttempt>>>()?;
        let score = rows
            .iter()
            .try_fold(Decimal::ZERO, |total, r| total.checked_add(r.score_awarded))
            .ok_or_else(|| Error::Internal(format!("score of attempt {} overflows", attempt_id)))?;

        let needs_manual = rows.iter().any(|r| r.needs_manual);
        let outcome = Finalization {
            state: if needs_manual {
                AttemptState::Submitted
            } else {
                AttemptState::Graded
            },
            finished_at: now,
            duration_sec: elapsed_seconds(attempt.started_at, now),
            score,
            max_score,
            timed_out: false,
        };

        let finished = self.finalize(attempt_id, outcome, rows.clone()).await?;
        tracing::info!(
            attempt_id,
            test_id,
            %user_id,
            score = %finished.score,
            max_score = %finished.max_score,
            state = finished.state.as_str(),
            "attempt graded"
        );

        let breakdown = feedback::visible_breakdown(&test, &rows, now);
        Ok(AttemptResultResponse::new(&finished, breakdown))
    }

    /// Re-applies the feedback policy at read time.
    pub async fn result(
        &self,
        user_id: Uuid,
        test_id: i64,
        attempt_id: i64,
    ) -> Result<AttemptResultResponse> {
        let attempt = self.ledger.owned_attempt(user_id, test_id, attempt_id).await?;
        if attempt.is_open() {
            return Ok(AttemptResultResponse::new(&attempt, None));
        }

        let breakdown = match self.tests.find_test(test_id).await? {
            Some(test) => {
                let answers = self.store.answers_for(attempt_id).await?;
                feedback::visible_breakdown(&test, &answers, self.clock.now())
            }
            None => None,
        };
        Ok(AttemptResultResponse::new(&attempt, breakdown))
    }

    async fn finalize(
        &self,
        attempt_id: i64,
        outcome: Finalization,
        rows: Vec<AnswerAttempt>,
    ) -> Result<TestAttempt> {
        retry_once_on_conflict("submit_attempt", || {
            self.store
                .finalize_attempt(attempt_id, outcome.clone(), rows.clone())
        })
        .await
    }
}

fn is_overdue(test: &Test, attempt: &TestAttempt, now: DateTime<Utc>) -> bool {
    match test.time_limit_sec {
        Some(limit) => now - attempt.started_at > seconds(limit.saturating_add(TIMER_GRACE_SEC)),
        None => false,
    }
}

/// Checks a submission against the test and keys it by question id.
///
/// Answers to questions the test doesn't have are dropped.
fn validate_answers(
    test: &Test,
    answers: &[SubmittedAnswer],
) -> Result<HashMap<i64, AnswerPayload>> {
    let mut payloads = HashMap::with_capacity(answers.len());
    for raw in answers {
        let Some(question) = test.question(raw.question) else {
            tracing::debug!(test_id = test.id, question_id = raw.question, "ignoring answer to unknown question");
            continue;
        };
        let payload = AnswerPayload::parse(question, raw)?;
        if payloads.insert(question.id, payload).is_some() {
            return Err(Error::InvalidPayload(format!(
                "question {} answered more than once",
                question.id
            )));
        }
    }

    if let Some(missing) = test
        .questions
        .iter()
        .find(|q| q.required && payloads.get(&q.id).map_or(true, AnswerPayload::is_blank))
    {
        return Err(Error::InvalidPayload(format!(
            "question {} is required",
            missing.id
        )));
    }
    Ok(payloads)
}
