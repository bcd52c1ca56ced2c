use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::database::QuestionBank;
use crate::dto::authoring_dto::{NewQuestion, NewTest};
use crate::dto::public_dto::{decimal_to_f64, PublicChoice, PublicQuestion, PublicTest};
use crate::error::{Error, Result};
use crate::models::question::{MatchPairs, Question, QuestionSpec};
use crate::models::test::{max_points, Sequence, Test, POINTS_SCALE};
use crate::services::access_window;
use crate::services::course_access::CourseAccess;

#[derive(Clone)]
pub struct TestService {
    bank: Arc<dyn QuestionBank>,
    access: Arc<dyn CourseAccess>,
}

impl TestService {
    pub fn new(bank: Arc<dyn QuestionBank>, access: Arc<dyn CourseAccess>) -> Self {
        Self { bank, access }
    }

    pub async fn create_test(&self, payload: NewTest) -> Result<Test> {
        payload.validate()?;
        check_authoring_rules(&payload)?;

        let test = self.bank.insert_test(payload).await?;
        tracing::info!(
            test_id = test.id,
            lesson_id = test.lesson_id,
            questions = test.questions.len(),
            "test created"
        );
        Ok(test)
    }

    pub async fn get_test(&self, test_id: i64) -> Result<Test> {
        self.bank
            .get_test(test_id)
            .await?
            .ok_or_else(|| Error::not_found("Test", test_id))
    }

    /// `None` when the test was deleted after attempts referenced it.
    pub async fn find_test(&self, test_id: i64) -> Result<Option<Test>> {
        self.bank.get_test(test_id).await
    }

    pub async fn delete_test(&self, test_id: i64) -> Result<()> {
        if !self.bank.delete_test(test_id).await? {
            return Err(Error::not_found("Test", test_id));
        }
        tracing::info!(test_id, "test deleted");
        Ok(())
    }

    pub async fn lesson_test(&self, lesson_id: i64) -> Result<Option<Test>> {
        self.bank.find_published_for_lesson(lesson_id).await
    }

    pub async fn ensure_enrolled(&self, user_id: Uuid, test: &Test) -> Result<()> {
        if self.access.has_course_access(user_id, test.course_id).await? {
            Ok(())
        } else {
            tracing::info!(%user_id, course_id = test.course_id, "course access refused");
            Err(Error::AccessDenied(format!(
                "no access to course {}",
                test.course_id
            )))
        }
    }

    /// Loads a test the learner may take right now.
    pub async fn open_for_learner(
        &self,
        user_id: Uuid,
        test_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Test> {
        let test = self.get_test(test_id).await?;
        self.authorize(user_id, &test, now).await?;
        Ok(test)
    }

    pub async fn authorize(&self, user_id: Uuid, test: &Test, now: DateTime<Utc>) -> Result<()> {
        self.ensure_enrolled(user_id, test).await?;
        access_window::ensure_open(test, now)
    }
}

fn check_authoring_rules(payload: &NewTest) -> Result<()> {
    check_amount("pass_mark", payload.pass_mark).map_err(Error::InvalidPayload)?;
    if let (Some(opens), Some(closes)) = (payload.opens_at, payload.closes_at) {
        if opens >= closes {
            return Err(Error::InvalidPayload("opens_at must be before closes_at".into()));
        }
    }
    for (idx, question) in payload.questions.iter().enumerate() {
        check_question(question).map_err(|problem| {
            Error::InvalidPayload(format!("question {}: {}", idx + 1, problem))
        })?;
    }

    let total = payload
        .questions
        .iter()
        .try_fold(Decimal::ZERO, |total, q| total.checked_add(q.points))
        .filter(|total| *total <= max_points());
    if total.is_none() {
        return Err(Error::InvalidPayload(format!(
            "points of all questions cannot exceed {}",
            max_points()
        )));
    }
    Ok(())
}

/// Points and pass marks are non-negative cents that fit the score columns.
fn check_amount(field: &str, value: Decimal) -> std::result::Result<(), String> {
    if value < Decimal::ZERO {
        Err(format!("{} cannot be negative", field))
    } else if value > max_points() {
        Err(format!("{} cannot exceed {}", field, max_points()))
    } else if value.normalize().scale() > POINTS_SCALE {
        Err(format!("{} allows at most {} decimal places", field, POINTS_SCALE))
    } else {
        Ok(())
    }
}

fn check_question(question: &NewQuestion) -> std::result::Result<(), String> {
    check_amount("points", question.points)?;

    let total = question.choices.len();
    let correct = question.choices.iter().filter(|c| c.is_correct).count();
    match &question.spec {
        QuestionSpec::Single if total < 2 || correct != 1 => {
            Err("single choice needs at least two choices and exactly one correct".into())
        }
        QuestionSpec::TrueFalse if total != 2 || correct != 1 => {
            Err("true/false needs exactly two choices and one correct".into())
        }
        QuestionSpec::Multiple if total < 2 || correct < 1 => {
            Err("multiple choice needs at least two choices and one correct".into())
        }
        QuestionSpec::Single | QuestionSpec::TrueFalse | QuestionSpec::Multiple => Ok(()),
        _ if total > 0 => Err(format!("{} questions take no choices", question.spec.kind().as_str())),
        QuestionSpec::Short { accepted } if accepted.iter().any(|a| a.trim().is_empty()) => {
            Err("accepted answers cannot be blank".into())
        }
        QuestionSpec::Match {
            left,
            right,
            solution,
        } => check_match(left, right, solution.as_ref()),
        QuestionSpec::Order { items, solution } => check_order(items, solution.as_deref()),
        _ => Ok(()),
    }
}

fn check_match(
    left: &[String],
    right: &[String],
    solution: Option<&MatchPairs>,
) -> std::result::Result<(), String> {
    let left_keys = distinct_keys("left", left)?;
    let right_keys = distinct_keys("right", right)?;
    let Some(solution) = solution else {
        return Ok(());
    };
    for (l, r) in solution {
        if !left_keys.contains(l.as_str()) {
            return Err(format!("solution pairs unknown left item {:?}", l));
        }
        if !right_keys.contains(r.as_str()) {
            return Err(format!("solution pairs {:?} with unknown right item {:?}", l, r));
        }
    }
    Ok(())
}

fn check_order(items: &[String], solution: Option<&[String]>) -> std::result::Result<(), String> {
    let keys = distinct_keys("items", items)?;
    let Some(solution) = solution else {
        return Ok(());
    };
    let ordered: HashSet<&str> = solution.iter().map(String::as_str).collect();
    if solution.len() != items.len() || ordered != keys {
        return Err("solution must list every item exactly once".into());
    }
    Ok(())
}

fn distinct_keys<'a>(
    side: &str,
    keys: &'a [String],
) -> std::result::Result<HashSet<&'a str>, String> {
    if keys.is_empty() {
        return Err(format!("{} cannot be empty", side));
    }
    let mut seen = HashSet::with_capacity(keys.len());
    for key in keys {
        if key.trim().is_empty() || !seen.insert(key.as_str()) {
            return Err(format!("{} must be distinct non-blank keys", side));
        }
    }
    Ok(seen)
}

/// What a learner sees before submitting. Correctness flags, accepted answers and
/// solutions never leave this function.
pub fn public_view<R: Rng + ?Sized>(test: &Test, rng: &mut R) -> Result<PublicTest> {
    let mut questions: Vec<PublicQuestion> = test
        .questions
        .iter()
        .map(|q| public_question(q, test.option_order, rng))
        .collect();
    if test.question_order == Sequence::Shuffled {
        questions.shuffle(rng);
    }

    Ok(PublicTest {
        id: test.id,
        lesson_id: test.lesson_id,
        title: test.title.clone(),
        opens_at: test.opens_at,
        closes_at: test.closes_at,
        time_limit_sec: test.time_limit_sec,
        attempts_allowed: test.attempts_allowed,
        pass_mark: decimal_to_f64(test.pass_mark),
        max_score: decimal_to_f64(test.max_score()?),
        feedback_mode: test.feedback_mode,
        questions,
    })
}

fn public_question<R: Rng + ?Sized>(
    question: &Question,
    option_order: Sequence,
    rng: &mut R,
) -> PublicQuestion {
    let mut choices: Vec<PublicChoice> = question
        .choices
        .iter()
        .map(|c| PublicChoice {
            id: c.id,
            label: c.label.clone(),
        })
        .collect();
    if option_order == Sequence::Shuffled {
        choices.shuffle(rng);
    }

    // Item keys are shuffled so authored order can't hint at the solution.
    let extra = match &question.spec {
        QuestionSpec::Code {
            language: Some(language),
        } => Some(json!({ "language": language })),
        QuestionSpec::Match { left, right, .. } => {
            let mut right = right.clone();
            right.shuffle(rng);
            Some(json!({ "left": left, "right": right }))
        }
        QuestionSpec::Order { items, .. } => {
            let mut items = items.clone();
            items.shuffle(rng);
            Some(json!({ "items": items }))
        }
        _ => None,
    };

    PublicQuestion {
        id: question.id,
        question_type: question.kind(),
        text: question.text.clone(),
        points: decimal_to_f64(question.points),
        required: question.required,
        choices,
        extra,
    }
}
