//! One scoring rule per question type.
//!
//! Every rule is a pure function of the question and the learner's answer, so the same
//! submission always grades the same way.

use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::models::answer::{AnswerAttempt, AnswerPayload};
use crate::models::question::{Question, QuestionSpec};
use crate::models::test::POINTS_SCALE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grade {
    pub score_awarded: Decimal,
    /// `None` when a human has to decide.
    pub is_correct: Option<bool>,
    pub needs_manual: bool,
}

impl Grade {
    fn full(points: Decimal) -> Self {
        Self {
            score_awarded: points,
            is_correct: Some(true),
            needs_manual: false,
        }
    }

    fn wrong() -> Self {
        Self {
            score_awarded: Decimal::ZERO,
            is_correct: Some(false),
            needs_manual: false,
        }
    }

    fn manual() -> Self {
        Self {
            score_awarded: Decimal::ZERO,
            is_correct: None,
            needs_manual: true,
        }
    }

    fn binary(points: Decimal, correct: bool) -> Self {
        if correct {
            Self::full(points)
        } else {
            Self::wrong()
        }
    }
}

/// Fails only when the answer shape doesn't belong to the question type or the
/// partial credit overflows; `AnswerPayload::parse` rules out the first.
pub fn grade(question: &Question, answer: &AnswerPayload) -> Result<Grade> {
    let grade = match (&question.spec, answer) {
        (QuestionSpec::Single | QuestionSpec::TrueFalse, AnswerPayload::Choice(picked)) => {
            grade_single_choice(question, *picked)
        }
        (QuestionSpec::Multiple, AnswerPayload::Choices(picked)) => {
            grade_multiple_choice(question, picked)?
        }
        (QuestionSpec::Short { accepted }, AnswerPayload::Text(text)) => {
            grade_short(question.points, accepted, text.as_deref())
        }
        (QuestionSpec::Long | QuestionSpec::Code { .. }, AnswerPayload::Text(_)) => {
            Grade::manual()
        }
        (QuestionSpec::Match { solution, .. }, AnswerPayload::Pairs(given)) => {
            grade_structural(question.points, solution.as_ref(), given.as_ref())
        }
        (QuestionSpec::Order { solution, .. }, AnswerPayload::Sequence(given)) => {
            grade_structural(question.points, solution.as_ref(), given.as_ref())
        }
        (spec, payload) => {
            return Err(Error::Internal(format!(
                "question {} ({}) cannot grade answer {:?}",
                question.id,
                spec.kind().as_str(),
                payload
            )))
        }
    };
    Ok(grade)
}

fn grade_single_choice(question: &Question, picked: Option<i64>) -> Grade {
    let correct = picked
        .and_then(|id| question.choice(id))
        .map(|c| c.is_correct)
        .unwrap_or(false);
    Grade::binary(question.points, correct)
}

/// `points * max(0, hits - misses) / |correct|`, rounded to cents.
fn grade_multiple_choice(question: &Question, picked: &BTreeSet<i64>) -> Result<Grade> {
    let correct: BTreeSet<i64> = question.correct_choice_ids().into_iter().collect();
    if correct.is_empty() {
        return Ok(Grade::binary(question.points, picked.is_empty()));
    }

    let hits = picked.intersection(&correct).count() as i64;
    let misses = picked.difference(&correct).count() as i64;
    let net = (hits - misses).max(0);

    let raw = question
        .points
        .checked_mul(Decimal::from(net))
        .and_then(|p| p.checked_div(Decimal::from(correct.len() as i64)))
        .ok_or_else(|| {
            Error::Internal(format!("partial credit of question {} overflows", question.id))
        })?;
    Ok(Grade {
        score_awarded: raw
            .round_dp_with_strategy(POINTS_SCALE, RoundingStrategy::MidpointAwayFromZero)
            .min(question.points),
        is_correct: Some(*picked == correct),
        needs_manual: false,
    })
}

fn grade_short(points: Decimal, accepted: &[String], text: Option<&str>) -> Grade {
    if accepted.is_empty() {
        return Grade::manual();
    }
    let given = normalize(text.unwrap_or_default());
    let matched = !given.is_empty() && accepted.iter().any(|a| normalize(a) == given);
    Grade::binary(points, matched)
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

fn grade_structural<T: PartialEq>(points: Decimal, solution: Option<&T>, given: Option<&T>) -> Grade {
    match solution {
        None => Grade::manual(),
        Some(expected) => Grade::binary(points, given == Some(expected)),
    }
}

/// Grades one answer and shapes the row that gets persisted for it.
pub fn grade_answer(
    attempt_id: i64,
    question: &Question,
    answer: &AnswerPayload,
) -> Result<AnswerAttempt> {
    let grade = grade(question, answer)?;
    Ok(AnswerAttempt {
        attempt_id,
        question_id: question.id,
        selected: answer.selected_ids(),
        text: answer.text(),
        data: answer.data(),
        is_correct: grade.is_correct,
        score_awarded: grade.score_awarded,
        needs_manual: grade.needs_manual,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures;
    use crate::models::question::MatchPairs;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn picks(ids: &[i64]) -> AnswerPayload {
        AnswerPayload::Choices(ids.iter().copied().collect())
    }

    fn graded(q: &Question, answer: &AnswerPayload) -> Grade {
        grade(q, answer).unwrap()
    }
    #[test]
    fn single_choice_full_or_nothing() {
        let q = fixtures::single(1, 2, &[(5, true), (7, false)]);

        let right = graded(&q, &AnswerPayload::Choice(Some(5)));
        assert_eq!(right.score_awarded, dec("2"));
        assert_eq!(right.is_correct, Some(true));

        let wrong = graded(&q, &AnswerPayload::Choice(Some(7)));
        assert_eq!(wrong.score_awarded, Decimal::ZERO);
        assert_eq!(wrong.is_correct, Some(false));

        let blank = graded(&q, &AnswerPayload::Choice(None));
        assert_eq!(blank, Grade::wrong());
    }

    #[test]
    fn true_false_uses_choice_flags() {
        let q = fixtures::true_false(3, 1, false);
        // fixtures: id*10+1 is "true", id*10+2 is "false"
        assert_eq!(graded(&q, &AnswerPayload::Choice(Some(32))).is_correct, Some(true));
        assert_eq!(graded(&q, &AnswerPayload::Choice(Some(31))).is_correct, Some(false));
    }

    #[test]
    fn multiple_exact_set_gets_full_credit() {
        let q = fixtures::multiple(2, 4, &[(1, true), (2, true), (3, false)]);
        let g = graded(&q, &picks(&[1, 2]));
        assert_eq!(g.score_awarded, dec("4"));
        assert_eq!(g.is_correct, Some(true));
    }

    #[test]
    fn multiple_superset_is_penalised() {
        let q = fixtures::multiple(2, 4, &[(1, true), (2, true), (3, false)]);
        let g = graded(&q, &picks(&[1, 2, 3]));
        assert_eq!(g.score_awarded, dec("2.00"));
        assert_eq!(g.is_correct, Some(false));
    }

    #[test]
    fn multiple_never_goes_negative() {
        let q = fixtures::multiple(2, 4, &[(1, true), (2, true), (3, false), (4, false)]);
        let g = graded(&q, &picks(&[1, 3, 4]));
        assert_eq!(g.score_awarded, Decimal::ZERO);
        let g = graded(&q, &picks(&[3, 4]));
        assert_eq!(g.score_awarded, Decimal::ZERO);
        assert_eq!(g.is_correct, Some(false));
    }

    #[test]
    fn multiple_partial_rounds_to_cents() {
        let q = fixtures::multiple(2, 1, &[(1, true), (2, true), (3, true)]);
        let g = graded(&q, &picks(&[1]));
        assert_eq!(g.score_awarded, dec("0.33"));
        let g = graded(&q, &picks(&[1, 2]));
        assert_eq!(g.score_awarded, dec("0.67"));
    }

    #[test]
    fn short_answer_ignores_case_and_padding() {
        let q = fixtures::short(4, 3, &["Paris", "paris, france"]);
        let g = graded(&q, &AnswerPayload::Text(Some("  PARIS ".into())));
        assert_eq!(g.score_awarded, dec("3"));
        assert_eq!(g.is_correct, Some(true));

        let g = graded(&q, &AnswerPayload::Text(Some("Lyon".into())));
        assert_eq!(g, Grade::wrong());
        let g = graded(&q, &AnswerPayload::Text(None));
        assert_eq!(g, Grade::wrong());
    }

    #[test]
    fn short_answer_without_key_goes_to_manual() {
        let q = fixtures::short(4, 3, &[]);
        let g = graded(&q, &AnswerPayload::Text(Some("anything".into())));
        assert!(g.needs_manual);
        assert_eq!(g.is_correct, None);
        assert_eq!(g.score_awarded, Decimal::ZERO);
    }

    #[test]
    fn long_answers_always_need_a_human() {
        let q = fixtures::long(5, 10);
        let g = graded(&q, &AnswerPayload::Text(Some("essay".into())));
        assert_eq!(g, Grade::manual());
    }

    #[test]
    fn match_requires_exact_pairs() {
        let solution: MatchPairs = [("a", "1"), ("b", "2")]
            .iter()
            .map(|(l, r)| (l.to_string(), r.to_string()))
            .collect();
        let q = fixtures::matching(6, 2, Some(solution.clone()));
        assert_eq!(
            graded(&q, &AnswerPayload::Pairs(Some(solution))).is_correct,
            Some(true)
        );

        let swapped: MatchPairs = [("a", "2"), ("b", "1")]
            .iter()
            .map(|(l, r)| (l.to_string(), r.to_string()))
            .collect();
        assert_eq!(graded(&q, &AnswerPayload::Pairs(Some(swapped))), Grade::wrong());
    }

    #[test]
    fn order_without_solution_needs_manual() {
        let q = fixtures::ordering(7, 2, None);
        let g = graded(&q, &AnswerPayload::Sequence(Some(vec!["x".into()])));
        assert!(g.needs_manual);
    }

    #[test]
    fn order_compares_the_whole_sequence() {
        let q = fixtures::ordering(7, 2, Some(vec!["x".into(), "y".into(), "z".into()]));
        let right = AnswerPayload::Sequence(Some(vec!["x".into(), "y".into(), "z".into()]));
        let wrong = AnswerPayload::Sequence(Some(vec!["y".into(), "x".into(), "z".into()]));
        assert_eq!(graded(&q, &right).score_awarded, dec("2"));
        assert_eq!(graded(&q, &wrong).score_awarded, Decimal::ZERO);
    }

    #[test]
    fn grading_twice_gives_the_same_row() {
        let q = fixtures::multiple(2, 4, &[(1, true), (2, true), (3, false)]);
        let answer = picks(&[2, 3]);
        assert_eq!(
            grade_answer(9, &q, &answer).unwrap(),
            grade_answer(9, &q, &answer).unwrap()
        );
    }

    #[test]
    fn full_partial_credit_never_exceeds_the_points() {
        let mut q = fixtures::multiple(2, 1, &[(1, true), (2, false)]);
        q.points = dec("0.335");
        let g = graded(&q, &picks(&[1]));
        assert_eq!(g.score_awarded, dec("0.335"));
        assert!(g.score_awarded <= q.points);
    }

    #[test]
    fn overflowing_partial_credit_is_an_error() {
        let mut q = fixtures::multiple(2, 1, &[(1, true), (2, true), (3, false)]);
        q.points = Decimal::MAX;
        let err = grade(&q, &picks(&[1, 2])).unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }

    #[test]
    fn answer_of_the_wrong_shape_is_an_error() {
        let q = fixtures::single(1, 2, &[(5, true), (7, false)]);
        let err = grade(&q, &AnswerPayload::Text(Some("5".into()))).unwrap_err();
        assert!(matches!(err, Error::Internal(_)));

        let essay = fixtures::long(5, 10);
        assert!(grade(&essay, &AnswerPayload::Choice(Some(1))).is_err());
    }
}
