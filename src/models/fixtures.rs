//! Builders for test graphs used by the unit tests.

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;

use super::question::{Choice, MatchPairs, Question, QuestionSpec};
use super::test::{FeedbackMode, Sequence, Test, TestStatus};

pub fn test_with(questions: Vec<Question>) -> Test {
    Test {
        id: 1,
        course_id: 100,
        lesson_id: 200,
        title: "Fixture test".to_string(),
        status: TestStatus::Published,
        opens_at: None,
        closes_at: None,
        time_limit_sec: None,
        attempts_allowed: None,
        pass_mark: Decimal::from(1),
        question_order: Sequence::Fixed,
        option_order: Sequence::Fixed,
        feedback_mode: FeedbackMode::Immediate,
        questions,
        created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
    }
}

fn question(id: i64, points: i64, spec: QuestionSpec, choices: &[(i64, bool)]) -> Question {
    Question {
        id,
        test_id: 1,
        position: id as i32,
        text: format!("Question {}", id),
        points: Decimal::from(points),
        required: false,
        spec,
        choices: choices
            .iter()
            .enumerate()
            .map(|(pos, (choice_id, is_correct))| Choice {
                id: *choice_id,
                question_id: id,
                label: format!("Choice {}", choice_id),
                is_correct: *is_correct,
                position: pos as i32,
                feedback: None,
            })
            .collect(),
    }
}

pub fn single(id: i64, points: i64, choices: &[(i64, bool)]) -> Question {
    question(id, points, QuestionSpec::Single, choices)
}

pub fn true_false(id: i64, points: i64, correct_is_true: bool) -> Question {
    let base = id * 10;
    question(
        id,
        points,
        QuestionSpec::TrueFalse,
        &[(base + 1, correct_is_true), (base + 2, !correct_is_true)],
    )
}

pub fn multiple(id: i64, points: i64, choices: &[(i64, bool)]) -> Question {
    question(id, points, QuestionSpec::Multiple, choices)
}

pub fn short(id: i64, points: i64, accepted: &[&str]) -> Question {
    let spec = QuestionSpec::Short {
        accepted: accepted.iter().map(|s| s.to_string()).collect(),
    };
    question(id, points, spec, &[])
}

pub fn long(id: i64, points: i64) -> Question {
    question(id, points, QuestionSpec::Long, &[])
}

pub fn matching(id: i64, points: i64, solution: Option<MatchPairs>) -> Question {
    let spec = QuestionSpec::Match {
        left: vec!["a".into(), "b".into()],
        right: vec!["1".into(), "2".into()],
        solution,
    };
    question(id, points, spec, &[])
}

pub fn ordering(id: i64, points: i64, solution: Option<Vec<String>>) -> Question {
    let spec = QuestionSpec::Order {
        items: vec!["x".into(), "y".into(), "z".into()],
        solution,
    };
    question(id, points, spec, &[])
}
