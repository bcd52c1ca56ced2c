use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::models::question::Question;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Draft,
    Published,
    Closed,
}

/// Whether questions (or a question's choices) keep their authored order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Sequence {
    #[default]
    Fixed,
    Shuffled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackMode {
    #[default]
    None,
    Immediate,
    AfterClose,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Test {
    pub id: i64,
    pub course_id: i64,
    pub lesson_id: i64,
    pub title: String,
    pub status: TestStatus,
    pub opens_at: Option<DateTime<Utc>>,
    pub closes_at: Option<DateTime<Utc>>,
    pub time_limit_sec: Option<i32>,
    /// `None` or `Some(0)` means unlimited.
    pub attempts_allowed: Option<i32>,
    pub pass_mark: Decimal,
    pub question_order: Sequence,
    pub option_order: Sequence,
    pub feedback_mode: FeedbackMode,
    pub questions: Vec<Question>,
    pub created_at: DateTime<Utc>,
}

/// Largest amount a points or score column holds, `NUMERIC(10, 2)`.
pub fn max_points() -> Decimal {
    Decimal::new(99_999_999_99, 2)
}

/// Points, pass marks and scores are kept to cents.
pub const POINTS_SCALE: u32 = 2;

impl Test {
    /// Sum of all question points, answered or not.
    pub fn max_score(&self) -> Result<Decimal, Error> {
        self.questions
            .iter()
            .try_fold(Decimal::ZERO, |total, q| total.checked_add(q.points))
            .ok_or_else(|| Error::Internal(format!("points of test {} overflow", self.id)))
    }

    pub fn attempt_ceiling(&self) -> Option<i32> {
        self.attempts_allowed.filter(|n| *n > 0)
    }

    pub fn question(&self, question_id: i64) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == question_id)
    }
}

macro_rules! text_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($ty::$variant),)+
                    other => Err(Error::Internal(format!(
                        "unknown {} value '{}'",
                        stringify!($ty),
                        other
                    ))),
                }
            }
        }
    };
}

pub(crate) use text_enum;

text_enum!(TestStatus {
    Draft => "draft",
    Published => "published",
    Closed => "closed",
});

text_enum!(Sequence {
    Fixed => "fixed",
    Shuffled => "shuffled",
});

text_enum!(FeedbackMode {
    None => "none",
    Immediate => "immediate",
    AfterClose => "after_close",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_round_trip_through_their_column_text() {
        assert_eq!("after_close".parse::<FeedbackMode>().unwrap(), FeedbackMode::AfterClose);
        assert_eq!(TestStatus::Published.as_str(), "published");
        assert!("archived".parse::<TestStatus>().is_err());
    }

    #[test]
    fn max_score_sums_points_and_reports_overflow() {
        use crate::models::fixtures;

        let test = fixtures::test_with(vec![
            fixtures::short(1, 2, &["a"]),
            fixtures::short(2, 3, &["b"]),
        ]);
        assert_eq!(test.max_score().unwrap(), Decimal::from(5));

        let mut huge = fixtures::test_with(vec![
            fixtures::short(1, 1, &["a"]),
            fixtures::short(2, 1, &["b"]),
        ]);
        for q in &mut huge.questions {
            q.points = Decimal::MAX;
        }
        assert!(matches!(huge.max_score(), Err(Error::Internal(_))));
    }

    #[test]
    fn max_points_matches_the_column_range() {
        assert_eq!(max_points().to_string(), "99999999.99");
    }

    #[test]
    fn zero_ceiling_means_unlimited() {
        let mut test = crate::models::fixtures::test_with(vec![]);
        test.attempts_allowed = Some(0);
        assert_eq!(test.attempt_ceiling(), None);
        test.attempts_allowed = Some(3);
        assert_eq!(test.attempt_ceiling(), Some(3));
    }
}
