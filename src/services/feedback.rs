use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::dto::public_dto::{decimal_to_f64, ChoiceFeedback, QuestionFeedback};
use crate::models::answer::AnswerAttempt;
use crate::models::test::{FeedbackMode, Test};

/// Whether the per-question breakdown may be shown at `now`.
pub fn reveals(mode: FeedbackMode, closes_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match mode {
        FeedbackMode::None => false,
        FeedbackMode::Immediate => true,
        // Without a close time there is no moment at which the answers become safe to show.
        FeedbackMode::AfterClose => closes_at.map_or(false, |at| now >= at),
    }
}

/// Breakdown for every answered question, in the test's question order.
pub fn build_breakdown(test: &Test, answers: &[AnswerAttempt]) -> Vec<QuestionFeedback> {
    let by_question: HashMap<i64, &AnswerAttempt> =
        answers.iter().map(|a| (a.question_id, a)).collect();

    test.questions
        .iter()
        .filter_map(|question| {
            let answer = by_question.get(&question.id)?;
            let uses_choices = question.kind().uses_choices();

            let choice_feedback = answer
                .selected
                .iter()
                .filter_map(|id| question.choice(*id))
                .filter_map(|choice| {
                    choice.feedback.as_ref().map(|text| ChoiceFeedback {
                        choice_id: choice.id,
                        feedback: text.clone(),
                    })
                })
                .collect();

            Some(QuestionFeedback {
                question_id: question.id,
                question_type: question.kind(),
                score_awarded: decimal_to_f64(answer.score_awarded),
                max_points: decimal_to_f64(question.points),
                is_correct: answer.is_correct,
                needs_manual: answer.needs_manual,
                selected: answer.selected.clone(),
                text: answer.text.clone(),
                data: answer.data.clone(),
                correct_choice_ids: uses_choices.then(|| question.correct_choice_ids()),
                choice_feedback,
            })
        })
        .collect()
}

/// The breakdown if the test's policy allows it at `now`, otherwise `None`.
pub fn visible_breakdown(
    test: &Test,
    answers: &[AnswerAttempt],
    now: DateTime<Utc>,
) -> Option<Vec<QuestionFeedback>> {
    reveals(test.feedback_mode, test.closes_at, now).then(|| build_breakdown(test, answers))
}
