//! Time-weighted scoring for a single question.

use crate::model::{Answer, Question};

/// Points awarded for `answer` given the seconds left on the question timer.
///
/// A correct answer earns the question's points plus a bonus of up to half
/// of them, proportional to the unused share of `budget`:
///
/// `points + floor(points * 0.5 * remaining / budget)`
///
/// `remaining` is clamped to `[0, budget]`. A zero budget earns no bonus.
/// Wrong answers and [`Answer::Unanswered`] earn nothing.
///
/// ```
/// # use quiz_core::model::{Answer, Question, QuestionId};
/// # use quiz_core::scoring::score;
/// let q = Question::new(QuestionId::new(1), "2 + 2?", vec!["3".into(), "4".into()], 1, 100, 0).unwrap();
/// assert_eq!(score(&q, Answer::Chosen(1), 30, 30), 150);
/// assert_eq!(score(&q, Answer::Chosen(1), 0, 30), 100);
/// assert_eq!(score(&q, Answer::Chosen(0), 30, 30), 0);
/// ```
#[must_use]
pub fn score(question: &Question, answer: Answer, remaining: i64, budget: u32) -> u32 {
    if answer != Answer::Chosen(question.correct_option()) {
        return 0;
    }

    let points = u64::from(question.points());
    let bonus = if budget == 0 {
        0
    } else {
        let budget = u64::from(budget);
        let remaining = u64::try_from(remaining.max(0)).unwrap_or(0).min(budget);
        // points * 0.5 * remaining / budget, floored, in integer arithmetic
        (points * remaining) / (2 * budget)
    };

    u32::try_from(points + bonus).unwrap_or(u32::MAX)
}

/// Highest score a question can yield: answered correctly with the full budget left.
#[must_use]
pub fn max_score(question: &Question) -> u32 {
    question.points().saturating_add(question.points() / 2)
}
