use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{AttemptId, QuestionId, QuizId, UserId};
use crate::model::quiz::QuizPlan;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AttemptError {
    #[error("answer log has {answers} entries for {questions} questions")]
    LogLengthMismatch { answers: usize, questions: usize },

    #[error("answer {position} is for question {found}, expected {expected}")]
    OutOfOrder {
        position: usize,
        expected: QuestionId,
        found: QuestionId,
    },

    #[error("completed_at is before started_at")]
    InvalidTimeRange,
}

//
// ─── ANSWER ────────────────────────────────────────────────────────────────────
//

/// What the learner submitted for one question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Answer {
    Chosen(usize),
    /// The timer ran out before anything was selected.
    Unanswered,
}

impl Answer {
    /// Integer form used by stores: the option index, or `-1` when unanswered.
    #[must_use]
    pub fn to_wire(self) -> i64 {
        match self {
            Answer::Chosen(index) => i64::try_from(index).unwrap_or(i64::MAX),
            Answer::Unanswered => -1,
        }
    }

    /// Inverse of [`Answer::to_wire`]; any negative value reads as unanswered.
    #[must_use]
    pub fn from_wire(value: i64) -> Self {
        usize::try_from(value).map_or(Answer::Unanswered, Answer::Chosen)
    }
}

impl From<Option<usize>> for Answer {
    fn from(value: Option<usize>) -> Self {
        value.map_or(Answer::Unanswered, Answer::Chosen)
    }
}

/// Finalized answer for one question. Written once, never changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question_id: QuestionId,
    pub answer: Answer,
    pub time_spent_secs: u32,
    pub points_awarded: u32,
}

//
// ─── ATTEMPT ───────────────────────────────────────────────────────────────────
//

/// The finished run of one learner through one quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptResult {
    id: AttemptId,
    quiz_id: QuizId,
    user_id: UserId,
    score: u32,
    total_questions: u32,
    correct_answers: u32,
    total_time_spent_secs: u32,
    answers: Vec<AnswerRecord>,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
}

impl AttemptResult {
    /// Build the attempt from a complete answer log.
    ///
    /// The correct-answer count is re-derived by comparing each answer with
    /// its question rather than trusting awarded points.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError` if the log does not cover every question of
    /// the plan in order, or if the timestamps are reversed.
    pub fn from_log(
        plan: &QuizPlan,
        user_id: UserId,
        answers: Vec<AnswerRecord>,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Result<Self, AttemptError> {
        if completed_at < started_at {
            return Err(AttemptError::InvalidTimeRange);
        }
        if answers.len() != plan.len() {
            return Err(AttemptError::LogLengthMismatch {
                answers: answers.len(),
                questions: plan.len(),
            });
        }

        for (position, (record, question)) in answers.iter().zip(plan.questions()).enumerate() {
            if record.question_id != question.id() {
                return Err(AttemptError::OutOfOrder {
                    position,
                    expected: question.id(),
                    found: record.question_id,
                });
            }
        }

        Ok(Self::assemble(plan, user_id, answers, started_at, completed_at))
    }

    /// Build from a log already known to match `plan` question for question.
    pub(crate) fn assemble(
        plan: &QuizPlan,
        user_id: UserId,
        answers: Vec<AnswerRecord>,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Self {
        let mut score = 0_u32;
        let mut correct = 0_u32;
        let mut time_spent = 0_u32;
        for (record, question) in answers.iter().zip(plan.questions()) {
            if record.answer == Answer::Chosen(question.correct_option()) {
                correct = correct.saturating_add(1);
            }
            score = score.saturating_add(record.points_awarded);
            time_spent = time_spent.saturating_add(record.time_spent_secs);
        }

        Self {
            id: AttemptId::new_v4(),
            quiz_id: plan.config().id(),
            user_id,
            score,
            total_questions: u32::try_from(plan.len()).unwrap_or(u32::MAX),
            correct_answers: correct,
            total_time_spent_secs: time_spent,
            answers,
            started_at,
            completed_at,
        }
    }

    #[must_use]
    pub fn id(&self) -> AttemptId {
        self.id
    }

    #[must_use]
    pub fn quiz_id(&self) -> QuizId {
        self.quiz_id
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn correct_answers(&self) -> u32 {
        self.correct_answers
    }

    #[must_use]
    pub fn total_time_spent_secs(&self) -> u32 {
        self.total_time_spent_secs
    }

    #[must_use]
    pub fn answers(&self) -> &[AnswerRecord] {
        &self.answers
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    /// Share of correct answers as a whole percentage, rounded half up.
    #[must_use]
    pub fn accuracy_percent(&self) -> u32 {
        if self.total_questions == 0 {
            return 0;
        }
        let correct = u64::from(self.correct_answers) * 100;
        let total = u64::from(self.total_questions);
        u32::try_from((correct * 2 + total) / (total * 2)).unwrap_or(100)
    }
}

//
// ─── PROFILE ───────────────────────────────────────────────────────────────────
//

/// Aggregate counters kept on a learner's profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileCounters {
    pub quizzes: u32,
    pub score: u64,
    pub xp: u64,
}

impl ProfileCounters {
    #[must_use]
    pub fn apply(self, delta: &ProfileDelta) -> Self {
        Self {
            quizzes: self.quizzes.saturating_add(delta.quizzes),
            score: self.score.saturating_add(delta.score),
            xp: self.xp.saturating_add(delta.xp),
        }
    }
}

/// Increments applied to `ProfileCounters` after an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileDelta {
    pub quizzes: u32,
    pub score: u64,
    pub xp: u64,
}

impl ProfileDelta {
    /// One more quiz; score and experience both grow by the attempt score.
    #[must_use]
    pub fn from_attempt(attempt: &AttemptResult) -> Self {
        Self {
            quizzes: 1,
            score: u64::from(attempt.score()),
            xp: u64::from(attempt.score()),
        }
    }
}
