use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::model::ids::{QuestionId, QuizId};

/// Per-question budget used when a stored quiz carries none.
pub const DEFAULT_SECONDS_PER_QUESTION: u32 = 30;

/// Minimum number of answer options for a multiple-choice question.
pub const MIN_OPTIONS: usize = 2;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question prompt cannot be empty")]
    EmptyPrompt,

    #[error("question needs at least {MIN_OPTIONS} options, got {count}")]
    TooFewOptions { count: usize },

    #[error("correct option {index} is out of range for {count} options")]
    CorrectOptionOutOfRange { index: usize, count: usize },

    #[error("question must be worth at least one point")]
    ZeroPoints,
}

/// Rejections raised before a session is allowed to start.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("seconds per question must be positive")]
    ZeroTimeBudget,

    #[error("quiz has no questions")]
    NoQuestions,

    #[error("question {0} appears more than once")]
    DuplicateQuestion(QuestionId),
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A multiple-choice question. Immutable once validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    id: QuestionId,
    prompt: String,
    options: Vec<String>,
    correct_option: usize,
    points: u32,
    position: u32,
}

impl Question {
    /// Validate and build a question.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the prompt is blank, there are fewer than two
    /// options, the correct option is out of range, or `points` is zero.
    pub fn new(
        id: QuestionId,
        prompt: impl Into<String>,
        options: Vec<String>,
        correct_option: usize,
        points: u32,
        position: u32,
    ) -> Result<Self, QuestionError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(QuestionError::EmptyPrompt);
        }
        if options.len() < MIN_OPTIONS {
            return Err(QuestionError::TooFewOptions {
                count: options.len(),
            });
        }
        if correct_option >= options.len() {
            return Err(QuestionError::CorrectOptionOutOfRange {
                index: correct_option,
                count: options.len(),
            });
        }
        if points == 0 {
            return Err(QuestionError::ZeroPoints);
        }

        Ok(Self {
            id,
            prompt,
            options,
            correct_option,
            points,
            position,
        })
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn correct_option(&self) -> usize {
        self.correct_option
    }

    #[must_use]
    pub fn points(&self) -> u32 {
        self.points
    }

    #[must_use]
    pub fn position(&self) -> u32 {
        self.position
    }
}

//
// ─── QUIZ CONFIG ───────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizConfig {
    id: QuizId,
    title: String,
    seconds_per_question: u32,
}

impl QuizConfig {
    /// # Errors
    ///
    /// Returns `QuizError::ZeroTimeBudget` if `seconds_per_question` is zero.
    pub fn new(
        id: QuizId,
        title: impl Into<String>,
        seconds_per_question: u32,
    ) -> Result<Self, QuizError> {
        if seconds_per_question == 0 {
            return Err(QuizError::ZeroTimeBudget);
        }
        Ok(Self {
            id,
            title: title.into(),
            seconds_per_question,
        })
    }

    /// Rehydrate a stored quiz, falling back to the default budget when none was saved.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::ZeroTimeBudget` if a stored budget of zero is present.
    pub fn from_persisted(
        id: QuizId,
        title: impl Into<String>,
        seconds_per_question: Option<u32>,
    ) -> Result<Self, QuizError> {
        Self::new(
            id,
            title,
            seconds_per_question.unwrap_or(DEFAULT_SECONDS_PER_QUESTION),
        )
    }

    #[must_use]
    pub fn id(&self) -> QuizId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn seconds_per_question(&self) -> u32 {
        self.seconds_per_question
    }
}

//
// ─── QUIZ PLAN ─────────────────────────────────────────────────────────────────
//

/// A quiz together with its questions in play order.
///
/// Holding a `QuizPlan` means the quiz is playable: it has at least one
/// question, no question repeats, and the time budget is positive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizPlan {
    config: QuizConfig,
    questions: Vec<Question>,
}

impl QuizPlan {
    /// Order questions by their position and check the quiz is playable.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::NoQuestions` for an empty list and
    /// `QuizError::DuplicateQuestion` if an id occurs twice.
    pub fn new(config: QuizConfig, mut questions: Vec<Question>) -> Result<Self, QuizError> {
        if questions.is_empty() {
            return Err(QuizError::NoQuestions);
        }

        let mut seen = HashSet::with_capacity(questions.len());
        for question in &questions {
            if !seen.insert(question.id()) {
                return Err(QuizError::DuplicateQuestion(question.id()));
            }
        }

        questions.sort_by_key(Question::position);
        Ok(Self { config, questions })
    }

    #[must_use]
    pub fn config(&self) -> &QuizConfig {
        &self.config
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Always false for a constructed plan; kept for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    #[must_use]
    pub fn budget(&self) -> u32 {
        self.config.seconds_per_question
    }
}
