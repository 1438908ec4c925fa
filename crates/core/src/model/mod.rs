mod achievement;
mod attempt;
mod ids;
mod quiz;

pub use ids::{AchievementId, AttemptId, ParseIdError, QuestionId, QuizId, UserId};

pub use achievement::{AchievementGrant, AchievementRule, FIRST_STEPS};
pub use attempt::{
    Answer, AnswerRecord, AttemptError, AttemptResult, ProfileCounters, ProfileDelta,
};
pub use quiz::{
    DEFAULT_SECONDS_PER_QUESTION, MIN_OPTIONS, Question, QuestionError, QuizConfig, QuizError,
    QuizPlan,
};
