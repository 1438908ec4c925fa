use serde::{Deserialize, Serialize};

use crate::model::attempt::ProfileCounters;
use crate::model::ids::{AchievementId, UserId};

/// Store name of the achievement granted for the first completed quiz.
pub const FIRST_STEPS: &str = "First Steps";

/// Rules evaluated once an attempt has been recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AchievementRule {
    /// The learner had no completed quizzes before this attempt.
    FirstCompletedQuiz,
}

impl AchievementRule {
    pub const ALL: [AchievementRule; 1] = [AchievementRule::FirstCompletedQuiz];

    /// Name under which the achievement is defined in the store.
    #[must_use]
    pub fn achievement_name(self) -> &'static str {
        match self {
            AchievementRule::FirstCompletedQuiz => FIRST_STEPS,
        }
    }

    /// Short user-facing description used in unlock notifications.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            AchievementRule::FirstCompletedQuiz => "Complete your first quiz",
        }
    }

    /// Whether the rule holds, judged against the counters read *before*
    /// the attempt was applied.
    #[must_use]
    pub fn is_met(self, before: &ProfileCounters) -> bool {
        match self {
            AchievementRule::FirstCompletedQuiz => before.quizzes == 0,
        }
    }
}

/// A single (learner, achievement) award.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AchievementGrant {
    pub user_id: UserId,
    pub achievement_id: AchievementId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_quiz_rule_only_fires_from_zero() {
        let rule = AchievementRule::FirstCompletedQuiz;
        assert!(rule.is_met(&ProfileCounters::default()));
        assert!(!rule.is_met(&ProfileCounters {
            quizzes: 1,
            score: 0,
            xp: 0
        }));
        assert_eq!(rule.achievement_name(), "First Steps");
    }
}
