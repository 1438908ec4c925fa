use std::sync::Arc;

use quiz_core::model::{
    AchievementGrant, AchievementRule, AttemptId, AttemptResult, ProfileCounters, ProfileDelta,
};
use storage::{AchievementRepository, AttemptRepository, ProfileRepository, Storage, StorageError};

use crate::error::CompletionError;
use crate::notify::{Notification, NotificationSink};
use crate::settings::EngineSettings;

//
// ─── PROGRESS ──────────────────────────────────────────────────────────────────
//

/// Ordered steps run once a session completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CompletionStep {
    SaveAttempt,
    UpdateProfile,
    EvaluateAchievements,
}

/// Which completion steps have already taken effect for one attempt.
///
/// Passing the same progress back into [`CompletionPipeline::run`] after a
/// failure resumes at the failed step instead of repeating earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionProgress {
    attempt_saved: bool,
    counters_before: Option<ProfileCounters>,
    counters_after: Option<ProfileCounters>,
    achievements_evaluated: bool,
    granted: Vec<AchievementGrant>,
}

impl CompletionProgress {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The first step that has not taken effect yet, or `None` when done.
    #[must_use]
    pub fn pending_step(&self) -> Option<CompletionStep> {
        if !self.attempt_saved {
            Some(CompletionStep::SaveAttempt)
        } else if self.counters_after.is_none() {
            Some(CompletionStep::UpdateProfile)
        } else if !self.achievements_evaluated {
            Some(CompletionStep::EvaluateAchievements)
        } else {
            None
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.pending_step().is_none()
    }

    #[must_use]
    pub fn attempt_saved(&self) -> bool {
        self.attempt_saved
    }

    #[must_use]
    pub fn granted(&self) -> &[AchievementGrant] {
        &self.granted
    }
}

/// What the completion steps did for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionReport {
    pub attempt_id: AttemptId,
    pub score: u32,
    pub counters_before: ProfileCounters,
    pub counters_after: ProfileCounters,
    pub granted: Vec<AchievementGrant>,
}

//
// ─── PIPELINE ──────────────────────────────────────────────────────────────────
//

/// Persists a finished attempt, updates the learner's profile, and grants
/// achievements, in that order.
///
/// Steps are not rolled back: a failure leaves earlier steps in place and is
/// reported with the step that failed.
#[derive(Clone)]
pub struct CompletionPipeline {
    attempts: Arc<dyn AttemptRepository>,
    profiles: Arc<dyn ProfileRepository>,
    achievements: Arc<dyn AchievementRepository>,
    notifier: Arc<dyn NotificationSink>,
    first_completion_achievement: String,
}

impl CompletionPipeline {
    #[must_use]
    pub fn new(
        attempts: Arc<dyn AttemptRepository>,
        profiles: Arc<dyn ProfileRepository>,
        achievements: Arc<dyn AchievementRepository>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            attempts,
            profiles,
            achievements,
            notifier,
            first_completion_achievement: EngineSettings::default().first_completion_achievement,
        }
    }

    #[must_use]
    pub fn from_storage(storage: &Storage, notifier: Arc<dyn NotificationSink>) -> Self {
        Self::new(
            Arc::clone(&storage.attempts),
            Arc::clone(&storage.profiles),
            Arc::clone(&storage.achievements),
            notifier,
        )
    }

    #[must_use]
    pub fn with_settings(mut self, settings: &EngineSettings) -> Self {
        self.first_completion_achievement = settings.first_completion_achievement.clone();
        self
    }

    fn achievement_name(&self, rule: AchievementRule) -> &str {
        match rule {
            AchievementRule::FirstCompletedQuiz => &self.first_completion_achievement,
        }
    }

    /// Run every step that `progress` has not recorded as done.
    ///
    /// # Errors
    ///
    /// Returns the `CompletionError` of the first failing step; `progress`
    /// keeps everything that succeeded before it.
    pub async fn run(
        &self,
        attempt: &AttemptResult,
        progress: &mut CompletionProgress,
    ) -> Result<CompletionReport, CompletionError> {
        if !progress.attempt_saved {
            self.save_attempt(attempt).await?;
            progress.attempt_saved = true;
        }

        if progress.counters_after.is_none() {
            let before = match progress.counters_before {
                Some(before) => before,
                None => {
                    let before = self
                        .profiles
                        .read_counters(attempt.user_id())
                        .await
                        .map_err(|source| CompletionError::ReadCounters {
                            attempt_id: attempt.id(),
                            source,
                        })?;
                    progress.counters_before = Some(before);
                    before
                }
            };
            progress.counters_after = Some(self.update_profile(attempt, before).await?);
        }

        if !progress.achievements_evaluated {
            let before = progress.counters_before.unwrap_or_default();
            self.evaluate_achievements(attempt, &before, progress).await?;
            progress.achievements_evaluated = true;
        }

        Ok(CompletionReport {
            attempt_id: attempt.id(),
            score: attempt.score(),
            counters_before: progress.counters_before.unwrap_or_default(),
            counters_after: progress.counters_after.unwrap_or_default(),
            granted: progress.granted.clone(),
        })
    }

    async fn save_attempt(&self, attempt: &AttemptResult) -> Result<(), CompletionError> {
        match self.attempts.save_attempt(attempt).await {
            Ok(()) => {
                tracing::info!(
                    attempt_id = %attempt.id(),
                    user_id = %attempt.user_id(),
                    quiz_id = %attempt.quiz_id(),
                    score = attempt.score(),
                    correct = attempt.correct_answers(),
                    "attempt saved"
                );
                Ok(())
            }
            // An earlier try reached the store even though it reported failure.
            Err(StorageError::Conflict) => {
                tracing::debug!(attempt_id = %attempt.id(), "attempt already saved");
                Ok(())
            }
            Err(source) => {
                tracing::warn!(attempt_id = %attempt.id(), error = %source, "saving attempt failed");
                Err(CompletionError::SaveAttempt {
                    attempt_id: attempt.id(),
                    source,
                })
            }
        }
    }

    async fn update_profile(
        &self,
        attempt: &AttemptResult,
        before: ProfileCounters,
    ) -> Result<ProfileCounters, CompletionError> {
        let delta = ProfileDelta::from_attempt(attempt);
        self.profiles
            .apply_delta(attempt.user_id(), &delta)
            .await
            .map_err(|source| {
                tracing::warn!(attempt_id = %attempt.id(), error = %source, "profile update failed");
                CompletionError::ApplyDelta {
                    attempt_id: attempt.id(),
                    source,
                }
            })?;

        let after = before.apply(&delta);
        tracing::debug!(
            user_id = %attempt.user_id(),
            quizzes = after.quizzes,
            xp = after.xp,
            "profile counters updated"
        );
        Ok(after)
    }

    async fn evaluate_achievements(
        &self,
        attempt: &AttemptResult,
        before: &ProfileCounters,
        progress: &mut CompletionProgress,
    ) -> Result<(), CompletionError> {
        let user_id = attempt.user_id();
        for rule in AchievementRule::ALL {
            if !rule.is_met(before) {
                continue;
            }
            let name = self.achievement_name(rule);
            let find_err = |source| CompletionError::FindAchievement {
                name: name.to_owned(),
                source,
            };

            let Some(achievement_id) = self
                .achievements
                .find_achievement_by_name(name)
                .await
                .map_err(find_err)?
            else {
                tracing::warn!(achievement = name, "achievement not defined, skipping");
                continue;
            };

            if self
                .achievements
                .has_achievement(user_id, achievement_id)
                .await
                .map_err(|source| CompletionError::CheckAchievement {
                    name: name.to_owned(),
                    source,
                })?
            {
                tracing::debug!(%user_id, achievement = name, "achievement already held");
                continue;
            }

            let grant = AchievementGrant {
                user_id,
                achievement_id,
            };
            match self.achievements.grant(grant).await {
                Ok(()) => {}
                Err(StorageError::Conflict) => {
                    tracing::debug!(%user_id, achievement = name, "achievement granted concurrently");
                    continue;
                }
                Err(source) => {
                    return Err(CompletionError::GrantAchievement {
                        name: name.to_owned(),
                        source,
                    });
                }
            }

            tracing::info!(%user_id, achievement = name, "achievement granted");
            progress.granted.push(grant);
            self.notifier
                .notify(Notification::achievement_unlocked(name, rule));
        }
        Ok(())
    }
}
