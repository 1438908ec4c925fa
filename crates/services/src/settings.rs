use serde::{Deserialize, Serialize};
use std::time::Duration;

use quiz_core::model::FIRST_STEPS;

use crate::error::SettingsError;

const DEFAULT_TICK_PERIOD_MS: u64 = 1_000;

/// Tunables for running quiz sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Wall-clock length of one timer tick.
    pub tick_period_ms: u64,
    /// Store name of the achievement granted on a learner's first completed quiz.
    pub first_completion_achievement: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tick_period_ms: DEFAULT_TICK_PERIOD_MS,
            first_completion_achievement: FIRST_STEPS.to_owned(),
        }
    }
}

impl EngineSettings {
    /// Parse settings from JSON; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::Parse` for malformed JSON and
    /// `SettingsError::ZeroTickPeriod` / `SettingsError::EmptyAchievementName`
    /// for values that cannot run a session.
    pub fn from_json(raw: &str) -> Result<Self, SettingsError> {
        let settings: Self = serde_json::from_str(raw)?;
        settings.validate()
    }

    /// # Errors
    ///
    /// See [`EngineSettings::from_json`].
    pub fn validate(self) -> Result<Self, SettingsError> {
        if self.tick_period_ms == 0 {
            return Err(SettingsError::ZeroTickPeriod);
        }
        if self.first_completion_achievement.trim().is_empty() {
            return Err(SettingsError::EmptyAchievementName);
        }
        Ok(self)
    }

    #[must_use]
    pub fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[must_use]
    pub fn with_first_completion_achievement(mut self, name: impl Into<String>) -> Self {
        self.first_completion_achievement = name.into();
        self
    }

    #[must_use]
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms.max(1))
    }
}
