//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::{AttemptId, QuizError};
use storage::StorageError;

use crate::completion::CompletionStep;

/// Errors emitted by `EngineSettings` parsing.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("tick period must be positive")]
    ZeroTickPeriod,
    #[error("first completion achievement name cannot be empty")]
    EmptyAchievementName,
    #[error(transparent)]
    Parse(#[from] serde_json::Error),
}

/// A failed step of the completion pipeline.
///
/// Each variant carries the storage error unchanged, so callers can tell
/// "nothing was saved" apart from "attempt saved, profile not updated".
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CompletionError {
    #[error("failed to save attempt {attempt_id}")]
    SaveAttempt {
        attempt_id: AttemptId,
        #[source]
        source: StorageError,
    },
    #[error("attempt {attempt_id} saved, but reading profile counters failed")]
    ReadCounters {
        attempt_id: AttemptId,
        #[source]
        source: StorageError,
    },
    #[error("attempt {attempt_id} saved, but updating profile counters failed")]
    ApplyDelta {
        attempt_id: AttemptId,
        #[source]
        source: StorageError,
    },
    #[error("profile updated, but looking up achievement {name:?} failed")]
    FindAchievement {
        name: String,
        #[source]
        source: StorageError,
    },
    #[error("profile updated, but checking whether achievement {name:?} is held failed")]
    CheckAchievement {
        name: String,
        #[source]
        source: StorageError,
    },
    #[error("profile updated, but granting achievement {name:?} failed")]
    GrantAchievement {
        name: String,
        #[source]
        source: StorageError,
    },
}

impl CompletionError {
    /// The pipeline step that failed.
    #[must_use]
    pub fn step(&self) -> CompletionStep {
        match self {
            CompletionError::SaveAttempt { .. } => CompletionStep::SaveAttempt,
            CompletionError::ReadCounters { .. } | CompletionError::ApplyDelta { .. } => {
                CompletionStep::UpdateProfile
            }
            CompletionError::FindAchievement { .. }
            | CompletionError::CheckAchievement { .. }
            | CompletionError::GrantAchievement { .. } => CompletionStep::EvaluateAchievements,
        }
    }

    /// The underlying store error, as reported by the store.
    #[must_use]
    pub fn storage_error(&self) -> &StorageError {
        match self {
            CompletionError::SaveAttempt { source, .. }
            | CompletionError::ReadCounters { source, .. }
            | CompletionError::ApplyDelta { source, .. }
            | CompletionError::FindAchievement { source, .. }
            | CompletionError::CheckAchievement { source, .. }
            | CompletionError::GrantAchievement { source, .. } => source,
        }
    }

    /// Whether the attempt record reached the store before the failure.
    #[must_use]
    pub fn attempt_saved(&self) -> bool {
        !matches!(self, CompletionError::SaveAttempt { .. })
    }
}

/// Errors emitted by quiz session services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizSessionError {
    #[error("quiz not found")]
    NotFound,
    #[error("invalid quiz configuration: {0}")]
    InvalidConfiguration(#[from] QuizError),
    #[error("session is not complete")]
    NotComplete,
    #[error(transparent)]
    Storage(StorageError),
    #[error(transparent)]
    Completion(#[from] CompletionError),
}

impl From<StorageError> for QuizSessionError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => QuizSessionError::NotFound,
            other => QuizSessionError::Storage(other),
        }
    }
}
