use async_trait::async_trait;
use quiz_core::model::{
    AchievementGrant, AchievementId, AttemptId, AttemptResult, ProfileCounters, ProfileDelta,
    Question, QuizConfig, QuizError, QuizId, QuizPlan, UserId,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Persisted shape of a quiz: its settings and questions as stored, not yet
/// checked for playability.
#[derive(Debug, Clone)]
pub struct QuizRecord {
    pub config: QuizConfig,
    pub questions: Vec<Question>,
}

impl QuizRecord {
    /// Convert the record into a playable plan.
    ///
    /// # Errors
    ///
    /// Returns `QuizError` if the quiz has no questions or repeats one.
    pub fn into_plan(self) -> Result<QuizPlan, QuizError> {
        QuizPlan::new(self.config, self.questions)
    }
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

/// Loads quiz definitions.
#[async_trait]
pub trait QuizRepository: Send + Sync {
    /// Fetch a quiz with its questions.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the quiz does not exist.
    async fn load_quiz(&self, id: QuizId) -> Result<QuizRecord, StorageError>;
}

/// Write-once store for finished attempts.
#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// Persist a finished attempt.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if an attempt with the same id was
    /// already saved, or other storage errors.
    async fn save_attempt(&self, attempt: &AttemptResult) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no attempt has this id.
    async fn get_attempt(&self, id: AttemptId) -> Result<AttemptResult, StorageError>;

    /// All attempts of a learner in the order they were saved.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    async fn list_attempts(&self, user_id: UserId) -> Result<Vec<AttemptResult>, StorageError>;
}

/// Aggregate counters on learner profiles.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Current counters; a learner with no profile row reads as all zeroes.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    async fn read_counters(&self, user_id: UserId) -> Result<ProfileCounters, StorageError>;

    /// Add `delta` to the stored counters.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the update cannot be written.
    async fn apply_delta(&self, user_id: UserId, delta: &ProfileDelta)
    -> Result<(), StorageError>;
}

/// Achievement definitions and per-learner grants.
#[async_trait]
pub trait AchievementRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    async fn find_achievement_by_name(
        &self,
        name: &str,
    ) -> Result<Option<AchievementId>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    async fn has_achievement(
        &self,
        user_id: UserId,
        achievement_id: AchievementId,
    ) -> Result<bool, StorageError>;

    /// Record a grant.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the learner already holds it.
    async fn grant(&self, grant: AchievementGrant) -> Result<(), StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

/// Store operations that can be made to fail once, for exercising error paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    LoadQuiz,
    SaveAttempt,
    ReadCounters,
    ApplyDelta,
    FindAchievement,
    HasAchievement,
    Grant,
}

#[derive(Default)]
struct MemoryState {
    quizzes: HashMap<QuizId, QuizRecord>,
    attempts: Vec<AttemptResult>,
    counters: HashMap<UserId, ProfileCounters>,
    achievements: HashMap<String, AchievementId>,
    grants: HashSet<AchievementGrant>,
    fail_next: HashSet<FailPoint>,
    calls: HashMap<FailPoint, usize>,
}

impl MemoryState {
    fn enter(&mut self, point: FailPoint) -> Result<(), StorageError> {
        *self.calls.entry(point).or_default() += 1;
        if self.fail_next.remove(&point) {
            return Err(StorageError::Unavailable(format!("injected failure at {point:?}")));
        }
        Ok(())
    }
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Unavailable(e.to_string()))
    }

    /// Seed a quiz definition.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Unavailable` if the store lock is poisoned.
    pub fn insert_quiz(&self, record: QuizRecord) -> Result<(), StorageError> {
        self.lock()?.quizzes.insert(record.config.id(), record);
        Ok(())
    }

    /// Seed an achievement definition.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Unavailable` if the store lock is poisoned.
    pub fn insert_achievement(
        &self,
        id: AchievementId,
        name: impl Into<String>,
    ) -> Result<(), StorageError> {
        self.lock()?.achievements.insert(name.into(), id);
        Ok(())
    }

    /// Overwrite a learner's counters.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Unavailable` if the store lock is poisoned.
    pub fn set_counters(
        &self,
        user_id: UserId,
        counters: ProfileCounters,
    ) -> Result<(), StorageError> {
        self.lock()?.counters.insert(user_id, counters);
        Ok(())
    }

    /// Make the next call at `point` fail with `StorageError::Unavailable`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Unavailable` if the store lock is poisoned.
    pub fn fail_next(&self, point: FailPoint) -> Result<(), StorageError> {
        self.lock()?.fail_next.insert(point);
        Ok(())
    }

    /// How many times the operation at `point` has been invoked, failed calls included.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Unavailable` if the store lock is poisoned.
    pub fn calls(&self, point: FailPoint) -> Result<usize, StorageError> {
        Ok(self.lock()?.calls.get(&point).copied().unwrap_or(0))
    }

    /// Every grant recorded so far.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Unavailable` if the store lock is poisoned.
    pub fn grants(&self) -> Result<Vec<AchievementGrant>, StorageError> {
        Ok(self.lock()?.grants.iter().copied().collect())
    }
}

#[async_trait]
impl QuizRepository for InMemoryRepository {
    async fn load_quiz(&self, id: QuizId) -> Result<QuizRecord, StorageError> {
        let mut guard = self.lock()?;
        guard.enter(FailPoint::LoadQuiz)?;
        guard.quizzes.get(&id).cloned().ok_or(StorageError::NotFound)
    }
}

#[async_trait]
impl AttemptRepository for InMemoryRepository {
    async fn save_attempt(&self, attempt: &AttemptResult) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.enter(FailPoint::SaveAttempt)?;
        if guard.attempts.iter().any(|a| a.id() == attempt.id()) {
            return Err(StorageError::Conflict);
        }
        guard.attempts.push(attempt.clone());
        Ok(())
    }

    async fn get_attempt(&self, id: AttemptId) -> Result<AttemptResult, StorageError> {
        let guard = self.lock()?;
        guard
            .attempts
            .iter()
            .find(|a| a.id() == id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn list_attempts(&self, user_id: UserId) -> Result<Vec<AttemptResult>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .attempts
            .iter()
            .filter(|a| a.user_id() == user_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ProfileRepository for InMemoryRepository {
    async fn read_counters(&self, user_id: UserId) -> Result<ProfileCounters, StorageError> {
        let mut guard = self.lock()?;
        guard.enter(FailPoint::ReadCounters)?;
        Ok(guard.counters.get(&user_id).copied().unwrap_or_default())
    }

    async fn apply_delta(
        &self,
        user_id: UserId,
        delta: &ProfileDelta,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.enter(FailPoint::ApplyDelta)?;
        let counters = guard.counters.entry(user_id).or_default();
        *counters = counters.apply(delta);
        Ok(())
    }
}

#[async_trait]
impl AchievementRepository for InMemoryRepository {
    async fn find_achievement_by_name(
        &self,
        name: &str,
    ) -> Result<Option<AchievementId>, StorageError> {
        let mut guard = self.lock()?;
        guard.enter(FailPoint::FindAchievement)?;
        Ok(guard.achievements.get(name).copied())
    }

    async fn has_achievement(
        &self,
        user_id: UserId,
        achievement_id: AchievementId,
    ) -> Result<bool, StorageError> {
        let mut guard = self.lock()?;
        guard.enter(FailPoint::HasAchievement)?;
        Ok(guard.grants.contains(&AchievementGrant {
            user_id,
            achievement_id,
        }))
    }

    async fn grant(&self, grant: AchievementGrant) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.enter(FailPoint::Grant)?;
        if !guard.grants.insert(grant) {
            return Err(StorageError::Conflict);
        }
        Ok(())
    }
}

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub quizzes: Arc<dyn QuizRepository>,
    pub attempts: Arc<dyn AttemptRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub achievements: Arc<dyn AchievementRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repository(&InMemoryRepository::new())
    }

    /// Expose one in-memory repository through every contract.
    #[must_use]
    pub fn from_repository(repo: &InMemoryRepository) -> Self {
        Self {
            quizzes: Arc::new(repo.clone()),
            attempts: Arc::new(repo.clone()),
            profiles: Arc::new(repo.clone()),
            achievements: Arc::new(repo.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{Answer, AnswerRecord, QuestionId};
    use quiz_core::time::fixed_now;

    fn record(questions: u64) -> QuizRecord {
        let config = QuizConfig::new(QuizId::new(1), "Rivers", 30).unwrap();
        let questions = (1..=questions)
            .map(|id| {
                Question::new(
                    QuestionId::new(id),
                    format!("Q{id}"),
                    vec!["a".into(), "b".into()],
                    0,
                    10,
                    u32::try_from(id).unwrap(),
                )
                .unwrap()
            })
            .collect();
        QuizRecord { config, questions }
    }

    fn attempt(user: u64) -> AttemptResult {
        let plan = record(1).into_plan().unwrap();
        let log = vec![AnswerRecord {
            question_id: QuestionId::new(1),
            answer: Answer::Chosen(0),
            time_spent_secs: 3,
            points_awarded: 14,
        }];
        AttemptResult::from_log(&plan, UserId::new(user), log, fixed_now(), fixed_now()).unwrap()
    }

    #[tokio::test]
    async fn load_missing_quiz_is_not_found() {
        let repo = InMemoryRepository::new();
        let err = repo.load_quiz(QuizId::new(99)).await.unwrap_err();
        assert_eq!(err, StorageError::NotFound);
    }

    #[tokio::test]
    async fn empty_quiz_loads_but_is_not_playable() {
        let repo = InMemoryRepository::new();
        repo.insert_quiz(record(0)).unwrap();
        let loaded = repo.load_quiz(QuizId::new(1)).await.unwrap();
        assert_eq!(loaded.into_plan().unwrap_err(), QuizError::NoQuestions);
    }

    #[tokio::test]
    async fn attempts_are_write_once() {
        let repo = InMemoryRepository::new();
        let attempt = attempt(5);
        repo.save_attempt(&attempt).await.unwrap();
        assert_eq!(
            repo.save_attempt(&attempt).await.unwrap_err(),
            StorageError::Conflict
        );

        let listed = repo.list_attempts(UserId::new(5)).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(repo.get_attempt(attempt.id()).await.unwrap(), attempt);
        assert!(repo.list_attempts(UserId::new(6)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn counters_default_to_zero_and_accumulate() {
        let repo = InMemoryRepository::new();
        let user = UserId::new(1);
        assert_eq!(
            repo.read_counters(user).await.unwrap(),
            ProfileCounters::default()
        );

        let delta = ProfileDelta {
            quizzes: 1,
            score: 40,
            xp: 40,
        };
        repo.apply_delta(user, &delta).await.unwrap();
        repo.apply_delta(user, &delta).await.unwrap();
        let counters = repo.read_counters(user).await.unwrap();
        assert_eq!(counters.quizzes, 2);
        assert_eq!(counters.xp, 80);
    }

    #[tokio::test]
    async fn duplicate_grant_conflicts() {
        let repo = InMemoryRepository::new();
        repo.insert_achievement(AchievementId::new(3), "First Steps")
            .unwrap();
        let id = repo
            .find_achievement_by_name("First Steps")
            .await
            .unwrap()
            .unwrap();
        let grant = AchievementGrant {
            user_id: UserId::new(1),
            achievement_id: id,
        };

        repo.grant(grant).await.unwrap();
        assert!(repo.has_achievement(UserId::new(1), id).await.unwrap());
        assert_eq!(repo.grant(grant).await.unwrap_err(), StorageError::Conflict);
    }

    #[tokio::test]
    async fn injected_failure_fires_once() {
        let repo = InMemoryRepository::new();
        repo.fail_next(FailPoint::ReadCounters).unwrap();

        let err = repo.read_counters(UserId::new(1)).await.unwrap_err();
        assert!(matches!(err, StorageError::Unavailable(_)));
        assert!(repo.read_counters(UserId::new(1)).await.is_ok());
        assert_eq!(repo.calls(FailPoint::ReadCounters).unwrap(), 2);
    }
}
