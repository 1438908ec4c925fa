use quiz_core::model::{
    AchievementGrant, AchievementId, Answer, AnswerRecord, AttemptId, AttemptResult, ProfileCounters,
    ProfileDelta, Question, QuestionId, QuizConfig, QuizId, UserId,
};
use quiz_core::time::fixed_now;
use storage::repository::{
    AchievementRepository, AttemptRepository, ProfileRepository, QuizRecord, QuizRepository,
};
use storage::{FailPoint, InMemoryRepository, Storage, StorageError};

fn record(quiz: u64, seconds: Option<u32>) -> QuizRecord {
    let config = QuizConfig::from_persisted(QuizId::new(quiz), "Capitals", seconds).unwrap();
    // Stored out of order; the plan sorts by position.
    let questions = vec![
        Question::new(
            QuestionId::new(2),
            "Capital of Italy?",
            vec!["Rome".into(), "Milan".into()],
            0,
            10,
            2,
        )
        .unwrap(),
        Question::new(
            QuestionId::new(1),
            "Capital of France?",
            vec!["Lyon".into(), "Paris".into()],
            1,
            10,
            1,
        )
        .unwrap(),
    ];
    QuizRecord { config, questions }
}

#[tokio::test]
async fn stored_quiz_loads_as_ordered_plan() {
    let repo = InMemoryRepository::new();
    repo.insert_quiz(record(1, None)).unwrap();

    let plan = repo
        .load_quiz(QuizId::new(1))
        .await
        .expect("load")
        .into_plan()
        .expect("playable");
    assert_eq!(plan.budget(), 30);
    let ids: Vec<u64> = plan.questions().iter().map(|q| q.id().value()).collect();
    assert_eq!(ids, vec![1, 2]);

    let missing = repo.load_quiz(QuizId::new(2)).await.unwrap_err();
    assert_eq!(missing, StorageError::NotFound);
}

#[tokio::test]
async fn attempts_and_counters_persist_through_storage_handles() {
    let repo = InMemoryRepository::new();
    repo.insert_quiz(record(1, Some(20))).unwrap();
    let storage = Storage::from_repository(&repo);
    let user = UserId::new(5);

    let plan = storage
        .quizzes
        .load_quiz(QuizId::new(1))
        .await
        .unwrap()
        .into_plan()
        .unwrap();
    let answers = vec![
        AnswerRecord {
            question_id: QuestionId::new(1),
            answer: Answer::Chosen(1),
            time_spent_secs: 4,
            points_awarded: 14,
        },
        AnswerRecord {
            question_id: QuestionId::new(2),
            answer: Answer::Unanswered,
            time_spent_secs: 20,
            points_awarded: 0,
        },
    ];
    let attempt = AttemptResult::from_log(&plan, user, answers, fixed_now(), fixed_now()).unwrap();

    storage.attempts.save_attempt(&attempt).await.unwrap();
    assert_eq!(
        storage.attempts.save_attempt(&attempt).await,
        Err(StorageError::Conflict)
    );
    let fetched = storage.attempts.get_attempt(attempt.id()).await.unwrap();
    assert_eq!(fetched.correct_answers(), 1);
    assert_eq!(fetched.total_time_spent_secs(), 24);
    assert_eq!(repo.list_attempts(user).await.unwrap(), vec![attempt.clone()]);
    assert!(repo.list_attempts(UserId::new(6)).await.unwrap().is_empty());
    assert_eq!(
        repo.get_attempt(AttemptId::new_v4()).await,
        Err(StorageError::NotFound)
    );

    let delta = ProfileDelta::from_attempt(&attempt);
    storage.profiles.apply_delta(user, &delta).await.unwrap();
    storage.profiles.apply_delta(user, &delta).await.unwrap();
    assert_eq!(
        storage.profiles.read_counters(user).await.unwrap(),
        ProfileCounters {
            quizzes: 2,
            score: 28,
            xp: 28
        }
    );
    assert_eq!(
        storage.profiles.read_counters(UserId::new(6)).await.unwrap(),
        ProfileCounters::default()
    );
}

#[tokio::test]
async fn grants_are_unique_per_user_and_achievement() {
    let repo = InMemoryRepository::new();
    repo.insert_achievement(AchievementId::new(3), "First Steps")
        .unwrap();

    let id = repo
        .find_achievement_by_name("First Steps")
        .await
        .unwrap()
        .expect("seeded");
    assert_eq!(repo.find_achievement_by_name("Speedster").await.unwrap(), None);

    let grant = AchievementGrant {
        user_id: UserId::new(1),
        achievement_id: id,
    };
    assert!(!repo.has_achievement(grant.user_id, id).await.unwrap());
    repo.grant(grant).await.unwrap();
    assert!(repo.has_achievement(grant.user_id, id).await.unwrap());
    assert_eq!(repo.grant(grant).await, Err(StorageError::Conflict));
    assert!(!repo.has_achievement(UserId::new(2), id).await.unwrap());
}

#[tokio::test]
async fn injected_failure_hits_only_the_next_call() {
    let repo = InMemoryRepository::new();
    repo.fail_next(FailPoint::ReadCounters).unwrap();

    let first = repo.read_counters(UserId::new(1)).await;
    assert!(matches!(first, Err(StorageError::Unavailable(_))));
    assert!(repo.read_counters(UserId::new(1)).await.is_ok());
    assert_eq!(repo.calls(FailPoint::ReadCounters).unwrap(), 2);
}
