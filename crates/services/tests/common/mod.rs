#![allow(dead_code)]

use std::sync::Arc;

use quiz_core::model::{AchievementId, Question, QuestionId, QuizConfig, QuizId, FIRST_STEPS};
use quiz_core::time::fixed_now;
use services::{ChannelNotifier, Clock, Notification, QuizLoopService};
use storage::{InMemoryRepository, QuizRecord, Storage};
use tokio::sync::mpsc::UnboundedReceiver;

pub const QUIZ: u64 = 1;
pub const FIRST_STEPS_ID: u64 = 100;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Every question has options a-d with "c" (index 2) correct.
pub fn seed_quiz(repo: &InMemoryRepository, questions: u64, budget: u32, points: u32) {
    let config = QuizConfig::new(QuizId::new(QUIZ), "General Knowledge", budget).unwrap();
    let questions = (1..=questions)
        .map(|id| {
            Question::new(
                QuestionId::new(id),
                format!("Question {id}"),
                vec!["a".into(), "b".into(), "c".into(), "d".into()],
                2,
                points,
                u32::try_from(id).unwrap(),
            )
            .unwrap()
        })
        .collect();
    repo.insert_quiz(QuizRecord { config, questions }).unwrap();
    repo.insert_achievement(AchievementId::new(FIRST_STEPS_ID), FIRST_STEPS)
        .unwrap();
}

pub fn service(repo: &InMemoryRepository) -> (QuizLoopService, UnboundedReceiver<Notification>) {
    init_tracing();
    let (notifier, rx) = ChannelNotifier::new();
    let svc = QuizLoopService::from_storage(
        Clock::fixed(fixed_now()),
        &Storage::from_repository(repo),
        Arc::new(notifier),
    );
    (svc, rx)
}
