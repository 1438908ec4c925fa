#![forbid(unsafe_code)]

pub mod repository;

pub use repository::{
    AchievementRepository, AttemptRepository, FailPoint, InMemoryRepository, ProfileRepository,
    QuizRecord, QuizRepository, Storage, StorageError,
};
