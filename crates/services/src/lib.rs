#![forbid(unsafe_code)]

pub mod completion;
pub mod error;
pub mod notify;
pub mod settings;
pub mod ticker;
pub mod workflow;

pub use quiz_core::Clock;

pub use completion::{CompletionPipeline, CompletionProgress, CompletionReport, CompletionStep};
pub use error::{CompletionError, QuizSessionError, SettingsError};
pub use notify::{ChannelNotifier, LogNotifier, Notification, NotificationSink};
pub use settings::EngineSettings;
pub use ticker::{IntervalTicker, ManualTicker, Tick, TickHandle, TickSource, TimerCall};
pub use workflow::{ActiveQuiz, Command, DriveOutcome, QuizLoopService, StepResult};
