use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;

use quiz_core::model::{AttemptResult, QuizId, UserId};
use quiz_core::session::{
    IgnoreReason, QuizSession, SessionEffect, SessionEvent, SessionProgress, Transition,
};
use storage::{QuizRepository, Storage};

use crate::Clock;
use crate::completion::{CompletionPipeline, CompletionProgress, CompletionReport};
use crate::error::QuizSessionError;
use crate::notify::NotificationSink;
use crate::settings::EngineSettings;
use crate::ticker::{IntervalTicker, Tick, TickSource};

//
// ─── ACTIVE QUIZ ───────────────────────────────────────────────────────────────
//

/// A running session together with its timer and completion bookkeeping.
pub struct ActiveQuiz {
    session: QuizSession,
    ticker: Box<dyn TickSource>,
    pending: Option<PendingCompletion>,
    report: Option<CompletionReport>,
}

struct PendingCompletion {
    attempt: AttemptResult,
    progress: CompletionProgress,
}

impl ActiveQuiz {
    #[must_use]
    pub fn session(&self) -> &QuizSession {
        &self.session
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        self.session.progress()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.session.is_complete()
    }

    /// The finished attempt, once the last question has been finalized.
    #[must_use]
    pub fn attempt(&self) -> Option<&AttemptResult> {
        self.pending.as_ref().map(|p| &p.attempt)
    }

    /// Set once every completion step has succeeded.
    #[must_use]
    pub fn report(&self) -> Option<&CompletionReport> {
        self.report.as_ref()
    }

    /// Completion steps done so far, if the session has completed.
    #[must_use]
    pub fn completion_progress(&self) -> Option<&CompletionProgress> {
        self.pending.as_ref().map(|p| &p.progress)
    }

    #[must_use]
    pub fn timer_armed(&self) -> bool {
        self.ticker.is_armed()
    }

    /// Wait for the next tick of the question timer.
    pub async fn next_tick(&mut self) -> Tick {
        self.ticker.next_tick().await
    }
}

impl fmt::Debug for ActiveQuiz {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveQuiz")
            .field("session", &self.session)
            .field("timer_armed", &self.ticker.is_armed())
            .field("completed", &self.pending.is_some())
            .field("report", &self.report)
            .finish_non_exhaustive()
    }
}

//
// ─── STEP RESULT ───────────────────────────────────────────────────────────────
//

/// Result of feeding one event to an active quiz.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    /// Why the event was dropped, if it was.
    pub ignored: Option<IgnoreReason>,
    pub progress: SessionProgress,
    pub score: u32,
    /// Present on the step that completed the session.
    pub completion: Option<CompletionReport>,
}

/// User input for [`QuizLoopService::drive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Select(usize),
    Advance,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriveOutcome {
    Completed(CompletionReport),
    /// The command channel closed before the last question was finalized.
    Abandoned,
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Orchestrates session start, event handling, and completion.
#[derive(Clone)]
pub struct QuizLoopService {
    clock: Clock,
    quizzes: Arc<dyn QuizRepository>,
    pipeline: CompletionPipeline,
    settings: EngineSettings,
}

impl QuizLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        quizzes: Arc<dyn QuizRepository>,
        pipeline: CompletionPipeline,
    ) -> Self {
        Self {
            clock,
            quizzes,
            pipeline,
            settings: EngineSettings::default(),
        }
    }

    #[must_use]
    pub fn from_storage(
        clock: Clock,
        storage: &Storage,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self::new(
            clock,
            Arc::clone(&storage.quizzes),
            CompletionPipeline::from_storage(storage, notifier),
        )
    }

    #[must_use]
    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.pipeline = self.pipeline.with_settings(&settings);
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Start a session timed by a real-time ticker.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `QuizSessionError::NotFound` for an unknown quiz and
    /// `QuizSessionError::InvalidConfiguration` if it cannot be played.
    pub async fn start_session(
        &self,
        quiz_id: QuizId,
        user_id: UserId,
    ) -> Result<ActiveQuiz, QuizSessionError> {
        let ticker = IntervalTicker::new(self.settings.tick_period());
        self.start_session_with_ticker(quiz_id, user_id, Box::new(ticker))
            .await
    }

    /// Start a session timed by the given tick source.
    ///
    /// # Errors
    ///
    /// See [`QuizLoopService::start_session`].
    pub async fn start_session_with_ticker(
        &self,
        quiz_id: QuizId,
        user_id: UserId,
        ticker: Box<dyn TickSource>,
    ) -> Result<ActiveQuiz, QuizSessionError> {
        let plan = self.quizzes.load_quiz(quiz_id).await?.into_plan()?;
        let (session, effects) = QuizSession::start(plan, user_id, self.clock.now());
        tracing::info!(
            %quiz_id,
            %user_id,
            questions = session.plan().len(),
            budget_secs = session.plan().budget(),
            "quiz session started"
        );

        let mut active = ActiveQuiz {
            session,
            ticker,
            pending: None,
            report: None,
        };
        apply_timer_effects(&mut active, effects);
        Ok(active)
    }

    /// Tentatively select an option for the active question.
    ///
    /// # Errors
    ///
    /// Never fails in practice; shares the signature of the other steps.
    pub async fn select_answer(
        &self,
        active: &mut ActiveQuiz,
        option: usize,
    ) -> Result<StepResult, QuizSessionError> {
        self.handle(active, SessionEvent::SelectAnswer(option)).await
    }

    /// Finalize the active question and move on, completing the quiz after the last one.
    ///
    /// # Errors
    ///
    /// Returns `QuizSessionError::Completion` if a completion step fails;
    /// the session stays completed and [`QuizLoopService::finalize`] can retry.
    pub async fn advance(&self, active: &mut ActiveQuiz) -> Result<StepResult, QuizSessionError> {
        self.handle(active, SessionEvent::Advance).await
    }

    /// Deliver one timer tick.
    ///
    /// # Errors
    ///
    /// Same as [`QuizLoopService::advance`] when the tick expires the last question.
    pub async fn tick(&self, active: &mut ActiveQuiz) -> Result<StepResult, QuizSessionError> {
        self.handle(active, SessionEvent::Tick).await
    }

    /// Retry the completion steps that have not succeeded yet.
    ///
    /// # Errors
    ///
    /// Returns `QuizSessionError::NotComplete` before the session has
    /// completed, or `QuizSessionError::Completion` if a step fails again.
    pub async fn finalize(
        &self,
        active: &mut ActiveQuiz,
    ) -> Result<CompletionReport, QuizSessionError> {
        if let Some(report) = &active.report {
            return Ok(report.clone());
        }
        let Some(pending) = active.pending.as_mut() else {
            return Err(QuizSessionError::NotComplete);
        };

        let report = self
            .pipeline
            .run(&pending.attempt, &mut pending.progress)
            .await?;
        tracing::info!(
            attempt_id = %report.attempt_id,
            score = report.score,
            granted = report.granted.len(),
            "quiz completion recorded"
        );
        active.report = Some(report.clone());
        Ok(report)
    }

    /// Run the session as a cooperative loop over user commands and timer ticks.
    ///
    /// Events are handled one at a time. Returns once the session has
    /// completed and its completion steps succeeded, or when `commands`
    /// closes first (the timer is then disarmed).
    ///
    /// # Errors
    ///
    /// Returns `QuizSessionError::Completion` if a completion step fails.
    pub async fn drive(
        &self,
        active: &mut ActiveQuiz,
        commands: &mut mpsc::Receiver<Command>,
    ) -> Result<DriveOutcome, QuizSessionError> {
        enum Input {
            Command(Option<Command>),
            Tick,
        }

        loop {
            if active.is_complete() {
                let report = self.finalize(active).await?;
                return Ok(DriveOutcome::Completed(report));
            }

            // A command and a tick ready at once: the command goes first.
            let input = tokio::select! {
                biased;
                command = commands.recv() => Input::Command(command),
                _ = active.ticker.next_tick() => Input::Tick,
            };

            match input {
                Input::Command(Some(Command::Select(option))) => {
                    self.select_answer(active, option).await?;
                }
                Input::Command(Some(Command::Advance)) => {
                    self.advance(active).await?;
                }
                Input::Command(None) => {
                    active.ticker.disarm();
                    tracing::info!(
                        quiz_id = %active.session.plan().config().id(),
                        user_id = %active.session.user_id(),
                        answered = active.progress().answered,
                        "quiz session abandoned"
                    );
                    return Ok(DriveOutcome::Abandoned);
                }
                Input::Tick => {
                    self.tick(active).await?;
                }
            }
        }
    }

    async fn handle(
        &self,
        active: &mut ActiveQuiz,
        event: SessionEvent,
    ) -> Result<StepResult, QuizSessionError> {
        let transition = active.session.handle(event, self.clock.now());

        let ignored = match transition {
            Transition::Ignored(reason) => {
                tracing::debug!(?event, ?reason, "event ignored");
                Some(reason)
            }
            Transition::Applied(effects) => {
                for effect in effects {
                    if let SessionEffect::Completed(attempt) = effect {
                        // The session emits this once; a second would be a bug upstream.
                        if active.pending.is_none() {
                            active.pending = Some(PendingCompletion {
                                attempt,
                                progress: CompletionProgress::new(),
                            });
                        }
                    } else {
                        apply_timer_effects(active, vec![effect]);
                    }
                }
                None
            }
        };

        let completion = if ignored.is_none() && active.pending.is_some() && active.report.is_none()
        {
            Some(self.finalize(active).await?)
        } else {
            None
        };

        Ok(StepResult {
            ignored,
            progress: active.session.progress(),
            score: active.session.state().score(),
            completion,
        })
    }
}

fn apply_timer_effects(active: &mut ActiveQuiz, effects: Vec<SessionEffect>) {
    for effect in effects {
        match effect {
            SessionEffect::ArmTimer { seconds } => active.ticker.arm(seconds),
            SessionEffect::DisarmTimer => active.ticker.disarm(),
            SessionEffect::Completed(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::LogNotifier;
    use crate::ticker::{ManualTicker, TimerCall};
    use quiz_core::model::{Question, QuestionId, QuizConfig};
    use quiz_core::time::fixed_now;
    use storage::{InMemoryRepository, QuizRecord};

    fn service(repo: &InMemoryRepository) -> QuizLoopService {
        QuizLoopService::from_storage(
            Clock::fixed(fixed_now()),
            &Storage::from_repository(repo),
            Arc::new(LogNotifier),
        )
    }

    fn seed(repo: &InMemoryRepository, questions: u64) {
        let config = QuizConfig::new(QuizId::new(1), "Quiz", 10).unwrap();
        let questions = (1..=questions)
            .map(|id| {
                Question::new(
                    QuestionId::new(id),
                    format!("Q{id}"),
                    vec!["a".into(), "b".into()],
                    1,
                    10,
                    u32::try_from(id).unwrap(),
                )
                .unwrap()
            })
            .collect();
        repo.insert_quiz(QuizRecord { config, questions }).unwrap();
    }

    #[tokio::test]
    async fn unknown_quiz_is_not_found() {
        let repo = InMemoryRepository::new();
        let (ticker, _handle) = ManualTicker::new();
        let err = service(&repo)
            .start_session_with_ticker(QuizId::new(5), UserId::new(1), Box::new(ticker))
            .await
            .unwrap_err();
        assert!(matches!(err, QuizSessionError::NotFound));
    }

    #[tokio::test]
    async fn empty_quiz_is_rejected_before_start() {
        let repo = InMemoryRepository::new();
        seed(&repo, 0);
        let (ticker, handle) = ManualTicker::new();
        let err = service(&repo)
            .start_session_with_ticker(QuizId::new(1), UserId::new(1), Box::new(ticker))
            .await
            .unwrap_err();
        assert!(matches!(err, QuizSessionError::InvalidConfiguration(_)));
        assert!(handle.calls().is_empty());
    }

    #[tokio::test]
    async fn timer_rearms_per_question_and_disarms_on_completion() {
        let repo = InMemoryRepository::new();
        seed(&repo, 2);
        let svc = service(&repo);
        let (ticker, handle) = ManualTicker::new();
        let mut active = svc
            .start_session_with_ticker(QuizId::new(1), UserId::new(1), Box::new(ticker))
            .await
            .unwrap();
        assert!(active.timer_armed());

        svc.advance(&mut active).await.unwrap();
        let step = svc.advance(&mut active).await.unwrap();
        assert!(step.completion.is_some());
        assert!(!active.timer_armed());
        assert_eq!(
            handle.calls(),
            vec![TimerCall::Arm(10), TimerCall::Arm(10), TimerCall::Disarm]
        );
    }

    #[tokio::test]
    async fn finalize_before_completion_is_an_error() {
        let repo = InMemoryRepository::new();
        seed(&repo, 1);
        let svc = service(&repo);
        let (ticker, _handle) = ManualTicker::new();
        let mut active = svc
            .start_session_with_ticker(QuizId::new(1), UserId::new(1), Box::new(ticker))
            .await
            .unwrap();
        assert!(matches!(
            svc.finalize(&mut active).await,
            Err(QuizSessionError::NotComplete)
        ));
    }
}
