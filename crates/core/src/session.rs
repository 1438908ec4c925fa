//! Per-attempt state machine for a timed quiz.
//!
//! A session is either awaiting an answer for question `i` or completed.
//! Every input (answer selection, explicit advance, timer tick) goes through
//! [`QuizSession::handle`], which computes the next [`SessionState`] and the
//! effects the caller must carry out: re-arming or disarming the timer, and
//! running the completion steps once with the finished [`AttemptResult`].

use chrono::{DateTime, Utc};
use std::fmt;

use crate::model::{Answer, AnswerRecord, AttemptResult, Question, QuizPlan, UserId};
use crate::scoring;

//
// ─── EVENTS & EFFECTS ──────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Tentatively pick an option; can be changed until the question is finalized.
    SelectAnswer(usize),
    /// Finalize the active question with the current selection.
    Advance,
    /// One second elapsed on the question timer.
    Tick,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEffect {
    /// Start a fresh countdown of `seconds` ticks, replacing any running one.
    ArmTimer { seconds: u32 },
    /// Stop the countdown; no further ticks may be delivered.
    DisarmTimer,
    /// The last question was finalized. Emitted exactly once per session.
    Completed(AttemptResult),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    AlreadyCompleted,
    OptionOutOfRange { index: usize, options: usize },
}

/// Outcome of feeding one event to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum Transition {
    Applied(Vec<SessionEffect>),
    /// The event had no effect on the session.
    Ignored(IgnoreReason),
}

impl Transition {
    #[must_use]
    pub fn effects(&self) -> &[SessionEffect] {
        match self {
            Transition::Applied(effects) => effects,
            Transition::Ignored(_) => &[],
        }
    }

    #[must_use]
    pub fn into_effects(self) -> Vec<SessionEffect> {
        match self {
            Transition::Applied(effects) => effects,
            Transition::Ignored(_) => Vec::new(),
        }
    }

    #[must_use]
    pub fn is_ignored(&self) -> bool {
        matches!(self, Transition::Ignored(_))
    }

    /// The finished attempt, if this transition completed the session.
    #[must_use]
    pub fn completed(&self) -> Option<&AttemptResult> {
        self.effects().iter().find_map(|effect| match effect {
            SessionEffect::Completed(attempt) => Some(attempt),
            _ => None,
        })
    }
}

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingAnswer(usize),
    Completed,
}

/// Plain data describing where a session stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    current: usize,
    remaining_secs: u32,
    score: u32,
    selection: Option<usize>,
    answers: Vec<AnswerRecord>,
    completed_at: Option<DateTime<Utc>>,
}

impl SessionState {
    fn initial(budget: u32, questions: usize) -> Self {
        Self {
            current: 0,
            remaining_secs: budget,
            score: 0,
            selection: None,
            answers: Vec::with_capacity(questions),
            completed_at: None,
        }
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        if self.completed_at.is_some() {
            Phase::Completed
        } else {
            Phase::AwaitingAnswer(self.current)
        }
    }

    /// Index of the active question; equals the question count once completed.
    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn selection(&self) -> Option<usize> {
        self.selection
    }

    #[must_use]
    pub fn answers(&self) -> &[AnswerRecord] {
        &self.answers
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionProgress {
    pub total: usize,
    pub answered: usize,
    pub remaining: usize,
    pub is_complete: bool,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One learner's run through one quiz.
pub struct QuizSession {
    plan: QuizPlan,
    user_id: UserId,
    started_at: DateTime<Utc>,
    state: SessionState,
}

impl QuizSession {
    /// Begin at the first question with a full timer.
    ///
    /// A `QuizPlan` always holds at least one question with a positive
    /// budget, so starting cannot fail. The returned effects arm the timer
    /// for the first question.
    pub fn start(
        plan: QuizPlan,
        user_id: UserId,
        started_at: DateTime<Utc>,
    ) -> (Self, Vec<SessionEffect>) {
        let budget = plan.budget();
        let state = SessionState::initial(budget, plan.len());
        let session = Self {
            plan,
            user_id,
            started_at,
            state,
        };
        (session, vec![SessionEffect::ArmTimer { seconds: budget }])
    }

    #[must_use]
    pub fn plan(&self) -> &QuizPlan {
        &self.plan
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.state.is_complete()
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        match self.state.phase() {
            Phase::AwaitingAnswer(index) => self.plan.question(index),
            Phase::Completed => None,
        }
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let total = self.plan.len();
        let answered = self.state.answers.len();
        SessionProgress {
            total,
            answered,
            remaining: total.saturating_sub(answered),
            is_complete: self.state.is_complete(),
        }
    }

    /// Apply one event. `at` is the wall-clock time used to stamp completion.
    pub fn handle(&mut self, event: SessionEvent, at: DateTime<Utc>) -> Transition {
        let (next, transition) = self.next_state(event, at);
        if let Some(next) = next {
            self.state = next;
        }
        transition
    }

    /// Compute the successor state without touching `self`.
    ///
    /// Returns `None` for the state when the event is ignored.
    #[must_use]
    pub fn next_state(
        &self,
        event: SessionEvent,
        at: DateTime<Utc>,
    ) -> (Option<SessionState>, Transition) {
        let Phase::AwaitingAnswer(index) = self.state.phase() else {
            return (None, Transition::Ignored(IgnoreReason::AlreadyCompleted));
        };

        match event {
            SessionEvent::SelectAnswer(option) => self.select(index, option),
            SessionEvent::Advance => {
                let (next, effects) = self.finalize(index, self.state.clone(), at);
                (Some(next), Transition::Applied(effects))
            }
            SessionEvent::Tick => {
                let mut next = self.state.clone();
                next.remaining_secs = next.remaining_secs.saturating_sub(1);
                if next.remaining_secs > 0 {
                    return (Some(next), Transition::Applied(Vec::new()));
                }
                // Out of time: finalize with whatever is selected.
                let (next, effects) = self.finalize(index, next, at);
                (Some(next), Transition::Applied(effects))
            }
        }
    }

    fn select(&self, index: usize, option: usize) -> (Option<SessionState>, Transition) {
        let options = self.plan.question(index).map_or(0, |q| q.options().len());
        if option >= options {
            return (
                None,
                Transition::Ignored(IgnoreReason::OptionOutOfRange {
                    index: option,
                    options,
                }),
            );
        }
        let mut next = self.state.clone();
        next.selection = Some(option);
        (Some(next), Transition::Applied(Vec::new()))
    }

    fn finalize(
        &self,
        index: usize,
        mut next: SessionState,
        at: DateTime<Utc>,
    ) -> (SessionState, Vec<SessionEffect>) {
        let budget = self.plan.budget();
        let answer = Answer::from(next.selection);

        let (question_id, points) = match self.plan.question(index) {
            Some(question) => (
                question.id(),
                scoring::score(question, answer, i64::from(next.remaining_secs), budget),
            ),
            // The phase index never runs past the plan; nothing to finalize.
            None => return (next, Vec::new()),
        };

        next.answers.push(AnswerRecord {
            question_id,
            answer,
            time_spent_secs: budget.saturating_sub(next.remaining_secs),
            points_awarded: points,
        });
        next.score = next.score.saturating_add(points);
        next.selection = None;
        next.current = index + 1;

        if next.current < self.plan.len() {
            next.remaining_secs = budget;
            return (next, vec![SessionEffect::ArmTimer { seconds: budget }]);
        }

        let completed_at = at.max(self.started_at);
        next.completed_at = Some(completed_at);
        let attempt = AttemptResult::assemble(
            &self.plan,
            self.user_id,
            next.answers.clone(),
            self.started_at,
            completed_at,
        );
        (
            next,
            vec![SessionEffect::DisarmTimer, SessionEffect::Completed(attempt)],
        )
    }
}

impl fmt::Debug for QuizSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizSession")
            .field("quiz_id", &self.plan.config().id())
            .field("user_id", &self.user_id)
            .field("questions", &self.plan.len())
            .field("current", &self.state.current)
            .field("remaining_secs", &self.state.remaining_secs)
            .field("score", &self.state.score)
            .field("completed_at", &self.state.completed_at)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
