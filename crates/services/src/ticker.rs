//! Tick sources driving the per-question countdown.
//!
//! A tick source knows nothing about quizzes: it is armed for a number of
//! one-period ticks, can be disarmed, and hands ticks out through
//! [`TickSource::next_tick`]. Every arm starts a new generation; ticks left
//! over from an earlier generation are discarded on receipt, so once `arm` or
//! `disarm` returns the caller never observes a tick from the previous arm.

use async_trait::async_trait;
use std::future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// One elapsed period of an armed tick source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub generation: u64,
}

#[async_trait]
pub trait TickSource: Send {
    /// Start delivering up to `ticks` ticks, cancelling any previous arm.
    fn arm(&mut self, ticks: u32);

    /// Stop delivery. Idempotent.
    fn disarm(&mut self);

    fn is_armed(&self) -> bool;

    /// Wait for the next tick of the current arm.
    ///
    /// Never resolves while disarmed. Cancel safe.
    async fn next_tick(&mut self) -> Tick;
}

//
// ─── INTERVAL TICKER ───────────────────────────────────────────────────────────
//

/// Real-time tick source backed by a `tokio::time::interval` task per arm.
///
/// Must be armed from within a tokio runtime.
pub struct IntervalTicker {
    period: Duration,
    generation: u64,
    armed: bool,
    task: Option<JoinHandle<()>>,
    tx: mpsc::UnboundedSender<u64>,
    rx: mpsc::UnboundedReceiver<u64>,
}

impl IntervalTicker {
    #[must_use]
    pub fn new(period: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            period,
            generation: 0,
            armed: false,
            task: None,
            tx,
            rx,
        }
    }

    fn stop_task(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[async_trait]
impl TickSource for IntervalTicker {
    fn arm(&mut self, ticks: u32) {
        self.stop_task();
        self.generation += 1;
        self.armed = ticks > 0;
        if !self.armed {
            return;
        }

        let generation = self.generation;
        let period = self.period;
        let tx = self.tx.clone();
        self.task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            for _ in 0..ticks {
                interval.tick().await;
                if tx.send(generation).is_err() {
                    return;
                }
            }
        }));
    }

    fn disarm(&mut self) {
        self.stop_task();
        if self.armed {
            self.generation += 1;
        }
        self.armed = false;
    }

    fn is_armed(&self) -> bool {
        self.armed
    }

    async fn next_tick(&mut self) -> Tick {
        loop {
            if !self.armed {
                return future::pending().await;
            }
            match self.rx.recv().await {
                Some(generation) if generation == self.generation => {
                    return Tick { generation };
                }
                Some(stale) => {
                    tracing::trace!(stale, current = self.generation, "dropping stale tick");
                }
                // Unreachable while `self.tx` is alive.
                None => return future::pending().await,
            }
        }
    }
}

impl Drop for IntervalTicker {
    fn drop(&mut self) {
        self.stop_task();
    }
}

//
// ─── MANUAL TICKER ─────────────────────────────────────────────────────────────
//

/// Arm/disarm calls observed by a [`ManualTicker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCall {
    Arm(u32),
    Disarm,
}

/// Deterministic tick source for tests: ticks are pushed through a [`TickHandle`].
///
/// Pushed ticks are only delivered while armed and within the armed count;
/// anything queued when the ticker is re-armed or disarmed is discarded.
pub struct ManualTicker {
    generation: u64,
    budget: u32,
    rx: mpsc::UnboundedReceiver<()>,
    calls: Arc<Mutex<Vec<TimerCall>>>,
}

/// Test-side handle for pushing ticks into a [`ManualTicker`].
#[derive(Debug, Clone)]
pub struct TickHandle {
    tx: mpsc::UnboundedSender<()>,
    calls: Arc<Mutex<Vec<TimerCall>>>,
}

impl ManualTicker {
    #[must_use]
    pub fn new() -> (Self, TickHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let ticker = Self {
            generation: 0,
            budget: 0,
            rx,
            calls: Arc::clone(&calls),
        };
        (ticker, TickHandle { tx, calls })
    }

    fn discard_queued(&mut self) {
        while self.rx.try_recv().is_ok() {}
    }

    fn record(&self, call: TimerCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

#[async_trait]
impl TickSource for ManualTicker {
    fn arm(&mut self, ticks: u32) {
        self.discard_queued();
        self.generation += 1;
        self.budget = ticks;
        self.record(TimerCall::Arm(ticks));
    }

    fn disarm(&mut self) {
        self.discard_queued();
        if self.budget > 0 {
            self.generation += 1;
        }
        self.budget = 0;
        self.record(TimerCall::Disarm);
    }

    fn is_armed(&self) -> bool {
        self.budget > 0
    }

    async fn next_tick(&mut self) -> Tick {
        if self.budget == 0 {
            return future::pending().await;
        }
        match self.rx.recv().await {
            Some(()) => {
                self.budget -= 1;
                Tick {
                    generation: self.generation,
                }
            }
            None => future::pending().await,
        }
    }
}

impl TickHandle {
    /// Queue one tick.
    pub fn tick(&self) {
        let _ = self.tx.send(());
    }

    /// Queue `n` ticks.
    pub fn tick_n(&self, n: u32) {
        for _ in 0..n {
            self.tick();
        }
    }

    /// Every arm/disarm call made so far, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<TimerCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn interval_ticker_emits_armed_count_then_stops() {
        let mut ticker = IntervalTicker::new(Duration::from_secs(1));
        ticker.arm(3);

        let start = Instant::now();
        for expected in 1..=3_u64 {
            let tick = ticker.next_tick().await;
            assert_eq!(tick.generation, 1);
            assert_eq!(start.elapsed(), Duration::from_secs(expected));
        }

        let more = tokio::time::timeout(Duration::from_secs(10), ticker.next_tick()).await;
        assert!(more.is_err(), "no ticks beyond the armed count");
    }

    #[tokio::test(start_paused = true)]
    async fn interval_ticker_drops_ticks_from_previous_arm() {
        let mut ticker = IntervalTicker::new(Duration::from_secs(1));
        ticker.arm(5);
        // Let two ticks of the first arm pile up unread.
        tokio::time::sleep(Duration::from_millis(2_500)).await;

        ticker.arm(5);
        let start = Instant::now();
        let tick = ticker.next_tick().await;
        assert_eq!(tick.generation, 2);
        assert_eq!(start.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn interval_ticker_is_silent_after_disarm() {
        let mut ticker = IntervalTicker::new(Duration::from_secs(1));
        ticker.arm(5);
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        ticker.disarm();
        ticker.disarm();
        assert!(!ticker.is_armed());

        let late = tokio::time::timeout(Duration::from_secs(10), ticker.next_tick()).await;
        assert!(late.is_err());
    }

    #[tokio::test]
    async fn manual_ticker_only_delivers_while_armed() {
        let (mut ticker, handle) = ManualTicker::new();
        handle.tick();
        ticker.arm(2);
        assert!(ticker.is_armed());

        handle.tick_n(3);
        assert_eq!(ticker.next_tick().await.generation, 1);
        assert_eq!(ticker.next_tick().await.generation, 1);
        assert!(!ticker.is_armed(), "armed count exhausted");

        ticker.disarm();
        assert_eq!(
            handle.calls(),
            vec![TimerCall::Arm(2), TimerCall::Disarm]
        );
    }

    #[tokio::test]
    async fn manual_ticker_discards_queued_ticks_on_rearm() {
        let (mut ticker, handle) = ManualTicker::new();
        ticker.arm(5);
        handle.tick_n(2);
        ticker.arm(5);

        let pending =
            tokio::time::timeout(Duration::from_millis(20), ticker.next_tick()).await;
        assert!(pending.is_err());

        handle.tick();
        assert_eq!(ticker.next_tick().await.generation, 2);
    }
}
