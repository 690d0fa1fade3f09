//! Candle finalization for one series
//!
//! The venue pushes repeated snapshots of the bar that is still forming and
//! never flags a bar as closed. A bar is closed once the wall clock reaches
//! its end time; the finalizer turns that crossing into exactly one
//! `ClosedBar` per end time, in increasing end-time order.

use std::collections::VecDeque;

use tracing::debug;

use trigger_core::{Bar, ClosedBar, IndicatorSpec, SubscriptionKey};

use crate::indicators::IndicatorBank;

#[derive(Debug)]
pub struct CandleFinalizer {
    key: SubscriptionKey,
    last_finalized_end_time: i64,
    /// Latest snapshot of the forming bar
    live: Option<Bar>,
    /// Last snapshots of bars whose successor arrived before they were closed
    superseded: VecDeque<Bar>,
    bank: IndicatorBank,
    /// Recently closed bars, oldest first
    history: VecDeque<Bar>,
    history_capacity: usize,
}

impl CandleFinalizer {
    pub fn new(key: SubscriptionKey, history_capacity: usize) -> Self {
        Self {
            key,
            last_finalized_end_time: 0,
            live: None,
            superseded: VecDeque::new(),
            bank: IndicatorBank::new(),
            history: VecDeque::with_capacity(history_capacity),
            history_capacity,
        }
    }

    pub fn key(&self) -> &SubscriptionKey {
        &self.key
    }

    pub fn last_finalized_end_time(&self) -> i64 {
        self.last_finalized_end_time
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn indicator_count(&self) -> usize {
        self.bank.len()
    }

    /// Track `spec`, replaying retained history into it if it is new
    pub fn ensure_indicator(&mut self, spec: IndicatorSpec) -> bool {
        let added = self.bank.ensure(spec, self.history.iter());
        if added {
            debug!(
                "[Finalizer {}] Tracking {} (warmed from {} bars)",
                self.key,
                spec,
                self.history.len()
            );
        }
        added
    }

    /// Replace the cached live snapshot
    pub fn ingest_snapshot(&mut self, bar: Bar) {
        let end_time = bar.end_time;
        let Some(previous) = self.live.replace(bar) else {
            return;
        };

        if previous.end_time < end_time && previous.end_time > self.last_finalized_end_time {
            match self.superseded.back_mut() {
                Some(last) if last.end_time == previous.end_time => *last = previous,
                _ => self.superseded.push_back(previous),
            }
        }
    }

    /// Finalize the oldest bar that has closed by `now_ms`, if any.
    ///
    /// Callers drain with `while let Some(closed) = finalizer.try_finalize(now)`.
    pub fn try_finalize(&mut self, now_ms: i64) -> Option<ClosedBar> {
        while let Some(front) = self.superseded.front() {
            if front.end_time <= self.last_finalized_end_time {
                self.superseded.pop_front();
                continue;
            }
            if now_ms < front.end_time {
                return None;
            }
            let bar = self.superseded.pop_front()?;
            return Some(self.finalize(bar));
        }

        let live = self.live.as_ref()?;
        if now_ms < live.end_time || live.end_time <= self.last_finalized_end_time {
            return None;
        }
        let bar = live.clone();
        Some(self.finalize(bar))
    }

    /// Warm up from historical closed bars without emitting them.
    ///
    /// Returns the number of bars applied.
    pub fn seed(&mut self, mut bars: Vec<Bar>, now_ms: i64) -> usize {
        bars.sort_by_key(|bar| bar.end_time);

        let mut applied = 0;
        for bar in bars {
            if bar.end_time > now_ms || bar.end_time <= self.last_finalized_end_time {
                continue;
            }
            self.apply(bar);
            applied += 1;
        }
        applied
    }

    fn finalize(&mut self, bar: Bar) -> ClosedBar {
        let indicators = self.bank.push(&bar);
        self.record(bar.clone());
        ClosedBar { bar, indicators }
    }

    fn apply(&mut self, bar: Bar) {
        self.bank.push(&bar);
        self.record(bar);
    }

    fn record(&mut self, bar: Bar) {
        self.last_finalized_end_time = bar.end_time;
        if self.history_capacity == 0 {
            return;
        }
        if self.history.len() == self.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(bar);
    }
}
