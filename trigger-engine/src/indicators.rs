//! Rolling indicator accumulators
//!
//! Every accumulator consumes one scalar per closed bar in O(1) and returns
//! `None` while it does not yet have enough history. Windowed running sums
//! are rebuilt from the window contents once per `window` evictions so that
//! floating-point drift stays bounded over unbounded streams.

use std::collections::{HashMap, VecDeque};

use trigger_core::{Bar, IndicatorOutput, IndicatorSpec};

/// Fixed-capacity window with running sum and sum of squares
#[derive(Debug, Clone)]
struct RollingWindow {
    values: VecDeque<f64>,
    capacity: usize,
    sum: f64,
    sum_sq: f64,
    evictions: usize,
}

impl RollingWindow {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
            sum: 0.0,
            sum_sq: 0.0,
            evictions: 0,
        }
    }

    fn push(&mut self, value: f64) {
        if self.values.len() == self.capacity {
            if let Some(old) = self.values.pop_front() {
                self.sum -= old;
                self.sum_sq -= old * old;
                self.evictions += 1;
            }
        }
        self.values.push_back(value);
        self.sum += value;
        self.sum_sq += value * value;

        if self.evictions >= self.capacity {
            self.resync();
        }
    }

    fn resync(&mut self) {
        self.sum = self.values.iter().sum();
        self.sum_sq = self.values.iter().map(|v| v * v).sum();
        self.evictions = 0;
    }

    fn is_full(&self) -> bool {
        self.values.len() == self.capacity
    }

    fn len(&self) -> usize {
        self.values.len()
    }

    fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.sum / self.values.len() as f64
    }

    /// Population variance, clamped at zero
    fn variance(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let n = self.values.len() as f64;
        let mean = self.sum / n;
        (self.sum_sq / n - mean * mean).max(0.0)
    }
}

/// Simple moving average
#[derive(Debug, Clone)]
pub struct RollingSma {
    window: RollingWindow,
}

impl RollingSma {
    pub fn new(length: usize) -> Self {
        Self {
            window: RollingWindow::new(length),
        }
    }

    pub fn update(&mut self, value: f64) -> Option<f64> {
        self.window.push(value);
        self.window.is_full().then(|| self.window.mean())
    }
}

/// Exponential moving average, seeded with the first value
#[derive(Debug, Clone)]
pub struct RollingEma {
    alpha: f64,
    value: Option<f64>,
}

impl RollingEma {
    pub fn new(length: usize) -> Self {
        Self {
            alpha: 2.0 / (length as f64 + 1.0),
            value: None,
        }
    }

    pub fn update(&mut self, value: f64) -> Option<f64> {
        let next = match self.value {
            Some(prev) => self.alpha * value + (1.0 - self.alpha) * prev,
            None => value,
        };
        self.value = Some(next);
        self.value
    }
}

/// Relative Strength Index with Wilder smoothing
///
/// The first push only records the previous value. The next `length`
/// changes seed simple averages of gains and losses; the indicator resolves
/// on the push that completes the seed.
#[derive(Debug, Clone)]
pub struct RollingRsi {
    length: usize,
    prev: Option<f64>,
    seed_count: usize,
    gain_sum: f64,
    loss_sum: f64,
    avg_gain: f64,
    avg_loss: f64,
    warm: bool,
}

impl RollingRsi {
    pub fn new(length: usize) -> Self {
        Self {
            length: length.max(1),
            prev: None,
            seed_count: 0,
            gain_sum: 0.0,
            loss_sum: 0.0,
            avg_gain: 0.0,
            avg_loss: 0.0,
            warm: false,
        }
    }

    pub fn update(&mut self, value: f64) -> Option<f64> {
        // Non-finite inputs would poison the averages for good
        if !value.is_finite() {
            return self.current();
        }

        let Some(prev) = self.prev.replace(value) else {
            return None;
        };

        let change = value - prev;
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);

        if self.warm {
            let n = self.length as f64;
            self.avg_gain = (self.avg_gain * (n - 1.0) + gain) / n;
            self.avg_loss = (self.avg_loss * (n - 1.0) + loss) / n;
        } else {
            self.gain_sum += gain;
            self.loss_sum += loss;
            self.seed_count += 1;
            if self.seed_count < self.length {
                return None;
            }
            self.avg_gain = self.gain_sum / self.length as f64;
            self.avg_loss = self.loss_sum / self.length as f64;
            self.warm = true;
        }

        self.current()
    }

    fn current(&self) -> Option<f64> {
        if !self.warm {
            return None;
        }
        if self.avg_loss == 0.0 {
            return Some(100.0);
        }
        let rs = self.avg_gain / self.avg_loss;
        Some(100.0 - 100.0 / (1.0 + rs))
    }
}

/// Bollinger bands over a population standard deviation
#[derive(Debug, Clone)]
pub struct RollingBands {
    window: RollingWindow,
    multiplier: f64,
}

impl RollingBands {
    pub fn new(length: usize, multiplier: f64) -> Self {
        Self {
            window: RollingWindow::new(length),
            multiplier,
        }
    }

    pub fn update(&mut self, value: f64) -> Option<IndicatorOutput> {
        self.window.push(value);
        if !self.window.is_full() {
            return None;
        }
        let middle = self.window.mean();
        let width = self.multiplier * self.window.variance().sqrt();
        Some(IndicatorOutput::Bands {
            upper: middle + width,
            middle,
            lower: middle - width,
        })
    }
}

/// Volume-weighted average price over a bounded window
///
/// Resolves from the first bar; yields NaN while windowed volume is zero.
#[derive(Debug, Clone)]
pub struct RollingVwap {
    price_volume: RollingWindow,
    volume: RollingWindow,
}

impl RollingVwap {
    pub fn new(length: usize) -> Self {
        Self {
            price_volume: RollingWindow::new(length),
            volume: RollingWindow::new(length),
        }
    }

    pub fn update(&mut self, price: f64, volume: f64) -> Option<f64> {
        self.price_volume.push(price * volume);
        self.volume.push(volume);

        let total_volume = self.volume.sum;
        if total_volume == 0.0 {
            return Some(f64::NAN);
        }
        Some(self.price_volume.sum / total_volume)
    }

    pub fn len(&self) -> usize {
        self.volume.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volume.len() == 0
    }
}

/// One accumulator, selected by its spec
#[derive(Debug, Clone)]
pub enum Indicator {
    Sma(RollingSma),
    Ema(RollingEma),
    Rsi(RollingRsi),
    Bollinger(RollingBands),
    Vwap(RollingVwap),
}

impl Indicator {
    pub fn new(spec: &IndicatorSpec) -> Self {
        match *spec {
            IndicatorSpec::Sma { length, .. } => Indicator::Sma(RollingSma::new(length)),
            IndicatorSpec::Ema { length, .. } => Indicator::Ema(RollingEma::new(length)),
            IndicatorSpec::Rsi { length, .. } => Indicator::Rsi(RollingRsi::new(length)),
            IndicatorSpec::Bollinger {
                length, multiplier, ..
            } => Indicator::Bollinger(RollingBands::new(length, multiplier)),
            IndicatorSpec::Vwap { length, .. } => Indicator::Vwap(RollingVwap::new(length)),
        }
    }

    /// Push one closed bar, reading `spec`'s source from it
    pub fn push(&mut self, spec: &IndicatorSpec, bar: &Bar) -> Option<IndicatorOutput> {
        let x = bar.source(spec.source());
        match self {
            Indicator::Sma(sma) => sma.update(x).map(IndicatorOutput::Value),
            Indicator::Ema(ema) => ema.update(x).map(IndicatorOutput::Value),
            Indicator::Rsi(rsi) => rsi.update(x).map(IndicatorOutput::Value),
            Indicator::Bollinger(bands) => bands.update(x),
            Indicator::Vwap(vwap) => vwap.update(x, bar.volume).map(IndicatorOutput::Value),
        }
    }
}

/// The accumulators of one series, keyed by spec
#[derive(Debug, Default)]
pub struct IndicatorBank {
    indicators: HashMap<IndicatorSpec, Indicator>,
}

impl IndicatorBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, spec: &IndicatorSpec) -> bool {
        self.indicators.contains_key(spec)
    }

    pub fn len(&self) -> usize {
        self.indicators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indicators.is_empty()
    }

    /// Add `spec` if missing, warming it up from `history` (oldest first).
    ///
    /// Returns false if the spec was already tracked.
    pub fn ensure<'a>(
        &mut self,
        spec: IndicatorSpec,
        history: impl IntoIterator<Item = &'a Bar>,
    ) -> bool {
        if self.indicators.contains_key(&spec) {
            return false;
        }
        let mut indicator = Indicator::new(&spec);
        for bar in history {
            indicator.push(&spec, bar);
        }
        self.indicators.insert(spec, indicator);
        true
    }

    /// Push a closed bar into every accumulator; returns the resolved outputs
    pub fn push(&mut self, bar: &Bar) -> HashMap<IndicatorSpec, IndicatorOutput> {
        self.indicators
            .iter_mut()
            .filter_map(|(spec, indicator)| indicator.push(spec, bar).map(|out| (*spec, out)))
            .collect()
    }
}
