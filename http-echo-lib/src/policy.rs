//! Response policy: decides per request which status code
//! is returned and whether an artificial delay is applied.
//!
//! Both decisions are gated by the same configured rate,
//! but each gate uses its own independent draw.

use std::{fmt, sync::Arc, time::Duration};

use parking_lot::Mutex;
use rama::{http::StatusCode, telemetry::tracing};
use rand::{RngExt as _, SeedableRng as _, rngs::SmallRng};

use crate::config::{IMPLICIT_STATUS_CODE, StartupConfig};

/// Source of uniform draws in `[0, 1)` used for rate gating.
pub trait RandomSource: Send + Sync + 'static {
    fn draw(&self) -> f64;
}

/// Draws from the thread local generator, seeded by the OS.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandomSource;

impl RandomSource for ThreadRandomSource {
    #[inline(always)]
    fn draw(&self) -> f64 {
        rand::random()
    }
}

/// Reproducible draws, shared by all in-flight requests.
pub struct SeededRandomSource {
    rng: Mutex<SmallRng>,
}

impl SeededRandomSource {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(SmallRng::seed_from_u64(seed)),
        }
    }
}

impl fmt::Debug for SeededRandomSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeededRandomSource").finish()
    }
}

impl RandomSource for SeededRandomSource {
    fn draw(&self) -> f64 {
        self.rng.lock().random()
    }
}

/// Always returns the same draw.
#[derive(Debug, Clone, Copy)]
pub struct FixedRandomSource(pub f64);

impl RandomSource for FixedRandomSource {
    #[inline(always)]
    fn draw(&self) -> f64 {
        self.0
    }
}

/// Status code writer where only the first write takes effect,
/// mirroring an HTTP response whose head can only be written once.
#[derive(Debug, Default)]
pub struct StatusSlot {
    status: Option<StatusCode>,
}

impl StatusSlot {
    pub fn write(&mut self, code: StatusCode) {
        match self.status {
            None => self.status = Some(code),
            Some(written) => {
                tracing::debug!(
                    "superfluous status write ignored: {code} (already written: {written})"
                );
            }
        }
    }

    pub fn is_written(&self) -> bool {
        self.status.is_some()
    }

    pub fn into_status(self) -> StatusCode {
        self.status.unwrap_or(IMPLICIT_STATUS_CODE)
    }
}

#[derive(Clone)]
pub struct ResponsePolicy {
    default_status_code: StatusCode,
    rate: f64,
    default_delay_ms: f64,
    random: Arc<dyn RandomSource>,
}

impl fmt::Debug for ResponsePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponsePolicy")
            .field("default_status_code", &self.default_status_code)
            .field("rate", &self.rate)
            .field("default_delay_ms", &self.default_delay_ms)
            .finish()
    }
}

impl ResponsePolicy {
    pub fn new(
        default_status_code: StatusCode,
        rate: f64,
        default_delay_ms: f64,
        random: Arc<dyn RandomSource>,
    ) -> Self {
        Self {
            default_status_code,
            rate,
            default_delay_ms,
            random,
        }
    }

    pub fn from_config(cfg: &StartupConfig, random: Arc<dyn RandomSource>) -> Self {
        Self::new(
            cfg.default_status_code(),
            cfg.status_rate(),
            cfg.delay_ms(),
            random,
        )
    }

    /// Take a fresh draw and compare it against the rate percentage.
    ///
    /// Rates above 100 always pass, rates below 0 never do.
    fn rate_gate(&self) -> bool {
        self.random.draw() < self.rate / 100.
    }

    /// The default status code, if it is not 200 and the rate gate passes.
    ///
    /// No draw is taken for a default of 200.
    pub fn gated_default_status(&self) -> Option<StatusCode> {
        if self.default_status_code == IMPLICIT_STATUS_CODE {
            return None;
        }
        self.rate_gate().then_some(self.default_status_code)
    }

    /// Effective status code for a request.
    ///
    /// An explicit override is written first and can therefore
    /// not be replaced by the gated default.
    pub fn decide_status(&self, explicit_override: Option<StatusCode>) -> StatusCode {
        let mut slot = StatusSlot::default();
        if let Some(code) = explicit_override {
            slot.write(code);
        }
        if let Some(code) = self.gated_default_status() {
            slot.write(code);
        }
        slot.into_status()
    }

    /// Delay to apply for a request, if any.
    ///
    /// A supplied override always replaces the default, a zero override
    /// cancels the default delay. No draw is taken for a zero delay.
    pub fn decide_delay(&self, override_ms: Option<f64>) -> Option<Duration> {
        let delay_ms = override_ms.unwrap_or(self.default_delay_ms);
        // NaN and non-positive delays never apply, so they must not consume a draw
        if delay_ms.is_nan() || delay_ms <= 0. || !self.rate_gate() {
            return None;
        }
        Some(Duration::try_from_secs_f64(delay_ms / 1000.).unwrap_or(Duration::MAX))
    }

    /// Decide on the delay and suspend the current task for it.
    pub async fn apply_delay(&self, override_ms: Option<f64>) -> Option<Duration> {
        let delay = self.decide_delay(override_ms)?;
        tracing::info!(
            "timeout delay {}",
            humantime::format_duration(delay)
        );
        tokio::time::sleep(delay).await;
        Some(delay)
    }
}
