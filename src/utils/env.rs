//! Environment abstraction for clocks and randomness.
//!
//! The broker and the peer never read the wall clock or a global RNG
//! directly. Everything time- or chance-dependent goes through an
//! [`Environment`], so tests can swap in a manual clock and a seeded RNG.
//!
//! - [`SystemEnv`]: local wall clock, `tokio` sleep, thread-local RNG.
//! - `ManualEnv` (tests only): clock that moves only when told to, and a
//!   seeded `StdRng`.

use std::time::Duration;

use chrono::NaiveDateTime;
use rand::Rng;

/// Source of time and randomness.
#[allow(async_fn_in_trait)]
pub trait Environment {
    /// Current local wall-clock time.
    fn now(&self) -> NaiveDateTime;

    /// Suspend for `duration`.
    async fn sleep(&self, duration: Duration);

    /// Uniform value in `[0, 1)`.
    fn random_unit(&self) -> f64;

    /// Whole number of seconds in `0..=max` (sub-second part of `max` ignored).
    fn random_jitter(&self, max: Duration) -> Duration;
}

/// Production environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl Environment for SystemEnv {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn random_unit(&self) -> f64 {
        rand::thread_rng().gen_range(0.0..1.0)
    }

    fn random_jitter(&self, max: Duration) -> Duration {
        Duration::from_secs(rand::thread_rng().gen_range(0..=max.as_secs()))
    }
}

#[cfg(test)]
pub use manual::ManualEnv;
