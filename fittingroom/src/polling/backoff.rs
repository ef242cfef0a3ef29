//! Poll interval policy with configurable backoff and jitter.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Growth of the interval between checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// delay = interval
    #[default]
    Constant,
    /// delay = interval * (check + 1)
    Linear,
    /// delay = interval * 2^check
    Exponential,
}

/// Randomisation applied on top of the backoff delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// No jitter
    #[default]
    None,
    /// Random from 0 to delay
    Full,
    /// Half fixed, half random
    Equal,
    /// min(max, random(interval, prev * 3))
    Decorrelated,
}

fn default_interval_ms() -> u64 {
    15_000
}

fn default_max_interval_ms() -> u64 {
    60_000
}

/// How often, and for how long, to check a long-running operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Base delay between checks in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Delay cap in milliseconds.
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,
    /// Backoff strategy.
    #[serde(default)]
    pub backoff: BackoffStrategy,
    /// Jitter strategy.
    #[serde(default)]
    pub jitter: JitterStrategy,
    /// Maximum number of checks. `None` checks until another limit is hit.
    #[serde(default)]
    pub max_attempts: Option<usize>,
    /// Overall deadline in milliseconds, measured from the first check.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_interval_ms: default_max_interval_ms(),
            backoff: BackoffStrategy::Constant,
            jitter: JitterStrategy::None,
            max_attempts: None,
            timeout_ms: None,
        }
    }
}

impl PollPolicy {
    /// Creates the default policy: a check every 15 seconds, no limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a constant policy checking every `interval`.
    #[must_use]
    pub fn every(interval: Duration) -> Self {
        let interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        Self::default()
            .with_interval_ms(interval_ms)
            .with_max_interval_ms(interval_ms.max(default_max_interval_ms()))
    }

    /// Sets the base interval.
    #[must_use]
    pub fn with_interval_ms(mut self, interval: u64) -> Self {
        self.interval_ms = interval;
        self
    }

    /// Sets the interval cap.
    #[must_use]
    pub fn with_max_interval_ms(mut self, interval: u64) -> Self {
        self.max_interval_ms = interval;
        self
    }

    /// Sets the backoff strategy.
    #[must_use]
    pub fn with_backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff = strategy;
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub fn with_jitter(mut self, strategy: JitterStrategy) -> Self {
        self.jitter = strategy;
        self
    }

    /// Limits the number of checks.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Sets an overall deadline.
    #[must_use]
    pub fn with_timeout_ms(mut self, timeout: u64) -> Self {
        self.timeout_ms = Some(timeout);
        self
    }

    /// Returns the overall deadline, if any.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Starts a fresh delay schedule for this policy.
    #[must_use]
    pub fn schedule(&self) -> DelaySchedule<'_> {
        DelaySchedule::new(self)
    }
}

/// Delay sequence for one wait.
#[derive(Debug)]
pub struct DelaySchedule<'a> {
    policy: &'a PollPolicy,
    check: usize,
    previous_ms: Option<u64>,
}

impl<'a> DelaySchedule<'a> {
    /// Creates a schedule positioned before the first delay.
    #[must_use]
    pub fn new(policy: &'a PollPolicy) -> Self {
        Self {
            policy,
            check: 0,
            previous_ms: None,
        }
    }

    /// Returns the number of delays handed out so far.
    #[must_use]
    pub fn position(&self) -> usize {
        self.check
    }

    /// Returns the delay to wait after the current check and advances.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.delay_for(self.check);
        self.check += 1;
        delay
    }

    fn delay_for(&mut self, check: usize) -> Duration {
        let base = self.policy.interval_ms;
        let max = self.policy.max_interval_ms.max(base);

        let delay = match self.policy.backoff {
            BackoffStrategy::Constant => base,
            BackoffStrategy::Linear => base.saturating_mul(check as u64 + 1).min(max),
            BackoffStrategy::Exponential => {
                let exponent = u32::try_from(check).unwrap_or(u32::MAX);
                base.saturating_mul(2u64.saturating_pow(exponent)).min(max)
            }
        };

        let jittered = match self.policy.jitter {
            JitterStrategy::None => delay,
            JitterStrategy::Full => {
                if delay == 0 {
                    0
                } else {
                    rand::thread_rng().gen_range(0..=delay)
                }
            }
            JitterStrategy::Equal => {
                let half = delay / 2;
                if half == 0 {
                    delay
                } else {
                    half + rand::thread_rng().gen_range(0..=half)
                }
            }
            JitterStrategy::Decorrelated => {
                let prev = self.previous_ms.unwrap_or(base);
                let upper = prev.saturating_mul(3).min(max);
                let next = if upper <= base {
                    base
                } else {
                    rand::thread_rng().gen_range(base..=upper)
                };
                self.previous_ms = Some(next);
                next
            }
        };

        Duration::from_millis(jittered)
    }
}
