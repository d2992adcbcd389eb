// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{bail, Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Operator configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Concurrent workers draining each event queue
    pub worker_count: usize,
    /// Capacity of each bounded event queue
    pub queue_capacity: usize,
    /// Deadline applied to a single reconcile invocation
    pub reconcile_timeout: Duration,
    /// First retry delay after a failed reconcile, doubled per attempt
    pub retry_base: Duration,
    pub retry_max: Duration,
    /// Create a plan's destination namespace before the first sweep
    pub create_dest_namespace: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            worker_count: 2,
            queue_capacity: 256,
            reconcile_timeout: Duration::from_secs(30),
            retry_base: Duration::from_secs(5),
            retry_max: Duration::from_secs(300),
            create_dest_namespace: true,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let worker_count = parse_or(&lookup, "WORKER_COUNT", defaults.worker_count)?;
        if worker_count == 0 {
            bail!("WORKER_COUNT must be at least 1");
        }

        let queue_capacity = parse_or(&lookup, "QUEUE_CAPACITY", defaults.queue_capacity)?;
        if queue_capacity == 0 {
            bail!("QUEUE_CAPACITY must be at least 1");
        }

        let reconcile_timeout = Duration::from_secs(parse_or(
            &lookup,
            "RECONCILE_TIMEOUT_SECS",
            defaults.reconcile_timeout.as_secs(),
        )?);
        let retry_base = Duration::from_secs(parse_or(
            &lookup,
            "RETRY_BASE_SECS",
            defaults.retry_base.as_secs(),
        )?);
        let retry_max = Duration::from_secs(parse_or(
            &lookup,
            "RETRY_MAX_SECS",
            defaults.retry_max.as_secs(),
        )?);
        let create_dest_namespace =
            parse_or(&lookup, "CREATE_DEST_NAMESPACE", defaults.create_dest_namespace)?;

        Ok(Config {
            worker_count,
            queue_capacity,
            reconcile_timeout,
            retry_base,
            retry_max: retry_max.max(retry_base),
            create_dest_namespace,
        })
    }

    /// Delay before redelivering an event that failed `attempt` times
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.retry_base
            .checked_mul(factor)
            .unwrap_or(self.retry_max)
            .min(self.retry_max)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value '{}'", key, raw)),
        None => Ok(default),
    }
}
