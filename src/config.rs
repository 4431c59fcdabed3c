use std::env;
use std::num::NonZeroUsize;
use std::thread;

use crate::ApplyError;

/// Environment variable overriding the worker count.
pub const WORKERS_ENV: &str = "APPLYRULE_WORKERS";

/// Tunables of an apply pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    workers: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: thread::available_parallelism().map_or(1, NonZeroUsize::get),
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of rule workers. Zero is treated as one.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Defaults, overridden by `APPLYRULE_WORKERS` when set.
    ///
    /// # Errors
    ///
    /// Returns [`ApplyError::InvalidConfig`] if the variable is set but is not
    /// a positive integer.
    pub fn from_env() -> Result<Self, ApplyError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ApplyError::InvalidConfig`] for a non-positive or unparsable
    /// worker count.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ApplyError> {
        let mut config = Self::default();
        if let Some(raw) = lookup(WORKERS_ENV) {
            let workers = raw
                .trim()
                .parse::<NonZeroUsize>()
                .map_err(|_| ApplyError::InvalidConfig {
                    key: WORKERS_ENV.to_owned(),
                    value: raw.clone(),
                })?;
            config.workers = workers.get();
        }
        Ok(config)
    }
}
