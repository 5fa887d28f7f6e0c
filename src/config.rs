//! Planner configuration.

use crate::{LoopError, Result};

/// Default minimum extent of the outermost level for a parallel hint.
pub const DEFAULT_MIN_PARALLEL_LEN: usize = 200_000;

const ENV_PARALLEL: &str = "STRIDED_LOOPS_PARALLEL";
const ENV_MIN_PARALLEL_LEN: &str = "STRIDED_LOOPS_MIN_PARALLEL_LEN";

/// Options passed to every emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopConfig {
    /// Whether parallel hints may be emitted at all.
    pub parallel: bool,
    /// Minimum outermost extent for which a parallel hint is emitted.
    pub min_parallel_len: usize,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            parallel: cfg!(feature = "parallel"),
            min_parallel_len: DEFAULT_MIN_PARALLEL_LEN,
        }
    }
}

impl LoopConfig {
    /// Sequential configuration: never emits parallel hints.
    pub fn sequential() -> Self {
        Self {
            parallel: false,
            ..Self::default()
        }
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_min_parallel_len(mut self, min_parallel_len: usize) -> Self {
        self.min_parallel_len = min_parallel_len;
        self
    }

    /// Defaults overridden by `STRIDED_LOOPS_PARALLEL` and
    /// `STRIDED_LOOPS_MIN_PARALLEL_LEN` when set.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(value) = lookup(ENV_PARALLEL) {
            config.parallel = match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(LoopError::InvalidConfig {
                        key: ENV_PARALLEL,
                        value,
                    })
                }
            };
        }
        if let Some(value) = lookup(ENV_MIN_PARALLEL_LEN) {
            config.min_parallel_len =
                value
                    .trim()
                    .parse()
                    .map_err(|_| LoopError::InvalidConfig {
                        key: ENV_MIN_PARALLEL_LEN,
                        value: value.clone(),
                    })?;
        }
        Ok(config)
    }

    /// Whether a level of `extent` iterations gets a parallel hint.
    #[inline]
    pub fn parallel_for(&self, extent: usize) -> bool {
        self.parallel && extent >= self.min_parallel_len
    }
}
