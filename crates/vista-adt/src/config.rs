//! Configuration types for the ADT engine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::decoder::KeyPolicy;
use crate::window::IntervalSpec;

/// Default upper bound on windows per windowed fetch.
pub const DEFAULT_MAX_WINDOWS: usize = 10_000;

/// Shared stop request, checked before each window starts.
///
/// Clones share one flag, so a host keeps a clone and cancels from another
/// thread while the engine runs.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    flag: Arc<AtomicBool>,
}

impl CancellationFlag {
    /// Creates a flag that is not set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Returns true once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Configuration for the ADT engine.
///
/// # Example
///
/// ```rust
/// use vista_adt::{CancellationFlag, EngineConfig, IntervalSpec, KeyPolicy};
///
/// let cancel = CancellationFlag::new();
/// let config = EngineConfig::builder()
///     .with_interval(IntervalSpec::Week)
///     .with_key_policy(KeyPolicy::AbortBatch)
///     .with_max_windows(500)
///     .with_cancellation(cancel.clone())
///     .build();
///
/// assert_eq!(config.interval, IntervalSpec::Week);
/// assert!(!config.is_cancelled());
/// cancel.cancel();
/// assert!(config.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Window step used when a call does not name one.
    pub interval: IntervalSpec,
    /// Handling of records without a primary key.
    pub key_policy: KeyPolicy,
    /// Largest number of windows one call may plan.
    pub max_windows: usize,
    /// Optional stop request.
    pub cancellation: Option<CancellationFlag>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interval: IntervalSpec::Day,
            key_policy: KeyPolicy::SkipRecord,
            max_windows: DEFAULT_MAX_WINDOWS,
            cancellation: None,
        }
    }
}

impl EngineConfig {
    /// Creates a new builder for EngineConfig.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Returns true if a cancellation flag is set.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationFlag::is_cancelled)
    }
}

/// Builder for EngineConfig.
#[derive(Debug, Clone, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Sets the default window step.
    pub fn with_interval(mut self, interval: IntervalSpec) -> Self {
        self.config.interval = interval;
        self
    }

    /// Sets the missing-key policy.
    pub fn with_key_policy(mut self, key_policy: KeyPolicy) -> Self {
        self.config.key_policy = key_policy;
        self
    }

    /// Sets the window limit.
    pub fn with_max_windows(mut self, max_windows: usize) -> Self {
        self.config.max_windows = max_windows;
        self
    }

    /// Attaches a cancellation flag.
    pub fn with_cancellation(mut self, cancellation: CancellationFlag) -> Self {
        self.config.cancellation = Some(cancellation);
        self
    }

    /// Builds the EngineConfig.
    pub fn build(self) -> EngineConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_default() {
        let config = EngineConfig::default();
        assert_eq!(config.interval, IntervalSpec::Day);
        assert_eq!(config.key_policy, KeyPolicy::SkipRecord);
        assert_eq!(config.max_windows, 10_000);
        assert!(config.cancellation.is_none());
        assert!(!config.is_cancelled());
    }

    #[test]
    fn test_engine_config_builder() {
        let config = EngineConfig::builder()
            .with_interval(IntervalSpec::Month)
            .with_key_policy(KeyPolicy::AbortBatch)
            .with_max_windows(12)
            .build();

        assert_eq!(config.interval, IntervalSpec::Month);
        assert_eq!(config.key_policy, KeyPolicy::AbortBatch);
        assert_eq!(config.max_windows, 12);
        assert!(config.cancellation.is_none());
    }

    #[test]
    fn test_builder_defaults_match_default() {
        let built = EngineConfig::builder().build();
        let default = EngineConfig::default();
        assert_eq!(built.interval, default.interval);
        assert_eq!(built.max_windows, default.max_windows);
    }

    #[test]
    fn test_cancellation_shared_between_clones() {
        let flag = CancellationFlag::new();
        let config = EngineConfig::builder().with_cancellation(flag.clone()).build();
        let copy = config.clone();
        assert!(!copy.is_cancelled());
        flag.cancel();
        assert!(config.is_cancelled());
        assert!(copy.is_cancelled());
    }
}
