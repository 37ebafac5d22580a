//! The `log` module configures the crate's logging facilities. Logging is about the internal
//! behavior of the simulator (resets, replicate scheduling, sink output). It is not to be confused
//! with the per-replicate _results_ written by a [`ResultSink`](crate::report::ResultSink).
//!
//! This module (re)exports the five logging macros: `error!`, `warn!`, `info!`, `debug!` and
//! `trace!`, where `error!` represents the highest-priority log messages and `trace!` the lowest.
//!
//! Logging is _disabled_ by default. It is enabled from the `seirmix` binary with
//! `--log-level <spec>`, or programmatically with a parsed [`LogLevelSpec`]:
//!
//! ```rust
//! use seirmix::log::{apply_log_level_spec, LogLevelSpec};
//!
//! pub fn setup_logging() {
//!     // `info` messages globally, every simulated day of every replicate.
//!     let spec: LogLevelSpec = "info,seirmix::model=trace".parse().unwrap();
//!     apply_log_level_spec(&spec);
//! }
//! ```
#[cfg(feature = "logging")]
mod standard_logger;

#[cfg(not(feature = "logging"))]
mod null_logger;

pub use log::{debug, error, info, trace, warn, LevelFilter};
use std::str::FromStr;

use crate::error::SimError;
use crate::HashMap;
#[cfg(feature = "logging")]
use log4rs::Handle;
use std::sync::LazyLock;
use std::sync::{Mutex, MutexGuard};

// Logging disabled
const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Off;

/// A global instance of the logging configuration.
static LOG_CONFIGURATION: LazyLock<Mutex<LogConfiguration>> = LazyLock::new(Mutex::default);

/// The installed filters. Loggers are global, so only the singleton behind
/// [`get_log_configuration`] exists; the public API is a pair of free functions.
#[derive(Debug)]
pub(in crate::log) struct LogConfiguration {
    /// Level for targets without a module filter. `LevelFilter::Off` disables logging.
    pub(in crate::log) global_log_level: LevelFilter,
    /// Module path (e.g. `"seirmix::runner"`) to its level.
    pub(in crate::log) module_levels: HashMap<String, LevelFilter>,

    #[cfg(feature = "logging")]
    /// Handle to the `log4rs` logger.
    root_handle: Option<Handle>,
}

impl Default for LogConfiguration {
    fn default() -> Self {
        Self {
            global_log_level: DEFAULT_LOG_LEVEL,
            module_levels: HashMap::default(),

            #[cfg(feature = "logging")]
            root_handle: None,
        }
    }
}

impl LogConfiguration {
    fn set_log_level(&mut self, level: LevelFilter) {
        self.global_log_level = level;
        self.set_config();
    }

    /// Replaces every module filter with those of `spec`.
    fn apply(&mut self, spec: &LogLevelSpec) {
        if let Some(level) = spec.global {
            self.global_log_level = level;
        } else if !spec.modules.is_empty() {
            // Errors stay visible when only module filters are given.
            self.global_log_level = LevelFilter::Error;
        }
        self.module_levels = spec.modules.iter().cloned().collect();
        self.set_config();
    }

    /// The most verbose level any target can log at.
    #[cfg_attr(feature = "logging", allow(dead_code))]
    pub(in crate::log) fn max_level(&self) -> LevelFilter {
        self.module_levels
            .values()
            .copied()
            .fold(self.global_log_level, Ord::max)
    }
}

/// Sets the global log level. A global filter level of `LevelFilter::Off` disables logging.
pub fn set_log_level(level: LevelFilter) {
    get_log_configuration().set_log_level(level);
}

/// A parsed `--log-level` argument: an optional global level plus module specific levels.
#[derive(Debug, Default, PartialEq)]
pub struct LogLevelSpec {
    pub global: Option<LevelFilter>,
    pub modules: Vec<(String, LevelFilter)>,
}

impl FromStr for LogLevelSpec {
    type Err = SimError;

    /// Parses comma separated items of the form `level` or `module=level`, e.g.
    /// `"info"` or `"seirmix::runner=trace,warn"`.
    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let mut parsed = LogLevelSpec::default();
        for item in spec.split(',').map(str::trim).filter(|item| !item.is_empty()) {
            match item.split_once('=') {
                Some((module, level)) => {
                    let level = parse_level(level)?;
                    parsed.modules.push((module.trim().to_string(), level));
                }
                None => parsed.global = Some(parse_level(item)?),
            }
        }
        Ok(parsed)
    }
}

fn parse_level(level: &str) -> Result<LevelFilter, SimError> {
    LevelFilter::from_str(level.trim())
        .map_err(|_| SimError::config(format!("invalid log level: {level:?}")))
}

/// Installs a parsed [`LogLevelSpec`]. Module filters from an earlier call are dropped; the global
/// level is kept unless the spec sets one.
pub fn apply_log_level_spec(spec: &LogLevelSpec) {
    get_log_configuration().apply(spec);
}

/// Fetches a mutable reference to the global `LogConfiguration`.
fn get_log_configuration() -> MutexGuard<'static, LogConfiguration> {
    LOG_CONFIGURATION
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::{apply_log_level_spec, get_log_configuration, set_log_level, LogLevelSpec};
    use log::{error, trace, LevelFilter};
    use std::sync::{LazyLock, Mutex};

    // Force logging tests to run serially for consistent behavior.
    static TEST_MUTEX: LazyLock<Mutex<()>> = LazyLock::new(Mutex::default);

    #[test]
    fn test_set_log_level() {
        let _guard = TEST_MUTEX.lock().expect("Mutex poisoned");
        set_log_level(LevelFilter::Error);
        {
            let config = get_log_configuration();
            assert_eq!(config.global_log_level, LevelFilter::Error);
            error!("test_set_log_level: global set to error");
            trace!("test_set_log_level: NOT EMITTED");
        }
        set_log_level(LevelFilter::Trace);
        {
            let config = get_log_configuration();
            assert_eq!(config.global_log_level, LevelFilter::Trace);
        }
        set_log_level(LevelFilter::Off);
    }

    #[test]
    fn applied_spec_replaces_module_filters() {
        let _guard = TEST_MUTEX.lock().expect("Mutex poisoned");
        let spec: LogLevelSpec = "seirmix::runner=error,seirmix::model=debug".parse().unwrap();
        apply_log_level_spec(&spec);
        {
            let config = get_log_configuration();
            assert_eq!(config.global_log_level, LevelFilter::Error);
            assert_eq!(
                config.module_levels.get("seirmix::model"),
                Some(&LevelFilter::Debug)
            );
            assert_eq!(config.max_level(), LevelFilter::Debug);
        }

        apply_log_level_spec(&"warn,seirmix::report=info".parse().unwrap());
        {
            let config = get_log_configuration();
            assert_eq!(config.global_log_level, LevelFilter::Warn);
            assert!(config.module_levels.get("seirmix::model").is_none());
            assert_eq!(config.module_levels.len(), 1);
        }

        apply_log_level_spec(&"off".parse().unwrap());
        assert!(get_log_configuration().module_levels.is_empty());
    }

    #[test]
    fn parses_log_level_specs() {
        let spec: LogLevelSpec = "seirmix::runner=trace, warn".parse().unwrap();
        assert_eq!(spec.global, Some(LevelFilter::Warn));
        assert_eq!(
            spec.modules,
            vec![("seirmix::runner".to_string(), LevelFilter::Trace)]
        );

        let spec: LogLevelSpec = "INFO".parse().unwrap();
        assert_eq!(spec.global, Some(LevelFilter::Info));
        assert!(spec.modules.is_empty());

        assert!("loud".parse::<LogLevelSpec>().is_err());
    }
}
