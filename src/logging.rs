//! `env_logger` setup for binaries and tests embedding the crate.

use log::LevelFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set.
    pub default_level: LevelFilter,
    /// Route output through the test harness capture.
    pub is_test: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default_level: LevelFilter::Info,
            is_test: false,
        }
    }
}

/// Installs the global logger.
///
/// Safe to call more than once; only the first call wins and later calls
/// return `false`.
pub fn init_logging(config: LoggingConfig) -> bool {
    let env = env_logger::Env::default().default_filter_or(config.default_level.as_str());
    match env_logger::Builder::from_env(env)
        .is_test(config.is_test)
        .try_init()
    {
        Ok(()) => true,
        Err(e) => {
            log::debug!("logger already initialised: {e}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_a_no_op() {
        let config = LoggingConfig {
            is_test: true,
            ..LoggingConfig::default()
        };
        init_logging(config);
        assert!(!init_logging(config));
    }
}
