//! Configuration presets for common scenarios

use super::{Config, DisplayConfig, Format};

impl Config {
    /// Create configuration from environment variables
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(level) = std::env::var("STRATA_LOG") {
            config.level = level;
        } else if let Ok(level) = std::env::var("RUST_LOG") {
            config.level = level;
        }

        if let Ok(format) = std::env::var("STRATA_LOG_FORMAT") {
            config.format = match format.to_lowercase().as_str() {
                "pretty" => Format::Pretty,
                "json" => Format::Json,
                _ => Format::Compact,
            };
        }

        config.display.parse_env();
        config
    }

    /// Development configuration (pretty, debug level, copies to stdout)
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            format: Format::Pretty,
            tee_stdout: true,
            display: DisplayConfig {
                source: true,
                ..DisplayConfig::default()
            },
            ..Self::default()
        }
    }

    /// Production configuration (JSON, info level)
    #[must_use]
    pub fn production() -> Self {
        Self {
            level: "info".to_string(),
            format: Format::Json,
            tee_stdout: false,
            display: DisplayConfig {
                colors: false,
                source: false,
                ..DisplayConfig::default()
            },
            ..Self::default()
        }
    }

    /// Test configuration: debug level without the stdout copy
    #[must_use]
    pub fn test() -> Self {
        Self {
            tee_stdout: false,
            ..Self::development()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_tees_to_stdout() {
        let config = Config::development();
        assert_eq!(config.level, "debug");
        assert_eq!(config.format, Format::Pretty);
        assert!(config.tee_stdout);
    }

    #[test]
    fn production_is_json_at_info() {
        let config = Config::production();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, Format::Json);
        assert!(!config.tee_stdout);
        assert!(!config.display.colors);
    }

    #[test]
    fn test_preset_keeps_debug_level_but_not_stdout() {
        let config = Config::test();
        assert_eq!(config.level, "debug");
        assert!(!config.tee_stdout);
    }
}
