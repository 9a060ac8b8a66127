//! Field access scoped to one resource name.

use std::time::Duration;

use secrecy::SecretString;
use strata_config::{Config, ConfigError, Section};

use crate::credentials::Secrets;
use crate::error::{Error, Result};
use crate::resource::ResourceKind;

/// Reads `<name>.<field>` from the section of one resource kind and reports
/// failures against the resource name and the bare field.
pub(crate) struct Fields<'a> {
    resource: &'a str,
    section: Section,
}

impl<'a> Fields<'a> {
    pub(crate) fn new(kind: ResourceKind, resource: &'a str, config: &Config) -> Self {
        Self {
            resource,
            section: config.section(kind.section()),
        }
    }

    fn key(&self, field: &str) -> String {
        format!("{}.{field}", self.resource)
    }

    pub(crate) fn string(&self, field: &str) -> Result<String> {
        self.section
            .string(&self.key(field))
            .map_err(|e| self.error(field, e))
    }

    pub(crate) fn string_or(&self, field: &str, default: &str) -> Result<String> {
        self.section
            .string_or(&self.key(field), default)
            .map_err(|e| self.error(field, e))
    }

    pub(crate) fn optional_string(&self, field: &str) -> Result<Option<String>> {
        self.section
            .optional_string(&self.key(field))
            .map_err(|e| self.error(field, e))
    }

    pub(crate) fn bool_or(&self, field: &str, default: bool) -> Result<bool> {
        self.section
            .bool_or(&self.key(field), default)
            .map_err(|e| self.error(field, e))
    }

    pub(crate) fn int_or(&self, field: &str, default: i64) -> Result<i64> {
        self.section
            .int_or(&self.key(field), default)
            .map_err(|e| self.error(field, e))
    }

    /// Mandatory TCP port.
    pub(crate) fn port(&self, field: &str) -> Result<u16> {
        let raw = self
            .section
            .int(&self.key(field))
            .map_err(|e| self.error(field, e))?;
        u16::try_from(raw)
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| self.invalid(field, "port number", raw))
    }

    /// Optional positive count.
    pub(crate) fn count_or(&self, field: &str, default: usize) -> Result<usize> {
        let raw = self.int_or(field, default as i64)?;
        usize::try_from(raw)
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| self.invalid(field, "positive integer", raw))
    }

    /// Optional duration given as a whole number of `unit`s.
    pub(crate) fn duration_or(
        &self,
        field: &str,
        default: Duration,
        unit: Duration,
    ) -> Result<Duration> {
        let default_units = (default.as_nanos() / unit.as_nanos().max(1)) as i64;
        let raw = self.int_or(field, default_units)?;
        u32::try_from(raw)
            .map(|n| unit * n)
            .map_err(|_| self.invalid(field, "non-negative duration", raw))
    }

    /// Mandatory credential, decrypted when it is ciphertext.
    pub(crate) fn secret(&self, field: &str, secrets: &Secrets) -> Result<SecretString> {
        let raw = self.string(field)?;
        Ok(secrets.reveal(self.resource, field, raw))
    }

    /// Optional credential, decrypted when it is ciphertext.
    pub(crate) fn optional_secret(
        &self,
        field: &str,
        secrets: &Secrets,
    ) -> Result<Option<SecretString>> {
        Ok(self
            .optional_string(field)?
            .map(|raw| secrets.reveal(self.resource, field, raw)))
    }

    /// Section-wide key (not namespaced by the resource name).
    pub(crate) fn shared_optional_string(&self, key: &str) -> Result<Option<String>> {
        self.section
            .optional_string(key)
            .map_err(|e| self.error(key, e))
    }

    /// Section-wide flag (not namespaced by the resource name).
    pub(crate) fn shared_bool_or(&self, key: &str, default: bool) -> Result<bool> {
        self.section
            .bool_or(key, default)
            .map_err(|e| self.error(key, e))
    }

    pub(crate) fn missing(&self, field: &str) -> Error {
        Error::ConfigMissing {
            resource: self.resource.to_string(),
            section: self.section.name().to_string(),
            field: field.to_string(),
        }
    }

    pub(crate) fn invalid(
        &self,
        field: &str,
        expected: &'static str,
        found: impl ToString,
    ) -> Error {
        Error::ConfigType {
            resource: self.resource.to_string(),
            section: self.section.name().to_string(),
            field: field.to_string(),
            expected,
            found: found.to_string(),
        }
    }

    fn error(&self, field: &str, err: ConfigError) -> Error {
        match err {
            ConfigError::Missing { .. } => self.missing(field),
            ConfigError::Type {
                expected, found, ..
            } => self.invalid(field, expected, found),
            other => Error::Initialization {
                resource: self.resource.to_string(),
                reason: other.to_string(),
                source: Some(Box::new(other)),
            },
        }
    }
}

/// Logical CPU count, at least 1.
pub(crate) fn cpu_count() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config(toml: &str) -> Config {
        Config::from_toml_str(toml).unwrap()
    }

    #[test]
    fn missing_field_is_reported_without_prefix() {
        let config = config("[redis]\n\"c.port\" = 6379");
        let fields = Fields::new(ResourceKind::Cache, "c", &config);

        match fields.string("host").unwrap_err() {
            Error::ConfigMissing {
                resource,
                section,
                field,
            } => {
                assert_eq!(resource, "c");
                assert_eq!(section, "redis");
                assert_eq!(field, "host");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn out_of_range_port_is_a_type_error() {
        let config = config("[redis]\n\"c.port\" = 70000");
        let fields = Fields::new(ResourceKind::Cache, "c", &config);
        assert!(matches!(
            fields.port("port").unwrap_err(),
            Error::ConfigType { expected: "port number", .. }
        ));
    }

    #[test]
    fn durations_use_the_given_unit() {
        let config = config("[redis]\n\"c.dial_timeout_ms\" = 250");
        let fields = Fields::new(ResourceKind::Cache, "c", &config);
        let ms = Duration::from_millis(1);

        assert_eq!(
            fields
                .duration_or("dial_timeout_ms", Duration::from_millis(100), ms)
                .unwrap(),
            Duration::from_millis(250)
        );
        assert_eq!(
            fields
                .duration_or("read_timeout_ms", Duration::from_secs(1), ms)
                .unwrap(),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn zero_count_is_rejected() {
        let config = config("[redis]\n\"c.max_open\" = 0");
        let fields = Fields::new(ResourceKind::Cache, "c", &config);
        assert!(fields.count_or("max_open", 20).is_err());
    }
}
