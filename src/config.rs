//! Runtime configuration.
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! `STEWARD__SECTION__KEY` environment variables. The raw layers deserialize
//! into [`StewardConfig`], which [`StewardConfig::validate`] checks before
//! the binary wires anything together.

use crate::task::{
    adapters::qbittorrent::QbittorrentSettings,
    domain::RequesterId,
    services::{IntakeSettings, LargeFilePolicy},
};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "STEWARD";

/// Separator between the prefix, section and key of environment variables.
pub const ENV_SEPARATOR: &str = "__";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// A configuration source could not be read or deserialized.
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// A value is present but unusable.
    #[error("invalid configuration value for {key}: {reason}")]
    Invalid {
        /// Dotted key of the offending value.
        key: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

impl SettingsError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Download client connection settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GatewayConfig {
    /// Web API base URL.
    pub base_url: String,
    /// Web API user.
    pub username: String,
    /// Web API password.
    pub password: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_owned(),
            username: "admin".to_owned(),
            password: String::new(),
            request_timeout_secs: 10,
        }
    }
}

/// Chat intake settings.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChatConfig {
    /// Requester identifiers allowed to use the bot.
    pub allowed_requesters: Vec<i64>,
    /// Category applied to submissions.
    pub category: Option<String>,
    /// Tags applied to submissions.
    pub tags: Vec<String>,
    /// Download directory passed with submissions.
    pub save_path: Option<String>,
}

/// Reconciliation loop settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReconciliationConfig {
    /// Seconds between passes.
    pub period_secs: u64,
    /// Seconds to wait after a submission before resolving its entry.
    pub settle_delay_secs: u64,
    /// Seconds after which an unresolved task is failed; unset disables.
    pub resolution_expiry_secs: Option<u64>,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            period_secs: 30,
            settle_delay_secs: 3,
            resolution_expiry_secs: None,
        }
    }
}

/// File organizer settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OrganizerConfig {
    /// Seconds between passes.
    pub period_secs: u64,
    /// Root directory receiving promoted files.
    pub target_root: Utf8PathBuf,
    /// Files of at least this many bytes are promoted.
    pub large_file_threshold_bytes: u64,
}

impl Default for OrganizerConfig {
    fn default() -> Self {
        Self {
            period_secs: 60,
            target_root: Utf8PathBuf::from("organized"),
            large_file_threshold_bytes: LargeFilePolicy::DEFAULT_THRESHOLD_BYTES,
        }
    }
}

/// Task store settings.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreConfig {
    /// `PostgreSQL` connection URL; tasks stay in memory when unset.
    pub database_url: Option<String>,
}

/// Complete runtime configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StewardConfig {
    /// Download client connection.
    pub gateway: GatewayConfig,
    /// Chat intake.
    pub chat: ChatConfig,
    /// Reconciliation loop.
    pub reconciliation: ReconciliationConfig,
    /// File organizer.
    pub organizer: OrganizerConfig,
    /// Task store.
    pub store: StoreConfig,
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for StewardConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            chat: ChatConfig::default(),
            reconciliation: ReconciliationConfig::default(),
            organizer: OrganizerConfig::default(),
            store: StoreConfig::default(),
            log_filter: "info".to_owned(),
        }
    }
}

impl StewardConfig {
    /// Loads configuration from the optional TOML file at `path` and the
    /// process environment, then validates it.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] when a source is malformed or a value fails
    /// validation.
    pub fn load(path: Option<&Utf8Path>) -> Result<Self, SettingsError> {
        let mut builder = config::Config::builder();
        if let Some(file) = path {
            builder = builder.add_source(
                config::File::with_name(file.as_str())
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }
        let loaded: Self = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("chat.allowed_requesters")
                    .with_list_parse_key("chat.tags"),
            )
            .build()?
            .try_deserialize()?;
        loaded.validate()
    }

    /// Checks values that deserialize but cannot be used.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Invalid`] naming the first offending key.
    pub fn validate(self) -> Result<Self, SettingsError> {
        if self.gateway.base_url.trim().is_empty() {
            return Err(SettingsError::invalid("gateway.base_url", "must not be empty"));
        }
        if !self.gateway.base_url.starts_with("http://")
            && !self.gateway.base_url.starts_with("https://")
        {
            return Err(SettingsError::invalid(
                "gateway.base_url",
                "must be an http or https URL",
            ));
        }
        ensure_positive("gateway.request_timeout_secs", self.gateway.request_timeout_secs)?;
        ensure_positive("reconciliation.period_secs", self.reconciliation.period_secs)?;
        ensure_positive("organizer.period_secs", self.organizer.period_secs)?;
        if self.reconciliation.resolution_expiry_secs == Some(0) {
            return Err(SettingsError::invalid(
                "reconciliation.resolution_expiry_secs",
                "must be positive when set",
            ));
        }
        if self.organizer.target_root.as_str().is_empty() {
            return Err(SettingsError::invalid("organizer.target_root", "must not be empty"));
        }
        if self.chat.allowed_requesters.is_empty() {
            tracing::warn!("chat.allowed_requesters is empty; every message will be refused");
        }
        Ok(self)
    }

    /// Returns the download client adapter settings.
    #[must_use]
    pub fn gateway_settings(&self) -> QbittorrentSettings {
        QbittorrentSettings {
            base_url: self.gateway.base_url.trim_end_matches('/').to_owned(),
            username: self.gateway.username.clone(),
            password: self.gateway.password.clone(),
            request_timeout: Duration::from_secs(self.gateway.request_timeout_secs),
        }
    }

    /// Returns the chat intake settings.
    #[must_use]
    pub fn intake_settings(&self) -> IntakeSettings {
        IntakeSettings {
            allowed_requesters: self
                .chat
                .allowed_requesters
                .iter()
                .copied()
                .map(RequesterId::new)
                .collect(),
            category: self.chat.category.clone(),
            tags: self.chat.tags.clone(),
            save_path: self.chat.save_path.clone(),
        }
    }

    /// Returns the reconciliation period.
    #[must_use]
    pub const fn reconciliation_period(&self) -> Duration {
        Duration::from_secs(self.reconciliation.period_secs)
    }

    /// Returns the delay between submission and resolution.
    #[must_use]
    pub const fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.reconciliation.settle_delay_secs)
    }

    /// Returns the unresolved-task expiry, if enabled.
    #[must_use]
    pub fn resolution_expiry(&self) -> Option<chrono::Duration> {
        self.reconciliation
            .resolution_expiry_secs
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(chrono::Duration::try_seconds)
    }

    /// Returns the organizer period.
    #[must_use]
    pub const fn organizer_period(&self) -> Duration {
        Duration::from_secs(self.organizer.period_secs)
    }

    /// Returns the large-file policy.
    #[must_use]
    pub const fn large_file_policy(&self) -> LargeFilePolicy {
        LargeFilePolicy::new(self.organizer.large_file_threshold_bytes)
    }
}

fn ensure_positive(key: &'static str, value: u64) -> Result<(), SettingsError> {
    if value == 0 {
        return Err(SettingsError::invalid(key, "must be positive"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{SettingsError, StewardConfig};
    use camino::Utf8PathBuf;
    use rstest::rstest;
    use std::io::Write;
    use std::time::Duration;

    #[rstest]
    fn defaults_validate() {
        let config = StewardConfig::default().validate();
        assert!(config.is_ok());
    }

    #[rstest]
    #[case::empty_url(|c: &mut StewardConfig| c.gateway.base_url = String::new(), "gateway.base_url")]
    #[case::bad_scheme(|c: &mut StewardConfig| c.gateway.base_url = "ftp://host".to_owned(), "gateway.base_url")]
    #[case::zero_period(|c: &mut StewardConfig| c.reconciliation.period_secs = 0, "reconciliation.period_secs")]
    #[case::zero_organizer(|c: &mut StewardConfig| c.organizer.period_secs = 0, "organizer.period_secs")]
    #[case::zero_expiry(|c: &mut StewardConfig| c.reconciliation.resolution_expiry_secs = Some(0), "reconciliation.resolution_expiry_secs")]
    fn invalid_values_are_rejected(
        #[case] change: fn(&mut StewardConfig),
        #[case] expected_key: &str,
    ) {
        let mut config = StewardConfig::default();
        change(&mut config);

        match config.validate() {
            Err(SettingsError::Invalid { key, .. }) => assert_eq!(key, expected_key),
            other => panic!("expected invalid {expected_key}, got {other:?}"),
        }
    }

    #[rstest]
    fn toml_file_overrides_defaults() -> eyre::Result<()> {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
        writeln!(
            file,
            r#"
log_filter = "debug"

[gateway]
base_url = "http://qbt.local:9090/"
username = "bot"

[chat]
allowed_requesters = [42, 7]
tags = ["steward"]

[organizer]
target_root = "/srv/media"
large_file_threshold_bytes = 1024
"#
        )?;
        let path = Utf8PathBuf::from_path_buf(file.path().to_path_buf())
            .map_err(|path| eyre::eyre!("non UTF-8 temp path {}", path.display()))?;

        let config = StewardConfig::load(Some(&path))?;

        assert_eq!(config.log_filter, "debug");
        assert_eq!(config.gateway_settings().base_url, "http://qbt.local:9090");
        assert_eq!(config.gateway.username, "bot");
        assert_eq!(config.intake_settings().allowed_requesters.len(), 2);
        assert_eq!(config.organizer.target_root, Utf8PathBuf::from("/srv/media"));
        assert_eq!(config.large_file_policy().threshold_bytes(), 1024);
        assert_eq!(config.reconciliation_period(), Duration::from_secs(30));
        assert!(config.resolution_expiry().is_none());
        Ok(())
    }

    #[rstest]
    fn resolution_expiry_converts_to_chrono() {
        let mut config = StewardConfig::default();
        config.reconciliation.resolution_expiry_secs = Some(90);

        assert_eq!(config.resolution_expiry(), chrono::Duration::try_seconds(90));
    }
}
