//! Configuration Module
//!
//! TOML-based configuration for the CONNECT tooling:
//! - Logging
//! - Connection policy (accepted protocols, client identifiers, keep alive)
//! - Packet size limits
//! - Environment variable overrides (VIBEMQ_CONNECT__* prefix)

use std::path::Path;
use std::time::Duration;

use config::{Environment, File, FileFormat};
use regex::Regex;
use serde::de::{self, SeqAccess, Unexpected, Visitor};
use serde::{Deserialize, Deserializer};

use crate::codec::frame::MAX_REMAINING_LENGTH;
use crate::protocol::{LEGACY_PROTOCOL_NAME, PROTOCOL_NAME};


/// Upper bound for `policy.keep_alive_grace`
pub const MAX_KEEP_ALIVE_GRACE: f64 = 10.0;

/// Substitute environment variables in a string.
/// Supports `${VAR}` and `${VAR:-default}` syntax.
fn substitute_env_vars(content: &str) -> String {
    let re = match Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}") {
        Ok(re) => re,
        Err(_) => return content.to_string(),
    };
    re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        std::env::var(var_name).unwrap_or_else(|_| default.to_string())
    })
    .to_string()
}

/// Configuration error types
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
    /// Config crate error
    Config(config::ConfigError),
    /// Validation error
    Validation(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Config(e) => write!(f, "Config error: {}", e),
            ConfigError::Validation(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl From<config::ConfigError> for ConfigError {
    fn from(e: config::ConfigError) -> Self {
        ConfigError::Config(e)
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub log: LogConfig,
    /// Connection policy
    pub policy: PolicyConfig,
    /// Packet limits
    pub limits: LimitsConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level: error, warn, info, debug, trace
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Connection acceptance policy
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Protocol names accepted in the variable header
    pub protocol_names: Vec<String>,
    /// Protocol levels accepted in the variable header
    #[serde(deserialize_with = "deserialize_protocol_levels")]
    pub protocol_levels: Vec<u8>,
    /// Assign an identifier to clients that send an empty one
    pub allow_empty_client_id: bool,
    /// Prefix for server-assigned client identifiers
    pub assigned_client_id_prefix: String,
    /// Maximum client identifier length in bytes
    pub max_client_id_len: usize,
    /// Keep alive timeout as a multiple of the client's interval
    pub keep_alive_grace: f64,
    /// Upper bound on the keep alive timeout in seconds (unset = no bound)
    pub max_keep_alive_timeout: Option<u64>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            protocol_names: vec![PROTOCOL_NAME.to_string(), LEGACY_PROTOCOL_NAME.to_string()],
            protocol_levels: vec![3, 4],
            allow_empty_client_id: true,
            assigned_client_id_prefix: "auto-".to_string(),
            max_client_id_len: 65_535,
            keep_alive_grace: 1.5,
            max_keep_alive_timeout: None,
        }
    }
}

/// Accepts a list of levels, a single level, or a comma separated string.
/// Environment overrides arrive as a bare integer when only one level is given.
fn deserialize_protocol_levels<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    struct LevelsVisitor;

    impl<'de> Visitor<'de> for LevelsVisitor {
        type Value = Vec<u8>;

        fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "a protocol level or a list of protocol levels")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            u8::try_from(v)
                .map(|level| vec![level])
                .map_err(|_| E::invalid_value(Unexpected::Unsigned(v), &self))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            u8::try_from(v)
                .map(|level| vec![level])
                .map_err(|_| E::invalid_value(Unexpected::Signed(v), &self))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            v.split(',')
                .map(|level| {
                    level
                        .trim()
                        .parse::<u8>()
                        .map_err(|_| E::invalid_value(Unexpected::Str(level), &self))
                })
                .collect()
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut levels = Vec::with_capacity(seq.size_hint().unwrap_or(0));
            while let Some(level) = seq.next_element::<u8>()? {
                levels.push(level);
            }
            Ok(levels)
        }
    }

    deserializer.deserialize_any(LevelsVisitor)
}

impl PolicyConfig {
    /// Get keep alive ceiling as Duration
    pub fn max_keep_alive_timeout_duration(&self) -> Option<Duration> {
        self.max_keep_alive_timeout.map(Duration::from_secs)
    }
}

/// Packet limits
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum remaining length accepted by the framed decoder
    pub max_packet_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_packet_size: MAX_REMAINING_LENGTH,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file with environment variable overrides.
    ///
    /// Supports:
    /// - `${VAR}` and `${VAR:-default}` substitution in the file
    /// - `VIBEMQ_CONNECT__SECTION__KEY` environment overrides
    ///
    /// A missing file is not an error; defaults and environment apply.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let defaults = PolicyConfig::default();
        let mut builder = config::Config::builder()
            // Start with defaults
            .set_default("log.level", default_log_level())?
            .set_default("policy.protocol_names", defaults.protocol_names)?
            .set_default(
                "policy.protocol_levels",
                defaults
                    .protocol_levels
                    .iter()
                    .map(|&level| i64::from(level))
                    .collect::<Vec<_>>(),
            )?
            .set_default("policy.allow_empty_client_id", defaults.allow_empty_client_id)?
            .set_default(
                "policy.assigned_client_id_prefix",
                defaults.assigned_client_id_prefix,
            )?
            .set_default("policy.max_client_id_len", defaults.max_client_id_len as i64)?
            .set_default("policy.keep_alive_grace", defaults.keep_alive_grace)?
            .set_default("limits.max_packet_size", MAX_REMAINING_LENGTH as i64)?;

        // Load from file with env var substitution
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let substituted = substitute_env_vars(&content);
                builder = builder.add_source(File::from_str(&substituted, FileFormat::Toml));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File doesn't exist, use defaults
            }
            Err(e) => return Err(ConfigError::Io(e)),
        }

        // VIBEMQ_CONNECT__POLICY__KEEP_ALIVE_GRACE etc.
        // Double underscore separates nested keys, single underscore preserved in field names.
        // List keys take comma separated values (VIBEMQ_CONNECT__POLICY__PROTOCOL_LEVELS=3,4)
        let cfg = builder
            .add_source(
                Environment::with_prefix("VIBEMQ_CONNECT")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("policy.protocol_names")
                    .with_list_parse_key("policy.protocol_levels")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = cfg.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides only (no file).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(Path::new(""))
    }

    /// Parse configuration from a TOML string (no env var support).
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let policy = &self.policy;

        if policy.protocol_names.is_empty() {
            return Err(ConfigError::Validation(
                "policy.protocol_names must not be empty".into(),
            ));
        }

        if policy.protocol_levels.is_empty() {
            return Err(ConfigError::Validation(
                "policy.protocol_levels must not be empty".into(),
            ));
        }

        if !(1.0..=MAX_KEEP_ALIVE_GRACE).contains(&policy.keep_alive_grace) {
            return Err(ConfigError::Validation(format!(
                "policy.keep_alive_grace must be between 1.0 and {}, got {}",
                MAX_KEEP_ALIVE_GRACE, policy.keep_alive_grace
            )));
        }

        if policy.assigned_client_id_prefix.is_empty() {
            return Err(ConfigError::Validation(
                "policy.assigned_client_id_prefix must not be empty".into(),
            ));
        }

        if self.limits.max_packet_size == 0 {
            return Err(ConfigError::Validation(
                "limits.max_packet_size must be greater than 0".into(),
            ));
        }

        Ok(())
    }
}
