//! Driver configuration
//!
//! Values come from built-in defaults, optionally overridden by a TOML file
//! and then by environment variables.
//!
//! # Environment variables
//!
//! - `OBJFILE_SCHEME`: URI scheme accepted by the driver. Default: `gs`.
//! - `OBJFILE_BUCKET_NAME`: bucket used when a URI leaves the bucket empty
//!   (`gs:///path/file.txt`). Default: unset.
//! - `OBJFILE_LOGLEVEL`: `info`, `debug` or `trace`. Default: `info`.
//! - `OBJFILE_BUFFER_SIZE`: preferred I/O buffer size, accepts `K`/`M`/`G`
//!   suffixes. Default: 4 MiB.

use crate::error::{Result, VfsError};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

pub const DEFAULT_SCHEME: &str = "gs";
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_BUFFER_SIZE: usize = 4 * 1024 * 1024; // 4 MiB

pub const ENV_SCHEME: &str = "OBJFILE_SCHEME";
pub const ENV_BUCKET_NAME: &str = "OBJFILE_BUCKET_NAME";
pub const ENV_LOG_LEVEL: &str = "OBJFILE_LOGLEVEL";
pub const ENV_BUFFER_SIZE: &str = "OBJFILE_BUFFER_SIZE";

/// Driver settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriverConfig {
    /// URI scheme, without `://`
    pub scheme: String,
    /// Bucket substituted for an empty bucket segment
    pub default_bucket: Option<String>,
    /// Log verbosity used when `RUST_LOG` is not set
    pub log_level: String,
    /// Buffer size for whole-file copies
    pub preferred_buffer_size: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            scheme: DEFAULT_SCHEME.to_string(),
            default_bucket: None,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            preferred_buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl DriverConfig {
    /// Defaults overridden by environment variables
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    /// Parse a TOML document; missing keys keep their defaults
    ///
    /// # Examples
    /// ```
    /// use objfile::DriverConfig;
    ///
    /// let config = DriverConfig::from_toml_str(r#"
    ///     scheme = "store"
    ///     default_bucket = "exports"
    /// "#).unwrap();
    /// assert_eq!(config.scheme, "store");
    /// assert_eq!(config.default_bucket.as_deref(), Some("exports"));
    /// assert_eq!(config.preferred_buffer_size, 4 * 1024 * 1024);
    /// ```
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: DriverConfig = toml::from_str(s).map_err(|e| VfsError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            VfsError::Config(format!("cannot read {:?}: {}", path.as_ref(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Apply every non-empty `OBJFILE_*` environment variable
    ///
    /// The result is validated like a TOML document.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(scheme) = env_or_default(ENV_SCHEME) {
            self.scheme = scheme;
        }
        if let Some(bucket) = env_or_default(ENV_BUCKET_NAME) {
            self.default_bucket = Some(bucket);
        }
        if let Some(level) = env_or_default(ENV_LOG_LEVEL) {
            self.log_level = level;
        }
        if let Some(size) = env_or_default(ENV_BUFFER_SIZE) {
            match parse_byte_size(&size) {
                Ok(n) if n > 0 => self.preferred_buffer_size = n,
                _ => debug!("Ignoring invalid {}={}", ENV_BUFFER_SIZE, size),
            }
        }
        self.validate()?;
        Ok(self)
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn with_default_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.default_bucket = Some(bucket.into());
        self
    }

    /// Set the copy buffer size, at least one byte
    pub fn with_buffer_size(mut self, bytes: usize) -> Self {
        self.preferred_buffer_size = bytes.max(1);
        self
    }

    /// Check values that may have been set field by field
    pub fn validate(&self) -> Result<()> {
        if self.scheme.is_empty() || self.scheme.contains(':') || self.scheme.contains('/') {
            return Err(VfsError::Config(format!("invalid scheme '{}'", self.scheme)));
        }
        if self.preferred_buffer_size == 0 {
            return Err(VfsError::Config(
                "preferred_buffer_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Non-empty value of `name`, logging the fallback when unset
fn env_or_default(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => {
            if is_secret(name) {
                debug!("{} set to **REDACTED**", name);
            } else {
                debug!("{} set to '{}'", name, value);
            }
            Some(value)
        }
        _ => {
            debug!("No {} specified, using default", name);
            None
        }
    }
}

/// Variable names whose values must not be logged
fn is_secret(name: &str) -> bool {
    let lower = name.to_lowercase();
    ["token", "password", "key", "secret"]
        .iter()
        .any(|needle| lower.contains(needle))
}

/// Parse a byte size string. Supports plain integers and suffixes:
/// `K`/`KB`, `M`/`MB`, `G`/`GB` (case-insensitive).
fn parse_byte_size(s: &str) -> std::result::Result<usize, ()> {
    let s = s.trim();
    let upper = s.to_ascii_uppercase();
    let suffixes: [(&str, usize); 6] = [
        ("GB", 1 << 30),
        ("G", 1 << 30),
        ("MB", 1 << 20),
        ("M", 1 << 20),
        ("KB", 1 << 10),
        ("K", 1 << 10),
    ];
    let (num_str, multiplier) = suffixes
        .iter()
        .find_map(|(suffix, mult)| {
            upper
                .strip_suffix(suffix)
                .map(|n| (n.trim().to_string(), *mult))
        })
        .unwrap_or((upper.clone(), 1));
    num_str
        .parse::<usize>()
        .map_err(|_| ())?
        .checked_mul(multiplier)
        .ok_or(())
}
