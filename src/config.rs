//! Application settings loaded from environment variables.
//!
//! All settings come from the process environment, with a `.env` file in
//! the working directory consulted for keys the environment does not set.
//! Keys are matched case-sensitively. Loading never writes back to the
//! process environment.

use std::collections::HashMap;
use std::ffi::OsString;
use std::fmt;
use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Name of the fallback file consulted by [`Settings::from_env`].
pub const ENV_FILE: &str = ".env";

/// Every key [`Settings`] reads.
pub const KNOWN_KEYS: &[&str] = &[
    "DATABASE_URL",
    "SECRET_KEY",
    "ALGORITHM",
    "ACCESS_TOKEN_EXPIRE_MINUTES",
    "PROJECT_NAME",
    "VERSION",
    "DATABASE_MAX_CONNECTIONS",
    "DATABASE_MIN_CONNECTIONS",
    "DATABASE_CONNECT_TIMEOUT_SECS",
    "DATABASE_POOL_RECYCLE_SECS",
    "DATABASE_IDLE_TIMEOUT_SECS",
    "DATABASE_POOL_PRE_PING",
    "DATABASE_ECHO",
    "LISTEN_ADDR",
    "REQUEST_TIMEOUT_SECS",
];

/// A string that never shows up in `Debug` or `Display` output.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    /// Wraps a raw secret.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the raw secret.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString(\"[REDACTED]\")")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Snapshot of key/value pairs settings are read from.
///
/// Later layers only fill keys that earlier layers left unset.
#[derive(Debug, Clone, Default)]
pub struct EnvSource {
    vars: HashMap<String, String>,
}

impl EnvSource {
    /// Captures the current process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a recognised key is set to a
    /// value that is not valid Unicode.
    pub fn from_process() -> Result<Self, ConfigError> {
        Self::from_os_pairs(std::env::vars_os())
    }

    /// Builds a source from raw OS strings.
    ///
    /// Unrecognised variables that are not valid Unicode are skipped; a
    /// recognised key with such a value is an error rather than unset, so a
    /// fallback file can never stand in for it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a recognised key whose value is
    /// not valid Unicode.
    pub fn from_os_pairs<I>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        let mut vars = HashMap::new();
        for (key, value) in pairs {
            let Ok(key) = key.into_string() else {
                continue;
            };
            match value.into_string() {
                Ok(value) => {
                    vars.insert(key, value);
                }
                Err(_) => {
                    if let Some(known) = KNOWN_KEYS.iter().copied().find(|k| *k == key) {
                        return Err(ConfigError::Invalid {
                            key: known,
                            reason: "value is not valid UTF-8".to_string(),
                        });
                    }
                    tracing::debug!(key = %key, "skipping non-UTF-8 environment variable");
                }
            }
        }
        Ok(Self { vars })
    }

    /// Builds a source from explicit pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self { vars }
    }

    /// Layers a dotenv-format file underneath the current values.
    ///
    /// Keys already present win over the file. A missing file is not an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EnvFile`] if the file exists but cannot be
    /// read or contains a malformed line.
    pub fn with_fallback_file(mut self, path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let env_file_err = |source| ConfigError::EnvFile {
            path: path.display().to_string(),
            source,
        };

        let iter = match dotenvy::from_path_iter(path) {
            Ok(iter) => iter,
            Err(dotenvy::Error::Io(e)) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no env file, skipping");
                return Ok(self);
            }
            Err(e) => return Err(env_file_err(e)),
        };

        let mut filled = 0usize;
        for item in iter {
            let (key, value) = item.map_err(env_file_err)?;
            if !self.vars.contains_key(&key) {
                self.vars.insert(key, value);
                filled += 1;
            }
        }
        tracing::debug!(path = %path.display(), filled, "loaded env file");
        Ok(self)
    }

    /// Returns the raw value for `key`, if set.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        match self.get(key) {
            Some(v) if !v.trim().is_empty() => Ok(v.to_string()),
            _ => Err(ConfigError::Missing(key)),
        }
    }

    fn string_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or(default).to_string()
    }

    /// Parses `key` as `T`, returning `default` only when the key is unset.
    fn parse_or<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                key,
                reason: format!("{raw:?}: {e}"),
            }),
        }
    }

    /// Parses `key` as a boolean. Accepts `true`/`1`/`yes`/`on` and
    /// `false`/`0`/`no`/`off` in any case.
    fn bool_or(&self, key: &'static str, default: bool) -> Result<bool, ConfigError> {
        let Some(raw) = self.get(key) else {
            return Ok(default);
        };
        match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                key,
                reason: format!("{raw:?} is not a boolean"),
            }),
        }
    }
}

/// Connection pool tuning.
///
/// Durations of `None` disable the corresponding behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    /// Maximum number of open connections.
    pub max_connections: u32,
    /// Connections the pool tries to keep open when idle.
    pub min_connections: u32,
    /// How long `acquire` waits for a free connection before giving up.
    pub acquire_timeout: Duration,
    /// Age after which a connection is closed and replaced.
    pub max_lifetime: Option<Duration>,
    /// Idle time after which a surplus connection is closed.
    pub idle_timeout: Option<Duration>,
    /// Round-trip check on a pooled connection before handing it out.
    pub pre_ping: bool,
    /// Log every SQL statement at INFO.
    pub echo: bool,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 0,
            acquire_timeout: Duration::from_secs(30),
            max_lifetime: Some(Duration::from_secs(3600)),
            idle_timeout: Some(Duration::from_secs(600)),
            pre_ping: true,
            echo: false,
        }
    }
}

impl PoolSettings {
    fn from_source(src: &EnvSource) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let max_connections = src.parse_or("DATABASE_MAX_CONNECTIONS", defaults.max_connections)?;
        if max_connections == 0 {
            return Err(ConfigError::Invalid {
                key: "DATABASE_MAX_CONNECTIONS",
                reason: "must be at least 1".to_string(),
            });
        }
        let min_connections = src.parse_or("DATABASE_MIN_CONNECTIONS", defaults.min_connections)?;
        if min_connections > max_connections {
            return Err(ConfigError::Invalid {
                key: "DATABASE_MIN_CONNECTIONS",
                reason: format!("{min_connections} exceeds DATABASE_MAX_CONNECTIONS ({max_connections})"),
            });
        }

        let acquire_timeout = Duration::from_secs(src.parse_or(
            "DATABASE_CONNECT_TIMEOUT_SECS",
            defaults.acquire_timeout.as_secs(),
        )?);

        Ok(Self {
            max_connections,
            min_connections,
            acquire_timeout,
            max_lifetime: optional_secs(src, "DATABASE_POOL_RECYCLE_SECS", defaults.max_lifetime)?,
            idle_timeout: optional_secs(src, "DATABASE_IDLE_TIMEOUT_SECS", defaults.idle_timeout)?,
            pre_ping: src.bool_or("DATABASE_POOL_PRE_PING", defaults.pre_ping)?,
            echo: src.bool_or("DATABASE_ECHO", defaults.echo)?,
        })
    }
}

/// Reads a seconds value where `0` means "disabled".
fn optional_secs(
    src: &EnvSource,
    key: &'static str,
    default: Option<Duration>,
) -> Result<Option<Duration>, ConfigError> {
    let secs = src.parse_or(key, default.map_or(0, |d| d.as_secs()))?;
    Ok((secs > 0).then(|| Duration::from_secs(secs)))
}

/// Validated application settings.
///
/// Loaded once at startup via [`Settings::from_env`]; a value of this type
/// only exists if every required key was present and every present key
/// parsed.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Connection string for the persistent store (`DATABASE_URL`).
    pub database_url: String,

    /// Token signing key (`SECRET_KEY`).
    pub secret_key: SecretString,

    /// Token signing algorithm (`ALGORITHM`).
    pub algorithm: String,

    /// Access token lifetime in minutes (`ACCESS_TOKEN_EXPIRE_MINUTES`).
    pub access_token_expire_minutes: u64,

    /// Human-readable service name (`PROJECT_NAME`).
    pub project_name: String,

    /// Service version string (`VERSION`).
    pub version: String,

    /// Connection pool tuning.
    pub pool: PoolSettings,

    /// Socket address the HTTP server binds to (`LISTEN_ADDR`).
    pub listen_addr: SocketAddr,

    /// Per-request deadline in seconds (`REQUEST_TIMEOUT_SECS`).
    pub request_timeout_secs: u64,
}

impl Settings {
    /// Default for `ALGORITHM`.
    pub const DEFAULT_ALGORITHM: &'static str = "HS256";
    /// Default for `ACCESS_TOKEN_EXPIRE_MINUTES`.
    pub const DEFAULT_ACCESS_TOKEN_EXPIRE_MINUTES: u64 = 30;
    /// Default for `PROJECT_NAME`.
    pub const DEFAULT_PROJECT_NAME: &'static str = "Habit Gamification API";
    /// Default for `VERSION`.
    pub const DEFAULT_VERSION: &'static str = "1.0.0";
    /// Default for `LISTEN_ADDR`.
    pub const DEFAULT_LISTEN_ADDR: SocketAddr =
        SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8000);
    /// Default for `REQUEST_TIMEOUT_SECS`.
    pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

    /// Loads settings from the process environment, falling back to
    /// [`ENV_FILE`] in the working directory for unset keys.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a required key is missing, a value
    /// fails to parse, or the env file is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let source = EnvSource::from_process()?.with_fallback_file(ENV_FILE)?;
        Self::from_source(&source)
    }

    /// Builds settings from an explicit source.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] for absent or blank required keys
    /// and [`ConfigError::Invalid`] for values that fail to parse.
    pub fn from_source(src: &EnvSource) -> Result<Self, ConfigError> {
        let database_url = src.required("DATABASE_URL")?;
        let secret_key = SecretString::new(src.required("SECRET_KEY")?);

        let listen_addr = src.parse_or("LISTEN_ADDR", Self::DEFAULT_LISTEN_ADDR)?;

        Ok(Self {
            database_url,
            secret_key,
            algorithm: src.string_or("ALGORITHM", Self::DEFAULT_ALGORITHM),
            access_token_expire_minutes: src.parse_or(
                "ACCESS_TOKEN_EXPIRE_MINUTES",
                Self::DEFAULT_ACCESS_TOKEN_EXPIRE_MINUTES,
            )?,
            project_name: src.string_or("PROJECT_NAME", Self::DEFAULT_PROJECT_NAME),
            version: src.string_or("VERSION", Self::DEFAULT_VERSION),
            pool: PoolSettings::from_source(src)?,
            listen_addr,
            request_timeout_secs: src.parse_or(
                "REQUEST_TIMEOUT_SECS",
                Self::DEFAULT_REQUEST_TIMEOUT_SECS,
            )?,
        })
    }

    /// Access token lifetime.
    #[must_use]
    pub fn access_token_ttl(&self) -> Duration {
        Duration::from_secs(self.access_token_expire_minutes.saturating_mul(60))
    }

    /// Per-request deadline.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
