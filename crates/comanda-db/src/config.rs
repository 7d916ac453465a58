//! # Store Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (DbConfig::from_env)                         │
//! │     COMANDA_DB_PATH=/data/kitutes.db                                   │
//! │     COMANDA_BACKEND=auto | native | memory                             │
//! │                                                                         │
//! │  2. Builder calls                                                      │
//! │     DbConfig::new(path).backend(BackendPreference::Native)             │
//! │                                                                         │
//! │  3. Default Values                                                     │
//! │     kitutes.db, BackendPreference::Auto                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use comanda_core::DEFAULT_DB_FILE;

/// Environment variable overriding the database file path.
pub const DB_PATH_ENV: &str = "COMANDA_DB_PATH";

/// Environment variable overriding the backend preference.
pub const BACKEND_ENV: &str = "COMANDA_BACKEND";

// =============================================================================
// Backend Preference
// =============================================================================

/// Which backend the store should try to open.
///
/// ## Selection
/// ```text
/// Auto   ──► open SQLite ──ok──► native
///                 │
///                 └──fails──► warn! + in-memory emulator
///
/// Native ──► open SQLite ──fails──► DbError::BackendUnavailable
///
/// Memory ──► in-memory emulator, SQLite never touched
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendPreference {
    #[default]
    Auto,
    Native,
    Memory,
}

impl fmt::Display for BackendPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BackendPreference::Auto => "auto",
            BackendPreference::Native => "native",
            BackendPreference::Memory => "memory",
        };
        f.write_str(s)
    }
}

impl FromStr for BackendPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(BackendPreference::Auto),
            "native" | "sqlite" => Ok(BackendPreference::Native),
            "memory" | "emulated" => Ok(BackendPreference::Memory),
            other => Err(format!(
                "unknown backend '{}', expected auto, native or memory",
                other
            )),
        }
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Store configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/data/kitutes.db")
///     .backend(BackendPreference::Native)
///     .max_connections(2);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Which backend to open.
    /// Default: Auto (SQLite, emulator on failure)
    pub backend: BackendPreference,

    /// Maximum number of connections in the pool.
    /// Default: 4 (screens refresh independently)
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// Connection acquire timeout.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection. `None` keeps connections
    /// forever, which an in-memory SQLite database requires.
    /// Default: 10 minutes
    pub idle_timeout: Option<Duration>,

    /// Run the schema bootstrap inside `Store::open` instead of on first use.
    /// Default: false
    pub bootstrap_on_open: bool,
}

impl DbConfig {
    /// Creates a configuration for the given database file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            backend: BackendPreference::Auto,
            max_connections: 4,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
            bootstrap_on_open: false,
        }
    }

    /// Native SQLite held entirely in memory (for testing).
    ///
    /// A single connection that never idles out, since every new
    /// connection would see an empty database.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            backend: BackendPreference::Native,
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: None,
            bootstrap_on_open: false,
        }
    }

    /// Forces the in-memory emulator.
    pub fn emulated() -> Self {
        DbConfig::new(DEFAULT_DB_FILE).backend(BackendPreference::Memory)
    }

    /// Default configuration with environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = DbConfig::default();

        if let Ok(path) = std::env::var(DB_PATH_ENV) {
            if !path.trim().is_empty() {
                config.database_path = PathBuf::from(path);
            }
        }

        if let Ok(value) = std::env::var(BACKEND_ENV) {
            match value.parse() {
                Ok(backend) => config.backend = backend,
                Err(e) => warn!(error = %e, "Ignoring {}", BACKEND_ENV),
            }
        }

        config
    }

    /// Sets the backend preference.
    pub fn backend(mut self, backend: BackendPreference) -> Self {
        self.backend = backend;
        self
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets whether `Store::open` bootstraps the schema immediately.
    pub fn bootstrap_on_open(mut self, eager: bool) -> Self {
        self.bootstrap_on_open = eager;
        self
    }

    /// Whether the path names an in-memory SQLite database.
    pub fn is_in_memory_path(&self) -> bool {
        self.database_path.as_os_str() == ":memory:"
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        DbConfig::new(DEFAULT_DB_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = DbConfig::new("/tmp/test.db")
            .max_connections(10)
            .min_connections(2)
            .backend(BackendPreference::Native)
            .bootstrap_on_open(true);

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.backend, BackendPreference::Native);
        assert!(config.bootstrap_on_open);
        assert!(!config.is_in_memory_path());
    }

    #[test]
    fn test_defaults() {
        let config = DbConfig::default();
        assert_eq!(config.database_path, PathBuf::from("kitutes.db"));
        assert_eq!(config.backend, BackendPreference::Auto);

        let memory = DbConfig::in_memory();
        assert!(memory.is_in_memory_path());
        assert_eq!(memory.idle_timeout, None);

        assert_eq!(DbConfig::emulated().backend, BackendPreference::Memory);
    }

    #[test]
    fn test_backend_preference_parsing() {
        assert_eq!("AUTO".parse(), Ok(BackendPreference::Auto));
        assert_eq!("sqlite".parse(), Ok(BackendPreference::Native));
        assert_eq!(" memory ".parse(), Ok(BackendPreference::Memory));
        assert!("postgres".parse::<BackendPreference>().is_err());
        assert_eq!(BackendPreference::Native.to_string(), "native");
    }
}
