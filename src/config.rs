//! Config file loading
//!
//! Values come from a TOML file (all keys optional) and are then overridden
//! by command line flags.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use kubeconsole_logs::{
    BufferConfig, BufferType, DEFAULT_CHUNK_SIZE, DEFAULT_EVENT_BUDGET_BYTES,
    DEFAULT_LOG_BUDGET_BYTES, DEFAULT_MAX_FAILURES, DEFAULT_NOTIFY_INTERVAL,
    DEFAULT_POLL_INTERVAL, PollerConfig,
};

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "KUBECONSOLE_CONFIG";

/// Lines requested on the first log fetch
pub const DEFAULT_TAIL_LINES: i64 = 500;

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub buffer: BufferSection,
    pub poll: PollSection,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct BufferSection {
    pub log_bytes: usize,
    pub event_bytes: usize,
    pub chunk_size: usize,
    pub notify_interval_ms: u64,
}

impl Default for BufferSection {
    fn default() -> Self {
        Self {
            log_bytes: DEFAULT_LOG_BUDGET_BYTES,
            event_bytes: DEFAULT_EVENT_BUDGET_BYTES,
            chunk_size: DEFAULT_CHUNK_SIZE,
            notify_interval_ms: DEFAULT_NOTIFY_INTERVAL.as_millis() as u64,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct PollSection {
    pub interval_ms: u64,
    pub max_failures: u32,
    pub tail_lines: i64,
}

impl Default for PollSection {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            max_failures: DEFAULT_MAX_FAILURES,
            tail_lines: DEFAULT_TAIL_LINES,
        }
    }
}

/// Command line values that take precedence over the file
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub interval_ms: Option<u64>,
    pub max_failures: Option<u32>,
    pub buffer_bytes: Option<usize>,
    pub chunk_size: Option<usize>,
    pub tail_lines: Option<i64>,
}

/// Config file to read: the flag wins over the environment
pub fn resolve_path(flag: Option<PathBuf>, env: Option<OsString>) -> Option<PathBuf> {
    flag.or_else(|| env.filter(|v| !v.is_empty()).map(PathBuf::from))
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("Invalid config file")
    }

    /// Read the config file, or use defaults when no file is named
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("In {}", path.display()))
    }

    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(interval_ms) = overrides.interval_ms {
            self.poll.interval_ms = interval_ms;
        }
        if let Some(max_failures) = overrides.max_failures {
            self.poll.max_failures = max_failures;
        }
        if let Some(tail_lines) = overrides.tail_lines {
            self.poll.tail_lines = tail_lines;
        }
        if let Some(buffer_bytes) = overrides.buffer_bytes {
            self.buffer.log_bytes = buffer_bytes;
        }
        if let Some(chunk_size) = overrides.chunk_size {
            self.buffer.chunk_size = chunk_size;
        }
    }

    pub fn log_buffer(&self) -> BufferConfig {
        self.buffer_config(BufferType::Logs, self.buffer.log_bytes)
    }

    pub fn event_buffer(&self) -> BufferConfig {
        self.buffer_config(BufferType::Events, self.buffer.event_bytes)
    }

    fn buffer_config(&self, buffer_type: BufferType, max_bytes: usize) -> BufferConfig {
        BufferConfig {
            max_buffer_size_bytes: max_bytes,
            chunk_size: self.buffer.chunk_size,
            buffer_type,
            notify_interval: Duration::from_millis(self.buffer.notify_interval_ms),
        }
    }

    pub fn poller(&self) -> PollerConfig {
        PollerConfig {
            // A zero interval would spin the tokio ticker
            interval: Duration::from_millis(self.poll.interval_ms.max(1)),
            max_consecutive_failures: self.poll.max_failures.max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.log_buffer().max_buffer_size_bytes, DEFAULT_LOG_BUDGET_BYTES);
        assert_eq!(config.event_buffer().buffer_type, BufferType::Events);
        assert_eq!(config.poller().interval, DEFAULT_POLL_INTERVAL);
    }

    #[test]
    fn test_partial_file() {
        let config = Config::from_toml(
            r#"
            [buffer]
            log_bytes = 65536

            [poll]
            interval_ms = 2000
            "#,
        )
        .unwrap();

        assert_eq!(config.buffer.log_bytes, 65536);
        assert_eq!(config.buffer.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.poll.interval_ms, 2000);
        assert_eq!(config.poll.max_failures, DEFAULT_MAX_FAILURES);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        assert!(Config::from_toml("[buffer]\nlog_size = 1\n").is_err());
    }

    #[test]
    fn test_flags_override_file() {
        let mut config = Config::from_toml("[poll]\ninterval_ms = 2000\nmax_failures = 9\n").unwrap();
        config.apply_overrides(&Overrides {
            interval_ms: Some(250),
            buffer_bytes: Some(1024),
            chunk_size: Some(10),
            ..Default::default()
        });

        assert_eq!(config.poll.interval_ms, 250);
        assert_eq!(config.poll.max_failures, 9);
        assert_eq!(config.log_buffer().max_buffer_size_bytes, 1024);
        assert_eq!(config.log_buffer().chunk_size, 10);
        // Events keep their own budget
        assert_eq!(config.event_buffer().max_buffer_size_bytes, DEFAULT_EVENT_BUDGET_BYTES);
    }

    #[test]
    fn test_poller_never_spins() {
        let mut config = Config::default();
        config.poll.interval_ms = 0;
        config.poll.max_failures = 0;
        let poller = config.poller();
        assert_eq!(poller.interval, Duration::from_millis(1));
        assert_eq!(poller.max_consecutive_failures, 1);
    }

    #[test]
    fn test_resolve_path() {
        let flag = Some(PathBuf::from("/etc/kc.toml"));
        let env = Some(OsString::from("/home/me/kc.toml"));

        assert_eq!(resolve_path(flag.clone(), env.clone()), flag);
        assert_eq!(resolve_path(None, env), Some(PathBuf::from("/home/me/kc.toml")));
        assert_eq!(resolve_path(None, Some(OsString::new())), None);
        assert_eq!(resolve_path(None, None), None);
    }

    #[test]
    fn test_load() {
        assert_eq!(Config::load(None).unwrap(), Config::default());

        let path = std::env::temp_dir().join(format!("kubeconsole-{}.toml", std::process::id()));
        std::fs::write(&path, "[buffer]\nchunk_size = 64\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.buffer.chunk_size, 64);

        let err = Config::load(Some(&path)).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to read config file"));
    }
}
