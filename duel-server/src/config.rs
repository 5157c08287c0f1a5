use anyhow::{Context, bail};
use duel_core::EngineConfig;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockBackend {
    /// Single instance: in-process mutexes
    Local,
    /// Several instances sharing one Redis
    Redis,
}

impl FromStr for LockBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(LockBackend::Local),
            "redis" => Ok(LockBackend::Redis),
            other => bail!("unknown lock backend '{}', expected 'local' or 'redis'", other),
        }
    }
}

impl fmt::Display for LockBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockBackend::Local => f.write_str("local"),
            LockBackend::Redis => f.write_str("redis"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub words_directory: String,
    pub word_length: usize,
    pub max_attempts: u32,
    pub lock_timeout_ms: u64,
    pub lock_backend: LockBackend,
    pub redis_url: Option<String>,
    pub lock_ttl_ms: u64,
    pub exclusive_row_lock: bool,
    pub dictionary_cache_ttl_seconds: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key/value source; unset keys take their defaults.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self {
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://wordle_duel.db?mode=rwc".to_string()),
            words_directory: lookup("WORDS_DIRECTORY").unwrap_or_else(|| "./words".to_string()),
            word_length: parse_or(&lookup, "WORD_LENGTH", 5)?,
            max_attempts: parse_or(&lookup, "MAX_ATTEMPTS", 6)?,
            lock_timeout_ms: parse_or(&lookup, "LOCK_TIMEOUT_MS", 3000)?,
            lock_backend: parse_or(&lookup, "LOCK_BACKEND", LockBackend::Local)?,
            redis_url: lookup("REDIS_URL").filter(|url| !url.trim().is_empty()),
            lock_ttl_ms: parse_or(&lookup, "LOCK_TTL_MS", 30_000)?,
            exclusive_row_lock: parse_or(&lookup, "EXCLUSIVE_ROW_LOCK", false)?,
            dictionary_cache_ttl_seconds: parse_or(&lookup, "DICTIONARY_CACHE_TTL_SECONDS", 600)?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.word_length == 0 {
            bail!("WORD_LENGTH must be positive");
        }
        if self.max_attempts == 0 {
            bail!("MAX_ATTEMPTS must be positive");
        }
        if self.lock_backend == LockBackend::Redis && self.redis_url.is_none() {
            bail!("LOCK_BACKEND=redis requires REDIS_URL");
        }
        if self.lock_ttl_ms <= self.lock_timeout_ms {
            bail!("LOCK_TTL_MS must be greater than LOCK_TIMEOUT_MS");
        }
        Ok(())
    }

    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            word_length: self.word_length,
            max_attempts: self.max_attempts,
            lock_timeout: Duration::from_millis(self.lock_timeout_ms),
            exclusive_row_lock: self.exclusive_row_lock,
        }
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_millis(self.lock_ttl_ms)
    }

    pub fn dictionary_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.dictionary_cache_ttl_seconds)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("Invalid {}: '{}'", key, raw)),
    }
}
