use core::time::Duration;
use std::fs::{read_to_string, write};

use camino::Utf8Path;
use eyre::{bail, Result as EyreResult, WrapErr};
use serde::{Deserialize, Serialize};
use strand_repair::config::{
    DEFAULT_CHANNEL_CAPACITY, DEFAULT_HASH_DEPTH, DEFAULT_RENDEZVOUS_TIMEOUT_SECS,
    DEFAULT_STREAM_CONCURRENCY, DEFAULT_TREE_MAX_SIZE, DEFAULT_VALIDATION_CONCURRENCY,
};
use strand_repair::AntiEntropyConfig;

pub mod hints;

#[cfg(test)]
mod tests;

pub const CONFIG_FILE: &str = "config.toml";

/// Replicas per row when the file does not say
pub const DEFAULT_REPLICATION_FACTOR: usize = 3;

/// Deepest leaf a tree over a 128-bit ring can have
const MAX_HASH_DEPTH: u8 = 127;

#[derive(Debug, Default, Deserialize, Serialize)]
#[non_exhaustive]
pub struct ConfigFile {
    #[serde(default)]
    pub anti_entropy: AntiEntropySection,

    #[serde(default)]
    pub read: ReadConfig,
}

#[derive(Copy, Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct AntiEntropySection {
    #[serde(rename = "rendezvous_timeout_ms", with = "serde_duration")]
    pub rendezvous_timeout: Duration,
    pub tree_max_size: u64,
    pub hash_depth: u8,
    pub validation_concurrency: usize,
    pub stream_concurrency: usize,
    pub channel_capacity: usize,
}

impl Default for AntiEntropySection {
    fn default() -> Self {
        Self {
            rendezvous_timeout: Duration::from_secs(DEFAULT_RENDEZVOUS_TIMEOUT_SECS),
            tree_max_size: DEFAULT_TREE_MAX_SIZE,
            hash_depth: DEFAULT_HASH_DEPTH,
            validation_concurrency: DEFAULT_VALIDATION_CONCURRENCY,
            stream_concurrency: DEFAULT_STREAM_CONCURRENCY,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl From<AntiEntropySection> for AntiEntropyConfig {
    fn from(section: AntiEntropySection) -> Self {
        Self {
            rendezvous_timeout: section.rendezvous_timeout,
            tree_max_size: section.tree_max_size,
            hash_depth: section.hash_depth,
            validation_concurrency: section.validation_concurrency,
            stream_concurrency: section.stream_concurrency,
            channel_capacity: section.channel_capacity,
        }
    }
}

#[derive(Copy, Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ReadConfig {
    pub replication_factor: usize,
}

impl Default for ReadConfig {
    fn default() -> Self {
        Self {
            replication_factor: DEFAULT_REPLICATION_FACTOR,
        }
    }
}

impl ConfigFile {
    #[must_use]
    pub const fn new(anti_entropy: AntiEntropySection, read: ReadConfig) -> Self {
        Self { anti_entropy, read }
    }

    #[must_use]
    pub fn exists(dir: &Utf8Path) -> bool {
        dir.join(CONFIG_FILE).is_file()
    }

    pub fn load(dir: &Utf8Path) -> EyreResult<Self> {
        let path = dir.join(CONFIG_FILE);
        let content = read_to_string(&path)
            .wrap_err_with(|| format!("failed to read configuration from {path:?}"))?;

        let config: Self = toml::from_str(&content)
            .wrap_err_with(|| format!("failed to parse configuration from {path:?}"))?;

        config.validate()?;

        Ok(config)
    }

    pub fn save(&self, dir: &Utf8Path) -> EyreResult<()> {
        let path = dir.join(CONFIG_FILE);
        let content = toml::to_string_pretty(self)?;

        write(&path, content)
            .wrap_err_with(|| format!("failed to write configuration to {path:?}"))?;

        Ok(())
    }

    /// Only write config file if changes are detected
    pub fn save_if_changed(&self, dir: &Utf8Path) -> EyreResult<bool> {
        let path = dir.join(CONFIG_FILE);
        let new_content = toml::to_string_pretty(self)?;

        let changed = read_to_string(&path).map_or(true, |existing| existing != new_content);

        if changed {
            write(&path, new_content)
                .wrap_err_with(|| format!("failed to write configuration to {path:?}"))?;
        }

        Ok(changed)
    }

    pub fn validate(&self) -> EyreResult<()> {
        let section = &self.anti_entropy;

        if section.rendezvous_timeout.is_zero() {
            bail!("anti_entropy.rendezvous_timeout_ms must be positive");
        }
        if section.tree_max_size == 0 {
            bail!("anti_entropy.tree_max_size must be positive");
        }
        if section.hash_depth > MAX_HASH_DEPTH {
            bail!("anti_entropy.hash_depth must be at most {MAX_HASH_DEPTH}");
        }
        if section.validation_concurrency == 0 || section.stream_concurrency == 0 {
            bail!("anti_entropy concurrency limits must be at least 1");
        }
        if section.channel_capacity == 0 {
            bail!("anti_entropy.channel_capacity must be positive");
        }
        if self.read.replication_factor == 0 {
            bail!("read.replication_factor must be at least 1");
        }

        Ok(())
    }

    /// Get the value for a specific config key
    #[must_use]
    pub fn get_value(&self, key: &str) -> Option<String> {
        let section = &self.anti_entropy;

        match key {
            "anti_entropy.rendezvous_timeout_ms" => {
                Some(section.rendezvous_timeout.as_millis().to_string())
            }
            "anti_entropy.tree_max_size" => Some(section.tree_max_size.to_string()),
            "anti_entropy.hash_depth" => Some(section.hash_depth.to_string()),
            "anti_entropy.validation_concurrency" => {
                Some(section.validation_concurrency.to_string())
            }
            "anti_entropy.stream_concurrency" => Some(section.stream_concurrency.to_string()),
            "anti_entropy.channel_capacity" => Some(section.channel_capacity.to_string()),
            "read.replication_factor" => Some(self.read.replication_factor.to_string()),
            _ => None,
        }
    }
}

mod serde_duration {
    use core::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
