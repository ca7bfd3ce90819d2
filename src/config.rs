use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const APP_NAME: &str = "ecs-instance-health";

/// Defaults for flags not given on the command line.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory for per-instance identity caches.
    pub cache_dir: PathBuf,
    /// Seconds between running task checks.
    pub check_interval: u64,
    /// Seconds to wait for tasks to drain; 0 waits forever.
    pub wait_timeout: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("."),
            check_interval: 10,
            wait_timeout: 600,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Ok(confy::load(APP_NAME, Some("config"))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_config_gives_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config: Config = confy::load_path(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());
    }

    #[test]
    fn test_stored_config_is_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let stored = Config {
            cache_dir: PathBuf::from("/var/cache/ecs"),
            check_interval: 5,
            wait_timeout: 0,
        };
        confy::store_path(&path, stored.clone()).unwrap();
        let config: Config = confy::load_path(&path).unwrap();
        assert_eq!(config, stored);
    }
}
