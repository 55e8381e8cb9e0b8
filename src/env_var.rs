use std::sync::OnceLock;

use serde::Deserialize;

fn default_deadlock_timeout() -> f64 {
    600.0
}

fn default_backend() -> String {
    "local".to_owned()
}

fn default_segment_size() -> usize {
    // bytes of symmetric heap contributed by each unit
    256 * 1024 * 1024
}

fn default_group_id() -> usize {
    0
}

#[derive(Deserialize, Debug)]
pub struct Config {
    /// The comm backend to use
    /// local -- single unit execution (default)
    /// shmem -- multi unit execution within one process group
    #[serde(default = "default_backend")]
    pub backend: String,

    /// This unit's id when attaching to an existing shmem group
    pub unit_id: Option<usize>,

    /// The shmem group to attach to, default: 0
    #[serde(default = "default_group_id")]
    pub group_id: usize,

    /// Bytes of symmetric heap each unit contributes, default: 256MB
    #[serde(default = "default_segment_size")]
    pub segment_size: usize,

    /// Seconds a blocked collective waits before logging a warning, default: 600.0
    #[serde(default = "default_deadlock_timeout")]
    pub deadlock_timeout: f64,
}

/// Get the current environment variable configuration
pub fn config() -> &'static Config {
    static CONFIG: OnceLock<Config> = OnceLock::new();
    CONFIG.get_or_init(|| match envy::prefixed("TESSERA_").from_env::<Config>() {
        Ok(config) => config,
        Err(error) => panic!("{}", error),
    })
}
