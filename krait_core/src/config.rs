use crate::client;
use crate::driver;
use crate::store;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct TargetSettings {
    #[serde(default = "default_target_address")]
    pub address: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

pub fn default_target_address() -> String {
    client::DEFAULT_TARGET.to_string()
}

fn default_endpoint() -> String {
    client::DEFAULT_ENDPOINT.to_string()
}

fn default_timeout_ms() -> u64 {
    client::DEFAULT_TIMEOUT_MS
}

impl TargetSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for TargetSettings {
    fn default() -> Self {
        Self {
            address: default_target_address(),
            endpoint: default_endpoint(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct CampaignConfig {
    #[serde(default = "default_iterations")]
    pub iterations: u64,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default)]
    pub rng_seed: u64,
}

pub fn default_iterations() -> u64 {
    driver::DEFAULT_ITERATIONS
}

fn default_delay_ms() -> u64 {
    driver::DEFAULT_DELAY_MS
}

fn default_workers() -> usize {
    1
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            delay_ms: default_delay_ms(),
            workers: default_workers(),
            rng_seed: 0,
        }
    }
}

impl CampaignConfig {
    pub fn to_settings(&self) -> driver::CampaignSettings {
        driver::CampaignSettings {
            iterations: self.iterations,
            delay: Duration::from_millis(self.delay_ms),
            workers: self.workers,
            rng_seed: self.rng_seed,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct MutationConfig {
    #[serde(default = "default_trigger_rate")]
    pub trigger_rate: f64,
    #[serde(default = "default_trigger_token")]
    pub trigger_token: String,
}

fn default_trigger_rate() -> f64 {
    0.02
}

fn default_trigger_token() -> String {
    "CRASH".to_string()
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            trigger_rate: default_trigger_rate(),
            trigger_token: default_trigger_token(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct CorpusConfig {
    /// Inline seed strings; the built-in demo corpus when absent and no
    /// seed paths are given.
    #[serde(default)]
    pub seeds: Vec<String>,
    #[serde(default)]
    pub seed_paths: Vec<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    #[serde(default = "default_crash_log")]
    pub crash_log: PathBuf,
    #[serde(default = "default_minimized_log")]
    pub minimized_log: PathBuf,
    #[serde(default = "default_reproducer_slot")]
    pub reproducer_slot: PathBuf,
}

fn default_crash_log() -> PathBuf {
    PathBuf::from(store::DEFAULT_CRASH_LOG)
}

fn default_minimized_log() -> PathBuf {
    PathBuf::from(store::DEFAULT_MINIMIZED_LOG)
}

fn default_reproducer_slot() -> PathBuf {
    PathBuf::from(store::DEFAULT_REPRODUCER_SLOT)
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            crash_log: default_crash_log(),
            minimized_log: default_minimized_log(),
            reproducer_slot: default_reproducer_slot(),
        }
    }
}

/// Root configuration, loadable from TOML. Every section and field is
/// optional; absent values fall back to the demo defaults.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct KraitConfig {
    #[serde(default)]
    pub target: TargetSettings,
    #[serde(default)]
    pub campaign: CampaignConfig,
    #[serde(default)]
    pub mutation: MutationConfig,
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

impl KraitConfig {
    pub fn load_from_file(path: &PathBuf) -> Result<Self, anyhow::Error> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file at {:?}: {}", path, e))?;

        let config: KraitConfig = toml::from_str(&content).map_err(|e| {
            anyhow::anyhow!("Failed to parse TOML from config file {:?}: {}", path, e)
        })?;

        Ok(config)
    }

    /// Effective seed list: inline seeds if any were configured, otherwise
    /// the demo corpus. Seed paths are loaded on top by the caller.
    pub fn inline_seeds(&self) -> Vec<String> {
        if self.corpus.seeds.is_empty() && self.corpus.seed_paths.is_empty() {
            crate::corpus::SeedCorpus::default_seeds()
        } else {
            self.corpus.seeds.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_demo_target() {
        let config = KraitConfig::default();
        assert_eq!(config.target.address, "http://127.0.0.1:8000");
        assert_eq!(config.target.endpoint, "/echo");
        assert_eq!(config.campaign.iterations, 2000);
        assert_eq!(config.campaign.delay_ms, 10);
        assert_eq!(config.campaign.workers, 1);
        assert_eq!(config.mutation.trigger_rate, 0.02);
        assert_eq!(config.mutation.trigger_token, "CRASH");
        assert_eq!(config.store.crash_log, PathBuf::from("fuzz/crash_cases.txt"));
    }

    #[test]
    fn partial_toml_overrides_only_named_fields() {
        let toml_text = r#"
            [campaign]
            iterations = 50
            workers = 4

            [mutation]
            trigger-rate = 0.0

            [store]
            crash-log = "out/crashes.tsv"
        "#;
        let config: KraitConfig = toml::from_str(toml_text).unwrap();
        assert_eq!(config.campaign.iterations, 50);
        assert_eq!(config.campaign.workers, 4);
        assert_eq!(config.campaign.delay_ms, 10, "Unnamed fields keep defaults");
        assert_eq!(config.mutation.trigger_rate, 0.0);
        assert_eq!(config.mutation.trigger_token, "CRASH");
        assert_eq!(config.store.crash_log, PathBuf::from("out/crashes.tsv"));
        assert_eq!(
            config.store.minimized_log,
            PathBuf::from("fuzz/minimized_cases.txt")
        );
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let toml_text = r#"
            [campaign]
            iterations = 50
            retries = 3
        "#;
        assert!(toml::from_str::<KraitConfig>(toml_text).is_err());
    }

    #[test]
    fn inline_seeds_fall_back_to_demo_corpus() {
        let config = KraitConfig::default();
        assert_eq!(config.inline_seeds().len(), 4);

        let with_seeds: KraitConfig = toml::from_str(
            r#"
            [corpus]
            seeds = ["only-this"]
        "#,
        )
        .unwrap();
        assert_eq!(with_seeds.inline_seeds(), vec!["only-this".to_string()]);
    }

    #[test]
    fn campaign_config_converts_to_settings() {
        let config: KraitConfig = toml::from_str(
            r#"
            [campaign]
            iterations = 7
            delay-ms = 0
            workers = 2
            rng-seed = 42
        "#,
        )
        .unwrap();
        let settings = config.campaign.to_settings();
        assert_eq!(settings.iterations, 7);
        assert_eq!(settings.delay, Duration::ZERO);
        assert_eq!(settings.workers, 2);
        assert_eq!(settings.rng_seed, 42);
    }
}
