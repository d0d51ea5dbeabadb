use serde::{Deserialize, Serialize};

use crate::{resolution::Resolution, storage::StorageConfig};

const DEFAULT_DECIMAL_PRECISION: u32 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TabsConfig {
    /// Decimal places kept when rounding `completion_rate`.
    #[serde(default = "default_decimal_precision")]
    pub decimal_precision: u32,
    /// Resolutions every start/completion is recorded under.
    #[serde(default = "default_resolutions")]
    pub resolutions: Vec<Resolution>,
    #[serde(default)]
    pub storage: StorageConfig,
}

fn default_decimal_precision() -> u32 {
    DEFAULT_DECIMAL_PRECISION
}

fn default_resolutions() -> Vec<Resolution> {
    Resolution::ALL.to_vec()
}

impl Default for TabsConfig {
    fn default() -> Self {
        Self {
            decimal_precision: DEFAULT_DECIMAL_PRECISION,
            resolutions: default_resolutions(),
            storage: StorageConfig::default(),
        }
    }
}

impl TabsConfig {
    /// Loads config from YAML string
    pub fn from_yaml(yaml_content: &str) -> anyhow::Result<Self> {
        let mut config: Self = serde_yaml::from_str(yaml_content)?;
        if config.resolutions.is_empty() {
            anyhow::bail!("at least one resolution must be configured");
        }
        config.resolutions.sort_unstable();
        config.resolutions.dedup();
        Ok(config)
    }

    /// Loads config from file, or returns default if file doesn't exist
    pub fn from_file_or_default(path: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(yaml_content) => {
                tracing::info!("Loading tabs config from {}", path);
                Self::from_yaml(&yaml_content)
            }
            Err(_) => {
                tracing::info!("No {} found, using default config", path);
                Ok(Self::default())
            }
        }
    }
}
