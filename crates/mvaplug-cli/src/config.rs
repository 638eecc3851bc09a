//! Job configuration

use mvaplug_core::DataSetInfo;
use mvaplug_methods::neurobayes::{BackendConfig, METHOD_NAME};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One training job as described in a YAML file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Job name, prefix of every artifact
    #[serde(default = "default_job")]
    pub job: String,

    /// Method title, also the plugin lookup key
    #[serde(default = "default_method")]
    pub method: String,

    /// Option string handed to the method
    #[serde(default)]
    pub options: String,

    /// Input variable expressions, in dataset order
    #[serde(default)]
    pub variables: Vec<String>,

    /// File locations used by the backend
    #[serde(default)]
    pub backend: BackendConfig,
}

fn default_job() -> String {
    "MVAJob".to_string()
}

fn default_method() -> String {
    METHOD_NAME.to_string()
}

impl JobConfig {
    /// Load configuration from file and CLI overrides
    pub fn load(config_path: &str, overrides: &JobOverrides) -> anyhow::Result<Self> {
        let mut config = if Path::new(config_path).exists() {
            let content = std::fs::read_to_string(config_path)?;
            serde_yaml::from_str(&content)?
        } else {
            Self::default()
        };

        if let Some(job) = &overrides.job {
            config.job = job.clone();
        }

        if let Some(options) = &overrides.options {
            config.options = options.clone();
        }

        if !overrides.variables.is_empty() {
            config.variables = overrides.variables.clone();
        }

        if config.variables.is_empty() {
            anyhow::bail!("job '{}' declares no input variables", config.job);
        }

        Ok(config)
    }

    /// Dataset description built from the variable list
    pub fn dataset(&self) -> DataSetInfo {
        DataSetInfo::new(self.job.clone(), self.variables.iter().map(String::as_str))
    }
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            job: default_job(),
            method: default_method(),
            options: String::new(),
            variables: Vec::new(),
            backend: BackendConfig::default(),
        }
    }
}

/// Command line values that take precedence over the file
#[derive(Debug, Clone, Default)]
pub struct JobOverrides {
    pub job: Option<String>,
    pub options: Option<String>,
    pub variables: Vec<String>,
}
