use caseforge_core::{PipelineConfig, RetryPolicy, RunSlotPolicy};
use config::{Config, ConfigError, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub pipeline: Option<PipelineSettings>,
    pub cors: Option<CorsConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LlmConfig {
    pub model: String,
    pub gemini_api_key: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct PipelineSettings {
    pub max_upload_mb: Option<u64>,
    pub storage_attempts: Option<u32>,
    pub generation_attempts: Option<u32>,
    /// When set, concurrent runs queue up to this depth instead of
    /// being rejected
    pub run_queue_depth: Option<usize>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                path: get_default_db_path(),
            },
            llm: LlmConfig {
                model: "gemini-1.5-pro".to_string(),
                gemini_api_key: None,
            },
            pipeline: None,
            cors: Some(CorsConfig {
                allowed_origins: vec!["http://localhost:3000".to_string()],
            }),
        }
    }
}

impl ApiConfig {
    /// Load the config file, creating it with defaults on first run
    pub fn load() -> Result<(Self, PathBuf), ConfigError> {
        let config_path = get_config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::Message(format!("Failed to create config directory: {e}"))
            })?;
        }

        if !config_path.exists() {
            let default_config = format!(
                r#"[server]
host = "127.0.0.1"
port = 8080

[database]
path = "{}"

[llm]
model = "gemini-1.5-pro"
# gemini_api_key = "..."

[pipeline]
# max_upload_mb = 5
# storage_attempts = 3
# generation_attempts = 3
# run_queue_depth = 4

[cors]
allowed_origins = ["http://localhost:3000"]
"#,
                get_default_db_path().display()
            );
            std::fs::write(&config_path, default_config).map_err(|e| {
                ConfigError::Message(format!("Failed to write default config: {e}"))
            })?;
            tracing::info!(path = %config_path.display(), "Created default config file");
        }

        let settings = Config::builder()
            .add_source(File::from(config_path.clone()))
            .build()?;
        let api_config: ApiConfig = settings.try_deserialize()?;

        Ok((api_config, config_path))
    }

    /// Derive the core pipeline config from the file settings
    pub fn pipeline_config(&self) -> PipelineConfig {
        let mut config = PipelineConfig {
            model: self.llm.model.clone(),
            ..Default::default()
        };

        if let Some(settings) = &self.pipeline {
            if let Some(mb) = settings.max_upload_mb {
                config.max_upload_bytes = mb * 1024 * 1024;
            }
            if let Some(attempts) = settings.storage_attempts {
                config.storage_retry = RetryPolicy {
                    max_attempts: attempts,
                    ..config.storage_retry
                };
            }
            if let Some(attempts) = settings.generation_attempts {
                config.generation_retry = RetryPolicy {
                    max_attempts: attempts,
                    ..config.generation_retry
                };
            }
            if let Some(depth) = settings.run_queue_depth {
                config.run_slot_policy = RunSlotPolicy::Queue { depth };
            }
        }

        config
    }
}

fn get_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("caseforge")
        .join("api.toml")
}

fn get_default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("caseforge")
        .join("caseforge.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_config_overrides() {
        let api_config = ApiConfig {
            pipeline: Some(PipelineSettings {
                max_upload_mb: Some(2),
                storage_attempts: Some(5),
                generation_attempts: None,
                run_queue_depth: Some(3),
            }),
            ..Default::default()
        };

        let pipeline = api_config.pipeline_config();
        assert_eq!(pipeline.max_upload_bytes, 2 * 1024 * 1024);
        assert_eq!(pipeline.storage_retry.max_attempts, 5);
        assert_eq!(pipeline.generation_retry.max_attempts, 3);
        assert_eq!(pipeline.run_slot_policy, RunSlotPolicy::Queue { depth: 3 });
    }
}
