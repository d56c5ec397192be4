use crate::core::errors::ConfigError;
use crate::utils::upload::MAX_FILE_SIZE;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub log_level: Level,
    /// Upper bound on a whole request body; must leave room for a 10 MiB image
    pub max_request_body_bytes: usize,
}

/// Upload storage configuration
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Scratch directory where batch uploads are written
    pub upload_dir: PathBuf,
}

/// Segmentation model configuration
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub model_path: String,
    /// Square input resolution the model expects (320 for u2net)
    pub input_size: u32,
    pub inference_backend: Option<String>,
    /// Number of ONNX sessions kept in the pool
    pub onnx_pool_size: usize,
}

/// Request processing configuration
#[derive(Debug, Clone)]
pub struct ProcessingConfig {
    /// Caller-side bound on a single removal; `None` waits indefinitely
    pub timeout: Option<Duration>,
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub upload: UploadConfig,
    pub model: ModelConfig,
    pub processing: ProcessingConfig,
}

impl Config {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let config = Self::load_from_env();
        config.validate()?;
        Ok(config)
    }

    fn load_from_env() -> Self {
        let log_level = env::var("LOG_LEVEL")
            .ok()
            .and_then(|s| parse_level(&s))
            .unwrap_or(Level::INFO);

        let timeout_secs: u64 = env::var("PROCESSING_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(120);

        Self {
            server: ServerConfig {
                port: env::var("SERVER_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5000),
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                log_level,
                max_request_body_bytes: env::var("MAX_REQUEST_BODY_BYTES")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(200 * 1024 * 1024),
            },
            upload: UploadConfig {
                upload_dir: env::var("UPLOAD_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("/tmp/uploads")),
            },
            model: ModelConfig {
                model_path: env::var("MODEL_PATH")
                    .unwrap_or_else(|_| "models/u2net.onnx".to_string()),
                input_size: env::var("MODEL_INPUT_SIZE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(320),
                inference_backend: env::var("INFERENCE_BACKEND")
                    .ok()
                    .map(|s| s.trim().to_lowercase())
                    .filter(|s| !s.is_empty() && s != "auto"),
                onnx_pool_size: env::var("ONNX_POOL_SIZE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(|| {
                        // Each u2net session holds ~170 MB, so stay small by default
                        (num_cpus::get() / 2).clamp(1, 4)
                    }),
            },
            processing: ProcessingConfig {
                timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
            },
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.max_request_body_bytes < MAX_FILE_SIZE {
            return Err(ConfigError::InvalidServerConfig(format!(
                "max_request_body_bytes must be at least {} bytes, got {}",
                MAX_FILE_SIZE, self.server.max_request_body_bytes
            )));
        }

        if !(64..=2048).contains(&self.model.input_size) {
            return Err(ConfigError::InvalidModelConfig(format!(
                "input_size must be between 64 and 2048, got {}",
                self.model.input_size
            )));
        }

        if self.model.model_path.trim().is_empty() {
            return Err(ConfigError::InvalidModelConfig(
                "model_path must not be empty".to_string(),
            ));
        }

        if self.model.onnx_pool_size == 0 {
            return Err(ConfigError::InvalidPoolSize(self.model.onnx_pool_size));
        }

        if self.upload.upload_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidUploadDir(
                "upload_dir must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn server_port(&self) -> u16 {
        self.server.port
    }

    pub fn server_host(&self) -> &str {
        &self.server.host
    }

    pub fn log_level(&self) -> Level {
        self.server.log_level
    }

    pub fn upload_dir(&self) -> &std::path::Path {
        &self.upload.upload_dir
    }

    pub fn model_path(&self) -> &str {
        &self.model.model_path
    }

    pub fn input_size(&self) -> u32 {
        self.model.input_size
    }

    pub fn onnx_pool_size(&self) -> usize {
        self.model.onnx_pool_size
    }

    pub fn processing_timeout(&self) -> Option<Duration> {
        self.processing.timeout
    }
}

fn parse_level(s: &str) -> Option<Level> {
    match s.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

// Note: No Default implementation because Config::new() can fail
// Users should explicitly call Config::new()? and handle errors

#[cfg(test)]
pub(crate) fn test_config(upload_dir: impl Into<PathBuf>) -> Config {
    Config {
        server: ServerConfig {
            port: 0,
            host: "127.0.0.1".to_string(),
            log_level: Level::INFO,
            max_request_body_bytes: 64 * 1024 * 1024,
        },
        upload: UploadConfig {
            upload_dir: upload_dir.into(),
        },
        model: ModelConfig {
            model_path: "models/u2net.onnx".to_string(),
            input_size: 320,
            inference_backend: None,
            onnx_pool_size: 1,
        },
        processing: ProcessingConfig {
            timeout: Some(Duration::from_secs(5)),
        },
    }
}
