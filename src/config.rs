use anyhow::Result;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::batch::{BatchConfig, DEFAULT_MARKER};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub signing: SigningConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub work_root: PathBuf,
    pub job_retention_secs: u64,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SigningConfig {
    pub marker: String,
    pub offset: i64,
    pub width_in: f64,
    pub height_in: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub log_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            server: ServerConfig {
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8002".to_string())
                    .parse()?,
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                cors_allowed_origins: env::var("ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| "*".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                max_upload_bytes: env::var("MAX_UPLOAD_BYTES")
                    .unwrap_or_else(|_| "104857600".to_string())
                    .parse()?,
            },
            storage: StorageConfig {
                work_root: env::var("WORK_ROOT")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("./jobs")),
                job_retention_secs: env::var("JOB_RETENTION_SECS")
                    .unwrap_or_else(|_| "3600".to_string())
                    .parse()?,
                sweep_interval_secs: env::var("SWEEP_INTERVAL_SECS")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse()?,
            },
            signing: SigningConfig {
                marker: env::var("SIGNATURE_MARKER").unwrap_or_else(|_| DEFAULT_MARKER.to_string()),
                offset: env::var("SIGNATURE_OFFSET")
                    .unwrap_or_else(|_| "-1".to_string())
                    .parse()?,
                width_in: env::var("SIGNATURE_WIDTH_IN")
                    .unwrap_or_else(|_| "0.5".to_string())
                    .parse()?,
                height_in: env::var("SIGNATURE_HEIGHT_IN")
                    .unwrap_or_else(|_| "0.5".to_string())
                    .parse()?,
            },
            logging: LoggingConfig {
                log_dir: env::var("LOG_DIR").ok().map(PathBuf::from),
            },
        })
    }

    /// Config rooted at `work_root` with every other value at its default.
    pub fn with_work_root(work_root: impl Into<PathBuf>) -> Self {
        Self {
            server: ServerConfig {
                port: 8002,
                host: "0.0.0.0".to_string(),
                cors_allowed_origins: vec!["*".to_string()],
                max_upload_bytes: 104_857_600,
            },
            storage: StorageConfig {
                work_root: work_root.into(),
                job_retention_secs: 3600,
                sweep_interval_secs: 300,
            },
            signing: SigningConfig {
                marker: DEFAULT_MARKER.to_string(),
                offset: -1,
                width_in: 0.5,
                height_in: 0.5,
            },
            logging: LoggingConfig { log_dir: None },
        }
    }
}

impl StorageConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.job_retention_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

impl SigningConfig {
    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            marker: self.marker.clone(),
            offset: self.offset,
            width_in: self.width_in,
            height_in: self.height_in,
        }
    }
}
