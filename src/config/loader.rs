use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use super::AppConfig;

pub const DEFAULT_CONFIG_PATHS: &[&str] = &["solana-swap.yaml", "config/solana-swap.yaml"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置 {path} 失败: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("解析配置 {path} 失败: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("环境变量 {key} 非法: {message}")]
    Env { key: String, message: String },
    #[error("配置非法: {0}")]
    Invalid(String),
}

/// 依次尝试显式路径或默认路径，都不存在时使用默认配置；最后叠加进程环境变量。
pub fn load_config(path: Option<PathBuf>) -> Result<AppConfig, ConfigError> {
    let mut config = load_config_file(path)?;
    config.apply_env_overrides(|key| std::env::var(key).ok())?;
    Ok(config)
}

pub fn load_config_file(path: Option<PathBuf>) -> Result<AppConfig, ConfigError> {
    let explicit = path.is_some();
    let candidate_paths = match path {
        Some(p) => vec![p],
        None => DEFAULT_CONFIG_PATHS.iter().map(PathBuf::from).collect(),
    };

    for candidate in candidate_paths {
        if let Some(config) = try_load_file(&candidate)? {
            info!(target: "config", path = %candidate.display(), "已加载配置文件");
            return Ok(config);
        }
        if explicit {
            return Err(ConfigError::Io {
                path: candidate,
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "配置文件不存在"),
            });
        }
    }

    debug!(target: "config", "未找到配置文件，使用默认配置");
    Ok(AppConfig::default())
}

fn try_load_file(path: &Path) -> Result<Option<AppConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if contents.trim().is_empty() {
        return Ok(Some(AppConfig::default()));
    }

    let config: AppConfig = serde_yaml::from_str(&contents).map_err(|err| ConfigError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;

    Ok(Some(config))
}
