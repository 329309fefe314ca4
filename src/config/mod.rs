//! 桥接配置模块
//!
//! - 配置文件加载和解析（TOML）
//! - 候选路径回退，全部失败时使用默认配置
//! - 环境变量覆盖

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use tracing::warn;

use crate::identity::DEFAULT_FILE_PREFIX;

mod manager;
pub use manager::ConfigManager;

/// 全局配置实例，使用 OnceLock 确保只初始化一次
static BRIDGE_CONFIG: OnceLock<BridgeConfig> = OnceLock::new();

/// 未显式指定路径时依次尝试的配置文件
pub const DEFAULT_CONFIG_CANDIDATES: [&str; 2] = ["config.toml", "config/bridge.toml"];

/// 桥接整体配置
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct BridgeConfig {
    pub identity: IdentityConfig,
    pub webhook: WebhookConfig,
    pub logging: LoggingConfig,
}

/// 身份映射目录配置
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct IdentityConfig {
    /// 认证目录（存放映射文件）
    pub auth_dir: PathBuf,
    /// 映射文件名前缀
    pub file_prefix: String,
    /// 轮询间隔（毫秒）
    pub watch_interval_ms: u64,
    /// 是否监听目录变化
    pub watch: bool,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            auth_dir: PathBuf::from("auth_info"),
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
            watch_interval_ms: 1_000,
            watch: true,
        }
    }
}

/// WebHook 投递配置
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct WebhookConfig {
    pub url: Option<String>,
    /// HMAC-SHA256 签名密钥
    pub secret: Option<String>,
    pub timeout_ms: u64,
    /// 附加请求头
    pub headers: HashMap<String, String>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: None,
            secret: None,
            timeout_ms: 5_000,
            headers: HashMap::new(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别（trace/debug/info/warn/error）
    pub level: String,
    pub with_target: bool,
    pub with_thread_ids: bool,
    pub with_file: bool,
    pub with_line_number: bool,
    /// 输出 JSON 格式
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            with_target: true,
            with_thread_ids: false,
            with_file: false,
            with_line_number: false,
            json: false,
        }
    }
}

/// 加载配置（进程内只加载一次）
pub fn load_config(path: Option<&str>) -> &'static BridgeConfig {
    BRIDGE_CONFIG.get_or_init(|| {
        let mut cfg = load_with_fallback(&config_candidates(path));
        ConfigManager::apply_process_env(&mut cfg);
        cfg
    })
}

/// 获取已加载的配置
pub fn bridge_config() -> Option<&'static BridgeConfig> {
    BRIDGE_CONFIG.get()
}

fn config_candidates(path: Option<&str>) -> Vec<PathBuf> {
    match path {
        Some(p) => vec![PathBuf::from(p)],
        None => DEFAULT_CONFIG_CANDIDATES
            .iter()
            .map(PathBuf::from)
            .collect(),
    }
}

/// 使用备选方案加载配置
pub fn load_with_fallback(candidates: &[PathBuf]) -> BridgeConfig {
    for path in candidates {
        if !path.exists() {
            continue;
        }
        match load_config_from_file(path) {
            Ok(cfg) => return cfg,
            Err(err) => {
                warn!("failed to load config from {}: {err:#}", path.display());
            }
        }
    }

    warn!("no configuration source succeeded, falling back to defaults");
    BridgeConfig::default()
}

/// 从文件加载配置
pub fn load_config_from_file(path: &Path) -> Result<BridgeConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("unable to read config file: {}", path.display()))?;
    let cfg: BridgeConfig = toml::from_str(&content)
        .with_context(|| format!("invalid config format: {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config values: {}", path.display()))?;
    Ok(cfg)
}

impl BridgeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.identity.file_prefix.trim().is_empty() {
            return Err(anyhow!("identity.file_prefix must not be empty"));
        }
        if self.identity.watch && self.identity.watch_interval_ms == 0 {
            return Err(anyhow!("identity.watch_interval_ms must be positive"));
        }
        if self.webhook.timeout_ms == 0 {
            return Err(anyhow!("webhook.timeout_ms must be positive"));
        }
        Ok(())
    }
}
