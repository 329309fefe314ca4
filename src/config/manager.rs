//! 配置管理器 - 负责环境变量覆盖
//!
//! 支持的环境变量：
//! - `BRIDGE_AUTH_DIR`
//! - `BRIDGE_WEBHOOK_URL`
//! - `BRIDGE_WEBHOOK_SECRET`
//! - `BRIDGE_LOG_LEVEL`

use std::env;
use std::path::PathBuf;

use tracing::debug;

use super::BridgeConfig;

pub const ENV_AUTH_DIR: &str = "BRIDGE_AUTH_DIR";
pub const ENV_WEBHOOK_URL: &str = "BRIDGE_WEBHOOK_URL";
pub const ENV_WEBHOOK_SECRET: &str = "BRIDGE_WEBHOOK_SECRET";
pub const ENV_LOG_LEVEL: &str = "BRIDGE_LOG_LEVEL";

/// 配置管理器
pub struct ConfigManager;

impl ConfigManager {
    /// 使用进程环境变量覆盖配置
    pub fn apply_process_env(config: &mut BridgeConfig) {
        Self::apply_env_overrides(config, |key| env::var(key).ok());
    }

    /// 使用给定的查找函数覆盖配置，空值视为未设置
    pub fn apply_env_overrides<F>(config: &mut BridgeConfig, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(dir) = get(ENV_AUTH_DIR) {
            debug!(key = ENV_AUTH_DIR, "config_env_override");
            config.identity.auth_dir = PathBuf::from(dir);
        }
        if let Some(url) = get(ENV_WEBHOOK_URL) {
            debug!(key = ENV_WEBHOOK_URL, "config_env_override");
            config.webhook.url = Some(url);
        }
        if let Some(secret) = get(ENV_WEBHOOK_SECRET) {
            debug!(key = ENV_WEBHOOK_SECRET, "config_env_override");
            config.webhook.secret = Some(secret);
        }
        if let Some(level) = get(ENV_LOG_LEVEL) {
            debug!(key = ENV_LOG_LEVEL, "config_env_override");
            config.logging.level = level;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_AUTH_DIR, "/data/auth"),
            (ENV_WEBHOOK_URL, "http://localhost:8080/hook"),
            (ENV_WEBHOOK_SECRET, "s3cret"),
            (ENV_LOG_LEVEL, ""),
        ]);
        let mut cfg = BridgeConfig::default();
        ConfigManager::apply_env_overrides(&mut cfg, |key| {
            vars.get(key).map(|value| value.to_string())
        });

        assert_eq!(cfg.identity.auth_dir, PathBuf::from("/data/auth"));
        assert_eq!(cfg.webhook.url.as_deref(), Some("http://localhost:8080/hook"));
        assert_eq!(cfg.webhook.secret.as_deref(), Some("s3cret"));
        // 空值不覆盖
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn test_no_overrides() {
        let mut cfg = BridgeConfig::default();
        ConfigManager::apply_env_overrides(&mut cfg, |_| None);
        assert_eq!(cfg, BridgeConfig::default());
    }
}
