//! 统一异常处理模块
//!
//! 身份解析、消息归一化本身不会失败（缺失/格式错误都在本地降级处理），
//! 这里的错误类型只用于存储读取、配置加载和 WebHook 投递等 I/O 边界。

use std::path::PathBuf;

use thiserror::Error;

/// Bridge 错误类型
#[derive(Debug, Error)]
pub enum BridgeError {
    /// 文件系统错误
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 单个映射文件内容无法解析
    #[error("Malformed mapping file {path}: {reason}")]
    MalformedMapping { path: PathBuf, reason: String },

    /// 配置错误
    #[error("Configuration error: {0}")]
    Config(String),

    /// WebHook 投递失败
    #[error("Delivery error: {0}")]
    Delivery(String),

    /// 序列化错误
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BridgeError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BridgeError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        BridgeError::MalformedMapping {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl From<reqwest::Error> for BridgeError {
    fn from(err: reqwest::Error) -> Self {
        BridgeError::Delivery(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
