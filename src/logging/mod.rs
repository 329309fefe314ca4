//! # 日志初始化
//!
//! 基于 `tracing-subscriber` 的 fmt 输出，支持纯文本与 JSON 两种格式。

use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LoggingConfig;

/// 从配置初始化日志系统
///
/// # 参数
/// * `logging_config` - 日志配置（可选），如果为 None 则使用默认配置
///
/// 已存在全局 subscriber 时返回 false（例如测试中重复初始化）。
///
/// # 示例
/// ```rust,ignore
/// use wa_bridge_core::config::LoggingConfig;
///
/// init_tracing_from_config(None);
///
/// let config = LoggingConfig {
///     level: "debug".to_string(),
///     json: true,
///     ..LoggingConfig::default()
/// };
/// init_tracing_from_config(Some(&config));
/// ```
pub fn init_tracing_from_config(logging_config: Option<&LoggingConfig>) -> bool {
    let default_config = LoggingConfig::default();
    let config = logging_config.unwrap_or(&default_config);

    // 优先使用环境变量 RUST_LOG，如果没有则使用配置文件的日志级别
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let builder = fmt::Subscriber::builder()
        .with_target(config.with_target)
        .with_thread_ids(config.with_thread_ids)
        .with_file(config.with_file)
        .with_line_number(config.with_line_number)
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter);

    if config.json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    }
}
