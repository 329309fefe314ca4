//! WhatsApp 桥接核心库
//!
//! 提供 LID 身份缓存、标识符解析和消息归一化，以及围绕它们的投递管道

pub mod config;
pub mod error;
pub mod hooks;
pub mod identity;
pub mod logging;
pub mod normalizer;
pub mod pipeline;
pub mod resolver;
pub mod utils;

use std::sync::Arc;
use std::time::Duration;

pub use config::{
    BridgeConfig, ConfigManager, IdentityConfig, LoggingConfig, WebhookConfig, load_config,
};
pub use error::{BridgeError, Result};
pub use hooks::{
    CollectingSink, DeliverySink, MESSAGE_RECEIVED_EVENT, StdoutSink, WebhookClient,
    WebhookEnvelope,
};
pub use identity::{
    FsMappingStore, IdentityCache, MappingStore, MemoryMappingStore, PollingWatcher,
    ValidationReport,
};
pub use normalizer::{MessageType, MessageUpsert, NormalizedMessage, RawMessage, normalize};
pub use pipeline::MessagePipeline;
pub use resolver::{IdentifierResolver, Provenance, Resolution};

/// 按配置组装身份缓存与解析器
pub fn build_resolver(config: &IdentityConfig) -> Arc<IdentifierResolver> {
    let store = Arc::new(FsMappingStore::new(config.auth_dir.clone()));
    let mut cache = IdentityCache::new(store, config.file_prefix.clone());
    if config.watch {
        let watcher = PollingWatcher::new(
            config.auth_dir.clone(),
            Duration::from_millis(config.watch_interval_ms),
        );
        cache = cache.with_watch_source(Arc::new(watcher));
    }
    Arc::new(IdentifierResolver::new(Arc::new(cache)))
}
