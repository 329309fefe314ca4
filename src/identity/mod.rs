//! 身份模块
//!
//! LID ⇄ 手机号映射的存储、缓存与目录监听

pub mod cache;
pub mod store;
pub mod watcher;

pub use cache::{CachedIdentity, IdentityCache, ValidationReport};
pub use store::{
    DEFAULT_FILE_PREFIX, FsMappingStore, MappingFileName, MappingRecord, MappingStore,
    MemoryMappingStore,
};
pub use watcher::{ChangeKind, MappingEvent, PollingWatcher, WatchHandle, WatchSource};
