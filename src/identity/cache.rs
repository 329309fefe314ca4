//! # 身份缓存
//!
//! LID ⇄ 手机号的双向内存映射，数据源是认证目录中的映射文件。
//!
//! - 首次查询时懒加载，之后常驻内存
//! - 解析器兜底成功后写回缓存（只写内存，不落盘）
//! - 目录变更事件通过通道送达，正向文件变更会让缓存失效并在下次查询时重新加载

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use super::store::{MappingFileName, MappingRecord, MappingStore};
use super::watcher::{MappingEvent, WatchHandle, WatchSource};

/// 缓存中的一条映射值
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedIdentity {
    pub value: String,
    /// 来自映射文件、实时凭据或地址提示时为 true，启发式推断为 false
    pub verified: bool,
}

/// 诊断结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub auth_dir_exists: bool,
    pub mapping_count: usize,
    pub ok: bool,
}

#[derive(Debug, Default)]
struct CacheState {
    lid_to_phone: HashMap<String, CachedIdentity>,
    phone_to_lid: HashMap<String, CachedIdentity>,
    loaded: bool,
}

impl CacheState {
    /// 同时更新两个方向，并解除旧的对应关系（后写覆盖先写）
    fn insert(&mut self, lid: &str, phone_number: &str, verified: bool) {
        if let Some(old_phone) = self.lid_to_phone.get(lid) {
            if old_phone.value != phone_number {
                self.phone_to_lid.remove(&old_phone.value);
            }
        }
        if let Some(old_lid) = self.phone_to_lid.get(phone_number) {
            if old_lid.value != lid {
                self.lid_to_phone.remove(&old_lid.value);
            }
        }

        self.lid_to_phone.insert(
            lid.to_string(),
            CachedIdentity {
                value: phone_number.to_string(),
                verified,
            },
        );
        self.phone_to_lid.insert(
            phone_number.to_string(),
            CachedIdentity {
                value: lid.to_string(),
                verified,
            },
        );
    }

    fn has_verified(&self, lid: &str, phone_number: &str) -> bool {
        self.lid_to_phone.get(lid).is_some_and(|e| e.verified)
            || self.phone_to_lid.get(phone_number).is_some_and(|e| e.verified)
    }

    fn clear(&mut self) {
        self.lid_to_phone.clear();
        self.phone_to_lid.clear();
        self.loaded = false;
    }
}

/// 身份缓存服务
pub struct IdentityCache {
    store: Arc<dyn MappingStore>,
    file_prefix: String,
    state: RwLock<CacheState>,
    events_tx: UnboundedSender<MappingEvent>,
    events_rx: Mutex<UnboundedReceiver<MappingEvent>>,
    watch_source: Option<Arc<dyn WatchSource>>,
    watch_handle: Mutex<Option<WatchHandle>>,
}

impl IdentityCache {
    pub fn new(store: Arc<dyn MappingStore>, file_prefix: impl Into<String>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            store,
            file_prefix: file_prefix.into(),
            state: RwLock::new(CacheState::default()),
            events_tx,
            events_rx: Mutex::new(events_rx),
            watch_source: None,
            watch_handle: Mutex::new(None),
        }
    }

    /// 设置目录监听源，首次成功加载后启动
    pub fn with_watch_source(mut self, source: Arc<dyn WatchSource>) -> Self {
        self.watch_source = Some(source);
        self
    }

    pub fn store(&self) -> &dyn MappingStore {
        self.store.as_ref()
    }

    pub fn file_prefix(&self) -> &str {
        &self.file_prefix
    }

    /// 目录变更事件的发送端
    pub fn event_sender(&self) -> UnboundedSender<MappingEvent> {
        self.events_tx.clone()
    }

    fn read_state(&self) -> RwLockReadGuard<'_, CacheState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_loaded(&self) -> bool {
        self.read_state().loaded
    }

    /// 当前映射数量（按 LID 计）
    pub fn len(&self) -> usize {
        self.read_state().lid_to_phone.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 加载映射文件，已加载时直接返回
    ///
    /// 返回加载后的映射数量。目录不存在是新会话的正常状态，不算错误。
    pub fn load(&self) -> usize {
        self.drain_events();

        {
            let state = self.read_state();
            if state.loaded {
                return state.lid_to_phone.len();
            }
        }

        if !self.store.exists() {
            let mut state = self.write_state();
            state.loaded = true;
            warn!(
                dir = %self.store.location().display(),
                "Mapping directory does not exist, identity cache left empty"
            );
            return state.lid_to_phone.len();
        }

        // 先建立监听基线再读目录，读取期间写入的文件会在下次查询时触发重载
        self.ensure_watching();
        let records = self.read_records();

        let count = {
            let mut state = self.write_state();
            if !state.loaded {
                for record in &records {
                    state.insert(&record.lid, &record.phone_number, true);
                }
                state.loaded = true;
            }
            state.lid_to_phone.len()
        };

        info!(
            dir = %self.store.location().display(),
            files = records.len(),
            mappings = count,
            "identity_cache_loaded"
        );
        count
    }

    /// 显式预热
    pub fn preload(&self) -> usize {
        self.load()
    }

    fn read_records(&self) -> Vec<MappingRecord> {
        let names = match self.store.list() {
            Ok(names) => names,
            Err(err) => {
                warn!(error = %err, "Failed to list mapping directory");
                return Vec::new();
            }
        };

        let mut records = Vec::new();
        for name in names {
            let Some(kind) = MappingFileName::parse(&self.file_prefix, &name) else {
                continue;
            };
            let value = match self.store.read_value(&name) {
                Ok(Some(value)) => value,
                Ok(None) => continue,
                Err(err) => {
                    warn!(file = %name, error = %err, "Skipping malformed mapping file");
                    continue;
                }
            };
            let record = match kind {
                MappingFileName::Forward { phone_number } => MappingRecord {
                    lid: value,
                    phone_number,
                },
                MappingFileName::Reverse { lid } => MappingRecord {
                    lid,
                    phone_number: value,
                },
            };
            records.push(record);
        }
        records
    }

    fn ensure_watching(&self) {
        let Some(source) = self.watch_source.as_ref() else {
            return;
        };
        let mut handle = self.watch_handle.lock().unwrap_or_else(|e| e.into_inner());
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        *handle = source.start(self.events_tx.clone());
    }

    pub fn is_watching(&self) -> bool {
        self.watch_handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// 处理积压的目录变更事件
    ///
    /// 多个正向文件事件合并为一次失效，下一次查询时只重新加载一次。
    pub fn drain_events(&self) -> usize {
        let mut rx = self.events_rx.lock().unwrap_or_else(|e| e.into_inner());
        let mut forward_changes = 0;
        while let Ok(event) = rx.try_recv() {
            let is_forward = MappingFileName::parse(&self.file_prefix, &event.file_name)
                .is_some_and(|name| name.is_forward());
            if is_forward {
                debug!(file = %event.file_name, kind = ?event.kind, "Forward mapping changed");
                forward_changes += 1;
            }
        }
        drop(rx);

        if forward_changes > 0 {
            self.invalidate();
        }
        forward_changes
    }

    /// 清空缓存，下次查询时重新加载
    pub fn invalidate(&self) {
        self.write_state().clear();
        info!("identity_cache_invalidated");
    }

    /// 按 LID 查询缓存条目
    pub fn lookup_phone(&self, lid: &str) -> Option<CachedIdentity> {
        self.load();
        self.read_state().lid_to_phone.get(lid).cloned()
    }

    /// 按手机号查询缓存条目
    pub fn lookup_lid(&self, phone_number: &str) -> Option<CachedIdentity> {
        self.load();
        self.read_state().phone_to_lid.get(phone_number).cloned()
    }

    pub fn get_phone(&self, lid: &str) -> Option<String> {
        self.lookup_phone(lid).map(|e| e.value)
    }

    pub fn get_lid(&self, phone_number: &str) -> Option<String> {
        self.lookup_lid(phone_number).map(|e| e.value)
    }

    /// 写入已确认的映射
    pub fn insert(&self, lid: &str, phone_number: &str) {
        self.write_state().insert(lid, phone_number, true);
        debug!(lid, phone_number, "identity_cache_insert");
    }

    /// 写入启发式推断的映射，不会覆盖已确认的映射
    pub fn insert_unverified(&self, lid: &str, phone_number: &str) -> bool {
        let mut state = self.write_state();
        if state.has_verified(lid, phone_number) {
            return false;
        }
        state.insert(lid, phone_number, false);
        true
    }

    /// 当前所有映射
    pub fn snapshot(&self) -> Vec<MappingRecord> {
        let state = self.read_state();
        let mut records = state
            .lid_to_phone
            .iter()
            .map(|(lid, phone)| MappingRecord {
                lid: lid.clone(),
                phone_number: phone.value.clone(),
            })
            .collect::<Vec<_>>();
        records.sort_by(|a, b| a.lid.cmp(&b.lid));
        records
    }

    /// 诊断认证目录状态，不依赖也不触发加载
    pub fn validate(&self) -> ValidationReport {
        if !self.store.exists() {
            warn!(
                dir = %self.store.location().display(),
                "Mapping directory missing, LID resolution will likely fail"
            );
            return ValidationReport {
                auth_dir_exists: false,
                mapping_count: 0,
                ok: false,
            };
        }

        let names = match self.store.list() {
            Ok(names) => names,
            Err(err) => {
                warn!(error = %err, "Failed to list mapping directory");
                return ValidationReport {
                    auth_dir_exists: true,
                    mapping_count: 0,
                    ok: false,
                };
            }
        };

        let mapping_count = names
            .iter()
            .filter_map(|name| MappingFileName::parse(&self.file_prefix, name))
            .filter(MappingFileName::is_forward)
            .count();

        if mapping_count == 0 {
            info!(
                dir = %self.store.location().display(),
                "No mapping files yet, expected for a new session"
            );
        }

        ValidationReport {
            auth_dir_exists: true,
            mapping_count,
            ok: true,
        }
    }
}

impl std::fmt::Debug for IdentityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityCache")
            .field("location", &self.store.location())
            .field("file_prefix", &self.file_prefix)
            .field("loaded", &self.is_loaded())
            .field("mappings", &self.len())
            .finish()
    }
}
