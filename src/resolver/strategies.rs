//! LID 解析策略
//!
//! 按顺序尝试，第一个命中的结果生效。每个策略只负责查找，
//! 写回缓存由解析器统一处理。

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::jid::is_phone_shaped;
use crate::identity::{IdentityCache, MappingFileName};

/// 解析结果的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Provenance {
    /// 身份缓存中已确认的映射
    Cache,
    /// 协议客户端凭据中的实时映射表
    LiveCredentials,
    /// 直接读取的反向映射文件
    ReverseFile,
    /// 全量扫描正向映射文件
    DirectoryScan,
    /// LID 形如手机号时视为自身（未确认）
    Heuristic,
    /// 消息携带的备用地址
    AddressHint,
    /// 标识符本身就是手机号形态
    Direct,
    /// 群组标识符
    Group,
    /// 无法识别的形态，取开头数字
    Digits,
}

impl Provenance {
    /// 是否为已确认的映射
    pub fn is_verified(self) -> bool {
        !matches!(self, Provenance::Heuristic | Provenance::Digits)
    }
}

/// 单个策略的命中结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LidMatch {
    pub phone_number: String,
    pub provenance: Provenance,
}

impl LidMatch {
    pub fn new(phone_number: impl Into<String>, provenance: Provenance) -> Self {
        Self {
            phone_number: phone_number.into(),
            provenance,
        }
    }
}

/// 协议客户端的实时身份表
pub trait LiveIdentityTable: Send + Sync {
    fn phone_for_lid(&self, lid: &str) -> Option<String>;
}

impl LiveIdentityTable for HashMap<String, String> {
    fn phone_for_lid(&self, lid: &str) -> Option<String> {
        self.get(lid).cloned()
    }
}

impl LiveIdentityTable for RwLock<HashMap<String, String>> {
    fn phone_for_lid(&self, lid: &str) -> Option<String> {
        self.read()
            .unwrap_or_else(|e| e.into_inner())
            .get(lid)
            .cloned()
    }
}

/// 策略执行上下文
pub struct ResolveContext<'a> {
    pub cache: &'a IdentityCache,
    pub live: Option<&'a dyn LiveIdentityTable>,
}

/// LID 解析策略
pub trait LidStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn resolve(&self, lid: &str, ctx: &ResolveContext<'_>) -> Option<LidMatch>;
}

/// 1. 身份缓存
pub struct CacheLookup;

impl LidStrategy for CacheLookup {
    fn name(&self) -> &'static str {
        "cache"
    }

    fn resolve(&self, lid: &str, ctx: &ResolveContext<'_>) -> Option<LidMatch> {
        let entry = ctx.cache.lookup_phone(lid)?;
        let provenance = if entry.verified {
            Provenance::Cache
        } else {
            Provenance::Heuristic
        };
        Some(LidMatch::new(entry.value, provenance))
    }
}

/// 2. 实时凭据映射表
pub struct LiveCredentialsLookup;

impl LidStrategy for LiveCredentialsLookup {
    fn name(&self) -> &'static str {
        "live_credentials"
    }

    fn resolve(&self, lid: &str, ctx: &ResolveContext<'_>) -> Option<LidMatch> {
        let phone = ctx.live?.phone_for_lid(lid)?;
        let phone = phone.split('@').next().unwrap_or_default().trim();
        if phone.is_empty() {
            return None;
        }
        Some(LidMatch::new(phone, Provenance::LiveCredentials))
    }
}

/// 3. 直接读取该 LID 的反向映射文件
///
/// 覆盖缓存加载之后才写入的映射。
pub struct ReverseFileLookup;

impl LidStrategy for ReverseFileLookup {
    fn name(&self) -> &'static str {
        "reverse_file"
    }

    fn resolve(&self, lid: &str, ctx: &ResolveContext<'_>) -> Option<LidMatch> {
        let store = ctx.cache.store();
        if !store.exists() {
            return None;
        }
        let file_name = MappingFileName::reverse(ctx.cache.file_prefix(), lid);
        match store.read_value(&file_name) {
            Ok(Some(phone)) => Some(LidMatch::new(phone, Provenance::ReverseFile)),
            Ok(None) => None,
            Err(err) => {
                warn!(file = %file_name, error = %err, "Unreadable reverse mapping file");
                None
            }
        }
    }
}

/// 4. 全量扫描正向映射文件
pub struct DirectoryScan;

impl LidStrategy for DirectoryScan {
    fn name(&self) -> &'static str {
        "directory_scan"
    }

    fn resolve(&self, lid: &str, ctx: &ResolveContext<'_>) -> Option<LidMatch> {
        let store = ctx.cache.store();
        if !store.exists() {
            return None;
        }
        let names = match store.list() {
            Ok(names) => names,
            Err(err) => {
                warn!(error = %err, "Failed to list mapping directory for scan");
                return None;
            }
        };

        let mut scanned = 0usize;
        for name in names {
            let Some(MappingFileName::Forward { phone_number }) =
                MappingFileName::parse(ctx.cache.file_prefix(), &name)
            else {
                continue;
            };
            scanned += 1;
            match store.read_value(&name) {
                Ok(Some(stored_lid)) if stored_lid == lid => {
                    debug!(lid, scanned, "LID found by directory scan");
                    return Some(LidMatch::new(phone_number, Provenance::DirectoryScan));
                }
                Ok(_) => {}
                Err(err) => {
                    debug!(file = %name, error = %err, "Skipping unreadable file during scan");
                }
            }
        }
        debug!(lid, scanned, "Directory scan found no mapping");
        None
    }
}

/// 5. 启发式：形如手机号的 LID 视为自身
pub struct PhoneShapedHeuristic;

impl LidStrategy for PhoneShapedHeuristic {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn resolve(&self, lid: &str, _ctx: &ResolveContext<'_>) -> Option<LidMatch> {
        is_phone_shaped(lid).then(|| LidMatch::new(lid, Provenance::Heuristic))
    }
}

/// 默认策略顺序
pub fn default_strategies() -> Vec<Box<dyn LidStrategy>> {
    vec![
        Box::new(CacheLookup),
        Box::new(LiveCredentialsLookup),
        Box::new(ReverseFileLookup),
        Box::new(DirectoryScan),
        Box::new(PhoneShapedHeuristic),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{DEFAULT_FILE_PREFIX, MemoryMappingStore};
    use std::sync::Arc;

    fn cache_with(store: Arc<MemoryMappingStore>) -> IdentityCache {
        IdentityCache::new(store, DEFAULT_FILE_PREFIX)
    }

    #[test]
    fn test_cache_lookup_reports_heuristic_entries() {
        let cache = cache_with(Arc::new(MemoryMappingStore::new()));
        cache.insert("lid-1", "5511");
        cache.insert_unverified("5522333330000", "5522333330000");
        let ctx = ResolveContext {
            cache: &cache,
            live: None,
        };

        assert_eq!(
            CacheLookup.resolve("lid-1", &ctx),
            Some(LidMatch::new("5511", Provenance::Cache))
        );
        assert_eq!(
            CacheLookup.resolve("5522333330000", &ctx).map(|m| m.provenance),
            Some(Provenance::Heuristic)
        );
    }

    #[test]
    fn test_live_credentials_lookup() {
        let cache = cache_with(Arc::new(MemoryMappingStore::new()));
        let table = HashMap::from([("lid-9".to_string(), "5599@s.whatsapp.net".to_string())]);
        let ctx = ResolveContext {
            cache: &cache,
            live: Some(&table as &dyn LiveIdentityTable),
        };
        assert_eq!(
            LiveCredentialsLookup.resolve("lid-9", &ctx),
            Some(LidMatch::new("5599", Provenance::LiveCredentials))
        );
        assert_eq!(LiveCredentialsLookup.resolve("lid-0", &ctx), None);
    }

    #[test]
    fn test_reverse_file_and_scan() {
        let store = Arc::new(MemoryMappingStore::new());
        store.put_reverse(DEFAULT_FILE_PREFIX, "lid-r", "5501");
        store.put_forward(DEFAULT_FILE_PREFIX, "5502", "lid-f");
        let cache = cache_with(store);
        let ctx = ResolveContext {
            cache: &cache,
            live: None,
        };

        assert_eq!(
            ReverseFileLookup.resolve("lid-r", &ctx),
            Some(LidMatch::new("5501", Provenance::ReverseFile))
        );
        assert_eq!(ReverseFileLookup.resolve("lid-f", &ctx), None);
        assert_eq!(
            DirectoryScan.resolve("lid-f", &ctx),
            Some(LidMatch::new("5502", Provenance::DirectoryScan))
        );
        assert_eq!(DirectoryScan.resolve("lid-r", &ctx), None);
    }

    #[test]
    fn test_heuristic() {
        let cache = cache_with(Arc::new(MemoryMappingStore::missing()));
        let ctx = ResolveContext {
            cache: &cache,
            live: None,
        };
        assert_eq!(
            PhoneShapedHeuristic.resolve("5511999990000", &ctx),
            Some(LidMatch::new("5511999990000", Provenance::Heuristic))
        );
        assert_eq!(PhoneShapedHeuristic.resolve("abc123", &ctx), None);
        assert!(!Provenance::Heuristic.is_verified());
        assert!(Provenance::ReverseFile.is_verified());
    }
}
