//! # 标识符解析器
//!
//! 把任意协议标识符解析为 `{ phoneNumber, lid, canonicalIdentifier }`。
//! LID 形态依次尝试 [`strategies`] 中的策略，命中后写回身份缓存。

pub mod jid;
pub mod strategies;

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::identity::IdentityCache;
use jid::{Identifier, direct_jid, group_phone, is_digits, leading_digits};
pub use strategies::{
    LidMatch, LidStrategy, LiveIdentityTable, Provenance, ResolveContext, default_strategies,
};

/// 单个标识符的解析结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    /// 手机号；解析失败时为 None，调用方不得自行替代
    pub phone_number: Option<String>,
    pub lid: Option<String>,
    pub canonical_identifier: Option<String>,
    pub provenance: Option<Provenance>,
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        self.phone_number.is_some()
    }
}

pub struct IdentifierResolver {
    cache: Arc<IdentityCache>,
    strategies: Vec<Box<dyn LidStrategy>>,
    live: Option<Arc<dyn LiveIdentityTable>>,
}

impl IdentifierResolver {
    pub fn new(cache: Arc<IdentityCache>) -> Self {
        Self::with_strategies(cache, default_strategies())
    }

    pub fn with_strategies(cache: Arc<IdentityCache>, strategies: Vec<Box<dyn LidStrategy>>) -> Self {
        Self {
            cache,
            strategies,
            live: None,
        }
    }

    /// 接入协议客户端凭据中的实时映射表
    pub fn with_live_table(mut self, table: Arc<dyn LiveIdentityTable>) -> Self {
        self.live = Some(table);
        self
    }

    pub fn cache(&self) -> &Arc<IdentityCache> {
        &self.cache
    }

    /// 按策略顺序解析 LID，第一个命中生效
    pub fn resolve_lid(&self, lid: &str) -> Option<LidMatch> {
        let ctx = ResolveContext {
            cache: &self.cache,
            live: self.live.as_deref(),
        };

        for strategy in &self.strategies {
            let Some(found) = strategy.resolve(lid, &ctx) else {
                continue;
            };
            match found.provenance {
                Provenance::Cache => {}
                Provenance::Heuristic => {
                    self.cache.insert_unverified(lid, &found.phone_number);
                }
                _ => self.cache.insert(lid, &found.phone_number),
            }
            debug!(
                lid,
                phone_number = %found.phone_number,
                strategy = strategy.name(),
                "lid_resolved"
            );
            return Some(found);
        }

        debug!(lid, "lid_strategies_exhausted");
        None
    }

    /// 解析任意形态的标识符
    pub fn resolve(&self, raw: &str) -> Resolution {
        match Identifier::classify(raw) {
            Identifier::Lid(lid) => {
                let found = self.resolve_lid(lid);
                Resolution {
                    canonical_identifier: found.as_ref().map(|m| direct_jid(&m.phone_number)),
                    provenance: found.as_ref().map(|m| m.provenance),
                    phone_number: found.map(|m| m.phone_number),
                    lid: Some(lid.to_string()),
                }
            }
            Identifier::Direct(phone) => Resolution {
                phone_number: Some(phone.to_string()),
                lid: None,
                canonical_identifier: Some(raw.trim().to_string()),
                provenance: Some(Provenance::Direct),
            },
            Identifier::Group { jid, local } => Resolution {
                phone_number: group_phone(local).map(str::to_string),
                lid: None,
                canonical_identifier: Some(jid.to_string()),
                provenance: Some(Provenance::Group),
            },
            Identifier::Other(other) => {
                let digits = leading_digits(other);
                Resolution {
                    phone_number: digits.map(str::to_string),
                    lid: None,
                    canonical_identifier: digits.map(direct_jid),
                    provenance: digits.map(|_| Provenance::Digits),
                }
            }
        }
    }

    /// 带备用地址的解析
    ///
    /// 协议可能在消息上同时给出两种地址：LID 寻址时附带手机号形态的备用地址，
    /// 或手机号寻址时附带 LID。两者都是最直接的映射证据，命中后写入缓存。
    /// 手机号部分不是纯数字的提示被忽略。
    pub fn resolve_with_hint(&self, raw: &str, hint: Option<&str>) -> Resolution {
        match (Identifier::classify(raw), hint.map(Identifier::classify)) {
            (Identifier::Lid(lid), Some(Identifier::Direct(phone))) if is_digits(phone) => {
                self.record_hint(lid, phone);
                Resolution {
                    phone_number: Some(phone.to_string()),
                    lid: Some(lid.to_string()),
                    canonical_identifier: Some(direct_jid(phone)),
                    provenance: Some(Provenance::AddressHint),
                }
            }
            (Identifier::Direct(phone), Some(Identifier::Lid(lid))) if is_digits(phone) => {
                self.record_hint(lid, phone);
                Resolution {
                    lid: Some(lid.to_string()),
                    ..self.resolve(raw)
                }
            }
            _ => self.resolve(raw),
        }
    }

    fn record_hint(&self, lid: &str, phone_number: &str) {
        if self.cache.get_phone(lid).as_deref() != Some(phone_number) {
            debug!(lid, phone_number, "address_hint_recorded");
            self.cache.insert(lid, phone_number);
        }
    }

    pub fn phone_number(&self, raw: &str) -> Option<String> {
        self.resolve(raw).phone_number
    }

    /// 规范化为 `<phone>@s.whatsapp.net`
    ///
    /// 手机号与群组形态原样返回；LID 无法解析时返回 None。
    pub fn to_canonical_identifier(&self, raw: &str) -> Option<String> {
        self.resolve(raw).canonical_identifier
    }
}

impl std::fmt::Debug for IdentifierResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentifierResolver")
            .field("cache", &self.cache)
            .field(
                "strategies",
                &self.strategies.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .field("live", &self.live.is_some())
            .finish()
    }
}
