//! 消息管道：upsert 事件 → 归一化 → 信封 → 投递

use std::sync::Arc;

use tracing::{debug, warn};

use crate::hooks::{DeliverySink, WebhookEnvelope};
use crate::normalizer::{MessageUpsert, UpsertKind, normalize};
use crate::resolver::IdentifierResolver;

pub struct MessagePipeline {
    resolver: Arc<IdentifierResolver>,
    sink: Arc<dyn DeliverySink>,
}

impl MessagePipeline {
    pub fn new(resolver: Arc<IdentifierResolver>, sink: Arc<dyn DeliverySink>) -> Self {
        Self { resolver, sink }
    }

    pub fn resolver(&self) -> &Arc<IdentifierResolver> {
        &self.resolver
    }

    /// 处理一次 upsert，返回成功投递的条数
    ///
    /// 只处理实时消息（`notify`），历史同步（`append`）直接丢弃。
    /// 单条投递失败只记录日志，不影响其余消息。
    pub async fn handle_upsert(&self, upsert: MessageUpsert) -> usize {
        if upsert.kind != UpsertKind::Notify {
            debug!(
                kind = ?upsert.kind,
                count = upsert.messages.len(),
                "upsert_skipped"
            );
            return 0;
        }

        let mut delivered = 0;
        for raw in &upsert.messages {
            let normalized = normalize(raw, &self.resolver);
            let message_id = normalized.id.clone();
            let envelope = WebhookEnvelope::message_received(normalized);
            match self.sink.deliver(&envelope).await {
                Ok(()) => delivered += 1,
                Err(err) => {
                    warn!(message_id = ?message_id, error = %err, "delivery_failed");
                }
            }
        }
        delivered
    }
}

impl std::fmt::Debug for MessagePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessagePipeline")
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}
