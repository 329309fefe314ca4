use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::normalizer::NormalizedMessage;
use crate::utils::{current_millis, millis_to_datetime};

/// 消息接收事件名
pub const MESSAGE_RECEIVED_EVENT: &str = "message.received";

/// 对外投递的事件信封
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebhookEnvelope {
    pub event: String,
    /// RFC 3339 格式的投递时间
    pub timestamp: String,
    pub data: NormalizedMessage,
}

impl WebhookEnvelope {
    pub fn message_received(data: NormalizedMessage) -> Self {
        Self::message_received_at(data, current_millis())
    }

    pub fn message_received_at(data: NormalizedMessage, millis: i64) -> Self {
        let timestamp = millis_to_datetime(millis)
            .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
            .unwrap_or_default();
        Self {
            event: MESSAGE_RECEIVED_EVENT.to_string(),
            timestamp,
            data,
        }
    }
}

/// 投递出口
#[async_trait]
pub trait DeliverySink: Send + Sync {
    async fn deliver(&self, envelope: &WebhookEnvelope) -> Result<()>;
}

/// 以 JSON 行写到标准输出
#[derive(Debug, Default)]
pub struct StdoutSink;

#[async_trait]
impl DeliverySink for StdoutSink {
    async fn deliver(&self, envelope: &WebhookEnvelope) -> Result<()> {
        let line = serde_json::to_string(envelope)?;
        println!("{line}");
        Ok(())
    }
}

/// 内存收集，便于嵌入方做断言或批量转发
#[derive(Debug, Default)]
pub struct CollectingSink {
    envelopes: Mutex<Vec<WebhookEnvelope>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<WebhookEnvelope> {
        std::mem::take(&mut *self.envelopes.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

#[async_trait]
impl DeliverySink for CollectingSink {
    async fn deliver(&self, envelope: &WebhookEnvelope) -> Result<()> {
        self.envelopes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(envelope.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shape() {
        let envelope = WebhookEnvelope::message_received_at(NormalizedMessage::default(), 0);
        let json = serde_json::to_value(&envelope).expect("serialize");
        assert_eq!(json["event"], "message.received");
        assert_eq!(json["timestamp"], "1970-01-01T00:00:00.000Z");
        assert_eq!(json["data"]["messageType"], "unknown");
    }

    #[tokio::test]
    async fn test_collecting_sink() {
        let sink = CollectingSink::new();
        let envelope = WebhookEnvelope::message_received(NormalizedMessage::default());
        sink.deliver(&envelope).await.expect("deliver");
        assert_eq!(sink.take().len(), 1);
        assert!(sink.take().is_empty());
    }

    #[test]
    fn test_stdout_sink() {
        let envelope = WebhookEnvelope::message_received_at(NormalizedMessage::default(), 0);
        tokio_test::block_on(StdoutSink.deliver(&envelope)).expect("deliver");
    }
}
