//! 消息投递模块
//!
//! - 定义对外事件信封 `{ event, timestamp, data }`
//! - 提供投递出口接口，以及 WebHook / 标准输出 / 内存实现

pub mod adapters;
mod types;

pub use adapters::{SIGNATURE_HEADER, WebhookClient, sign_payload};
pub use types::{CollectingSink, DeliverySink, MESSAGE_RECEIVED_EVENT, StdoutSink, WebhookEnvelope};
