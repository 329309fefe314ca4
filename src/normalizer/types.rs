//! 原始消息与归一化消息的数据结构

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::resolver::Provenance;

/// 消息 key 块
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageKey {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub remote_jid: Option<String>,
    #[serde(default)]
    pub from_me: bool,
    #[serde(default)]
    pub participant: Option<String>,
    /// 发送方的备用地址（LID 寻址时通常是手机号形态）
    #[serde(default, alias = "senderPn")]
    pub remote_jid_alt: Option<String>,
    /// 群成员的备用地址
    #[serde(default, alias = "participantPn")]
    pub participant_alt: Option<String>,
}

/// 协议客户端推送的原始消息
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    #[serde(default)]
    pub key: MessageKey,
    /// 内容块：键名即内容类型
    #[serde(default)]
    pub message: Option<Map<String, Value>>,
    /// 秒级时间戳，可能是数字、字符串或 Long 对象
    #[serde(default)]
    pub message_timestamp: Option<Value>,
    #[serde(default)]
    pub push_name: Option<String>,
}

/// 投递类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertKind {
    /// 实时通知
    Notify,
    /// 历史同步回放
    Append,
}

/// 一次消息事件
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MessageUpsert {
    #[serde(rename = "type")]
    pub kind: UpsertKind,
    #[serde(default)]
    pub messages: Vec<RawMessage>,
}

/// 消息类型（封闭集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    Image,
    Video,
    Audio,
    Voice,
    Document,
    Sticker,
    Location,
    Contact,
    Contacts,
    Poll,
    Reaction,
    Unsupported,
    #[default]
    Unknown,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::Image => "image",
            MessageType::Video => "video",
            MessageType::Audio => "audio",
            MessageType::Voice => "voice",
            MessageType::Document => "document",
            MessageType::Sticker => "sticker",
            MessageType::Location => "location",
            MessageType::Contact => "contact",
            MessageType::Contacts => "contacts",
            MessageType::Poll => "poll",
            MessageType::Reaction => "reaction",
            MessageType::Unsupported => "unsupported",
            MessageType::Unknown => "unknown",
        }
    }

    pub fn is_media(&self) -> bool {
        matches!(
            self,
            MessageType::Image
                | MessageType::Video
                | MessageType::Audio
                | MessageType::Voice
                | MessageType::Document
                | MessageType::Sticker
        )
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 联系人卡片
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactCard {
    pub display_name: Option<String>,
    pub vcard: Option<String>,
}

/// 被引用消息摘要
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotedMessage {
    pub id: Option<String>,
    pub participant: Option<String>,
    pub participant_lid: Option<String>,
    pub content: Option<String>,
}

/// 被 @ 的成员
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MentionedParty {
    pub phone_number: String,
    pub lid: Option<String>,
    pub jid: String,
}

/// 归一化后的消息
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedMessage {
    pub id: Option<String>,
    /// 毫秒级时间戳
    pub timestamp: i64,

    pub from: Option<String>,
    pub from_lid: Option<String>,
    pub from_jid: Option<String>,
    pub raw_from: Option<String>,
    pub from_me: bool,
    pub from_provenance: Option<Provenance>,
    pub push_name: Option<String>,

    pub is_group: bool,
    pub participant: Option<String>,
    pub participant_lid: Option<String>,
    pub participant_jid: Option<String>,
    pub participant_provenance: Option<Provenance>,

    pub message_type: MessageType,
    pub content: Option<String>,
    pub caption: Option<String>,

    pub has_media: bool,
    pub mime_type: Option<String>,
    pub file_size: Option<u64>,
    pub file_name: Option<String>,
    pub duration: Option<u64>,
    pub media_url: Option<String>,

    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location_name: Option<String>,
    pub location_address: Option<String>,

    pub contacts: Vec<ContactCard>,

    pub poll_name: Option<String>,
    pub poll_options: Vec<String>,
    pub poll_selectable_count: Option<u64>,

    pub reaction_emoji: Option<String>,
    pub reaction_target_id: Option<String>,

    pub quoted: Option<QuotedMessage>,
    pub mentions: Vec<MentionedParty>,

    /// 原始内容块（审计用）
    pub raw_message: Option<Value>,
}
