//! 内容块识别与字段提取

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::warn;

use super::types::{ContactCard, MessageType, NormalizedMessage};
use crate::utils::{de_opt_f64, de_opt_long};

/// 内容键及其优先级（数组顺序即优先级）
const CONTENT_KEYS: &[(&str, ContentKind)] = &[
    ("conversation", ContentKind::Conversation),
    ("extendedTextMessage", ContentKind::ExtendedText),
    ("imageMessage", ContentKind::Image),
    ("videoMessage", ContentKind::Video),
    ("audioMessage", ContentKind::Audio),
    ("documentMessage", ContentKind::Document),
    ("stickerMessage", ContentKind::Sticker),
    ("locationMessage", ContentKind::Location),
    ("contactMessage", ContentKind::Contact),
    ("contactsArrayMessage", ContentKind::ContactsArray),
    ("pollCreationMessage", ContentKind::Poll),
    ("pollCreationMessageV2", ContentKind::Poll),
    ("pollCreationMessageV3", ContentKind::Poll),
    ("reactionMessage", ContentKind::Reaction),
];

/// 协议附带的簿记字段，不代表消息内容
const BOOKKEEPING_KEYS: &[&str] = &["messageContextInfo", "senderKeyDistributionMessage"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Conversation,
    ExtendedText,
    Image,
    Video,
    Audio,
    Document,
    Sticker,
    Location,
    Contact,
    ContactsArray,
    Poll,
    Reaction,
}

/// 内容块识别结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Detected<'a> {
    Known(ContentKind, &'a Value),
    Unsupported(&'a str),
    Empty,
}

pub fn detect(message: &Map<String, Value>) -> Detected<'_> {
    for (key, kind) in CONTENT_KEYS {
        if let Some(value) = message.get(*key) {
            return Detected::Known(*kind, value);
        }
    }

    let unrecognized = message
        .keys()
        .find(|key| !BOOKKEEPING_KEYS.contains(&key.as_str()))
        .or_else(|| message.keys().next());
    match unrecognized {
        Some(key) => Detected::Unsupported(key.as_str()),
        None => Detected::Empty,
    }
}

/// 宽松解码：结构不符时记录告警并使用默认值
pub(crate) fn decode<T: DeserializeOwned + Default>(kind: ContentKind, value: &Value) -> T {
    match T::deserialize(value) {
        Ok(decoded) => decoded,
        Err(err) => {
            warn!(kind = ?kind, error = %err, "Malformed content block, using defaults");
            T::default()
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct ExtendedTextMessage {
    pub text: Option<String>,
    pub context_info: Option<ContextInfo>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct ContextInfo {
    pub stanza_id: Option<String>,
    pub participant: Option<String>,
    pub quoted_message: Option<Map<String, Value>>,
    pub mentioned_jid: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct MediaMessage {
    pub mimetype: Option<String>,
    #[serde(deserialize_with = "de_opt_long")]
    pub file_length: Option<u64>,
    pub caption: Option<String>,
    pub url: Option<String>,
    pub direct_path: Option<String>,
    #[serde(deserialize_with = "de_opt_long")]
    pub seconds: Option<u64>,
    pub ptt: Option<bool>,
    pub file_name: Option<String>,
}

impl MediaMessage {
    fn media_url(&self) -> Option<String> {
        self.url.clone().or_else(|| self.direct_path.clone())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct LocationMessage {
    #[serde(deserialize_with = "de_opt_f64")]
    pub degrees_latitude: Option<f64>,
    #[serde(deserialize_with = "de_opt_f64")]
    pub degrees_longitude: Option<f64>,
    pub name: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct ContactMessage {
    pub display_name: Option<String>,
    pub vcard: Option<String>,
}

impl From<ContactMessage> for ContactCard {
    fn from(value: ContactMessage) -> Self {
        ContactCard {
            display_name: value.display_name,
            vcard: value.vcard,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct ContactsArrayMessage {
    pub display_name: Option<String>,
    pub contacts: Vec<ContactMessage>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct PollOption {
    pub option_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct PollCreationMessage {
    pub name: Option<String>,
    pub options: Vec<PollOption>,
    #[serde(deserialize_with = "de_opt_long")]
    pub selectable_options_count: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct ReactionKey {
    pub id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct ReactionMessage {
    pub text: Option<String>,
    pub key: Option<ReactionKey>,
}

fn apply_media(out: &mut NormalizedMessage, message_type: MessageType, media: MediaMessage) {
    out.message_type = message_type;
    out.has_media = true;
    out.media_url = media.media_url();
    out.mime_type = media.mimetype;
    out.file_size = media.file_length;
    out.caption = media.caption;
}

/// 按内容类型填充归一化字段（引用与 @ 信息由上层处理）
pub(crate) fn apply_content(out: &mut NormalizedMessage, kind: ContentKind, value: &Value) {
    match kind {
        ContentKind::Conversation => {
            out.message_type = MessageType::Text;
            out.content = value.as_str().map(str::to_string);
        }
        ContentKind::ExtendedText => {
            let text: ExtendedTextMessage = decode(kind, value);
            out.message_type = MessageType::Text;
            out.content = text.text;
        }
        ContentKind::Image | ContentKind::Sticker => {
            let media: MediaMessage = decode(kind, value);
            let message_type = if kind == ContentKind::Image {
                MessageType::Image
            } else {
                MessageType::Sticker
            };
            apply_media(out, message_type, media);
            out.content = out.caption.clone();
        }
        ContentKind::Video => {
            let media: MediaMessage = decode(kind, value);
            let duration = media.seconds;
            apply_media(out, MessageType::Video, media);
            out.duration = duration;
            out.content = out.caption.clone();
        }
        ContentKind::Audio => {
            let media: MediaMessage = decode(kind, value);
            let duration = media.seconds;
            let message_type = if media.ptt.unwrap_or(false) {
                MessageType::Voice
            } else {
                MessageType::Audio
            };
            apply_media(out, message_type, media);
            out.duration = duration;
        }
        ContentKind::Document => {
            let media: MediaMessage = decode(kind, value);
            let file_name = media.file_name.clone();
            apply_media(out, MessageType::Document, media);
            out.content = out.caption.clone().or_else(|| file_name.clone());
            out.file_name = file_name;
        }
        ContentKind::Location => {
            let location: LocationMessage = decode(kind, value);
            out.message_type = MessageType::Location;
            out.latitude = location.degrees_latitude;
            out.longitude = location.degrees_longitude;
            out.content = location.name.clone();
            out.location_name = location.name;
            out.location_address = location.address;
        }
        ContentKind::Contact => {
            let contact: ContactMessage = decode(kind, value);
            out.message_type = MessageType::Contact;
            out.content = contact.display_name.clone();
            out.contacts = vec![contact.into()];
        }
        ContentKind::ContactsArray => {
            let list: ContactsArrayMessage = decode(kind, value);
            out.message_type = MessageType::Contacts;
            out.content = list.display_name;
            out.contacts = list.contacts.into_iter().map(ContactCard::from).collect();
        }
        ContentKind::Poll => {
            let poll: PollCreationMessage = decode(kind, value);
            out.message_type = MessageType::Poll;
            out.content = poll.name.clone();
            out.poll_name = poll.name;
            out.poll_options = poll
                .options
                .into_iter()
                .filter_map(|option| option.option_name)
                .collect();
            out.poll_selectable_count = poll.selectable_options_count;
        }
        ContentKind::Reaction => {
            let reaction: ReactionMessage = decode(kind, value);
            out.message_type = MessageType::Reaction;
            out.content = reaction.text.clone();
            out.reaction_emoji = reaction.text;
            out.reaction_target_id = reaction.key.and_then(|key| key.id);
        }
    }
}

/// 单行摘要：文本类型给出文本，其余类型给出占位符
pub fn summarize(message: &Map<String, Value>) -> Option<String> {
    let placeholder = |label: &str| Some(format!("[{label}]"));
    match detect(message) {
        Detected::Known(ContentKind::Conversation, value) => value.as_str().map(str::to_string),
        Detected::Known(ContentKind::ExtendedText, value) => {
            decode::<ExtendedTextMessage>(ContentKind::ExtendedText, value).text
        }
        Detected::Known(ContentKind::Image, _) => placeholder("Image"),
        Detected::Known(ContentKind::Video, _) => placeholder("Video"),
        Detected::Known(ContentKind::Audio, value) => {
            let media: MediaMessage = decode(ContentKind::Audio, value);
            if media.ptt.unwrap_or(false) {
                placeholder("Voice")
            } else {
                placeholder("Audio")
            }
        }
        Detected::Known(ContentKind::Document, _) => placeholder("Document"),
        Detected::Known(ContentKind::Sticker, _) => placeholder("Sticker"),
        Detected::Known(ContentKind::Location, _) => placeholder("Location"),
        Detected::Known(ContentKind::Contact, _) => placeholder("Contact"),
        Detected::Known(ContentKind::ContactsArray, _) => placeholder("Contacts"),
        Detected::Known(ContentKind::Poll, _) => placeholder("Poll"),
        Detected::Known(ContentKind::Reaction, _) => placeholder("Reaction"),
        Detected::Unsupported(_) => placeholder("Unsupported"),
        Detected::Empty => None,
    }
}
