//! # 消息归一化
//!
//! 把协议推送的原始消息转换为稳定的 [`NormalizedMessage`]。
//! 归一化不会失败：未知内容归为 `unsupported`，缺失内容归为 `unknown`，
//! 无法解析的身份字段保持为 null。

pub mod content;
mod quoted;
pub mod types;

use serde_json::Value;
use tracing::{debug, warn};

use crate::resolver::jid::{is_group, is_lid};
use crate::resolver::{IdentifierResolver, Resolution};
use crate::utils::{current_millis, parse_long, seconds_to_millis};
use content::{ContentKind, Detected, ExtendedTextMessage, apply_content, decode, detect};
pub use types::{
    ContactCard, MentionedParty, MessageKey, MessageType, MessageUpsert, NormalizedMessage,
    QuotedMessage, RawMessage, UpsertKind,
};

/// 归一化单条消息
pub fn normalize(raw: &RawMessage, resolver: &IdentifierResolver) -> NormalizedMessage {
    let message_id = raw.key.id.as_deref();
    let mut out = NormalizedMessage {
        id: raw.key.id.clone(),
        timestamp: message_timestamp(raw),
        raw_from: raw.key.remote_jid.clone(),
        from_me: raw.key.from_me,
        push_name: raw.push_name.clone(),
        ..NormalizedMessage::default()
    };

    if let Some(remote_jid) = raw.key.remote_jid.as_deref() {
        out.is_group = is_group(remote_jid);
        let sender = resolve_party(
            resolver,
            remote_jid,
            raw.key.remote_jid_alt.as_deref(),
            message_id,
            "from",
        );
        out.from = sender.phone_number;
        out.from_lid = sender.lid;
        out.from_jid = sender.canonical_identifier;
        out.from_provenance = sender.provenance;
    }

    if let Some(participant) = raw.key.participant.as_deref().filter(|p| !p.is_empty()) {
        let party = resolve_party(
            resolver,
            participant,
            raw.key.participant_alt.as_deref(),
            message_id,
            "participant",
        );
        out.participant = party.phone_number;
        out.participant_lid = party.lid;
        out.participant_jid = party.canonical_identifier;
        out.participant_provenance = party.provenance;
    }

    let Some(message) = raw.message.as_ref() else {
        debug!(message_id, "Message has no content block");
        return out;
    };
    out.raw_message = Some(Value::Object(message.clone()));

    match detect(message) {
        Detected::Known(kind, value) => {
            apply_content(&mut out, kind, value);
            if kind == ContentKind::ExtendedText {
                let text: ExtendedTextMessage = decode(kind, value);
                if let Some(context) = text.context_info.as_ref() {
                    out.quoted = quoted::quoted_message(context, resolver);
                    out.mentions = quoted::mentions(context, resolver, message_id);
                }
            }
        }
        Detected::Unsupported(key) => {
            debug!(message_id, key, "Unsupported content type");
            out.message_type = MessageType::Unsupported;
            out.content = Some(key.to_string());
        }
        Detected::Empty => {}
    }

    debug!(
        message_id,
        message_type = %out.message_type,
        is_group = out.is_group,
        "message_normalized"
    );
    out
}

fn resolve_party(
    resolver: &IdentifierResolver,
    jid: &str,
    hint: Option<&str>,
    message_id: Option<&str>,
    field: &'static str,
) -> Resolution {
    let resolution = resolver.resolve_with_hint(jid, hint);
    if is_lid(jid) && !resolution.is_resolved() {
        warn!(message_id, field, jid, "lid_resolution_failed");
    }
    resolution
}

fn message_timestamp(raw: &RawMessage) -> i64 {
    raw.message_timestamp
        .as_ref()
        .and_then(parse_long)
        .and_then(seconds_to_millis)
        .unwrap_or_else(current_millis)
}
