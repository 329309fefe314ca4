//! 引用消息与 @ 成员提取

use tracing::debug;

use super::content::{ContextInfo, summarize};
use super::types::{MentionedParty, QuotedMessage};
use crate::resolver::IdentifierResolver;
use crate::resolver::jid::direct_jid;

/// 提取引用消息摘要，没有引用时返回 None
pub(crate) fn quoted_message(
    context: &ContextInfo,
    resolver: &IdentifierResolver,
) -> Option<QuotedMessage> {
    if context.stanza_id.is_none() && context.quoted_message.is_none() {
        return None;
    }

    let sender = context
        .participant
        .as_deref()
        .map(|participant| resolver.resolve(participant))
        .unwrap_or_default();

    Some(QuotedMessage {
        id: context.stanza_id.clone(),
        participant: sender.phone_number,
        participant_lid: sender.lid,
        content: context.quoted_message.as_ref().and_then(summarize),
    })
}

/// 解析被 @ 的成员，无法解析的直接丢弃
pub(crate) fn mentions(
    context: &ContextInfo,
    resolver: &IdentifierResolver,
    message_id: Option<&str>,
) -> Vec<MentionedParty> {
    context
        .mentioned_jid
        .iter()
        .filter_map(|jid| {
            let resolution = resolver.resolve(jid);
            let Some(phone_number) = resolution.phone_number else {
                debug!(message_id, jid = %jid, "Dropping unresolvable mention");
                return None;
            };
            Some(MentionedParty {
                jid: resolution
                    .canonical_identifier
                    .unwrap_or_else(|| direct_jid(&phone_number)),
                phone_number,
                lid: resolution.lid,
            })
        })
        .collect()
}
