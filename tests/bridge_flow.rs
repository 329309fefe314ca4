use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wa_bridge_core::identity::{ChangeKind, MappingEvent};
use wa_bridge_core::{
    CollectingSink, FsMappingStore, IdentifierResolver, IdentityCache, IdentityConfig,
    MemoryMappingStore, MessagePipeline, MessageType, MessageUpsert, Provenance, build_resolver,
};

const PREFIX: &str = "lid-mapping";

fn write_forward(dir: &Path, phone: &str, lid: &str) {
    fs::write(
        dir.join(format!("{PREFIX}-{phone}.json")),
        format!("\"{lid}\""),
    )
    .expect("write forward mapping");
}

fn fs_resolver(dir: &Path) -> IdentifierResolver {
    let cache = IdentityCache::new(Arc::new(FsMappingStore::new(dir)), PREFIX);
    IdentifierResolver::new(Arc::new(cache))
}

#[test]
fn loads_forward_and_reverse_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_forward(dir.path(), "5511999990001", "90000000000000001");
    write_forward(dir.path(), "5511999990002", "90000000000000002");
    fs::write(
        dir.path().join(format!("{PREFIX}-90000000000000003_reverse.json")),
        "\"5511999990003@s.whatsapp.net\"",
    )
    .expect("write reverse");
    fs::write(dir.path().join(format!("{PREFIX}-5511999990004.json")), "{oops").expect("write");
    fs::write(dir.path().join("creds.json"), "{}").expect("write");

    let resolver = fs_resolver(dir.path());
    let cache = resolver.cache();
    assert_eq!(cache.load(), 3);
    for n in 1..=3 {
        let lid = format!("9000000000000000{n}");
        let phone = format!("551199999000{n}");
        assert_eq!(cache.get_phone(&lid).as_deref(), Some(phone.as_str()));
        assert_eq!(cache.get_lid(&phone).as_deref(), Some(lid.as_str()));
    }

    let report = cache.validate();
    assert!(report.auth_dir_exists);
    // 只按正向文件名计数，内容损坏的文件也算在内
    assert_eq!(report.mapping_count, 3);
}

#[test]
fn missing_directory_is_not_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let resolver = fs_resolver(&dir.path().join("not-created-yet"));

    let report = resolver.cache().validate();
    assert!(!report.auth_dir_exists);
    let json = serde_json::to_value(&report).expect("serialize");
    assert_eq!(json["authDirExists"], false);

    let phone_shaped = resolver.resolve("551199998888@lid");
    assert_eq!(phone_shaped.phone_number.as_deref(), Some("551199998888"));
    assert_eq!(phone_shaped.provenance, Some(Provenance::Heuristic));

    let opaque = resolver.resolve("abcdef@lid");
    assert!(opaque.phone_number.is_none());
    assert!(opaque.canonical_identifier.is_none());
}

#[test]
fn change_event_reloads_new_forward_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_forward(dir.path(), "5511999990001", "90000000000000001");

    let resolver = fs_resolver(dir.path());
    assert_eq!(resolver.cache().load(), 1);
    assert!(resolver.cache().get_phone("90000000000000099").is_none());

    write_forward(dir.path(), "5511999990099", "90000000000000099");
    let file_name = format!("{PREFIX}-5511999990099.json");
    resolver
        .cache()
        .event_sender()
        .send(MappingEvent::new(file_name, ChangeKind::Created))
        .expect("send event");

    let found = resolver.resolve("90000000000000099@lid");
    assert_eq!(found.phone_number.as_deref(), Some("5511999990099"));
    assert_eq!(found.provenance, Some(Provenance::Cache));
    assert_eq!(
        found.canonical_identifier.as_deref(),
        Some("5511999990099@s.whatsapp.net")
    );
}

#[test]
fn in_memory_store_backs_the_resolver() {
    let store = Arc::new(MemoryMappingStore::new());
    store.put_forward(PREFIX, "5511999990005", "90000000000000005");
    let resolver = IdentifierResolver::new(Arc::new(IdentityCache::new(store.clone(), PREFIX)));

    let first = resolver.resolve("90000000000000005@lid");
    assert_eq!(first.phone_number.as_deref(), Some("5511999990005"));
    let reads = store.accesses();

    let again = resolver.resolve("90000000000000005@lid");
    assert_eq!(again, first);
    assert_eq!(store.accesses(), reads);
}

#[tokio::test]
async fn polling_watcher_picks_up_new_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_forward(dir.path(), "5511999990001", "90000000000000001");

    let resolver = build_resolver(&IdentityConfig {
        auth_dir: dir.path().to_path_buf(),
        file_prefix: PREFIX.to_string(),
        watch_interval_ms: 20,
        watch: true,
    });
    assert_eq!(resolver.cache().load(), 1);
    assert!(resolver.cache().is_watching());

    write_forward(dir.path(), "5511999990077", "90000000000000077");
    tokio::time::sleep(Duration::from_millis(300)).await;

    let found = resolver.resolve("90000000000000077@lid");
    assert_eq!(found.phone_number.as_deref(), Some("5511999990077"));
    assert_eq!(found.provenance, Some(Provenance::Cache));
}

#[tokio::test]
async fn pipeline_delivers_normalized_envelopes() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_forward(dir.path(), "5511999990001", "90000000000000001");
    write_forward(dir.path(), "5511999990002", "90000000000000002");

    let resolver = Arc::new(fs_resolver(dir.path()));
    let sink = Arc::new(CollectingSink::new());
    let pipeline = MessagePipeline::new(resolver, sink.clone());

    let upsert: MessageUpsert = serde_json::from_value(json!({
        "type": "notify",
        "messages": [
            {
                "key": { "id": "M1", "remoteJid": "90000000000000001@lid" },
                "message": { "conversation": "hi" },
                "messageTimestamp": 1700000000,
                "pushName": "Ana"
            },
            {
                "key": {
                    "id": "M2",
                    "remoteJid": "120363000000000000@g.us",
                    "participant": "90000000000000002@lid"
                },
                "message": {
                    "imageMessage": {
                        "mimetype": "image/jpeg",
                        "fileLength": 1024,
                        "caption": "pic"
                    }
                },
                "messageTimestamp": "1700000001"
            },
            {
                "key": { "id": "M3", "remoteJid": "5511999990003@s.whatsapp.net" },
                "message": { "fooMessage": {} }
            }
        ]
    }))
    .expect("upsert");

    assert_eq!(pipeline.handle_upsert(upsert).await, 3);
    let envelopes = sink.take();
    assert_eq!(envelopes.len(), 3);

    let text = serde_json::to_value(&envelopes[0]).expect("serialize");
    assert_eq!(text["event"], "message.received");
    assert_eq!(text["data"]["from"], "5511999990001");
    assert_eq!(text["data"]["messageType"], "text");
    assert_eq!(text["data"]["content"], "hi");
    assert_eq!(text["data"]["timestamp"], 1_700_000_000_000i64);
    assert_eq!(text["data"]["hasMedia"], false);

    let image = &envelopes[1].data;
    assert!(image.is_group);
    assert_eq!(image.participant.as_deref(), Some("5511999990002"));
    assert_eq!(image.message_type, MessageType::Image);
    assert!(image.has_media);
    assert_eq!(image.mime_type.as_deref(), Some("image/jpeg"));
    assert_eq!(image.file_size, Some(1024));
    assert_eq!(image.caption.as_deref(), Some("pic"));

    let unsupported = &envelopes[2].data;
    assert_eq!(unsupported.message_type, MessageType::Unsupported);
    assert_eq!(unsupported.content.as_deref(), Some("fooMessage"));
}
