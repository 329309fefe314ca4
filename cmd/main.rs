//! # wa-bridge-replay 入口
//!
//! 从标准输入逐行读取 upsert 事件（JSON），归一化后投递到 WebHook，
//! 未配置 WebHook 时输出到标准输出

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use wa_bridge_core::logging::init_tracing_from_config;
use wa_bridge_core::{
    DeliverySink, MessagePipeline, MessageUpsert, StdoutSink, WebhookClient, build_resolver,
    load_config,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config_file = std::env::var("CONFIG_FILE").ok();
    let config = load_config(config_file.as_deref());
    init_tracing_from_config(Some(&config.logging));

    let resolver = build_resolver(&config.identity);
    let report = resolver.cache().validate();
    info!(
        auth_dir = %config.identity.auth_dir.display(),
        auth_dir_exists = report.auth_dir_exists,
        mapping_count = report.mapping_count,
        "identity_store_checked"
    );
    if report.auth_dir_exists {
        resolver.cache().preload();
    }

    let sink: Arc<dyn DeliverySink> = match WebhookClient::from_config(&config.webhook)
        .context("failed to build webhook client")?
    {
        Some(client) => {
            info!(endpoint = %client.endpoint(), "delivering to webhook");
            Arc::new(client)
        }
        None => Arc::new(StdoutSink),
    };
    let pipeline = MessagePipeline::new(resolver, sink);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut line_no = 0usize;
    let mut delivered = 0usize;
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<MessageUpsert>(&line) {
            Ok(upsert) => delivered += pipeline.handle_upsert(upsert).await,
            Err(err) => warn!(line = line_no, error = %err, "invalid upsert event"),
        }
    }

    info!(lines = line_no, delivered, "replay finished");
    Ok(())
}
