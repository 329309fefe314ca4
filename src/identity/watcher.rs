//! # 映射目录监听器
//!
//! 定时扫描认证目录，把文件的新增/修改/删除转换为 [`MappingEvent`]
//! 发送到通道上。身份缓存只订阅通道，不关心事件从哪里来。

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// 文件变更类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

/// 目录变更事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEvent {
    pub file_name: String,
    pub kind: ChangeKind,
}

impl MappingEvent {
    pub fn new(file_name: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            file_name: file_name.into(),
            kind,
        }
    }
}

/// 活跃的监听任务，drop 时停止
#[derive(Debug)]
pub struct WatchHandle {
    task: JoinHandle<()>,
}

impl WatchHandle {
    pub fn new(task: JoinHandle<()>) -> Self {
        Self { task }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// 变更事件源
pub trait WatchSource: Send + Sync {
    /// 开始监听，事件写入 `sender`；无法启动时返回 None
    fn start(&self, sender: UnboundedSender<MappingEvent>) -> Option<WatchHandle>;
}

type Snapshot = HashMap<String, SystemTime>;

/// 轮询式目录监听器
#[derive(Debug, Clone)]
pub struct PollingWatcher {
    dir: PathBuf,
    interval: Duration,
}

impl PollingWatcher {
    pub fn new<P: Into<PathBuf>>(dir: P, interval: Duration) -> Self {
        Self {
            dir: dir.into(),
            interval,
        }
    }

    fn snapshot(&self) -> Snapshot {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return Snapshot::new();
        };
        entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_str()?.to_string();
                let meta = entry.metadata().ok()?;
                if !meta.is_file() {
                    return None;
                }
                Some((name, meta.modified().unwrap_or(SystemTime::UNIX_EPOCH)))
            })
            .collect()
    }
}

/// 对比两次快照，得到按文件名排序的事件列表
pub fn diff_snapshots(
    previous: &HashMap<String, SystemTime>,
    current: &HashMap<String, SystemTime>,
) -> Vec<MappingEvent> {
    let mut events = Vec::new();
    for (name, modified) in current {
        match previous.get(name) {
            None => events.push(MappingEvent::new(name.clone(), ChangeKind::Created)),
            Some(prev) if prev != modified => {
                events.push(MappingEvent::new(name.clone(), ChangeKind::Modified))
            }
            Some(_) => {}
        }
    }
    for name in previous.keys() {
        if !current.contains_key(name) {
            events.push(MappingEvent::new(name.clone(), ChangeKind::Removed));
        }
    }
    events.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    events
}

impl WatchSource for PollingWatcher {
    fn start(&self, sender: UnboundedSender<MappingEvent>) -> Option<WatchHandle> {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!(
                    dir = %self.dir.display(),
                    "No tokio runtime available, mapping directory watch disabled"
                );
                return None;
            }
        };

        // 基线快照在 start 返回前拍下，之后写入的文件都会产生事件
        let mut previous = self.snapshot();
        let watcher = self.clone();
        let task = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(watcher.interval);
            // 第一次 tick 立即返回
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let current = watcher.snapshot();
                for event in diff_snapshots(&previous, &current) {
                    debug!(file = %event.file_name, kind = ?event.kind, "mapping_file_changed");
                    if sender.send(event).is_err() {
                        debug!("Mapping event receiver dropped, stopping watcher");
                        return;
                    }
                }
                previous = current;
            }
        });

        info!(
            dir = %self.dir.display(),
            interval_ms = self.interval.as_millis() as u64,
            "Mapping directory watch started"
        );
        Some(WatchHandle::new(task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn test_diff_snapshots() {
        let previous = HashMap::from([
            ("a.json".to_string(), at(1)),
            ("b.json".to_string(), at(1)),
            ("c.json".to_string(), at(1)),
        ]);
        let current = HashMap::from([
            ("a.json".to_string(), at(1)),
            ("b.json".to_string(), at(2)),
            ("d.json".to_string(), at(1)),
        ]);

        let events = diff_snapshots(&previous, &current);
        assert_eq!(
            events,
            vec![
                MappingEvent::new("b.json", ChangeKind::Modified),
                MappingEvent::new("c.json", ChangeKind::Removed),
                MappingEvent::new("d.json", ChangeKind::Created),
            ]
        );
    }

    #[test]
    fn test_start_without_runtime_is_noop() {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let watcher = PollingWatcher::new("/nonexistent", Duration::from_millis(10));
        assert!(watcher.start(tx).is_none());
    }

    #[tokio::test]
    async fn test_polling_watcher_emits_created_event() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let watcher = PollingWatcher::new(dir.path(), Duration::from_millis(20));
        let handle = watcher.start(tx).expect("runtime present");

        tokio::time::sleep(Duration::from_millis(50)).await;
        fs::write(dir.path().join("lid-mapping-5511.json"), "\"777\"").expect("write");

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("event within timeout")
            .expect("channel open");
        assert_eq!(event, MappingEvent::new("lid-mapping-5511.json", ChangeKind::Created));
        drop(handle);
    }

    #[tokio::test]
    async fn test_file_written_right_after_start_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let watcher = PollingWatcher::new(dir.path(), Duration::from_millis(20));
        let handle = watcher.start(tx).expect("runtime present");

        // 监听任务尚未被调度
        fs::write(dir.path().join("lid-mapping-5522.json"), "\"888\"").expect("write");

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("event within timeout")
            .expect("channel open");
        assert_eq!(event, MappingEvent::new("lid-mapping-5522.json", ChangeKind::Created));
        drop(handle);
    }
}
