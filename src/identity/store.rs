//! # 映射文件存储
//!
//! 协议客户端把 LID ⇄ 手机号映射写在认证目录下，每个文件一个 JSON 标量：
//!
//! - 正向文件 `<prefix>-<phoneNumber>.json`，内容是 LID
//! - 反向文件 `<prefix>-<lid>_reverse.json`，内容是手机号
//!
//! 本模块只读这些文件，写入由协议客户端负责。

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use serde_json::Value;

use crate::error::{BridgeError, Result};

/// 默认文件前缀
pub const DEFAULT_FILE_PREFIX: &str = "lid-mapping";

const REVERSE_MARKER: &str = "_reverse";
const FILE_EXTENSION: &str = ".json";

/// 一条双向映射事实
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingRecord {
    pub lid: String,
    pub phone_number: String,
}

/// 映射文件名的两种形态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingFileName {
    /// 文件名嵌入手机号，内容为 LID
    Forward { phone_number: String },
    /// 文件名嵌入 LID，内容为手机号
    Reverse { lid: String },
}

impl MappingFileName {
    /// 按前缀解析文件名，不属于映射布局的文件返回 None
    pub fn parse(prefix: &str, file_name: &str) -> Option<Self> {
        let stem = file_name
            .strip_prefix(prefix)?
            .strip_prefix('-')?
            .strip_suffix(FILE_EXTENSION)?;

        if let Some(lid) = stem.strip_suffix(REVERSE_MARKER) {
            if lid.is_empty() {
                return None;
            }
            return Some(MappingFileName::Reverse {
                lid: lid.to_string(),
            });
        }

        if stem.is_empty() {
            return None;
        }
        Some(MappingFileName::Forward {
            phone_number: stem.to_string(),
        })
    }

    pub fn forward(prefix: &str, phone_number: &str) -> String {
        format!("{prefix}-{phone_number}{FILE_EXTENSION}")
    }

    pub fn reverse(prefix: &str, lid: &str) -> String {
        format!("{prefix}-{lid}{REVERSE_MARKER}{FILE_EXTENSION}")
    }

    pub fn is_forward(&self) -> bool {
        matches!(self, MappingFileName::Forward { .. })
    }
}

/// 解析单个映射文件的内容
///
/// 内容应为 JSON 字符串（也接受数字）。如果写入方存的是完整标识符，
/// 只保留 `@` 之前的用户部分，并去掉 `:device` 后缀。
pub fn parse_scalar(path: &Path, content: &str) -> Result<String> {
    let value: Value = serde_json::from_str(content.trim())
        .map_err(|err| BridgeError::malformed(path, err.to_string()))?;

    let raw = match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        other => {
            return Err(BridgeError::malformed(
                path,
                format!("expected a string scalar, found {other}"),
            ));
        }
    };

    let user = raw.split('@').next().unwrap_or_default();
    let user = user.split(':').next().unwrap_or_default().trim();
    if user.is_empty() {
        return Err(BridgeError::malformed(path, "empty mapping value"));
    }
    Ok(user.to_string())
}

/// 映射存储接口
///
/// 身份缓存和解析器的文件兜底策略都通过该接口访问存储，
/// 测试中可以替换为内存实现。
pub trait MappingStore: Send + Sync {
    /// 存储位置（仅用于日志）
    fn location(&self) -> &Path;

    /// 存储目录是否存在
    fn exists(&self) -> bool;

    /// 列出目录中的所有文件名
    fn list(&self) -> Result<Vec<String>>;

    /// 读取单个文件的标量值，文件不存在时返回 `Ok(None)`
    fn read_value(&self, file_name: &str) -> Result<Option<String>>;
}

/// 基于文件系统的映射存储
#[derive(Debug, Clone)]
pub struct FsMappingStore {
    dir: PathBuf,
}

impl FsMappingStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }
}

impl MappingStore for FsMappingStore {
    fn location(&self) -> &Path {
        &self.dir
    }

    fn exists(&self) -> bool {
        self.dir.is_dir()
    }

    fn list(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.dir).map_err(|err| BridgeError::io(&self.dir, err))?;
        let mut names = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .collect::<Vec<_>>();
        names.sort();
        Ok(names)
    }

    fn read_value(&self, file_name: &str) -> Result<Option<String>> {
        let path = self.dir.join(file_name);
        match fs::read_to_string(&path) {
            Ok(content) => parse_scalar(&path, &content).map(Some),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(BridgeError::io(path, err)),
        }
    }
}

/// 内存映射存储
///
/// 文件名到原始 JSON 内容的映射。凭据不落在本地目录的嵌入方
/// （例如保存在数据库中）可以用它承载映射，通过 `put_forward` /
/// `put_reverse` 写入后交给 [`IdentityCache`](crate::identity::IdentityCache)。
///
/// `accesses` 统计 `list` / `read_value` 的调用次数，
/// 用来观察缓存命中后是否还有存储访问。
#[derive(Debug)]
pub struct MemoryMappingStore {
    location: PathBuf,
    present: AtomicBool,
    files: RwLock<BTreeMap<String, String>>,
    accesses: AtomicUsize,
}

impl MemoryMappingStore {
    pub fn new() -> Self {
        Self {
            location: PathBuf::from("memory://auth"),
            present: AtomicBool::new(true),
            files: RwLock::new(BTreeMap::new()),
            accesses: AtomicUsize::new(0),
        }
    }

    /// 目录不存在的存储（新会话）
    pub fn missing() -> Self {
        let store = Self::new();
        store.present.store(false, Ordering::SeqCst);
        store
    }

    /// 写入原始文件内容，同时让目录变为存在
    pub fn put(&self, file_name: &str, raw_json: &str) {
        self.present.store(true, Ordering::SeqCst);
        self.files
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(file_name.to_string(), raw_json.to_string());
    }

    pub fn put_forward(&self, prefix: &str, phone_number: &str, lid: &str) {
        self.put(
            &MappingFileName::forward(prefix, phone_number),
            &Value::String(lid.to_string()).to_string(),
        );
    }

    pub fn put_reverse(&self, prefix: &str, lid: &str, phone_number: &str) {
        self.put(
            &MappingFileName::reverse(prefix, lid),
            &Value::String(phone_number.to_string()).to_string(),
        );
    }

    /// list/read_value 的累计调用次数
    pub fn accesses(&self) -> usize {
        self.accesses.load(Ordering::SeqCst)
    }
}

impl Default for MemoryMappingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MappingStore for MemoryMappingStore {
    fn location(&self) -> &Path {
        &self.location
    }

    fn exists(&self) -> bool {
        self.present.load(Ordering::SeqCst)
    }

    fn list(&self) -> Result<Vec<String>> {
        self.accesses.fetch_add(1, Ordering::SeqCst);
        if !self.exists() {
            return Err(BridgeError::io(
                &self.location,
                std::io::Error::from(ErrorKind::NotFound),
            ));
        }
        let files = self.files.read().unwrap_or_else(|e| e.into_inner());
        Ok(files.keys().cloned().collect())
    }

    fn read_value(&self, file_name: &str) -> Result<Option<String>> {
        self.accesses.fetch_add(1, Ordering::SeqCst);
        let files = self.files.read().unwrap_or_else(|e| e.into_inner());
        match files.get(file_name) {
            Some(content) => parse_scalar(&self.location.join(file_name), content).map(Some),
            None => Ok(None),
        }
    }
}
