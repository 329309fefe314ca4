//! 工具函数模块
//!
//! 提供时间戳转换、协议 Long 数值解析等通用工具函数

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// 获取当前时间戳（毫秒）
pub fn current_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// 秒级时间戳转换为毫秒数
pub fn seconds_to_millis(seconds: u64) -> Option<i64> {
    i64::try_from(seconds).ok()?.checked_mul(1000)
}

/// 毫秒数转换为 DateTime
pub fn millis_to_datetime(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

/// 解析协议中的 Long 数值
///
/// 同一个字段在不同客户端版本中可能是数字、数字字符串，
/// 或者 `{ "low": .., "high": .., "unsigned": .. }` 形式的 64 位拆分值。
pub fn parse_long(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        Value::Object(map) => {
            let low = map.get("low").and_then(Value::as_i64)?;
            let high = map.get("high").and_then(Value::as_i64).unwrap_or(0);
            let combined = ((high as u64 & 0xFFFF_FFFF) << 32) | (low as u64 & 0xFFFF_FFFF);
            Some(combined)
        }
        _ => None,
    }
}

/// serde 辅助：宽松解析可选 Long 字段，无法识别的值视为缺失
pub fn de_opt_long<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(parse_long))
}

/// serde 辅助：宽松解析可选浮点字段
pub fn de_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}
