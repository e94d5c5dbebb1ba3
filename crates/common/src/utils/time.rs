use chrono::{DateTime, Utc};

use crate::errors::{EngineError, Result};

/// 解析周期字符串为毫秒数
///
/// 支持 `s|m|h|d` 四种后缀（大小写不敏感），数字前缀为倍数：
/// `"1h"` -> 3_600_000，`"2d"` -> 172_800_000，`"30s"` -> 30_000
pub fn period_to_mill(period: &str) -> Result<i64> {
    let trimmed = period.trim().to_lowercase();
    if trimmed.is_empty() {
        return Err(EngineError::Parse("周期字符串为空".to_string()));
    }

    let unit = trimmed
        .chars()
        .last()
        .ok_or_else(|| EngineError::Parse(format!("无效周期: {}", period)))?;
    let unit_mill: i64 = match unit {
        's' => 1_000,
        'm' => 60_000,
        'h' => 3_600_000,
        'd' => 86_400_000,
        _ => return Err(EngineError::Parse(format!("不支持的周期单位: {}", period))),
    };

    let digits = &trimmed[..trimmed.len() - 1];
    let factor: i64 = if digits.is_empty() {
        1
    } else {
        digits
            .parse()
            .map_err(|_| EngineError::Parse(format!("无效周期倍数: {}", period)))?
    };

    Ok(factor * unit_mill)
}

/// 获取当前毫秒级时间戳
pub fn now_mills() -> i64 {
    Utc::now().timestamp_millis()
}

/// 将毫秒级时间戳转换为可读字符串（UTC）
pub fn mill_time_to_string(timestamp_ms: i64) -> String {
    match DateTime::from_timestamp_millis(timestamp_ms) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => format!("invalid({})", timestamp_ms),
    }
}

/// 时间戳增加指定周期的n倍
pub fn ts_add_n_period(ts: i64, period: &str, n: usize) -> Result<i64> {
    let mill = period_to_mill(period)?;
    Ok(ts + n as i64 * mill)
}

/// 时间戳减少指定周期的n倍
pub fn ts_reduce_n_period(ts: i64, period: &str, n: usize) -> Result<i64> {
    let mill = period_to_mill(period)?;
    Ok(ts - n as i64 * mill)
}
