//! K线实体
//!
//! 按 (exchange_name, market, timeframe, timestamp) 唯一

use serde::{Deserialize, Serialize};
use spot_maker_common::types::CandleItem;

use crate::enums::Timeframe;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub exchange_name: String,
    pub market: String,
    pub timeframe: Timeframe,
    /// 开盘时间（毫秒）
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// 唯一键
    pub fn key(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.exchange_name,
            self.market,
            self.timeframe.as_str(),
            self.timestamp
        )
    }

    /// 转换为指标输入行
    pub fn to_item(&self) -> anyhow::Result<CandleItem> {
        Ok(CandleItem::new(
            self.timestamp,
            self.open,
            self.high,
            self.low,
            self.close,
            self.volume,
        )?)
    }
}
