use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CandleError {
    #[error("K线字段不是有限数: {field}={value}")]
    NotFinite { field: &'static str, value: f64 },

    #[error("K线字段为负: {field}={value}")]
    Negative { field: &'static str, value: f64 },

    #[error("高低价未包含开收价: o={open} h={high} l={low} c={close}")]
    RangeViolation {
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },
}

/// 不可变OHLCV行，指标计算的统一输入
///
/// 构造即校验：所有字段有限且非负，高低价必须包含开收价。
/// 通过校验的行在整个引擎里无需再检查
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct CandleItem {
    ts: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl CandleItem {
    pub fn new(
        ts: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Result<Self, CandleError> {
        for (field, value) in [
            ("open", open),
            ("high", high),
            ("low", low),
            ("close", close),
            ("volume", volume),
        ] {
            if !value.is_finite() {
                return Err(CandleError::NotFinite { field, value });
            }
            if value < 0.0 {
                return Err(CandleError::Negative { field, value });
            }
        }
        if high < low || high < open.max(close) || low > open.min(close) {
            return Err(CandleError::RangeViolation {
                open,
                high,
                low,
                close,
            });
        }

        Ok(Self {
            ts,
            open,
            high,
            low,
            close,
            volume,
        })
    }

    /// 交易所适配器返回的 [ts, o, h, l, c, v] 行
    pub fn from_ohlcv_row(row: &[f64; 6]) -> Result<Self, CandleError> {
        Self::new(row[0] as i64, row[1], row[2], row[3], row[4], row[5])
    }

    pub fn ts(&self) -> i64 {
        self.ts
    }
    pub fn open(&self) -> f64 {
        self.open
    }
    pub fn high(&self) -> f64 {
        self.high
    }
    pub fn low(&self) -> f64 {
        self.low
    }
    pub fn close(&self) -> f64 {
        self.close
    }
    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// 估算成交额: volume × OHLC均价
    pub fn quote_volume_estimate(&self) -> f64 {
        self.volume * (self.open + self.high + self.low + self.close) / 4.0
    }
}

/// 通道访问器：把K线序列拆成指标所需的列向量
pub fn opens(candles: &[CandleItem]) -> Vec<f64> {
    candles.iter().map(|c| c.open).collect()
}

pub fn highs(candles: &[CandleItem]) -> Vec<f64> {
    candles.iter().map(|c| c.high).collect()
}

pub fn lows(candles: &[CandleItem]) -> Vec<f64> {
    candles.iter().map(|c| c.low).collect()
}

pub fn closes(candles: &[CandleItem]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}

pub fn volumes(candles: &[CandleItem]) -> Vec<f64> {
    candles.iter().map(|c| c.volume).collect()
}
