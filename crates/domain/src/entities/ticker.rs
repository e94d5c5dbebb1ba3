//! Ticker实体

use serde::{Deserialize, Serialize};

/// 行情快照
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Ticker {
    /// 时间戳（毫秒）
    pub timestamp: i64,
    /// 最优买价
    pub bid: f64,
    /// 最优卖价
    pub ask: f64,
    /// 最新成交价
    pub last: f64,
    /// 24h基础币种成交量
    pub base_volume: f64,
    /// 24h计价币种成交量
    pub quote_volume: f64,
}

impl Ticker {
    /// 中间价
    pub fn average(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }

    /// 买卖价差
    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_and_spread() {
        let t = Ticker {
            timestamp: 0,
            bid: 99.0,
            ask: 101.0,
            last: 100.0,
            base_volume: 10.0,
            quote_volume: 1000.0,
        };
        assert_eq!(t.average(), 100.0);
        assert_eq!(t.spread(), 2.0);
    }
}
