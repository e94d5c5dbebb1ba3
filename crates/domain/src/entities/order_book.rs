//! 订单簿实体

use serde::{Deserialize, Serialize};

/// 订单簿快照，买卖两侧均按最优价在前排序
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderBook {
    /// 买盘 [(价格, 数量)]，价格降序
    pub bids: Vec<(f64, f64)>,
    /// 卖盘 [(价格, 数量)]，价格升序
    pub asks: Vec<(f64, f64)>,
}

impl OrderBook {
    pub fn best_bid(&self) -> Option<(f64, f64)> {
        self.bids.first().copied()
    }

    pub fn second_best_bid(&self) -> Option<(f64, f64)> {
        self.bids.get(1).copied()
    }

    pub fn best_ask(&self) -> Option<(f64, f64)> {
        self.asks.first().copied()
    }

    pub fn second_best_ask(&self) -> Option<(f64, f64)> {
        self.asks.get(1).copied()
    }
}
