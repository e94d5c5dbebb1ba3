//! 对数收益率

use spot_maker_common::types::CandleItem;

/// 对数收益率序列：index 0 为 0，其余为 ln(close[i]/close[i−1])
pub fn log_returns(candles: &[CandleItem]) -> Vec<f64> {
    let mut result = vec![0.0; candles.len()];
    for i in 1..candles.len() {
        let prev = candles[i - 1].close();
        let cur = candles[i].close();
        if prev > 0.0 && cur > 0.0 {
            result[i] = (cur / prev).ln();
        }
    }
    result
}
