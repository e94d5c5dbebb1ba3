//! 相对强弱指数（EMA平滑）

use spot_maker_common::types::{closes, volumes, CandleItem};

use crate::trend::{ema, volume_ema};

fn up_down_moves(closes: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let mut up = vec![0.0; closes.len()];
    let mut down = vec![0.0; closes.len()];
    for i in 1..closes.len() {
        let change = closes[i] - closes[i - 1];
        up[i] = change.max(0.0);
        down[i] = (-change).max(0.0);
    }
    (up, down)
}

/// RSI = 100 − 100/(1 + EMA(up)/EMA(down))；EMA(down)=0 时取100
pub fn rsi(candles: &[CandleItem], period: usize) -> Vec<f64> {
    let closes = closes(candles);
    let (up, down) = up_down_moves(&closes);
    let up_ema = ema(&up, period);
    let down_ema = ema(&down, period);
    up_ema
        .iter()
        .zip(down_ema.iter())
        .map(|(u, d)| {
            if *d == 0.0 {
                100.0
            } else {
                100.0 - 100.0 / (1.0 + u / d)
            }
        })
        .collect()
}

/// 成交量加权RSI
///
/// 上游实现的最终公式有运算优先级缺陷（`100 − (100/1 + rs)`），
/// 此处按修正后的 `100 − 100/(1+rs)` 计算，见 DESIGN.md
pub fn vrsi(candles: &[CandleItem], period: usize) -> Vec<f64> {
    let closes = closes(candles);
    let vols = volumes(candles);
    let (up, down) = up_down_moves(&closes);
    let up_vema = volume_ema(&up, &vols, period);
    let down_vema = volume_ema(&down, &vols, period);
    up_vema
        .iter()
        .zip(down_vema.iter())
        .map(|(u, d)| {
            if *d == 0.0 {
                100.0
            } else {
                100.0 - 100.0 / (1.0 + u / d)
            }
        })
        .collect()
}
