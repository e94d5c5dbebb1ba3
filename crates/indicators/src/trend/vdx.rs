//! 成交量加权方向性指数 (VDX)
//!
//! 用高低点增量（按收盘价归一化）构造牛/熊点数，做成交量加权EMA平滑，
//! VDX = (vdi⁺ − vdi⁻) / (vdi⁺ + vdi⁻)，取值 [-1, 1]

use spot_maker_common::types::{closes, highs, lows, volumes, CandleItem};

use crate::trend::volume_ema;

/// 牛点数：高点上移量 / 收盘价
fn bull_points(candles: &[CandleItem]) -> Vec<f64> {
    let highs = highs(candles);
    let closes = closes(candles);
    let mut result = vec![0.0; candles.len()];
    for i in 1..candles.len() {
        let delta = (highs[i] - highs[i - 1]).max(0.0);
        result[i] = if closes[i] > 0.0 { delta / closes[i] } else { 0.0 };
    }
    result
}

/// 熊点数：低点下移量 / 收盘价
fn bear_points(candles: &[CandleItem]) -> Vec<f64> {
    let lows = lows(candles);
    let closes = closes(candles);
    let mut result = vec![0.0; candles.len()];
    for i in 1..candles.len() {
        let delta = (lows[i - 1] - lows[i]).max(0.0);
        result[i] = if closes[i] > 0.0 { delta / closes[i] } else { 0.0 };
    }
    result
}

/// 买方方向指标
pub fn vdi_plus(candles: &[CandleItem], period: usize) -> Vec<f64> {
    volume_ema(&bull_points(candles), &volumes(candles), period)
}

/// 卖方方向指标
pub fn vdi_min(candles: &[CandleItem], period: usize) -> Vec<f64> {
    volume_ema(&bear_points(candles), &volumes(candles), period)
}

/// 成交量加权方向性指数
pub fn vdx(candles: &[CandleItem], period: usize) -> Vec<f64> {
    let plus = vdi_plus(candles, period);
    let minus = vdi_min(candles, period);
    plus.iter()
        .zip(minus.iter())
        .map(|(p, m)| {
            let denom = p + m;
            if denom == 0.0 {
                0.0
            } else {
                (p - m) / denom
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(h: f64, l: f64, c: f64, v: f64, ts: i64) -> CandleItem {
        CandleItem::new(ts, c, h, l, c, v).unwrap()
    }

    fn rising_candles(n: usize) -> Vec<CandleItem> {
        (0..n)
            .map(|i| {
                let base = 100.0 + i as f64 * 2.0;
                candle(base + 1.0, base - 1.0, base, 10.0, i as i64)
            })
            .collect()
    }

    fn falling_candles(n: usize) -> Vec<CandleItem> {
        (0..n)
            .map(|i| {
                let base = 200.0 - i as f64 * 2.0;
                candle(base + 1.0, base - 1.0, base, 10.0, i as i64)
            })
            .collect()
    }

    #[test]
    fn test_vdx_bounds() {
        let candles = rising_candles(40);
        for v in vdx(&candles, 14) {
            assert!((-1.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_vdx_positive_in_uptrend() {
        let candles = rising_candles(40);
        let last = *vdx(&candles, 14).last().unwrap();
        assert!(last > 0.9, "uptrend vdx was {}", last);
    }

    #[test]
    fn test_vdx_negative_in_downtrend() {
        let candles = falling_candles(40);
        let last = *vdx(&candles, 14).last().unwrap();
        assert!(last < -0.9, "downtrend vdx was {}", last);
    }

    #[test]
    fn test_vdx_zero_on_flat_market() {
        let candles: Vec<CandleItem> =
            (0..20).map(|i| candle(101.0, 99.0, 100.0, 10.0, i)).collect();
        for v in vdx(&candles, 14) {
            assert_eq!(v, 0.0);
        }
    }
}
