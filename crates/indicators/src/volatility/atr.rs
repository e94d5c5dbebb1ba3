//! 平均真实波幅（EMA平滑）

use spot_maker_common::types::CandleItem;

use crate::trend::ema;

/// 真实波幅序列
///
/// tr[0] = high − low；
/// tr[i] = max(high − low, |high − close[i-1]|, |low − close[i-1]|)
pub fn true_range(candles: &[CandleItem]) -> Vec<f64> {
    let mut result = Vec::with_capacity(candles.len());
    for (i, c) in candles.iter().enumerate() {
        if i == 0 {
            result.push(c.high() - c.low());
        } else {
            let prev_close = candles[i - 1].close();
            let tr = (c.high() - c.low())
                .max((c.high() - prev_close).abs())
                .max((c.low() - prev_close).abs());
            result.push(tr);
        }
    }
    result
}

/// ATR = EMA(TR, period)
pub fn atr(candles: &[CandleItem], period: usize) -> Vec<f64> {
    ema(&true_range(candles), period)
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    fn candle(h: f64, l: f64, c: f64, ts: i64) -> CandleItem {
        CandleItem::new(ts, c, h, l, c, 1.0).unwrap()
    }

    #[test]
    fn test_true_range_with_gap() {
        let candles = vec![
            candle(10.0, 8.0, 9.0, 0),
            // 跳空高开：TR 由 |high − prev_close| 主导
            candle(15.0, 14.0, 14.5, 1),
        ];
        let tr = true_range(&candles);
        assert!(approx_eq!(f64, tr[0], 2.0, epsilon = 1e-12));
        assert!(approx_eq!(f64, tr[1], 6.0, epsilon = 1e-12));
    }

    #[test]
    fn test_atr_constant_range() {
        let candles: Vec<CandleItem> =
            (0..30).map(|i| candle(102.0, 98.0, 100.0, i)).collect();
        let values = atr(&candles, 14);
        assert_eq!(values.len(), 30);
        // 恒定波幅收敛到波幅本身
        assert!(approx_eq!(f64, *values.last().unwrap(), 4.0, epsilon = 0.01));
    }

    #[test]
    fn test_atr_same_length_as_input() {
        let candles = vec![candle(10.0, 9.0, 9.5, 0)];
        assert_eq!(atr(&candles, 14).len(), 1);
    }
}
