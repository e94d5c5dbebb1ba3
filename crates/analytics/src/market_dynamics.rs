//! 成交强度参数估计
//!
//! 在15m K线上统计价格首达时间：从每根参考K线的mid出发，
//! 记录此后行情首次穿越 s·ΔP 档位的耗时（天），得到每档的到达强度
//! λ[s] = count/Στ，再对 lnλ = b − k·(s·ΔP) 做线性回归，A = exp(b)

use serde::{Deserialize, Serialize};

use spot_maker_common::types::CandleItem;
use spot_maker_common::utils::linear_regression;
use spot_maker_common::EngineError;

/// 价差精度（相对开盘价）
const SPREAD_PRECISION: f64 = 0.03;
/// 档位数
const STEPS: usize = 100;
/// 最少K线数量
const MIN_CANDLES: usize = 16;

const MS_PER_DAY: f64 = 86_400_000.0;

/// 单侧成交强度参数
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IntensityParameters {
    pub a: f64,
    pub k: f64,
}

/// 买卖两侧的成交强度参数
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MarketDynamicsParameters {
    pub buy: IntensityParameters,
    pub sell: IntensityParameters,
}

struct PassageAccumulator {
    /// 各档位的首达时间合计（天）
    sum_days: Vec<f64>,
    /// 各档位的样本数
    counts: Vec<u64>,
}

impl PassageAccumulator {
    fn new() -> Self {
        Self {
            sum_days: vec![0.0; STEPS + 1],
            counts: vec![0; STEPS + 1],
        }
    }

    fn record(&mut self, step: usize, days: f64) {
        self.sum_days[step] += days;
        self.counts[step] += 1;
    }

    /// 按 lnλ[s] = b − k·(s·ΔP) 回归
    fn fit(&self, delta_p: f64) -> Result<IntensityParameters, EngineError> {
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        for s in 1..=STEPS {
            if self.counts[s] > 0 && self.sum_days[s] > 0.0 {
                let lambda = self.counts[s] as f64 / self.sum_days[s];
                xs.push(s as f64 * delta_p);
                ys.push(lambda.ln());
            }
        }

        let (intercept, slope) = linear_regression(&xs, &ys).ok_or({
            EngineError::InsufficientData {
                required: 2,
                actual: xs.len(),
            }
        })?;

        Ok(IntensityParameters {
            a: intercept.exp(),
            k: -slope,
        })
    }
}

/// 从15m K线估计买卖两侧的 (A, k)
pub fn compute_market_dynamics_parameters(
    quarter_candles: &[CandleItem],
) -> Result<MarketDynamicsParameters, EngineError> {
    let n = quarter_candles.len();
    if n < MIN_CANDLES {
        return Err(EngineError::InsufficientData {
            required: MIN_CANDLES,
            actual: n,
        });
    }

    let delta_p = quarter_candles[0].open() * (SPREAD_PRECISION / (2.0 * STEPS as f64));
    if delta_p <= 0.0 || !delta_p.is_finite() {
        return Err(EngineError::Input(format!(
            "无效的档位宽度: {}",
            delta_p
        )));
    }

    let mut buy_acc = PassageAccumulator::new();
    let mut sell_acc = PassageAccumulator::new();

    for i in 0..n / 2 {
        let mid = 0.5 * quarter_candles[i].close() + 0.5 * quarter_candles[i + 1].close();
        let t0 = quarter_candles[i].ts();

        // 单次前向扫描：档位只在首次到达时计数
        let mut reached_buy = 0usize;
        let mut reached_sell = 0usize;
        for candle in quarter_candles.iter().skip(i + 1) {
            let days = (candle.ts() - t0) as f64 / MS_PER_DAY;
            if days <= 0.0 {
                continue;
            }

            let buy_depth = ((mid - candle.low()) / delta_p).floor();
            if buy_depth > reached_buy as f64 {
                let top = (buy_depth as usize).min(STEPS);
                for s in (reached_buy + 1)..=top {
                    buy_acc.record(s, days);
                }
                reached_buy = top;
            }

            let sell_depth = ((candle.high() - mid) / delta_p).floor();
            if sell_depth > reached_sell as f64 {
                let top = (sell_depth as usize).min(STEPS);
                for s in (reached_sell + 1)..=top {
                    sell_acc.record(s, days);
                }
                reached_sell = top;
            }

            if reached_buy >= STEPS && reached_sell >= STEPS {
                break;
            }
        }
    }

    Ok(MarketDynamicsParameters {
        buy: buy_acc.fit(delta_p)?,
        sell: sell_acc.fit(delta_p)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oscillating_candles(n: usize) -> Vec<CandleItem> {
        // 围绕100的慢周期震荡：越深的档位平均首达耗时越长，
        // 两侧都有完整的λ衰减样本
        (0..n)
            .map(|i| {
                let close = 100.0 + 3.0 * (i as f64 / 20.0).sin();
                CandleItem::new(
                    i as i64 * 900_000,
                    close,
                    close + 0.1,
                    close - 0.1,
                    close,
                    10.0,
                )
                .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_insufficient_data() {
        let candles = oscillating_candles(4);
        assert!(matches!(
            compute_market_dynamics_parameters(&candles),
            Err(EngineError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_estimates_positive_parameters() {
        let candles = oscillating_candles(600);
        let params = compute_market_dynamics_parameters(&candles).unwrap();
        // 首达强度随深度衰减：A为正、k为正
        assert!(params.buy.a > 0.0);
        assert!(params.sell.a > 0.0);
        assert!(params.buy.k > 0.0, "k_buy was {}", params.buy.k);
        assert!(params.sell.k > 0.0, "k_sell was {}", params.sell.k);
    }

    #[test]
    fn test_deeper_levels_take_longer() {
        let mut acc = PassageAccumulator::new();
        acc.record(1, 0.5);
        acc.record(2, 2.0);
        let params = acc.fit(0.015).unwrap();
        assert!(params.k > 0.0);
    }
}
