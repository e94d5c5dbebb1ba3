//! Guéant–Lehalle–Fernandez-Tapia 最优报价
//!
//! 给定GBM参数、风险厌恶系数与两侧成交强度，给出相对mid的最优
//! 买卖距离。任一参数退化（σ、γ、A、k为0或非有限值）时返回零报价

use serde::{Deserialize, Serialize};

use crate::market_dynamics::IntensityParameters;

/// 报价输入
#[derive(Debug, Clone, Copy)]
pub struct QuoteInput {
    pub mid_price: f64,
    /// 库存偏移（单位库存步数，有符号）
    pub inventory: i64,
    pub sigma: f64,
    pub mu: f64,
    pub gamma: f64,
    pub buy: IntensityParameters,
    pub sell: IntensityParameters,
    /// 是否把漂移项并入报价倾斜
    pub with_drift: bool,
}

/// 最优报价
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub bid: f64,
    pub ask: f64,
}

impl Quote {
    pub fn zero() -> Self {
        Self { bid: 0.0, ask: 0.0 }
    }

    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }
}

/// 单侧距离项
struct SideTerms {
    sqrt_term: f64,
    ln_term: f64,
}

fn side_terms(sigma: f64, gamma: f64, side: &IntensityParameters) -> Option<SideTerms> {
    if !is_positive(sigma) || !is_positive(gamma) || !is_positive(side.a) || !is_positive(side.k) {
        return None;
    }
    let ratio = gamma / side.k;
    let sqrt_term = (sigma * sigma * gamma / (2.0 * side.k * side.a)
        * (1.0 + ratio).powf(1.0 + side.k / gamma))
    .sqrt();
    let ln_term = (1.0 + ratio).ln() / gamma;
    if !sqrt_term.is_finite() || !ln_term.is_finite() {
        return None;
    }
    Some(SideTerms { sqrt_term, ln_term })
}

fn is_positive(v: f64) -> bool {
    v > 0.0 && v.is_finite()
}

/// 最优报价。保证 bid ≤ mid ≤ ask，绝不穿越mid
pub fn compute_quote(input: &QuoteInput) -> Quote {
    let buy_terms = match side_terms(input.sigma, input.gamma, &input.buy) {
        Some(t) => t,
        None => return Quote::zero(),
    };
    let sell_terms = match side_terms(input.sigma, input.gamma, &input.sell) {
        Some(t) => t,
        None => return Quote::zero(),
    };

    let q = input.inventory as f64;
    let drift_skew = if input.with_drift {
        input.mu / (input.gamma * input.sigma * input.sigma)
    } else {
        0.0
    };

    let bid_multiplier = (2.0 * q + 1.0) / 2.0 - drift_skew;
    let ask_multiplier = -(2.0 * q - 1.0) / 2.0 + drift_skew;

    let bid_distance = buy_terms.ln_term + bid_multiplier * buy_terms.sqrt_term;
    let ask_distance = sell_terms.ln_term + ask_multiplier * sell_terms.sqrt_term;

    Quote {
        bid: (input.mid_price - bid_distance).min(input.mid_price),
        ask: (input.mid_price + ask_distance).max(input.mid_price),
    }
}

/// 报价价差（退化输入时为0）
pub fn compute_spread(input: &QuoteInput) -> f64 {
    compute_quote(input).spread()
}
