//! 几何布朗运动参数估计
//!
//! 以1h对数收益率估计日尺度参数：σ = std_unbiased(r)·√24，
//! μ = mean(r)·24 + σ²/2

use serde::{Deserialize, Serialize};

use spot_maker_common::types::CandleItem;
use spot_maker_common::utils::{mean, std_unbiased};
use spot_maker_common::EngineError;
use spot_maker_indicators::log_returns;

/// 估计所需的小时K线数量：一周
pub const GBM_REQUIRED_HOUR_CANDLES: usize = 24 * 7;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GbmParameters {
    /// 日尺度波动率
    pub sigma: f64,
    /// 日尺度漂移
    pub mu: f64,
}

/// 从最近一周的1h K线估计GBM参数
pub fn compute_gbm_parameters(hour_candles: &[CandleItem]) -> Result<GbmParameters, EngineError> {
    if hour_candles.len() < GBM_REQUIRED_HOUR_CANDLES {
        return Err(EngineError::InsufficientData {
            required: GBM_REQUIRED_HOUR_CANDLES,
            actual: hour_candles.len(),
        });
    }

    let returns = log_returns(hour_candles);
    let sigma = std_unbiased(&returns) * (24.0f64).sqrt();
    let mu = mean(&returns) * 24.0 + sigma * sigma / 2.0;

    Ok(GbmParameters { sigma, mu })
}
