//! 策略选项
//!
//! 类型化默认值 + JSON文档深合并：代理的strategy_options盖在默认值上，
//! market_settings[<market>] 的同名字段最后盖上，只影响该市场

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 入场门控选项
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryOptions {
    /// VDX趋势下限
    pub minimum_trend: f64,
    /// RSI/100价格水平上限
    pub maximum_price_level: f64,
    /// 日对数收益率均值下限
    pub minimum_returns: f64,
    /// 收益率均值回看期
    pub minimum_returns_period: usize,
    /// 成交量均线周期
    pub ma_period_volume: usize,
    /// 回撤判定用的日线EMA周期
    pub ema_period_daily_retracement: usize,
    /// 回撤判定用的日线ATR周期
    pub ema_period_daily: usize,
    /// ATR回撤倍数
    pub atr_retracement_multiplier: f64,
    /// 小时线快EMA周期
    pub ema_period_fast: usize,
    /// 小时线中EMA周期
    pub ema_period_mid: usize,
    /// 成交量买卖平衡回看窗口
    pub volume_balance_period: String,
    /// 同时持仓市场数上限，0为不限
    pub maximum_active_positions: usize,
}

impl Default for EntryOptions {
    fn default() -> Self {
        Self {
            minimum_trend: 0.1,
            maximum_price_level: 0.6,
            minimum_returns: 0.01,
            minimum_returns_period: 10,
            ma_period_volume: 20,
            ema_period_daily_retracement: 20,
            ema_period_daily: 14,
            atr_retracement_multiplier: 1.0,
            ema_period_fast: 12,
            ema_period_mid: 26,
            volume_balance_period: "1h".to_string(),
            maximum_active_positions: 0,
        }
    }
}

/// 离场选项
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitOptions {
    /// 止盈RSI阈值
    pub take_profit_rsi_threshold: f64,
    /// ATR止盈倍数
    pub take_profit_atr_multiplier: f64,
    /// 持仓超过该时长后允许收益率离场
    pub return_based_exit_after: String,
    /// 收益率均线周期
    pub ma_period_returns: usize,
    /// 收益率离场阈值
    pub return_threshold: f64,
    /// 等待盘整用的小时线慢EMA周期
    pub ema_period_slow: usize,
    /// 卖价相对入场价的最小溢价
    pub min_next_quote_difference: f64,
    /// 追踪止损开关（默认关闭，离场触发不含它）
    pub trailing_stop_enabled: bool,
    /// 追踪止损的ATR倍数
    pub volatility_multiplier: f64,
}

impl Default for ExitOptions {
    fn default() -> Self {
        Self {
            take_profit_rsi_threshold: 80.0,
            take_profit_atr_multiplier: 2.0,
            return_based_exit_after: "7d".to_string(),
            ma_period_returns: 10,
            return_threshold: 0.0,
            ema_period_slow: 20,
            min_next_quote_difference: 0.005,
            trailing_stop_enabled: false,
            volatility_multiplier: 2.0,
        }
    }
}

/// 做市核心选项
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketMakerOptions {
    /// 默认波动率（无GBM估计时）
    pub sigma: f64,
    /// 默认漂移
    pub mu: f64,
    /// 风险厌恶系数（模型报价用）
    pub gamma: f64,
    /// 库存档数
    pub inventory_steps: u32,
    /// 固定价差项
    pub spread_fixed_term: f64,
    /// 价差的σ乘数
    pub spread_sigma_multiplier: f64,
    /// 风险厌恶修正系数
    pub risk_aversion_correction: f64,
    /// 最小成交量
    pub min_deal_amount: f64,
    /// 最小名义价值
    pub minimum_notional_value: f64,
    /// 相邻报价的最小间距
    pub min_next_quote_difference: f64,
    /// 动态数量衰减指数
    pub dynamic_amount_dropoff: f64,
    /// 小时线慢EMA周期
    pub ema_period_slow: usize,
    /// 交易区间σ乘数
    pub trading_range_sigma_multiplier: f64,
    /// 单笔上限占24h成交量的比例
    pub trade_volume_cap: f64,
    /// 成交后的冷静期
    pub cool_off_period: String,
    /// 挂单成交比例撤单阈值
    pub auto_cancel_at_fill_percentage: f64,
    /// 用Guéant模型报价替代固定价差公式
    pub use_model_quotes: bool,
    /// 模型报价是否并入漂移倾斜
    pub with_drift: bool,
}

impl Default for MarketMakerOptions {
    fn default() -> Self {
        Self {
            sigma: 0.05,
            mu: 0.0,
            gamma: 0.1,
            inventory_steps: 8,
            spread_fixed_term: 0.005,
            spread_sigma_multiplier: 0.1,
            risk_aversion_correction: 0.1,
            min_deal_amount: 1.0,
            minimum_notional_value: 0.0,
            min_next_quote_difference: 0.005,
            dynamic_amount_dropoff: 20.0,
            ema_period_slow: 20,
            trading_range_sigma_multiplier: 1.0,
            trade_volume_cap: 0.01,
            cool_off_period: "2h".to_string(),
            auto_cancel_at_fill_percentage: 1.0,
            use_model_quotes: false,
            with_drift: false,
        }
    }
}

/// 策略选项总表
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyOptions {
    /// 保留为fiat的资金比例
    pub fiat_ratio: f64,
    /// 订单存活期（周期串，如"1h"）；强制auto_cancel的交易所必填
    pub order_auto_cancel: Option<String>,
    pub entry: EntryOptions,
    pub exit: ExitOptions,
    pub market_maker: MarketMakerOptions,
    /// 市场级文档：配置器写入的can_trade/trend/price_level，
    /// 以及盖在全局选项之上的同名覆盖项
    pub market_settings: HashMap<String, Value>,
}

/// JSON深合并：对象递归合并，其余类型直接覆盖
pub fn deep_merge(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            for (key, patch_value) in patch_map {
                match base_map.get_mut(key) {
                    Some(base_value) => deep_merge(base_value, patch_value),
                    None => {
                        base_map.insert(key.clone(), patch_value.clone());
                    }
                }
            }
        }
        (base_slot, _) => {
            *base_slot = patch.clone();
        }
    }
}

/// 解析代理的选项文档；给定market时把市场级覆盖合并到最后
pub fn resolve_options(agent_options: &Value, market: Option<&str>) -> StrategyOptions {
    let mut doc = serde_json::to_value(StrategyOptions::default())
        .unwrap_or(Value::Null);
    if agent_options.is_object() {
        deep_merge(&mut doc, agent_options);
    }
    if let Some(market) = market {
        if let Some(overrides) = agent_options
            .get("market_settings")
            .and_then(|ms| ms.get(market))
        {
            deep_merge(&mut doc, overrides);
        }
    }
    serde_json::from_value(doc).unwrap_or_default()
}

/// 市场级文档的类型化读数（配置器写入的部分）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketSettingsDoc {
    pub can_trade: bool,
    pub trend: Option<f64>,
    pub price_level: Option<f64>,
    pub sigma: Option<f64>,
    pub mu: Option<f64>,
}

impl MarketSettingsDoc {
    pub fn read(agent_options: &Value, market: &str) -> Self {
        agent_options
            .get("market_settings")
            .and_then(|ms| ms.get(market))
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }
}
