//! 交易代理实体
//!
//! 一个代理绑定一个交易所账户，管理一组市场的做市状态

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::enums::AgentState;

/// 单市场的模型参数与准入标记
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketModelSettings {
    /// GBM波动率（日尺度）
    pub sigma: Option<f64>,
    /// GBM漂移
    pub mu: Option<f64>,
    /// 风险厌恶系数
    pub gamma: Option<f64>,
    /// 买侧成交强度参数
    pub a_buy: Option<f64>,
    pub k_buy: Option<f64>,
    /// 卖侧成交强度参数
    pub a_sell: Option<f64>,
    pub k_sell: Option<f64>,
    /// VDX趋势值 [-1, 1]
    pub trend: Option<f64>,
    /// RSI/100 价格水平 [0, 1]
    pub price_level: Option<f64>,
    /// 组合配置器给出的准入标记
    pub can_trade: bool,
}

/// 单市场的代理状态
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketState {
    /// 组合权重；None时按活跃市场数等权
    pub ratio: Option<f64>,
    /// 入场价
    pub entry_price: Option<f64>,
    /// 入场时间（毫秒）
    pub entry_timestamp: Option<i64>,
    /// 状态机状态
    pub agent_state: AgentState,
    /// 模型参数
    pub model: MarketModelSettings,
}

/// 策略状态：按市场键控
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyState {
    pub market_states: HashMap<String, MarketState>,
}

/// 交易代理实体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingAgentEntity {
    pub id: String,

    /// 绑定的交易所实体id
    pub exchange_id: String,

    /// 策略名（注册到StrategyFactory）
    pub strategy: String,

    /// 策略选项文档，深合并到默认值之上
    pub strategy_options: serde_json::Value,

    /// 策略状态
    pub strategy_state: StrategyState,

    /// 回撤保护触发后置true，需运维手工清除
    pub paused: bool,

    /// 最大回撤比例 (0, 1)
    pub max_drawdown: f64,

    /// 历史峰值总额（计价币种）
    pub peak_market_amount: f64,

    // ---- 市场池过滤参数 ----
    /// 最小日成交额（计价币种）
    pub minimum_volume: f64,
    /// 日成交额EMA(5)下限
    pub minimum_average_volume: f64,
    /// 最新价下限
    pub minimum_fiat_price: f64,
    /// 允许的零成交小时占比上限
    pub max_percentage_hours_no_volume: f64,
    /// 黑名单市场
    pub blacklist: Vec<String>,

    /// 组合估值币种
    pub fiat_currency: String,

    /// 乐观锁版本
    pub version: u64,
}

impl TradingAgentEntity {
    pub fn new(id: &str, exchange_id: &str, strategy: &str, fiat_currency: &str) -> Self {
        Self {
            id: id.to_string(),
            exchange_id: exchange_id.to_string(),
            strategy: strategy.to_string(),
            strategy_options: serde_json::Value::Null,
            strategy_state: StrategyState::default(),
            paused: false,
            max_drawdown: 0.2,
            peak_market_amount: 0.0,
            minimum_volume: 70.0,
            minimum_average_volume: 70.0,
            minimum_fiat_price: 0.0,
            max_percentage_hours_no_volume: 0.1,
            blacklist: Vec::new(),
            fiat_currency: fiat_currency.to_string(),
            version: 0,
        }
    }

    /// 获取或创建某市场的状态
    pub fn market_state_mut(&mut self, market: &str) -> &mut MarketState {
        self.strategy_state
            .market_states
            .entry(market.to_string())
            .or_default()
    }

    pub fn market_state(&self, market: &str) -> Option<&MarketState> {
        self.strategy_state.market_states.get(market)
    }
}
