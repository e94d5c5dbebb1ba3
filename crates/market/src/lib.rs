//! # Spot Maker Market
//!
//! 行情数据服务：通过ExchangeClient端口拉取K线并做新鲜度缓存

pub mod candle_service;

pub use candle_service::CandleService;
