//! # Spot Maker Execution
//!
//! 交易所状态镜像：本地订单/余额状态、模拟撮合、保留额度记账、
//! sticky改价、自动撤单与远端对账。远端是事实来源，镜像在一次
//! 代理运行内是唯一可信的本地视图

pub mod mirror;

pub use mirror::*;
