//! 交易代理状态机枚举

use serde::{Deserialize, Serialize};

/// 单个市场内的代理状态
///
/// 状态流转: Idle -> TryingToEnter -> HasPosition -> TryingToLeave -> Idle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AgentState {
    /// 空仓观望
    #[default]
    Idle,
    /// 入场挂单中（sticky买单在场）
    TryingToEnter,
    /// 已持仓，双边做市
    HasPosition,
    /// 离场挂单中（sticky卖单在场）
    TryingToLeave,
}

impl AgentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentState::Idle => "idle",
            AgentState::TryingToEnter => "trying_to_enter",
            AgentState::HasPosition => "has_position",
            AgentState::TryingToLeave => "trying_to_leave",
        }
    }

    /// 是否持有仓位（含离场中）
    pub fn holds_position(&self) -> bool {
        matches!(self, AgentState::HasPosition | AgentState::TryingToLeave)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_idle() {
        assert_eq!(AgentState::default(), AgentState::Idle);
    }

    #[test]
    fn test_holds_position() {
        assert!(AgentState::HasPosition.holds_position());
        assert!(AgentState::TryingToLeave.holds_position());
        assert!(!AgentState::TryingToEnter.holds_position());
    }
}
