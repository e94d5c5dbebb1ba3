//! 余额实体
//!
//! free/used 来自交易所，locked 是策略层设置的保留意图。
//! 对外暴露的可用余额 = max(0, free − locked)，保证保留额度不被花掉

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Balance {
    /// 原始可用余额
    free: f64,
    /// 交易所报告被挂单占用的数量
    used: f64,
    /// 保留额度（不可花费）
    locked: f64,
}

impl Balance {
    pub fn new(free: f64, used: f64, locked: f64) -> Self {
        Self { free, used, locked }
    }

    /// 惰性创建时使用：空余额但带上配置的保留额度
    pub fn with_locked(locked: f64) -> Self {
        Self {
            free: 0.0,
            used: 0.0,
            locked,
        }
    }

    /// 对外暴露的可用余额（扣除保留额度）
    pub fn free(&self) -> f64 {
        (self.free - self.locked).max(0.0)
    }

    /// 原始可用余额（含保留额度）
    pub fn raw_free(&self) -> f64 {
        self.free
    }

    pub fn used(&self) -> f64 {
        self.used
    }

    pub fn locked(&self) -> f64 {
        self.locked
    }

    /// 总额 = 暴露的可用 + 占用
    pub fn total(&self) -> f64 {
        self.free() + self.used
    }

    /// 含保留额度的总额
    pub fn total_with_reserve(&self) -> f64 {
        self.free + self.used
    }

    // ---- 镜像记账原语 ----

    pub fn deposit(&mut self, delta: f64) {
        self.free += delta;
    }

    pub fn withdraw(&mut self, delta: f64) {
        self.free -= delta;
    }

    pub fn withdraw_from_used(&mut self, delta: f64) {
        self.used -= delta;
    }

    /// 占用可用余额。超出可花费部分被截断，返回实际占用量
    pub fn reserve(&mut self, delta: f64) -> f64 {
        let clamped = delta.min(self.free()).max(0.0);
        self.free -= clamped;
        self.used += clamped;
        clamped
    }

    /// 释放占用。超出占用部分被截断，返回实际释放量
    pub fn release(&mut self, delta: f64) -> f64 {
        let clamped = delta.min(self.used).max(0.0);
        self.used -= clamped;
        self.free += clamped;
        clamped
    }

    /// 远端快照合并：free/used 以远端为准，保留本地locked
    pub fn merge_remote(&mut self, free: f64, used: f64) {
        self.free = free;
        self.used = used;
    }
}
