//! 定时任务实体
//!
//! 持久化的任务文档，编排器轮询到期任务并通过locked_at原子抢占

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,

    /// 处理器名称
    pub name: String,

    /// 传给处理器的数据
    pub data: serde_json::Value,

    /// 下次运行时间（毫秒）
    pub next_run_at: i64,

    /// 重复间隔（毫秒）；None表示一次性任务
    pub repeat_interval: Option<i64>,

    /// 抢占时间；None表示未被占用
    pub locked_at: Option<i64>,

    /// 最近一次开始运行时间
    pub last_run_at: Option<i64>,

    /// 最近一次完成时间
    pub last_finished_at: Option<i64>,

    pub priority: i32,

    /// 最近一次失败原因
    pub fail_reason: Option<String>,
    pub fail_count: u32,

    /// 乐观锁版本
    pub version: u64,
}

impl Job {
    pub fn new(id: &str, name: &str, data: serde_json::Value, next_run_at: i64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            data,
            next_run_at,
            repeat_interval: None,
            locked_at: None,
            last_run_at: None,
            last_finished_at: None,
            priority: 0,
            fail_reason: None,
            fail_count: 0,
            version: 0,
        }
    }

    /// 是否到期。一次性任务完成后不再到期
    pub fn is_due(&self, now: i64) -> bool {
        if self.repeat_interval.is_none() && self.last_finished_at.is_some() {
            return false;
        }
        self.next_run_at <= now
    }

    /// 是否可抢占：未被锁定，或锁已超过存活期（处理器崩溃后回收）
    pub fn is_claimable(&self, now: i64, lock_lifetime: i64) -> bool {
        match self.locked_at {
            None => true,
            Some(locked_at) => now - locked_at > lock_lifetime,
        }
    }

    /// 完成一次运行：推进下次运行时间并释放锁
    pub fn finish_run(&mut self, now: i64) {
        self.last_finished_at = Some(now);
        if let Some(interval) = self.repeat_interval {
            self.next_run_at += interval;
            // 长时间停机后避免积压的密集补跑
            if self.next_run_at <= now {
                self.next_run_at = now + interval;
            }
        }
        self.locked_at = None;
        self.fail_reason = None;
    }

    /// 记录一次失败：保留错误并释放锁
    pub fn fail_run(&mut self, now: i64, reason: &str) {
        self.last_finished_at = Some(now);
        self.fail_reason = Some(reason.to_string());
        self.fail_count += 1;
        if let Some(interval) = self.repeat_interval {
            self.next_run_at = now + interval;
        }
        self.locked_at = None;
    }
}
