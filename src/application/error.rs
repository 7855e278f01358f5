//! 应用层错误定义
//!
//! 朗读队列对外暴露的统一错误类型

use std::time::Duration;
use thiserror::Error;

use crate::application::ports::ParseError;

/// 队列错误
#[derive(Debug, Error)]
pub enum QueueError {
    /// 配置无效（构造时致命）
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// intake 队列已满
    #[error("queue full")]
    QueueFull,

    /// 已到达队尾
    #[error("end of queue")]
    EndOfQueue,

    /// 已到达队首
    #[error("beginning of queue")]
    BeginningOfQueue,

    /// 没有当前片段
    #[error("no current segment")]
    NoCurrentSegment,

    /// 目标片段已被内存管理器回收
    #[error("segment reclaimed: {0}")]
    SegmentReclaimed(String),

    /// 分句失败
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// 等待超时
    #[error("timed out after {0:?} waiting for audio")]
    Timeout(Duration),

    /// 等待期间队列被停止
    #[error("stopped while waiting")]
    StoppedWhileWaiting,

    /// 队列已停止
    #[error("queue stopped")]
    Stopped,
}

impl QueueError {
    /// 创建配置错误
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// 导航边界属于预期结果，不是故障
    pub fn is_boundary(&self) -> bool {
        matches!(
            self,
            Self::EndOfQueue | Self::BeginningOfQueue | Self::NoCurrentSegment
        )
    }
}
