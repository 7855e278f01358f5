//! AudioQueue 运行参数

use std::time::Duration;

use crate::application::QueueError;
use crate::domain::AudioPreprocessor;

/// AudioQueue 配置
#[derive(Debug, Clone)]
pub struct AudioQueueConfig {
    /// 当前片段之后预先合成的片段数
    pub lookahead_size: usize,
    /// 合成 worker 数量
    pub worker_count: usize,
    /// intake 队列容量
    pub intake_capacity: usize,
    /// 合成队列容量
    pub synthesis_capacity: usize,
    /// 当前索引之前保留音频的片段数
    pub retention_period: usize,
    /// 片段音频内存上限（字节）
    pub max_memory_bytes: u64,
    pub memory_check_interval: Duration,
    /// wait_for_ready 的轮询间隔
    pub wait_poll_interval: Duration,
    /// stop() 等待后台任务退出的时间
    pub stop_timeout: Duration,
    /// 对象池容量
    pub pool_capacity: usize,
    pub preprocessor: AudioPreprocessor,
}

impl Default for AudioQueueConfig {
    fn default() -> Self {
        Self {
            lookahead_size: 3,
            worker_count: 2,
            intake_capacity: 100,
            synthesis_capacity: 50,
            retention_period: 10,
            max_memory_bytes: 100 * 1024 * 1024,
            memory_check_interval: Duration::from_secs(5),
            wait_poll_interval: Duration::from_millis(100),
            stop_timeout: Duration::from_secs(5),
            pool_capacity: 64,
            preprocessor: AudioPreprocessor::default(),
        }
    }
}

impl AudioQueueConfig {
    pub fn validate(&self) -> Result<(), QueueError> {
        if self.worker_count == 0 {
            return Err(QueueError::invalid_config("worker_count must be greater than 0"));
        }
        if self.intake_capacity == 0 {
            return Err(QueueError::invalid_config("intake_capacity must be greater than 0"));
        }
        if self.synthesis_capacity == 0 {
            return Err(QueueError::invalid_config(
                "synthesis_capacity must be greater than 0",
            ));
        }
        if self.max_memory_bytes == 0 {
            return Err(QueueError::invalid_config(
                "max_memory_bytes must be greater than 0",
            ));
        }
        if self.memory_check_interval.is_zero() || self.wait_poll_interval.is_zero() {
            return Err(QueueError::invalid_config("intervals must be non-zero"));
        }
        Ok(())
    }
}
