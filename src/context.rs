//! 请求截止时间（Deadline）模块
//!
//! 所有仓储和缓存调用都接受一个由调用方传播的截止时间。
//! 截止时间到期后，存储实现返回 [`StorageError::DeadlineExceeded`]，
//! 服务层将其映射为协议层的 `temporarily_unavailable`。
//!
//! ## 示例
//!
//! ```rust
//! use std::time::Duration;
//! use identrs::Deadline;
//!
//! // 无截止时间（永不到期）
//! let unlimited = Deadline::none();
//! assert!(!unlimited.is_expired());
//!
//! // 5 秒后到期
//! let deadline = Deadline::within(Duration::from_secs(5));
//! assert!(!deadline.is_expired());
//! assert!(deadline.check().is_ok());
//! ```

use std::time::{Duration, Instant};

use crate::error::{Result, StorageError};

/// 请求级别的截止时间令牌
///
/// 轻量、可复制，在一次请求内沿调用链透传。`None` 表示没有截止时间。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    /// 创建一个永不到期的截止时间
    pub fn none() -> Self {
        Self { at: None }
    }

    /// 创建一个从现在起 `timeout` 之后到期的截止时间
    pub fn within(timeout: Duration) -> Self {
        Self {
            at: Some(Instant::now() + timeout),
        }
    }

    /// 使用指定时刻作为截止时间
    pub fn at(instant: Instant) -> Self {
        Self { at: Some(instant) }
    }

    /// 截止时间是否已过
    pub fn is_expired(&self) -> bool {
        match self.at {
            Some(at) => Instant::now() >= at,
            None => false,
        }
    }

    /// 剩余时间；没有截止时间时返回 `None`
    pub fn remaining(&self) -> Option<Duration> {
        self.at.map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// 检查截止时间，已过期则返回 [`StorageError::DeadlineExceeded`]
    ///
    /// 存储实现应在每个操作入口调用。
    pub fn check(&self) -> Result<()> {
        if self.is_expired() {
            Err(StorageError::DeadlineExceeded.into())
        } else {
            Ok(())
        }
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_none_never_expires() {
        let deadline = Deadline::none();
        assert!(!deadline.is_expired());
        assert!(deadline.remaining().is_none());
        assert!(deadline.check().is_ok());
    }

    #[test]
    fn test_deadline_within_future() {
        let deadline = Deadline::within(Duration::from_secs(60));
        assert!(!deadline.is_expired());
        assert!(deadline.remaining().unwrap() > Duration::from_secs(55));
    }

    #[test]
    fn test_deadline_expired() {
        let deadline = Deadline::at(Instant::now() - Duration::from_millis(1));
        assert!(deadline.is_expired());
        assert_eq!(deadline.remaining(), Some(Duration::ZERO));

        let err = deadline.check().unwrap_err();
        assert!(err.is_deadline_exceeded());
    }

    #[test]
    fn test_deadline_zero_timeout() {
        let deadline = Deadline::within(Duration::ZERO);
        assert!(deadline.is_expired());
    }
}
