//! 轮询策略：最大尝试次数与指数退避
//!
//! 第 k 次尝试之后、第 k+1 次之前等待 `2^k × backoff_unit`（默认单位 1 秒：2s、4s、8s …），
//! 只受尝试次数约束，不设时长上限。

use std::time::Duration;

use crate::config::PollSection;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
pub const DEFAULT_BACKOFF_UNIT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub backoff_unit: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_unit: DEFAULT_BACKOFF_UNIT,
        }
    }
}

impl PollPolicy {
    pub fn new(max_attempts: u32, backoff_unit: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_unit,
        }
    }

    pub fn from_config(poll: &PollSection) -> Self {
        Self::new(poll.max_attempts, Duration::from_millis(poll.backoff_unit_ms))
    }

    /// 第 `attempt` 次尝试之后的等待时长
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.backoff_unit.saturating_mul(factor)
    }

    /// 事件里用的毫秒数，超出 u64 时饱和
    pub fn delay_ms_after(&self, attempt: u32) -> u64 {
        u64::try_from(self.delay_after(attempt).as_millis()).unwrap_or(u64::MAX)
    }

    /// 是否还能再发起一次尝试
    pub fn has_attempts_after(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = PollPolicy::default();
        assert_eq!(policy.max_attempts, 10);
        assert_eq!(policy.delay_after(1), Duration::from_secs(2));
        assert_eq!(policy.delay_after(2), Duration::from_secs(4));
        assert_eq!(policy.delay_after(3), Duration::from_secs(8));
        assert_eq!(policy.delay_after(9), Duration::from_secs(512));
    }

    #[test]
    fn test_attempt_bound() {
        let policy = PollPolicy::new(3, Duration::from_millis(10));
        assert!(policy.has_attempts_after(1));
        assert!(policy.has_attempts_after(2));
        assert!(!policy.has_attempts_after(3));
    }

    #[test]
    fn test_zero_attempts_clamped() {
        assert_eq!(PollPolicy::new(0, Duration::from_secs(1)).max_attempts, 1);
    }

    #[test]
    fn test_delay_ms_saturates_for_huge_unit() {
        let policy = PollPolicy::new(3, Duration::MAX);
        assert_eq!(policy.delay_ms_after(1), u64::MAX);
        assert_eq!(PollPolicy::default().delay_ms_after(2), 4000);
    }

    #[test]
    fn test_large_attempt_saturates() {
        let policy = PollPolicy::default();
        assert!(policy.delay_after(40) >= Duration::from_secs(u32::MAX as u64));
    }
}
