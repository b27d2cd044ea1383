use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 单次退避等待上限（秒）
pub const MAX_BACKOFF_SECS: f64 = 3600.0;

/// 重试配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// 最大尝试次数（含第一次）
    pub max_attempts: u32,
    /// 退避系数（秒），第 n 次失败后等待 factor * n 秒
    pub backoff_factor_secs: f64,
    /// 单次请求超时（秒），None 表示不限制
    pub timeout_secs: Option<u64>,
    /// 添加随机抖动
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_factor_secs: 1.0,
            timeout_secs: None,
            jitter: false,
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: u32, backoff_factor_secs: f64, timeout_secs: Option<u64>) -> Self {
        Self {
            max_attempts,
            backoff_factor_secs,
            timeout_secs,
            jitter: false,
        }
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("最大尝试次数必须大于0".to_string());
        }
        if !self.backoff_factor_secs.is_finite() || self.backoff_factor_secs < 0.0 {
            return Err("退避系数必须为非负数".to_string());
        }
        if self.backoff_factor_secs > MAX_BACKOFF_SECS {
            return Err(format!("退避系数不能超过 {} 秒", MAX_BACKOFF_SECS));
        }
        if self.timeout_secs == Some(0) {
            return Err("超时时间必须大于0，不限制请留空".to_string());
        }
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// 第 attempt 次失败后的等待时间（不含抖动），不超过 [`MAX_BACKOFF_SECS`]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let secs = self.backoff_factor_secs * attempt as f64;
        if secs.is_nan() {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(secs.clamp(0.0, MAX_BACKOFF_SECS))
    }
}

/// 各类接口的重试配置
///
/// 大文件夹的依赖列表可能非常慢，所以文件夹相关接口默认不限超时。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryProfiles {
    /// 根文件夹列表
    pub folders: RetryConfig,
    /// 文件夹依赖列表
    pub dependencies: RetryConfig,
    /// 单个服务详情（resolutionPath）
    pub service_detail: RetryConfig,
    /// graphman 查询
    pub query: RetryConfig,
}

impl Default for RetryProfiles {
    fn default() -> Self {
        Self {
            folders: RetryConfig::new(6, 2.0, None),
            dependencies: RetryConfig::new(8, 2.0, None),
            service_detail: RetryConfig::new(3, 1.0, Some(30)),
            query: RetryConfig::new(3, 1.0, Some(10)),
        }
    }
}

impl RetryProfiles {
    pub fn validate(&self) -> Result<(), String> {
        for (name, cfg) in [
            ("folders", &self.folders),
            ("dependencies", &self.dependencies),
            ("service_detail", &self.service_detail),
            ("query", &self.query),
        ] {
            cfg.validate().map_err(|e| format!("retry.{}: {}", name, e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_profiles_default() {
        let profiles = RetryProfiles::default();
        assert_eq!(profiles.dependencies.max_attempts, 8);
        assert_eq!(profiles.dependencies.timeout_secs, None);
        assert_eq!(profiles.service_detail.timeout_secs, Some(30));
        assert!(profiles.validate().is_ok());
    }

    #[test]
    fn test_backoff_is_linear_in_attempt() {
        let cfg = RetryConfig::new(5, 2.0, None);
        assert_eq!(cfg.backoff_for(1), Duration::from_secs(2));
        assert_eq!(cfg.backoff_for(3), Duration::from_secs(6));
    }

    #[test]
    fn test_retry_config_validation() {
        let mut cfg = RetryConfig::default();
        assert!(cfg.validate().is_ok());

        cfg.max_attempts = 0;
        assert!(cfg.validate().is_err());

        cfg.max_attempts = 1;
        cfg.timeout_secs = Some(0);
        assert!(cfg.validate().is_err());

        cfg.timeout_secs = None;
        cfg.backoff_factor_secs = -1.0;
        assert!(cfg.validate().is_err());

        cfg.backoff_factor_secs = 1e19;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_huge_backoff_is_capped() {
        let cfg = RetryConfig::new(3, 1e19, None);
        assert_eq!(cfg.backoff_for(2), Duration::from_secs(3600));
        assert_eq!(RetryConfig::new(3, f64::INFINITY, None).backoff_for(1), Duration::from_secs(3600));
    }
}
