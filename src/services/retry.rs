use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::{
    config::RetryConfig,
    error::FetchError,
    services::events::{EventSink, InventoryEvent},
};

/// 带退避与取消的重试执行器
///
/// 只有 [`FetchError::Transient`] 会被重试；第 n 次失败后等待
/// `backoff_factor * n` 秒。取消在每次尝试前、请求进行中以及退避等待中都会被检查。
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// 单次请求超时
    pub fn timeout(&self) -> Option<Duration> {
        self.config.timeout()
    }

    /// 执行带重试的异步操作
    pub async fn execute<F, Fut, T>(
        &self,
        label: &str,
        cancel: &CancellationToken,
        events: &dyn EventSink,
        mut operation: F,
    ) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(FetchError::Cancelled),
                result = operation() => result,
            };

            match outcome {
                Ok(result) => return Ok(result),
                Err(FetchError::Cancelled) => return Err(FetchError::Cancelled),
                Err(error) if !error.is_transient() => {
                    events.emit(InventoryEvent::RequestFailed {
                        label: label.to_string(),
                        error: error.to_string(),
                    });
                    return Err(error);
                }
                Err(error) => {
                    if attempt >= max_attempts {
                        events.emit(InventoryEvent::RetriesExhausted {
                            label: label.to_string(),
                            attempts: attempt,
                        });
                        return Err(FetchError::Exhausted {
                            attempts: attempt,
                            last: error.to_string(),
                        });
                    }

                    let delay = self.delay_for(attempt);
                    events.emit(InventoryEvent::AttemptFailed {
                        label: label.to_string(),
                        attempt,
                        max_attempts,
                        wait_secs: delay.as_secs_f64(),
                        error: error.to_string(),
                    });

                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                        _ = sleep(delay) => {}
                    }

                    attempt += 1;
                }
            }
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.config.backoff_for(attempt);
        if self.config.jitter {
            add_jitter(base)
        } else {
            base
        }
    }
}

fn add_jitter(base: Duration) -> Duration {
    // 10% 抖动
    let jitter_range = base.as_secs_f64() * 0.1;
    base + Duration::from_secs_f64(rand::random::<f64>() * jitter_range)
}
