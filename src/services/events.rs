use std::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::InventoryMode;

/// 盘点过程中产生的进度 / 诊断事件
///
/// 引擎本身不打日志，只发事件；由调用方决定如何展示。
#[derive(Debug, Clone, PartialEq)]
pub enum InventoryEvent {
    RunStarted {
        mode: InventoryMode,
        targets: usize,
    },
    RootFoldersListed {
        count: usize,
    },
    /// 获取根文件夹列表耗时较长
    SlowFolderListing {
        elapsed_secs: u64,
    },
    TargetStarted {
        index: usize,
        total: usize,
        target: String,
    },
    UnresolvedRoot {
        target: String,
    },
    SubfolderStarted {
        index: usize,
        total: usize,
        path: String,
    },
    ServicesSaved {
        path: String,
        saved: usize,
    },
    ServicesFound {
        path: String,
        count: usize,
    },
    EmptyFolder {
        path: String,
    },
    FolderFailed {
        path: String,
        error: String,
    },
    AttemptFailed {
        label: String,
        attempt: u32,
        max_attempts: u32,
        wait_secs: f64,
        error: String,
    },
    RequestFailed {
        label: String,
        error: String,
    },
    RetriesExhausted {
        label: String,
        attempts: u32,
    },
    ResolutionProgress {
        processed: usize,
        total: usize,
    },
    ResolutionPathMissing {
        service_id: String,
        reason: String,
    },
    Cancelled {
        stage: String,
    },
    RunFinished {
        services: usize,
        visited: usize,
        empty: usize,
    },
}

/// 事件接收方
pub trait EventSink: Send + Sync {
    fn emit(&self, event: InventoryEvent);
}

/// 把事件写入 tracing 日志
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: InventoryEvent) {
        match event {
            InventoryEvent::RunStarted { mode, targets } => {
                info!(%mode, targets, "开始盘点");
            }
            InventoryEvent::RootFoldersListed { count } => {
                info!(count, "已获取根文件夹列表");
            }
            InventoryEvent::SlowFolderListing { elapsed_secs } => {
                warn!(elapsed_secs, "文件夹数量较多，本次盘点可能耗时较长，请勿中断");
            }
            InventoryEvent::TargetStarted {
                index,
                total,
                target,
            } => {
                info!("[{}/{}] 处理文件夹: {}", index, total, target);
            }
            InventoryEvent::UnresolvedRoot { target } => {
                warn!(target = %target, "未找到匹配的根文件夹");
            }
            InventoryEvent::SubfolderStarted { index, total, path } => {
                debug!("子文件夹进度 ({}/{}) -> {}", index, total, path);
            }
            InventoryEvent::ServicesSaved { path, saved } => {
                info!(path = %path, saved, "已保存服务");
            }
            InventoryEvent::ServicesFound { path, count } => {
                info!(path = %path, count, "找到API");
            }
            InventoryEvent::EmptyFolder { path } => {
                info!(path = %path, "空文件夹");
            }
            InventoryEvent::FolderFailed { path, error } => {
                error!(path = %path, error = %error, "获取文件夹内容失败");
            }
            InventoryEvent::AttemptFailed {
                label,
                attempt,
                max_attempts,
                wait_secs,
                error,
            } => {
                warn!(
                    "{} 第 {}/{} 次尝试失败: {}，{:.1}秒后重试",
                    label, attempt, max_attempts, error, wait_secs
                );
            }
            InventoryEvent::RequestFailed { label, error } => {
                error!("{} 遇到不可重试错误: {}", label, error);
            }
            InventoryEvent::RetriesExhausted { label, attempts } => {
                error!("{} 达到最大尝试次数 {}，放弃", label, attempts);
            }
            InventoryEvent::ResolutionProgress { processed, total } => {
                info!("resolutionPath 进度: {}/{}", processed, total);
            }
            InventoryEvent::ResolutionPathMissing { service_id, reason } => {
                info!(service_id = %service_id, reason = %reason, "未获取到 resolutionPath，记为 N/A");
            }
            InventoryEvent::Cancelled { stage } => {
                warn!(stage = %stage, "盘点已取消");
            }
            InventoryEvent::RunFinished {
                services,
                visited,
                empty,
            } => {
                info!(services, visited, empty, "盘点完成");
            }
        }
    }
}

/// 在内存中收集事件，供界面层轮询或测试断言
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<InventoryEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<InventoryEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn count_where<F>(&self, predicate: F) -> usize
    where
        F: Fn(&InventoryEvent) -> bool,
    {
        self.events().iter().filter(|e| predicate(e)).count()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: InventoryEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_collects_in_order() {
        let sink = MemorySink::new();
        sink.emit(InventoryEvent::EmptyFolder { path: "A".into() });
        sink.emit(InventoryEvent::EmptyFolder { path: "B".into() });

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], InventoryEvent::EmptyFolder { path: "A".into() });
        assert_eq!(
            sink.count_where(|e| matches!(e, InventoryEvent::EmptyFolder { .. })),
            2
        );
    }
}
