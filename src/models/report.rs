use chrono::{DateTime, Local};
use serde::Serialize;
use std::time::Duration;

use crate::config::InventoryMode;

use super::ServiceRecord;

/// 获取失败的文件夹
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedFolder {
    pub path: String,
    pub folder_id: Option<String>,
    pub error: String,
}

/// 一次盘点运行的结果
///
/// 即使运行被取消或部分文件夹失败，也包含已经收集到的全部记录。
#[derive(Debug, Clone, Serialize)]
pub struct InventoryReport {
    pub mode: InventoryMode,
    pub records: Vec<ServiceRecord>,
    pub empty_folders: Vec<String>,
    /// 实际展开过的文件夹数量
    pub visited_folders: usize,
    pub unresolved_roots: Vec<String>,
    pub failed_folders: Vec<FailedFolder>,
    pub cancelled: bool,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
}

impl InventoryReport {
    pub fn new(mode: InventoryMode) -> Self {
        let now = Local::now();
        Self {
            mode,
            records: Vec::new(),
            empty_folders: Vec::new(),
            visited_folders: 0,
            unresolved_roots: Vec::new(),
            failed_folders: Vec::new(),
            cancelled: false,
            started_at: now,
            finished_at: now,
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Local::now();
    }

    pub fn elapsed(&self) -> Duration {
        self.finished_at
            .signed_duration_since(self.started_at)
            .to_std()
            .unwrap_or_default()
    }

    /// 没有任何失败、未匹配或取消
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.failed_folders.is_empty() && self.unresolved_roots.is_empty()
    }
}
