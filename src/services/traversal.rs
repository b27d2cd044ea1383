use std::{collections::HashSet, sync::Arc, time::Duration};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{
    config::InventoryMode,
    error::FetchError,
    models::{FailedFolder, FolderRef, InventoryReport, ServiceRecord, child_path},
    services::{
        events::{EventSink, InventoryEvent},
        graphman_client::ServiceQuery,
        inventory::InventoryMap,
        restman_client::FolderSource,
    },
};

/// 获取根文件夹列表超过该时长时提示用户
const SLOW_LISTING_THRESHOLD: Duration = Duration::from_secs(15);

/// resolutionPath 阶段每处理多少个服务报告一次进度
const RESOLUTION_PROGRESS_EVERY: usize = 10;

/// 根文件夹路径，统一以 `/` 开头
pub fn root_path(name: &str) -> String {
    format!("/{}", name.trim_start_matches('/'))
}

/// 在根文件夹列表中查找目标：第一个名称是目标前缀的文件夹
pub fn resolve_root<'a>(roots: &'a [FolderRef], target: &str) -> Option<&'a FolderRef> {
    let target = target.trim().trim_start_matches('/');
    roots.iter().find(|folder| {
        let name = folder.name.trim_start_matches('/');
        !name.is_empty() && target.starts_with(name)
    })
}

/// 一次依赖图遍历的状态，只在单次运行内有效
#[derive(Debug, Default)]
struct TraversalState {
    visited: HashSet<String>,
    inventory: InventoryMap,
    empty_folders: Vec<String>,
    failed_folders: Vec<FailedFolder>,
}

/// 待展开的文件夹
struct PendingFolder {
    folder: FolderRef,
    path: String,
    /// 在父文件夹子列表中的位置 (序号, 总数)
    position: Option<(usize, usize)>,
}

/// 依赖图模式遍历引擎
///
/// 使用显式栈做深度优先遍历，子文件夹按服务端返回顺序展开；每个文件夹ID在一次运行中最多展开一次，
/// 因此依赖图中存在环也能正常结束。单个文件夹失败只记录事件，不影响其余子树。
pub struct DependencyTraversal<S> {
    source: S,
    cancel: CancellationToken,
    events: Arc<dyn EventSink>,
    resolve_paths: bool,
}

impl<S: FolderSource> DependencyTraversal<S> {
    pub fn new(source: S, cancel: CancellationToken, events: Arc<dyn EventSink>) -> Self {
        Self {
            source,
            cancel,
            events,
            resolve_paths: false,
        }
    }

    /// 遍历结束后逐个获取服务的 resolutionPath
    pub fn with_resolution_paths(mut self, enabled: bool) -> Self {
        self.resolve_paths = enabled;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub async fn run(&self, targets: &[String]) -> InventoryReport {
        let mut report = InventoryReport::new(InventoryMode::Dependency);
        self.events.emit(InventoryEvent::RunStarted {
            mode: InventoryMode::Dependency,
            targets: targets.len(),
        });

        let roots = self.list_roots(&mut report).await;
        let mut state = TraversalState::default();

        for (idx, target) in targets.iter().enumerate() {
            if self.cancel.is_cancelled() {
                break;
            }
            self.events.emit(InventoryEvent::TargetStarted {
                index: idx + 1,
                total: targets.len(),
                target: target.clone(),
            });

            match resolve_root(&roots, target) {
                Some(root) => {
                    self.expand(root.clone(), root_path(&root.name), &mut state)
                        .await
                }
                None => {
                    self.events.emit(InventoryEvent::UnresolvedRoot {
                        target: target.clone(),
                    });
                    report.unresolved_roots.push(target.clone());
                }
            }
        }

        report.visited_folders = state.visited.len();
        report.empty_folders = state.empty_folders;
        report.failed_folders.extend(state.failed_folders);
        report.records = state
            .inventory
            .into_entries()
            .into_iter()
            .map(|entry| ServiceRecord {
                folder_path: entry.folder_path,
                name: entry.name,
                service_id: Some(entry.id),
                resolution_path: None,
            })
            .collect();

        if self.resolve_paths && !self.cancel.is_cancelled() {
            self.resolve_resolution_paths(&mut report.records).await;
        }

        self.finish(report, "遍历")
    }

    async fn list_roots(&self, report: &mut InventoryReport) -> Vec<FolderRef> {
        let started = Instant::now();
        let roots = match self.source.list_root_folders().await {
            Ok(roots) => roots,
            Err(FetchError::Cancelled) => return Vec::new(),
            Err(e) => {
                self.events.emit(InventoryEvent::FolderFailed {
                    path: "/".to_string(),
                    error: e.to_string(),
                });
                report.failed_folders.push(FailedFolder {
                    path: "/".to_string(),
                    folder_id: None,
                    error: e.to_string(),
                });
                return Vec::new();
            }
        };

        let elapsed = started.elapsed();
        if elapsed > SLOW_LISTING_THRESHOLD {
            self.events.emit(InventoryEvent::SlowFolderListing {
                elapsed_secs: elapsed.as_secs(),
            });
        }
        self.events
            .emit(InventoryEvent::RootFoldersListed { count: roots.len() });
        roots
    }

    async fn expand(&self, root: FolderRef, path: String, state: &mut TraversalState) {
        let mut worklist = vec![PendingFolder {
            folder: root,
            path,
            position: None,
        }];

        while let Some(PendingFolder {
            folder,
            path,
            position,
        }) = worklist.pop()
        {
            if self.cancel.is_cancelled() {
                return;
            }
            if !state.visited.insert(folder.id.clone()) {
                continue;
            }
            if let Some((index, total)) = position {
                self.events.emit(InventoryEvent::SubfolderStarted {
                    index,
                    total,
                    path: path.clone(),
                });
            }

            let children = match self.source.list_children(&folder.id).await {
                Ok(children) => children,
                Err(FetchError::Cancelled) => {
                    // 未展开完成，不计入已访问
                    state.visited.remove(&folder.id);
                    return;
                }
                Err(e) => {
                    self.events.emit(InventoryEvent::FolderFailed {
                        path: path.clone(),
                        error: e.to_string(),
                    });
                    state.failed_folders.push(FailedFolder {
                        path,
                        folder_id: Some(folder.id),
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            let saved = children
                .services
                .iter()
                .filter(|service| {
                    state
                        .inventory
                        .merge(&service.id, &service.name, &path)
                        .is_stored()
                })
                .count();

            if saved > 0 {
                self.events.emit(InventoryEvent::ServicesSaved {
                    path: path.clone(),
                    saved,
                });
            } else if children.is_empty() {
                self.events
                    .emit(InventoryEvent::EmptyFolder { path: path.clone() });
                state.empty_folders.push(path.clone());
            }

            // 逆序入栈，出栈顺序与服务端返回顺序一致
            let total = children.subfolders.len();
            for (idx, sub) in children.subfolders.into_iter().enumerate().rev() {
                let sub_path = child_path(&path, &sub.name);
                worklist.push(PendingFolder {
                    folder: sub,
                    path: sub_path,
                    position: Some((idx + 1, total)),
                });
            }
        }
    }

    async fn resolve_resolution_paths(&self, records: &mut [ServiceRecord]) {
        let total = records.len();
        for (idx, record) in records.iter_mut().enumerate() {
            if self.cancel.is_cancelled() {
                return;
            }
            let processed = idx + 1;
            if processed % RESOLUTION_PROGRESS_EVERY == 0 {
                self.events
                    .emit(InventoryEvent::ResolutionProgress { processed, total });
            }

            let Some(service_id) = record.service_id.as_deref() else {
                continue;
            };
            match self.source.resolution_path_of(service_id).await {
                Ok(path) => record.resolution_path = path.into_option(),
                Err(FetchError::Cancelled) => return,
                Err(_) => record.resolution_path = None,
            }
        }
    }

    fn finish(&self, report: InventoryReport, stage: &str) -> InventoryReport {
        finish_report(report, &self.cancel, self.events.as_ref(), stage)
    }
}

/// 查询模式遍历：逐个查询调用方给出的文件夹路径，不递归
pub struct QueryTraversal<Q> {
    query: Q,
    cancel: CancellationToken,
    events: Arc<dyn EventSink>,
}

impl<Q: ServiceQuery> QueryTraversal<Q> {
    pub fn new(query: Q, cancel: CancellationToken, events: Arc<dyn EventSink>) -> Self {
        Self {
            query,
            cancel,
            events,
        }
    }

    pub fn query(&self) -> &Q {
        &self.query
    }

    pub async fn run(&self, targets: &[String]) -> InventoryReport {
        let mut report = InventoryReport::new(InventoryMode::Query);
        self.events.emit(InventoryEvent::RunStarted {
            mode: InventoryMode::Query,
            targets: targets.len(),
        });

        for (idx, target) in targets.iter().enumerate() {
            if self.cancel.is_cancelled() {
                break;
            }
            let path = root_path(target.trim());
            self.events.emit(InventoryEvent::TargetStarted {
                index: idx + 1,
                total: targets.len(),
                target: path.clone(),
            });

            match self.query.list_services_under(&path).await {
                Ok(services) if services.is_empty() => {
                    report.visited_folders += 1;
                    self.events
                        .emit(InventoryEvent::EmptyFolder { path: path.clone() });
                    report.empty_folders.push(path);
                }
                Ok(services) => {
                    report.visited_folders += 1;
                    self.events.emit(InventoryEvent::ServicesFound {
                        path,
                        count: services.len(),
                    });
                    report
                        .records
                        .extend(services.into_iter().map(ServiceRecord::from));
                }
                Err(FetchError::Cancelled) => break,
                Err(e) => {
                    report.visited_folders += 1;
                    self.events.emit(InventoryEvent::FolderFailed {
                        path: path.clone(),
                        error: e.to_string(),
                    });
                    report.failed_folders.push(FailedFolder {
                        path,
                        folder_id: None,
                        error: e.to_string(),
                    });
                }
            }
        }

        finish_report(report, &self.cancel, self.events.as_ref(), "查询")
    }
}

fn finish_report(
    mut report: InventoryReport,
    cancel: &CancellationToken,
    events: &dyn EventSink,
    stage: &str,
) -> InventoryReport {
    report.cancelled = cancel.is_cancelled();
    if report.cancelled {
        events.emit(InventoryEvent::Cancelled {
            stage: stage.to_string(),
        });
    }
    report.finish();
    events.emit(InventoryEvent::RunFinished {
        services: report.records.len(),
        visited: report.visited_folders,
        empty: report.empty_folders.len(),
    });
    report
}
