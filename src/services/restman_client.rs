use std::time::Duration;
use tracing::debug;

use crate::{
    config::RetryProfiles,
    error::FetchError,
    models::{FolderChildren, FolderRef, ResolutionPath},
    services::{
        events::InventoryEvent,
        restman_xml,
        retry::RetryPolicy,
        transport::GatewayContext,
    },
};

/// 依赖图模式的数据来源
#[async_trait::async_trait]
pub trait FolderSource: Send + Sync {
    /// 所有顶层文件夹
    async fn list_root_folders(&self) -> Result<Vec<FolderRef>, FetchError>;

    /// 文件夹直接包含的服务与子文件夹
    async fn list_children(&self, folder_id: &str) -> Result<FolderChildren, FetchError>;

    /// 服务对外发布的URL模式；只有取消会返回错误，其余失败都记为 NotFound
    async fn resolution_path_of(&self, service_id: &str) -> Result<ResolutionPath, FetchError>;
}

/// restman REST 管理接口客户端
#[derive(Debug, Clone)]
pub struct RestmanClient {
    ctx: GatewayContext,
    folders: RetryPolicy,
    dependencies: RetryPolicy,
    service_detail: RetryPolicy,
}

impl RestmanClient {
    pub fn new(ctx: GatewayContext, retry: &RetryProfiles) -> Self {
        Self {
            ctx,
            folders: RetryPolicy::new(retry.folders.clone()),
            dependencies: RetryPolicy::new(retry.dependencies.clone()),
            service_detail: RetryPolicy::new(retry.service_detail.clone()),
        }
    }

    /// 连接测试：单次请求文件夹列表，不重试
    pub async fn health_check(&self) -> Result<(), FetchError> {
        let url = self.ctx.url("/restman/1.0/folders");
        debug!("网关连接测试: {}", url);
        self.ctx
            .transport()
            .get(&url, Some(Duration::from_secs(8)))
            .await
            .map(|_| ())
    }

    async fn get_with_retry(
        &self,
        policy: &RetryPolicy,
        label: &str,
        path: &str,
    ) -> Result<String, FetchError> {
        let url = self.ctx.url(path);
        let timeout = policy.timeout();
        policy
            .execute(label, self.ctx.cancel_token(), self.ctx.events(), || {
                self.ctx.transport().get(&url, timeout)
            })
            .await
    }

    fn missing(&self, service_id: &str, reason: String) -> ResolutionPath {
        self.ctx.events().emit(InventoryEvent::ResolutionPathMissing {
            service_id: service_id.to_string(),
            reason,
        });
        ResolutionPath::NotFound
    }
}

#[async_trait::async_trait]
impl FolderSource for RestmanClient {
    async fn list_root_folders(&self) -> Result<Vec<FolderRef>, FetchError> {
        let body = self
            .get_with_retry(&self.folders, "文件夹列表", "/restman/1.0/folders")
            .await?;
        restman_xml::parse_folder_list(&body)
    }

    async fn list_children(&self, folder_id: &str) -> Result<FolderChildren, FetchError> {
        let path = format!("/restman/1.0/folders/{}/dependencies", folder_id);
        let label = format!("文件夹 {} 依赖", folder_id);
        let body = self
            .get_with_retry(&self.dependencies, &label, &path)
            .await?;
        restman_xml::parse_dependencies(&body)
    }

    async fn resolution_path_of(&self, service_id: &str) -> Result<ResolutionPath, FetchError> {
        let path = format!("/restman/1.0/services/{}", service_id);
        let label = format!("服务 {} 详情", service_id);
        let body = match self
            .get_with_retry(&self.service_detail, &label, &path)
            .await
        {
            Ok(body) => body,
            Err(FetchError::Cancelled) => return Err(FetchError::Cancelled),
            Err(e) => return Ok(self.missing(service_id, e.to_string())),
        };

        match restman_xml::parse_resolution_path(&body) {
            Ok(ResolutionPath::NotFound) => {
                Ok(self.missing(service_id, "响应中没有 UrlPattern".to_string()))
            }
            Ok(found) => Ok(found),
            Err(e) => Ok(self.missing(service_id, e.to_string())),
        }
    }
}
