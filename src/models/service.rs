use serde::{Deserialize, Serialize};

/// resolutionPath 缺失时的占位值
pub const NOT_AVAILABLE: &str = "N/A";

/// 服务对外发布的URL模式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionPath {
    Found(String),
    NotFound,
}

impl ResolutionPath {
    pub fn into_option(self) -> Option<String> {
        match self {
            ResolutionPath::Found(path) => Some(path),
            ResolutionPath::NotFound => None,
        }
    }
}

impl std::fmt::Display for ResolutionPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolutionPath::Found(path) => write!(f, "{}", path),
            ResolutionPath::NotFound => write!(f, "{}", NOT_AVAILABLE),
        }
    }
}

/// graphman 查询返回的服务条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueriedService {
    pub folder_path: String,
    pub name: String,
    #[serde(default)]
    pub resolution_path: Option<String>,
}

/// 最终输出的一条盘点记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRecord {
    pub folder_path: String,
    pub name: String,
    /// 查询模式下网关不返回服务ID
    pub service_id: Option<String>,
    pub resolution_path: Option<String>,
}

impl ServiceRecord {
    /// CSV 中的 resolutionPath 列
    pub fn resolution_path_or_na(&self) -> &str {
        self.resolution_path.as_deref().unwrap_or(NOT_AVAILABLE)
    }
}

impl From<QueriedService> for ServiceRecord {
    fn from(service: QueriedService) -> Self {
        Self {
            folder_path: service.folder_path,
            name: service.name,
            service_id: None,
            resolution_path: service.resolution_path.filter(|p| !p.is_empty()),
        }
    }
}
