use serde::{Deserialize, Serialize};

/// 依赖图模式下的文件夹引用
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FolderRef {
    /// 网关分配的文件夹ID，跨请求稳定
    pub id: String,
    pub name: String,
}

impl FolderRef {
    pub fn new<I: Into<String>, N: Into<String>>(id: I, name: N) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// 文件夹直接包含的内容（单层）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderChildren {
    pub services: Vec<ServiceRef>,
    pub subfolders: Vec<FolderRef>,
}

impl FolderChildren {
    pub fn is_empty(&self) -> bool {
        self.services.is_empty() && self.subfolders.is_empty()
    }
}

/// 依赖记录中的服务条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRef {
    pub id: String,
    pub name: String,
}

impl ServiceRef {
    pub fn new<I: Into<String>, N: Into<String>>(id: I, name: N) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// 依赖记录类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyKind {
    Service,
    Folder,
    Other(String),
}

impl std::str::FromStr for DependencyKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "SERVICE" => DependencyKind::Service,
            "FOLDER" => DependencyKind::Folder,
            other => DependencyKind::Other(other.to_string()),
        })
    }
}

/// 路径深度：按 `/` 拆分后的非空段数
pub fn path_depth(path: &str) -> usize {
    path.split('/').filter(|segment| !segment.is_empty()).count()
}

/// 拼接子文件夹路径
pub fn child_path(parent: &str, name: &str) -> String {
    format!("{}/{}", parent, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_depth() {
        assert_eq!(path_depth("/A/B"), 2);
        assert_eq!(path_depth("A/B/C/D"), 4);
        assert_eq!(path_depth("/A/B/C/D"), 4);
        assert_eq!(path_depth(""), 0);
    }

    #[test]
    fn test_dependency_kind() {
        assert_eq!("SERVICE".parse::<DependencyKind>().unwrap(), DependencyKind::Service);
        assert_eq!("FOLDER".parse::<DependencyKind>().unwrap(), DependencyKind::Folder);
        assert_eq!(
            "POLICY".parse::<DependencyKind>().unwrap(),
            DependencyKind::Other("POLICY".to_string())
        );
    }

    #[test]
    fn test_children_empty() {
        let mut children = FolderChildren::default();
        assert!(children.is_empty());
        children.subfolders.push(FolderRef::new("f1", "X"));
        assert!(!children.is_empty());
    }
}
