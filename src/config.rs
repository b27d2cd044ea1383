use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub mod retry;

pub use retry::{RetryConfig, RetryProfiles};

/// 应用程序配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub inventory: InventoryConfig,
    #[serde(default)]
    pub retry: RetryProfiles,
}

/// 网关连接配置
#[derive(Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// IP或主机名加端口，例如 10.112.0.89:8443
    pub host: String,
    pub username: String,
    /// 建议通过环境变量 APIGW_PASSWORD 提供
    #[serde(default)]
    pub password: String,
    /// 网关通常使用自签名证书
    #[serde(default = "default_true")]
    pub accept_invalid_certs: bool,
}

// 手写 Debug，避免密码进入日志
impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"***")
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .finish()
    }
}

/// 盘点方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InventoryMode {
    /// graphman 按文件夹路径查询，服务端负责遍历
    Query,
    /// restman 文件夹依赖图，本地递归遍历
    Dependency,
}

impl std::fmt::Display for InventoryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InventoryMode::Query => write!(f, "query"),
            InventoryMode::Dependency => write!(f, "dependency"),
        }
    }
}

/// 盘点任务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryConfig {
    pub mode: InventoryMode,
    /// 根文件夹，分号分隔，例如 "BHDL;/BHDIB/"
    pub folders: String,
    /// 输出CSV路径，为空时按网关地址生成
    #[serde(default)]
    pub output: Option<String>,
    /// 依赖图模式下是否再逐个获取 resolutionPath
    #[serde(default = "default_true")]
    pub resolve_paths: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig {
                host: "localhost:8443".to_string(),
                username: "admin".to_string(),
                password: String::new(),
                accept_invalid_certs: true,
            },
            inventory: InventoryConfig {
                mode: InventoryMode::Dependency,
                folders: String::new(),
                output: None,
                resolve_paths: true,
            },
            retry: RetryProfiles::default(),
        }
    }
}

impl Config {
    /// 从配置文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| AppError::config(format!("解析配置文件失败: {}", e)))?;

        Ok(config)
    }

    /// 加载配置文件；文件不存在时写出默认配置并使用它
    ///
    /// 已存在但无法解析的文件原样保留，错误返回给调用方。
    pub fn load_or_init<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path = path.as_ref();
        match Self::from_file(path) {
            Ok(config) => {
                tracing::info!("已加载配置文件: {}", path.display());
                Ok(config)
            }
            Err(AppError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("未找到配置文件 {}，使用默认配置", path.display());
                let default_config = Self::default();
                if let Err(e) = default_config.save_to_file(path) {
                    tracing::warn!("保存默认配置失败: {}", e);
                }
                Ok(default_config)
            }
            Err(e) => Err(e),
        }
    }

    /// 验证配置有效性
    pub fn validate(&self) -> AppResult<()> {
        if self.gateway.host.trim().is_empty() {
            return Err(AppError::config("网关地址不能为空"));
        }

        if self.gateway.username.trim().is_empty() {
            return Err(AppError::config("用户名不能为空"));
        }

        if self.targets().is_empty() {
            return Err(AppError::config("至少需要一个根文件夹"));
        }

        if let Err(e) = self.retry.validate() {
            return Err(AppError::config(format!("重试配置无效: {}", e)));
        }

        Ok(())
    }

    /// 网关基础URL，未带协议时补 https://
    pub fn base_url(&self) -> String {
        normalize_base_url(&self.gateway.host)
    }

    /// 拆分后的根文件夹列表
    pub fn targets(&self) -> Vec<String> {
        parse_targets(&self.inventory.folders)
    }

    /// 输出CSV路径
    pub fn output_path(&self) -> String {
        match &self.inventory.output {
            Some(path) if !path.trim().is_empty() => path.trim().to_string(),
            _ => default_output_name(&self.gateway.host),
        }
    }

    /// 保存配置到文件（不写入密码）
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> AppResult<()> {
        let mut redacted = self.clone();
        redacted.gateway.password.clear();
        let content = toml::to_string_pretty(&redacted)
            .map_err(|e| AppError::config(format!("序列化配置失败: {}", e)))?;

        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }
}

pub fn normalize_base_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

/// 按分号拆分根文件夹，去掉空白和空项
pub fn parse_targets(input: &str) -> Vec<String> {
    input
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// 根据网关地址生成默认CSV文件名
pub fn default_output_name(host: &str) -> String {
    let safe: String = host
        .trim()
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            other => other,
        })
        .collect();
    format!("inventory_apis_{}.csv", safe)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn sample_config() -> Config {
        let mut config = Config::default();
        config.inventory.folders = "BHDL; BHDIB ;;".to_string();
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.inventory.mode, InventoryMode::Dependency);
        assert!(config.inventory.resolve_paths);
        assert_eq!(config.retry.dependencies.max_attempts, 8);
    }

    #[test]
    fn test_config_validation() {
        let mut config = sample_config();
        assert!(config.validate().is_ok());

        config.inventory.folders = " ; ".to_string();
        assert!(config.validate().is_err());

        let mut config = sample_config();
        config.gateway.host = "".to_string();
        assert!(config.validate().is_err());

        let mut config = sample_config();
        config.retry.query.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_targets() {
        assert_eq!(parse_targets("BHDL; /BHDIB/ ;;"), vec!["BHDL", "/BHDIB/"]);
        assert!(parse_targets("").is_empty());
    }

    #[test]
    fn test_base_url() {
        assert_eq!(
            normalize_base_url("10.112.0.89:8443"),
            "https://10.112.0.89:8443"
        );
        assert_eq!(
            normalize_base_url("http://gw.local:8080/"),
            "http://gw.local:8080"
        );
    }

    #[test]
    fn test_default_output_name() {
        assert_eq!(
            default_output_name("10.112.0.89:8443"),
            "inventory_apis_10.112.0.89_8443.csv"
        );
        let config = sample_config();
        assert_eq!(config.output_path(), "inventory_apis_localhost_8443.csv");
    }

    #[test]
    fn test_debug_hides_password() {
        let mut config = Config::default();
        config.gateway.password = "s3cret".to_string();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("s3cret"));
    }

    #[test]
    fn test_load_or_init_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = Config::load_or_init(&path).unwrap();

        assert_eq!(config.gateway.host, "localhost:8443");
        assert!(path.exists());
        assert_eq!(Config::from_file(&path).unwrap().gateway.host, "localhost:8443");
    }

    #[test]
    fn test_load_or_init_keeps_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mycfg.toml");
        let content = "[gateway]\nhost = \"10.1.1.1:8443\"\nusername = \"ops\"\nthis is not toml\n\n[inventory]\nmode = \"dependency\"\nfolders = \"BHDL;BHDIB\"\n";
        std::fs::write(&path, content).unwrap();

        let err = Config::load_or_init(&path).unwrap_err();

        assert!(matches!(err, AppError::Config(_)));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), content);
    }

    #[test]
    fn test_save_and_load_config() {
        let mut original_config = sample_config();
        original_config.gateway.password = "s3cret".to_string();
        let temp_file = NamedTempFile::new().unwrap();

        original_config.save_to_file(temp_file.path()).unwrap();
        let loaded_config = Config::from_file(temp_file.path()).unwrap();

        assert_eq!(original_config.gateway.host, loaded_config.gateway.host);
        assert_eq!(original_config.targets(), loaded_config.targets());
        assert_eq!(original_config.retry, loaded_config.retry);
        assert!(loaded_config.gateway.password.is_empty());
    }
}
