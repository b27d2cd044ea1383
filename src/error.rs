use thiserror::Error;

/// 运行级错误（配置、输出写入等），会中止整次盘点
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV写入错误: {0}")]
    Csv(#[from] csv::Error),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("输出写入失败: {path}: {reason}")]
    Sink { path: String, reason: String },

    #[error("网关请求失败: {0}")]
    Fetch(#[from] FetchError),
}

/// 应用程序Result类型别名
pub type AppResult<T> = Result<T, AppError>;

/// 错误构造辅助函数
impl AppError {
    pub fn config<T: Into<String>>(msg: T) -> Self {
        Self::Config(msg.into())
    }

    pub fn sink<P: Into<String>, R: std::fmt::Display>(path: P, reason: R) -> Self {
        Self::Sink {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// 单次网关调用的失败分类
///
/// 只影响当前文件夹 / 服务，遍历引擎会把它转成事件后继续运行。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// 连接失败、超时或网关临时性状态码，可重试
    #[error("临时网络错误: {0}")]
    Transient(String),

    /// 重试次数耗尽
    #[error("重试 {attempts} 次后仍然失败: {last}")]
    Exhausted { attempts: u32, last: String },

    /// 不可重试的HTTP状态
    #[error("网关返回错误状态 {status}: {body_preview}")]
    Status { status: u16, body_preview: String },

    /// 响应体无法按预期结构解析
    #[error("响应格式错误: {0}")]
    Format(String),

    /// 请求本身无法构造或认证信息无效
    #[error("请求错误: {0}")]
    Request(String),

    /// 运行被取消
    #[error("操作已取消")]
    Cancelled,
}

impl FetchError {
    pub fn transient<T: Into<String>>(msg: T) -> Self {
        Self::Transient(msg.into())
    }

    pub fn format<T: Into<String>>(msg: T) -> Self {
        Self::Format(msg.into())
    }

    pub fn request<T: Into<String>>(msg: T) -> Self {
        Self::Request(msg.into())
    }

    /// 构造状态码错误，响应体只保留前200个字符
    pub fn status(status: u16, body: &str) -> Self {
        Self::Status {
            status,
            body_preview: body.chars().take(200).collect(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }
}
