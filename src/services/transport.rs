use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value as JsonValue;
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    config::{Config, GatewayConfig},
    error::{AppError, AppResult, FetchError},
    services::events::EventSink,
};

/// 网关用户名 / 密码，原样透传给 HTTP Basic 认证
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new<U: Into<String>, P: Into<String>>(username: U, password: P) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// 单次认证请求的抽象
///
/// 成功（2xx）时返回响应体文本，失败时按 [`FetchError`] 分类。
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str, timeout: Option<Duration>) -> Result<String, FetchError>;

    async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &JsonValue,
        timeout: Option<Duration>,
    ) -> Result<String, FetchError>;
}

/// 基于 reqwest 的传输实现
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
    credentials: Credentials,
}

impl HttpTransport {
    pub fn new(gateway: &GatewayConfig) -> AppResult<Self> {
        let http = Client::builder()
            .danger_accept_invalid_certs(gateway.accept_invalid_certs)
            .build()
            .map_err(|e| AppError::config(format!("创建HTTP客户端失败: {}", e)))?;
        Ok(Self {
            http,
            credentials: Credentials::new(&gateway.username, &gateway.password),
        })
    }

    fn authorize(&self, request: RequestBuilder, timeout: Option<Duration>) -> RequestBuilder {
        let request = request.basic_auth(
            &self.credentials.username,
            Some(&self.credentials.password),
        );
        match timeout {
            Some(timeout) => request.timeout(timeout),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<String, FetchError> {
        let resp = request.send().await.map_err(classify_reqwest_error)?;
        let status = resp.status();
        let text = resp.text().await.map_err(classify_reqwest_error)?;
        debug!(%status, len = text.len(), "网关响应");
        if !status.is_success() {
            return Err(classify_status(status, &text));
        }
        Ok(text)
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str, timeout: Option<Duration>) -> Result<String, FetchError> {
        let request = self.authorize(self.http.get(url), timeout);
        self.send(request).await
    }

    async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &JsonValue,
        timeout: Option<Duration>,
    ) -> Result<String, FetchError> {
        let mut request = self.http.post(url).json(body);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let request = self.authorize(request, timeout);
        self.send(request).await
    }
}

/// 连接失败、超时、响应中途断开属于临时错误
fn classify_reqwest_error(e: reqwest::Error) -> FetchError {
    if e.is_builder() {
        FetchError::request(e.to_string())
    } else if e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() {
        FetchError::transient(e.to_string())
    } else {
        FetchError::request(e.to_string())
    }
}

/// 网关临时不可用的状态码可重试，其余直接失败
pub fn classify_status(status: StatusCode, body: &str) -> FetchError {
    match status {
        StatusCode::INTERNAL_SERVER_ERROR
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => {
            FetchError::transient(format!("网关返回临时错误状态 {}", status))
        }
        _ => FetchError::status(status.as_u16(), body),
    }
}

/// 一次盘点运行共享的上下文：网关地址、传输层、取消令牌和事件接收方
#[derive(Clone)]
pub struct GatewayContext {
    base_url: String,
    transport: Arc<dyn Transport>,
    cancel: CancellationToken,
    events: Arc<dyn EventSink>,
}

impl GatewayContext {
    pub fn new(
        base_url: impl Into<String>,
        transport: Arc<dyn Transport>,
        cancel: CancellationToken,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            transport,
            cancel,
            events,
        }
    }

    /// 按配置构造 HTTP 传输层
    pub fn from_config(
        config: &Config,
        cancel: CancellationToken,
        events: Arc<dyn EventSink>,
    ) -> AppResult<Self> {
        let transport = HttpTransport::new(&config.gateway)?;
        Ok(Self::new(
            config.base_url(),
            Arc::new(transport),
            cancel,
            events,
        ))
    }

    pub fn url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{}/{}", base, path)
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn events(&self) -> &dyn EventSink {
        self.events.as_ref()
    }

    pub fn shared_events(&self) -> Arc<dyn EventSink> {
        self.events.clone()
    }
}

impl std::fmt::Debug for GatewayContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayContext")
            .field("base_url", &self.base_url)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
