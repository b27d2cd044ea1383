//! 测试用的脚本化传输层

use serde_json::Value as JsonValue;
use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio_util::sync::CancellationToken;

use crate::{
    error::FetchError,
    services::{
        events::MemorySink,
        transport::{GatewayContext, Transport},
    },
};

pub const BASE_URL: &str = "https://gw.test:8443";

/// 按 URL 预置响应；同一 URL 的多个响应按顺序消费，最后一个会一直重复
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<HashMap<String, VecDeque<Result<String, FetchError>>>>,
    calls: Mutex<Vec<(String, Option<Duration>)>>,
    bodies: Mutex<Vec<JsonValue>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, path: &str, response: Result<String, FetchError>) -> Self {
        let url = format!("{}/{}", BASE_URL, path.trim_start_matches('/'));
        self.responses
            .lock()
            .unwrap()
            .entry(url)
            .or_default()
            .push_back(response);
        self
    }

    pub fn calls(&self) -> Vec<(String, Option<Duration>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn bodies(&self) -> Vec<JsonValue> {
        self.bodies.lock().unwrap().clone()
    }

    fn next(&self, url: &str, timeout: Option<Duration>) -> Result<String, FetchError> {
        self.calls.lock().unwrap().push((url.to_string(), timeout));
        let mut responses = self.responses.lock().unwrap();
        match responses.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue
                .front()
                .cloned()
                .unwrap_or_else(|| Err(FetchError::status(404, "not scripted"))),
            None => Err(FetchError::status(404, "not scripted")),
        }
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &str, timeout: Option<Duration>) -> Result<String, FetchError> {
        self.next(url, timeout)
    }

    async fn post_json(
        &self,
        url: &str,
        _headers: &[(&str, &str)],
        body: &JsonValue,
        timeout: Option<Duration>,
    ) -> Result<String, FetchError> {
        self.bodies.lock().unwrap().push(body.clone());
        self.next(url, timeout)
    }
}

pub fn context(transport: Arc<ScriptedTransport>) -> (GatewayContext, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let ctx = GatewayContext::new(BASE_URL, transport, CancellationToken::new(), sink.clone());
    (ctx, sink)
}
