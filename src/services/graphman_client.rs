use serde_json::{Value as JsonValue, json};

use crate::{
    config::RetryConfig,
    error::FetchError,
    models::QueriedService,
    services::{retry::RetryPolicy, transport::GatewayContext},
};

const SERVICES_BY_FOLDER_QUERY: &str = r#"
query webApiServicesByFolderPath ($folderPath: String!) {
    webApiServicesByFolderPath (folderPath: $folderPath) {
        folderPath
        name
        resolutionPath
    }
}
"#;

const SERVICE_LIST_FIELD: &str = "webApiServicesByFolderPath";

/// 查询模式的数据来源：服务端负责遍历子树
#[async_trait::async_trait]
pub trait ServiceQuery: Send + Sync {
    async fn list_services_under(&self, folder_path: &str)
    -> Result<Vec<QueriedService>, FetchError>;
}

/// graphman GraphQL 接口客户端
#[derive(Debug, Clone)]
pub struct GraphmanClient {
    ctx: GatewayContext,
    policy: RetryPolicy,
}

impl GraphmanClient {
    pub fn new(ctx: GatewayContext, retry: &RetryConfig) -> Self {
        Self {
            ctx,
            policy: RetryPolicy::new(retry.clone()),
        }
    }
}

#[async_trait::async_trait]
impl ServiceQuery for GraphmanClient {
    async fn list_services_under(
        &self,
        folder_path: &str,
    ) -> Result<Vec<QueriedService>, FetchError> {
        let url = self.ctx.url("/graphman");
        let payload = json!({
            "query": SERVICES_BY_FOLDER_QUERY,
            "variables": { "folderPath": folder_path },
        });
        let headers = [
            ("Content-Type", "application/json"),
            ("X-REQUEST-TYPE", "GraphQL"),
        ];
        let timeout = self.policy.timeout();
        let label = format!("graphman {}", folder_path);

        let body = self
            .policy
            .execute(&label, self.ctx.cancel_token(), self.ctx.events(), || {
                self.ctx
                    .transport()
                    .post_json(&url, &headers, &payload, timeout)
            })
            .await?;

        parse_services_response(&body)
    }
}

/// 解析 `{data: {webApiServicesByFolderPath: [...]}}`；列表为 null 视为空
pub fn parse_services_response(body: &str) -> Result<Vec<QueriedService>, FetchError> {
    let json: JsonValue = serde_json::from_str(body)
        .map_err(|e| FetchError::format(format!("响应不是有效的JSON: {}", e)))?;

    let data = match json.get("data") {
        Some(data) if data.is_object() => data,
        _ => {
            let errors = json
                .get("errors")
                .map(|e| e.to_string())
                .unwrap_or_else(|| "缺少 data 字段".to_string());
            return Err(FetchError::format(format!("graphman 返回错误: {}", errors)));
        }
    };

    match data.get(SERVICE_LIST_FIELD) {
        None => Err(FetchError::format(format!(
            "响应缺少 {} 字段",
            SERVICE_LIST_FIELD
        ))),
        Some(JsonValue::Null) => Ok(Vec::new()),
        Some(list) => serde_json::from_value(list.clone())
            .map_err(|e| FetchError::format(format!("服务列表结构不符合预期: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{ScriptedTransport, context};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_parse_services_response() {
        let body = r#"{"data":{"webApiServicesByFolderPath":[
            {"folderPath":"/BHDL/X","name":"Svc1","resolutionPath":"/svc1"},
            {"folderPath":"/BHDL","name":"Svc2","resolutionPath":null}
        ]}}"#;
        let services = parse_services_response(body).unwrap();
        assert_eq!(services.len(), 2);
        assert_eq!(services[0].folder_path, "/BHDL/X");
        assert_eq!(services[1].resolution_path, None);
    }

    #[test]
    fn test_parse_null_list_is_empty() {
        let body = r#"{"data":{"webApiServicesByFolderPath":null}}"#;
        assert!(parse_services_response(body).unwrap().is_empty());
    }

    #[test]
    fn test_parse_malformed_responses() {
        assert!(matches!(
            parse_services_response("<html>login</html>"),
            Err(FetchError::Format(_))
        ));
        assert!(matches!(
            parse_services_response(r#"{"errors":[{"message":"denied"}]}"#),
            Err(FetchError::Format(msg)) if msg.contains("denied")
        ));
        assert!(matches!(
            parse_services_response(r#"{"data":{}}"#),
            Err(FetchError::Format(_))
        ));
        assert!(matches!(
            parse_services_response(r#"{"data":{"webApiServicesByFolderPath":[{"name":1}]}}"#),
            Err(FetchError::Format(_))
        ));
    }

    #[tokio::test]
    async fn test_query_posts_folder_path_variable() {
        let transport = Arc::new(ScriptedTransport::new().respond(
            "/graphman",
            Ok(r#"{"data":{"webApiServicesByFolderPath":[]}}"#.to_string()),
        ));
        let (ctx, _sink) = context(transport.clone());
        let client = GraphmanClient::new(ctx, &RetryConfig::new(1, 0.0, Some(10)));

        let services = client.list_services_under("/BHDL").await.unwrap();
        assert!(services.is_empty());

        let bodies = transport.bodies();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0]["variables"]["folderPath"], "/BHDL");
        assert!(
            bodies[0]["query"]
                .as_str()
                .unwrap()
                .contains("webApiServicesByFolderPath")
        );
        assert_eq!(transport.calls()[0].1, Some(Duration::from_secs(10)));
    }
}
