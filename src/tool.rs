//! Tool model and HTTP runner.
//!
//! A tool is an external HTTP service described by an OpenAPI-ish spec. The
//! runtime POSTs the mapped payload to `api_endpoint + route`; JSON bodies
//! are merged into memory directly, while routes that declare non-JSON
//! response mime types have their bodies written to the object store and a
//! blob descriptor stored instead.

use crate::setup::ToolPlan;
use crate::store::ObjectStore;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

/// Tool registration handed to the orchestrator at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub api_endpoint: String,
    /// OpenAPI-ish spec; `paths.<route>.post.responses.200.content` decides
    /// whether a route's output is stored as a blob.
    pub api_spec: Value,
    #[serde(default = "default_tool_id")]
    pub id: String,
    #[serde(default)]
    pub tokens_per_execution: f64,
    #[serde(default)]
    pub token_multiplier: f64,
}

fn default_tool_id() -> String {
    "-1".to_string()
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("tool response was not a JSON object: {0}")]
    Parse(String),

    #[error("failed to store tool output: {0}")]
    Store(#[from] anyhow::Error),
}

/// Execute a resolved tool plan.
pub async fn run_tool(
    client: &reqwest::Client,
    store: &dyn ObjectStore,
    plan: &ToolPlan,
) -> Result<Value, ToolError> {
    let response = client
        .post(&plan.tool_path)
        .json(&plan.payload)
        .send()
        .await?;

    let status = response.status();
    let response_headers = json!({
        "status": status.as_u16(),
        "success": status.is_success(),
    });

    if !plan.output_mime_types.is_empty() {
        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split('/').nth(1))
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .unwrap_or_else(|| "bin".to_string());

        let body = response.bytes().await?;
        let file_name = format!("{}.{}", Uuid::new_v4(), mime_type);
        store.put(&file_name, body).await?;

        let root = store.root_url();
        let url = if root.ends_with('/') {
            format!("{root}{file_name}")
        } else {
            format!("{root}/{file_name}")
        };
        return Ok(json!({
            "file_name": file_name,
            "mime_type": mime_type,
            "url": url,
            "response_headers": response_headers,
        }));
    }

    let body: Value = response.json().await?;
    let mut merged = match body {
        Value::Object(entries) => entries,
        other => {
            return Err(ToolError::Parse(format!(
                "expected object, got: {other}"
            )))
        }
    };
    merged.insert("response_headers".to_string(), response_headers);
    Ok(Value::Object(merged))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::{ToolPlan, ToolTokenUsage};
    use crate::store::InMemoryStore;
    use serde_json::json;

    fn plan(url: String, output_mime_types: Vec<String>) -> ToolPlan {
        ToolPlan {
            tool_id: "tool-1".to_string(),
            payload: json!({"query": "fish"}),
            output_mime_types,
            tool_path: url,
            tokens: ToolTokenUsage {
                execution: 2.0,
                multiplier: 0.0,
            },
        }
    }

    #[tokio::test]
    async fn json_response_merges_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/search")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"answer": 42}"#)
            .create_async()
            .await;

        let store = InMemoryStore::new();
        let client = reqwest::Client::new();
        let result = run_tool(
            &client,
            &store,
            &plan(format!("{}/search", server.url()), vec![]),
        )
        .await
        .unwrap();

        mock.assert_async().await;
        assert_eq!(result["answer"], json!(42));
        assert_eq!(result["response_headers"]["status"], json!(200));
        assert_eq!(result["response_headers"]["success"], json!(true));
    }

    #[tokio::test]
    async fn blob_response_is_stored() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/render")
            .with_status(200)
            .with_header("content-type", "image/png")
            .with_body("not-really-a-png")
            .create_async()
            .await;

        let store = InMemoryStore::new();
        let client = reqwest::Client::new();
        let result = run_tool(
            &client,
            &store,
            &plan(
                format!("{}/render", server.url()),
                vec!["image/png".to_string()],
            ),
        )
        .await
        .unwrap();

        assert_eq!(result["mime_type"], json!("png"));
        let file_name = result["file_name"].as_str().unwrap();
        assert!(file_name.ends_with(".png"));
        assert_eq!(
            result["url"],
            json!(format!("memory://{file_name}"))
        );
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn non_object_json_is_a_parse_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/scalar")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("41")
            .create_async()
            .await;

        let store = InMemoryStore::new();
        let client = reqwest::Client::new();
        let err = run_tool(
            &client,
            &store,
            &plan(format!("{}/scalar", server.url()), vec![]),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ToolError::Parse(_)));
    }
}
