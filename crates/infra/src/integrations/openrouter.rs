//! OpenRouter (OpenAI-compatible chat completions) as the assistant's LLM.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use tracing::instrument;

use storefront_ai::{AiError, LlmClient, LlmMessage, LlmRequest, LlmResponse, LlmRole, ToolCall, ToolSpec};

use super::http_client;
use crate::config::OpenRouterConfig;

#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    referer: Option<String>,
}

impl OpenRouterClient {
    pub fn new(config: &OpenRouterConfig) -> Self {
        Self {
            client: http_client(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            referer: None,
        }
    }

    /// Attribution header OpenRouter shows in its dashboard.
    pub fn with_referer(mut self, url: impl Into<String>) -> Self {
        self.referer = Some(url.into());
        self
    }
}

fn role(role: LlmRole) -> &'static str {
    match role {
        LlmRole::System => "system",
        LlmRole::User => "user",
        LlmRole::Assistant => "assistant",
        LlmRole::Tool => "tool",
    }
}

fn message_json(message: &LlmMessage) -> JsonValue {
    let mut out = json!({ "role": role(message.role), "content": message.content });
    if !message.tool_calls.is_empty() {
        out["tool_calls"] = message
            .tool_calls
            .iter()
            .map(|c| {
                json!({
                    "id": c.id,
                    "type": "function",
                    "function": { "name": c.name, "arguments": c.arguments.to_string() },
                })
            })
            .collect();
    }
    if let Some(id) = &message.tool_call_id {
        out["tool_call_id"] = json!(id);
    }
    out
}

fn tool_json(spec: &ToolSpec) -> JsonValue {
    json!({
        "type": "function",
        "function": { "name": spec.name, "description": spec.description, "parameters": spec.parameters },
    })
}

/// Chat-completions request body.
pub fn request_body(model: &str, request: &LlmRequest) -> JsonValue {
    let mut messages = vec![json!({ "role": "system", "content": request.system })];
    messages.extend(request.messages.iter().map(message_json));

    let mut body = json!({ "model": model, "messages": messages });
    if !request.tools.is_empty() {
        body["tools"] = request.tools.iter().map(tool_json).collect();
        body["tool_choice"] = json!("auto");
    }
    body
}

#[derive(Deserialize)]
struct Completion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<CompletionToolCall>,
}

#[derive(Deserialize)]
struct CompletionToolCall {
    id: String,
    function: CompletionFunction,
}

#[derive(Deserialize)]
struct CompletionFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

/// Decode the first choice. Unparseable tool arguments become `{}` so the
/// tool itself reports the missing fields.
pub fn parse_completion(body: &str) -> Result<LlmResponse, AiError> {
    let completion: Completion =
        serde_json::from_str(body).map_err(|e| AiError::InferenceFailed(format!("malformed completion: {e}")))?;
    let message = completion
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| AiError::InferenceFailed("completion has no choices".into()))?
        .message;

    let tool_calls = message
        .tool_calls
        .into_iter()
        .map(|c| ToolCall {
            id: c.id,
            name: c.function.name,
            arguments: serde_json::from_str(&c.function.arguments).unwrap_or_else(|_| json!({})),
        })
        .collect();

    Ok(LlmResponse {
        content: message.content.filter(|c| !c.is_empty()),
        tool_calls,
    })
}

#[async_trait]
impl LlmClient for OpenRouterClient {
    #[instrument(skip_all, fields(model = %self.model, messages = request.messages.len()), err)]
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, AiError> {
        let mut http = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request_body(&self.model, &request));
        if let Some(referer) = &self.referer {
            http = http.header("HTTP-Referer", referer);
        }

        let response = http
            .send()
            .await
            .map_err(|e| AiError::InferenceFailed(format!("openrouter transport error: {e}")))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AiError::InferenceFailed(format!("openrouter body error: {e}")))?;
        if !status.is_success() {
            return Err(AiError::InferenceFailed(format!("openrouter returned {status}: {body}")));
        }
        parse_completion(&body)
    }
}

/// Used when `OPENROUTER_API_KEY` is not set.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledLlm;

#[async_trait]
impl LlmClient for DisabledLlm {
    async fn complete(&self, _: LlmRequest) -> Result<LlmResponse, AiError> {
        Err(AiError::Unavailable("OPENROUTER_API_KEY is not configured".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_prepends_system_prompt_and_stringifies_tool_arguments() {
        let request = LlmRequest {
            system: "be nice".into(),
            messages: vec![
                LlmMessage::user("where is my order?"),
                LlmMessage::assistant_tool_calls(vec![ToolCall {
                    id: "call_1".into(),
                    name: "getOrderStatus".into(),
                    arguments: json!({ "orderNumber": "DC1" }),
                }]),
                LlmMessage::tool_result("call_1", &json!({ "success": true })),
            ],
            tools: vec![ToolSpec { name: "getOrderStatus".into(), description: "d".into(), parameters: json!({}) }],
        };

        let body = request_body("openai/gpt-4o-mini", &request);
        let messages = body["messages"].as_array().unwrap();

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[2]["tool_calls"][0]["function"]["arguments"], "{\"orderNumber\":\"DC1\"}");
        assert_eq!(messages[3]["tool_call_id"], "call_1");
        assert_eq!(body["tools"][0]["function"]["name"], "getOrderStatus");
    }

    #[test]
    fn completion_with_tool_calls_is_decoded() {
        let body = r#"{"choices":[{"message":{"content":null,"tool_calls":[
            {"id":"c1","type":"function","function":{"name":"getCustomerOrders","arguments":"{\"limit\":3}"}},
            {"id":"c2","type":"function","function":{"name":"getOrderStatus","arguments":"not json"}}
        ]}}]}"#;

        let response = parse_completion(body).unwrap();
        assert_eq!(response.content, None);
        assert_eq!(response.tool_calls.len(), 2);
        assert_eq!(response.tool_calls[0].arguments, json!({ "limit": 3 }));
        assert_eq!(response.tool_calls[1].arguments, json!({}));
    }

    #[test]
    fn empty_choices_is_an_error() {
        assert!(matches!(parse_completion(r#"{"choices":[]}"#), Err(AiError::InferenceFailed(_))));
    }
}
