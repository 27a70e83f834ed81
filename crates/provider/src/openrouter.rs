//! OpenRouter backend
//!
//! Speaks the OpenAI-compatible `/chat/completions` protocol, so it also works
//! against api.openai.com or any self-hosted gateway given the right base URL.

use crate::*;
use reqwest::Client;
use serde_json::json;
use tracing::trace;

pub const OPENROUTER_API_BASE: &str = "https://openrouter.ai/api/v1";
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "z-ai/glm-4.5";

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [Tool]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<Value>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

/// Assistant tool call; arguments travel as an encoded JSON string.
#[derive(Serialize)]
struct WireToolCall<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    function: WireFunctionCall<'a>,
}

#[derive(Serialize)]
struct WireFunctionCall<'a> {
    name: &'a str,
    arguments: String,
}

impl<'a> From<&'a Message> for WireMessage<'a> {
    fn from(message: &'a Message) -> Self {
        let tool_calls = message.tool_calls.as_ref().map(|calls| {
            calls
                .iter()
                .map(|call| WireToolCall {
                    id: &call.id,
                    kind: &call.call_type,
                    function: WireFunctionCall {
                        name: &call.function.name,
                        arguments: call.function.arguments.to_string(),
                    },
                })
                .collect()
        });

        Self {
            role: &message.role,
            content: message.content.as_deref(),
            tool_calls,
            tool_call_id: message.tool_call_id.as_deref(),
            name: message.name.as_deref(),
        }
    }
}

fn tool_choice_value(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Auto => json!("auto"),
        ToolChoice::None => json!("none"),
        ToolChoice::Required(name) => json!({"type": "function", "function": {"name": name}}),
    }
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireReply,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct WireReply {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireReplyCall>>,
}

#[derive(Deserialize)]
struct WireReplyCall {
    #[serde(default)]
    id: Option<String>,
    function: WireReplyFunction,
}

#[derive(Deserialize)]
struct WireReplyFunction {
    #[serde(default)]
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Deserialize)]
struct WireError {
    error: WireErrorBody,
}

#[derive(Deserialize)]
struct WireErrorBody {
    message: String,
}

/// Arguments arrive as an encoded string (sometimes empty, sometimes not JSON at all)
fn decode_arguments(raw: Value) -> Value {
    match raw {
        Value::Null => json!({}),
        Value::String(text) if text.trim().is_empty() => json!({}),
        Value::String(text) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
        other => other,
    }
}

impl From<WireReplyCall> for ToolCall {
    fn from(call: WireReplyCall) -> Self {
        ToolCall {
            id: call.id.unwrap_or_default(),
            name: call.function.name,
            arguments: decode_arguments(call.function.arguments),
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct OpenRouterProvider {
    client: Client,
    api_key: String,
    api_base: String,
    default_model: String,
}

impl OpenRouterProvider {
    pub fn new(
        api_key: impl Into<String>,
        api_base: Option<String>,
        default_model: Option<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_base: api_base
                .map(|b| b.trim_end_matches('/').to_string())
                .unwrap_or_else(|| OPENROUTER_API_BASE.to_string()),
            default_model: default_model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn build_request<'a>(&'a self, params: &'a ChatParams) -> WireRequest<'a> {
        let model = match params.model.as_str() {
            "" => self.default_model.as_str(),
            model => model,
        };
        let with_tools = !params.tools.is_empty();

        WireRequest {
            model,
            messages: params.messages.iter().map(WireMessage::from).collect(),
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            tools: with_tools.then_some(params.tools.as_slice()),
            tool_choice: with_tools.then(|| tool_choice_value(&params.tool_choice)),
        }
    }

    fn parse_response(&self, body: Value) -> Result<ChatResponse> {
        let wire: WireResponse =
            serde_json::from_value(body).map_err(|_| ProviderError::InvalidResponse)?;
        let choice = wire
            .choices
            .into_iter()
            .next()
            .ok_or(ProviderError::InvalidResponse)?;
        let usage = wire.usage.unwrap_or_default();

        Ok(ChatResponse {
            content: choice.message.content,
            tool_calls: choice
                .message
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(ToolCall::from)
                .collect(),
            finish_reason: choice.finish_reason.unwrap_or_else(|| "stop".to_string()),
            usage: Usage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
            },
        })
    }
}

#[async_trait]
impl Provider for OpenRouterProvider {
    async fn chat(&self, params: ChatParams) -> Result<ChatResponse> {
        if self.api_key.is_empty() {
            return Err(ProviderError::NoApiKey);
        }

        let url = format!("{}/chat/completions", self.api_base);
        trace!(%url, messages = params.messages.len(), tools = params.tools.len(), "sending completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.build_request(&params))
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited);
        }
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<WireError>(&text)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| format!("HTTP {}", status));
            return Err(ProviderError::Api(message));
        }

        let parsed = self.parse_response(serde_json::from_str(&text)?)?;
        debug!(
            tool_calls = parsed.tool_calls.len(),
            finish_reason = %parsed.finish_reason,
            total_tokens = parsed.usage.total_tokens,
            "completion received"
        );
        Ok(parsed)
    }

    fn default_model(&self) -> String {
        self.default_model.clone()
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params_with(messages: Vec<Message>, tools: Vec<Tool>, tool_choice: ToolChoice) -> ChatParams {
        ChatParams {
            model: "z-ai/glm-4.5".to_string(),
            messages,
            tools,
            max_tokens: 1024,
            temperature: 0.5,
            tool_choice,
        }
    }

    fn request_json(provider: &OpenRouterProvider, params: &ChatParams) -> Value {
        serde_json::to_value(provider.build_request(params)).unwrap()
    }

    // ========== Construction ==========

    #[test]
    fn test_new_uses_openrouter_defaults() {
        let provider = OpenRouterProvider::new("sk-or-test123", None, None);
        assert_eq!(provider.api_base, OPENROUTER_API_BASE);
        assert_eq!(provider.default_model, DEFAULT_MODEL);
        assert_eq!(provider.api_key, "sk-or-test123");
    }

    #[test]
    fn test_new_with_custom_base_strips_trailing_slash() {
        let provider =
            OpenRouterProvider::new("sk-test", Some(format!("{}/", OPENAI_API_BASE)), None);
        assert_eq!(provider.api_base(), OPENAI_API_BASE);
    }

    #[test]
    fn test_new_with_custom_default_model() {
        let provider = OpenRouterProvider::new("k", None, Some("openai/gpt-4o".to_string()));
        assert_eq!(provider.default_model(), "openai/gpt-4o");
    }

    #[test]
    fn test_is_configured() {
        assert!(OpenRouterProvider::new("valid-api-key", None, None).is_configured());
        assert!(!OpenRouterProvider::new("", None, None).is_configured());
    }

    #[tokio::test]
    async fn test_chat_without_key_fails_fast() {
        let provider = OpenRouterProvider::new("", None, None);
        let result = provider.chat(ChatParams::default()).await;
        assert!(matches!(result, Err(ProviderError::NoApiKey)));
    }

    // ========== build_request ==========

    #[test]
    fn test_build_request_basic() {
        let provider = OpenRouterProvider::new("sk-test", None, None);
        let params = params_with(vec![Message::user("Hello")], vec![], ToolChoice::Auto);

        let request = request_json(&provider, &params);

        assert_eq!(request["model"], "z-ai/glm-4.5");
        assert_eq!(request["max_tokens"], 1024);
        assert_eq!(request["temperature"], 0.5);
        assert!(request.get("tools").is_none());
        assert!(request.get("tool_choice").is_none());

        let messages = request["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[0]["content"], "Hello");
    }

    #[test]
    fn test_build_request_falls_back_to_default_model() {
        let provider = OpenRouterProvider::new("sk-test", None, Some("fallback/model".into()));
        let request = request_json(&provider, &ChatParams::default());
        assert_eq!(request["model"], "fallback/model");
    }

    #[test]
    fn test_build_request_tool_message() {
        let provider = OpenRouterProvider::new("sk-test", None, None);
        let params = params_with(
            vec![Message::tool("call_123", "Read", "{\"content\":\"hi\"}")],
            vec![],
            ToolChoice::Auto,
        );

        let request = request_json(&provider, &params);
        let messages = request["messages"].as_array().unwrap();
        assert_eq!(messages[0]["role"], "tool");
        assert_eq!(messages[0]["content"], "{\"content\":\"hi\"}");
        assert_eq!(messages[0]["tool_call_id"], "call_123");
        assert_eq!(messages[0]["name"], "Read");
    }

    #[test]
    fn test_build_request_encodes_tool_call_arguments_as_string() {
        let provider = OpenRouterProvider::new("sk-test", None, None);
        let msg = Message {
            role: "assistant".to_string(),
            content: None,
            tool_calls: Some(vec![ToolCallDef::new(
                "call_1",
                "Read",
                json!({"file_path": "a.md"}),
            )]),
            tool_call_id: None,
            name: None,
        };

        let request = request_json(&provider, &params_with(vec![msg], vec![], ToolChoice::Auto));
        let call = &request["messages"][0]["tool_calls"][0];
        assert_eq!(call["id"], "call_1");
        assert_eq!(call["type"], "function");
        assert_eq!(call["function"]["name"], "Read");
        let encoded = call["function"]["arguments"].as_str().unwrap();
        let decoded: serde_json::Value = serde_json::from_str(encoded).unwrap();
        assert_eq!(decoded["file_path"], "a.md");
    }

    #[test]
    fn test_build_request_tool_choices() {
        let provider = OpenRouterProvider::new("sk-test", None, None);
        let tools = vec![Tool::new("List", "List files", json!({"type": "object"}))];

        let auto = request_json(&provider, &params_with(
            vec![Message::user("go")],
            tools.clone(),
            ToolChoice::Auto,
        ));
        assert_eq!(auto["tool_choice"], "auto");
        assert_eq!(auto["tools"][0]["function"]["name"], "List");

        let none = request_json(&provider, &params_with(
            vec![Message::user("go")],
            tools.clone(),
            ToolChoice::None,
        ));
        assert_eq!(none["tool_choice"], "none");

        let required = request_json(&provider, &params_with(
            vec![Message::user("go")],
            tools,
            ToolChoice::Required("List".to_string()),
        ));
        assert_eq!(required["tool_choice"]["type"], "function");
        assert_eq!(required["tool_choice"]["function"]["name"], "List");
    }

    // ========== parse_response ==========

    #[test]
    fn test_parse_response_simple() {
        let provider = OpenRouterProvider::new("sk-test", None, None);
        let response = provider
            .parse_response(json!({
                "choices": [{
                    "message": {"content": "Hello!", "role": "assistant"},
                    "finish_reason": "stop"
                }],
                "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
            }))
            .unwrap();

        assert_eq!(response.content, Some("Hello!".to_string()));
        assert!(response.tool_calls.is_empty());
        assert_eq!(response.finish_reason, "stop");
        assert_eq!(response.usage.total_tokens, 15);
    }

    #[test]
    fn test_parse_response_with_tool_calls() {
        let provider = OpenRouterProvider::new("sk-test", None, None);
        let response = provider
            .parse_response(json!({
                "choices": [{
                    "message": {
                        "content": null,
                        "tool_calls": [
                            {
                                "id": "call_1",
                                "type": "function",
                                "function": {"name": "Read", "arguments": "{\"file_path\": \"a.md\"}"}
                            },
                            {
                                "id": "call_2",
                                "type": "function",
                                "function": {"name": "List", "arguments": {"directory": "."}}
                            }
                        ]
                    },
                    "finish_reason": "tool_calls"
                }]
            }))
            .unwrap();

        assert_eq!(response.content, None);
        assert_eq!(response.tool_calls.len(), 2);
        assert_eq!(response.tool_calls[0].arguments, json!({"file_path": "a.md"}));
        assert_eq!(response.tool_calls[1].arguments, json!({"directory": "."}));
        assert_eq!(response.finish_reason, "tool_calls");
    }

    #[test]
    fn test_parse_response_empty_or_malformed_arguments() {
        let provider = OpenRouterProvider::new("sk-test", None, None);
        let response = provider
            .parse_response(json!({
                "choices": [{
                    "message": {
                        "tool_calls": [
                            {"id": "a", "function": {"name": "List", "arguments": ""}},
                            {"id": "b", "function": {"name": "Think", "arguments": "not json"}},
                            {"function": {"name": "List"}}
                        ]
                    }
                }]
            }))
            .unwrap();

        assert_eq!(response.tool_calls[0].arguments, json!({}));
        assert_eq!(response.tool_calls[1].arguments, json!("not json"));
        assert_eq!(response.tool_calls[2].id, "");
        assert_eq!(response.tool_calls[2].arguments, json!({}));
        assert_eq!(response.finish_reason, "stop");
    }

    #[test]
    fn test_parse_response_missing_usage() {
        let provider = OpenRouterProvider::new("sk-test", None, None);
        let response = provider
            .parse_response(json!({
                "choices": [{"message": {"content": "Hello"}, "finish_reason": "stop"}]
            }))
            .unwrap();
        assert_eq!(response.usage.prompt_tokens, 0);
        assert_eq!(response.usage.total_tokens, 0);
    }

    #[test]
    fn test_parse_response_without_choices() {
        let provider = OpenRouterProvider::new("sk-test", None, None);
        assert!(matches!(
            provider.parse_response(json!({"choices": []})),
            Err(ProviderError::InvalidResponse)
        ));
        assert!(matches!(
            provider.parse_response(json!({"usage": {}})),
            Err(ProviderError::InvalidResponse)
        ));
    }
}
