//! OpenRouter/OpenAI-compatible model endpoint.

use crate::*;
use reqwest::Client;
use serde_json::json;
use tracing::warn;

/// Chat-completions client for OpenRouter and OpenAI-compatible endpoints
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
        let api_key = api_key.into();
        let is_openrouter = api_key.starts_with("sk-or-")
            || api_base
                .as_ref()
                .map(|b| b.contains("openrouter"))
                .unwrap_or(false);

        let api_base = api_base
            .unwrap_or_else(|| {
                if is_openrouter {
                    "https://openrouter.ai/api/v1".to_string()
                } else {
                    "https://api.openai.com/v1".to_string()
                }
            })
            .trim_end_matches('/')
            .to_string();

        let default_model = default_model.unwrap_or_else(|| {
            if is_openrouter {
                "anthropic/claude-3-haiku".to_string()
            } else {
                "gpt-4o-mini".to_string()
            }
        });

        Self {
            client: Client::new(),
            api_key,
            api_base,
            default_model,
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn build_messages(&self, request: &ConverseRequest) -> Vec<Value> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);

        if !request.system_prompt.is_empty() {
            messages.push(json!({ "role": "system", "content": &request.system_prompt }));
        }

        for message in &request.messages {
            let mut text = Vec::new();
            let mut tool_calls = Vec::new();

            for block in &message.content {
                match block {
                    ContentBlock::Text { text: t } => text.push(t.as_str()),
                    ContentBlock::ToolUse { id, name, input } => tool_calls.push(json!({
                        "id": id,
                        "type": "function",
                        "function": { "name": name, "arguments": input.to_string() }
                    })),
                    ContentBlock::ToolResult {
                        tool_use_id,
                        content,
                    } => {
                        let body = content
                            .iter()
                            .map(ToolResultContent::as_text)
                            .collect::<Vec<_>>()
                            .join("\n");
                        messages.push(json!({
                            "role": "tool",
                            "tool_call_id": tool_use_id,
                            "content": body,
                        }));
                    }
                    ContentBlock::Unsupported { kind } => {
                        warn!("skipping unsupported content block '{}' in request", kind);
                    }
                }
            }

            if text.is_empty() && tool_calls.is_empty() {
                continue;
            }

            let role = match message.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            let mut obj = json!({ "role": role });
            obj["content"] = if text.is_empty() {
                Value::Null
            } else {
                json!(text.join("\n"))
            };
            if !tool_calls.is_empty() {
                obj["tool_calls"] = json!(tool_calls);
            }
            messages.push(obj);
        }

        messages
    }

    fn build_request(&self, request: &ConverseRequest) -> Value {
        let model = if request.model.is_empty() {
            self.default_model.clone()
        } else {
            request.model.clone()
        };

        let mut body = json!({
            "model": model,
            "messages": self.build_messages(request),
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });

        if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": &t.name,
                            "description": &t.description,
                            "parameters": &t.input_schema
                        }
                    })
                })
                .collect();

            body["tools"] = json!(tools);
            body["tool_choice"] = json!("auto");
        }

        body
    }

    fn parse_response(&self, json: Value) -> Result<ConverseOutput> {
        let choice = json["choices"]
            .get(0)
            .ok_or(ProviderError::InvalidResponse)?;
        let message = &choice["message"];
        if !message.is_object() {
            return Err(ProviderError::InvalidResponse);
        }

        let mut content = Vec::new();
        if let Some(text) = message["content"].as_str() {
            if !text.is_empty() {
                content.push(ContentBlock::Text {
                    text: text.to_string(),
                });
            }
        }

        if let Some(calls) = message["tool_calls"].as_array() {
            for (index, call) in calls.iter().enumerate() {
                let function = &call["function"];
                let input = function["arguments"]
                    .as_str()
                    .map(|s| {
                        if s.trim().is_empty() {
                            json!({})
                        } else {
                            serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.to_string()))
                        }
                    })
                    .unwrap_or_else(|| function["arguments"].clone());

                let id = call["id"]
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("call_{}", index));

                content.push(ContentBlock::ToolUse {
                    id,
                    name: function["name"].as_str().unwrap_or("").to_string(),
                    input,
                });
            }
        }

        let finish_reason = choice["finish_reason"].as_str().unwrap_or("stop");
        let has_tool_calls = content
            .iter()
            .any(|b| matches!(b, ContentBlock::ToolUse { .. }));
        // Some endpoints report "stop" even when tool calls are present
        let stop_reason = if has_tool_calls {
            StopReason::ToolUse
        } else {
            StopReason::from_finish_reason(finish_reason)
        };

        let usage = if let Some(usage) = json["usage"].as_object() {
            Usage {
                prompt_tokens: usage
                    .get("prompt_tokens")
                    .and_then(Value::as_u64)
                    .unwrap_or(0) as u32,
                completion_tokens: usage
                    .get("completion_tokens")
                    .and_then(Value::as_u64)
                    .unwrap_or(0) as u32,
                total_tokens: usage
                    .get("total_tokens")
                    .and_then(Value::as_u64)
                    .unwrap_or(0) as u32,
            }
        } else {
            Usage::default()
        };

        Ok(ConverseOutput {
            stop_reason,
            message: ModelMessage {
                role: Role::Assistant,
                content,
            },
            usage,
        })
    }
}

#[async_trait]
impl Provider for OpenRouterProvider {
    async fn converse(&self, request: ConverseRequest) -> Result<ConverseOutput> {
        if self.api_key.is_empty() {
            return Err(ProviderError::NoApiKey);
        }

        trace!("◆ converse request to {}", self.api_base);

        let url = format!("{}/chat/completions", self.api_base);
        let body = self.build_request(&request);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ProviderError::RateLimited);
        }

        let json: Value = response.json().await?;

        if !status.is_success() {
            let error = json["error"]["message"]
                .as_str()
                .unwrap_or("unknown error")
                .to_string();
            return Err(ProviderError::Api(format!("{}: {}", status.as_u16(), error)));
        }

        let output = self.parse_response(json)?;
        log_output(&output);
        Ok(output)
    }

    fn default_model(&self) -> String {
        self.default_model.clone()
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}
