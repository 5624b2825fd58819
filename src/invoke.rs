use crate::models::ModelReply;
use anyhow::{Context, Result};
use async_openai::{Client, config::OpenAIConfig, types::CreateChatCompletionRequestArgs};
use async_trait::async_trait;
use std::time::Instant;

/// One fully rendered request to a model
#[derive(Debug, Clone)]
pub struct InvokeRequest {
    pub model_id: String,
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Seam between the execution loop and the model transport. The loop treats
/// every error from `invoke` as transient and retryable.
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    async fn invoke(&self, request: &InvokeRequest) -> Result<ModelReply>;
}

/// Production invoker backed by an OpenAI-compatible chat-completions API
#[derive(Debug)]
pub struct OpenAiInvoker {
    client: Client<OpenAIConfig>,
}

impl OpenAiInvoker {
    /// Create an invoker reading the API key from the named environment variable
    pub fn new(api_endpoint: &str, env_var_api_key: &str) -> Result<Self> {
        let api_key = std::env::var(env_var_api_key)
            .with_context(|| format!("Environment variable {} not found", env_var_api_key))?;
        Ok(Self::with_api_key(api_endpoint, &api_key))
    }

    /// Create an invoker with an explicit key
    pub fn with_api_key(api_endpoint: &str, api_key: &str) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_endpoint);

        Self {
            client: Client::with_config(openai_config),
        }
    }

    /// Build the chat completion request
    fn build_request(
        &self,
        request: &InvokeRequest,
    ) -> Result<async_openai::types::CreateChatCompletionRequest> {
        let mut messages: Vec<async_openai::types::ChatCompletionRequestMessage> = Vec::new();

        if let Some(system_prompt) = &request.system_prompt {
            let system_message =
                async_openai::types::ChatCompletionRequestSystemMessageArgs::default()
                    .content(system_prompt.clone())
                    .build()
                    .context("Failed to build system message")?
                    .into();
            messages.push(system_message);
        }

        let user_message = async_openai::types::ChatCompletionRequestUserMessageArgs::default()
            .content(request.prompt.clone())
            .build()
            .context("Failed to build user message")?
            .into();
        messages.push(user_message);

        CreateChatCompletionRequestArgs::default()
            .model(&request.model_id)
            .messages(messages)
            .temperature(request.temperature)
            .max_tokens(request.max_tokens)
            .build()
            .context("Failed to build chat completion request")
    }
}

#[async_trait]
impl ModelInvoker for OpenAiInvoker {
    async fn invoke(&self, request: &InvokeRequest) -> Result<ModelReply> {
        let chat_request = self.build_request(request)?;

        let started = Instant::now();
        let response = self
            .client
            .chat()
            .create(chat_request)
            .await
            .context("Model invocation failed")?;
        let latency_ms = started.elapsed().as_millis() as u64;

        let text = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .unwrap_or_default();

        let (input_tokens, output_tokens, total_tokens) = match response.usage {
            Some(usage) => (
                usage.prompt_tokens,
                usage.completion_tokens,
                usage.total_tokens,
            ),
            None => (0, 0, 0),
        };

        Ok(ModelReply {
            text,
            input_tokens,
            output_tokens,
            total_tokens,
            latency_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> InvokeRequest {
        InvokeRequest {
            model_id: "gpt-test".to_string(),
            prompt: "Qual é a resposta?".to_string(),
            system_prompt: Some("Você é um avaliador.".to_string()),
            temperature: 0.0,
            max_tokens: 22,
        }
    }

    #[test]
    fn test_new_missing_env_var() {
        unsafe {
            std::env::remove_var("EXAM_BENCH_MISSING_KEY");
        }

        let result = OpenAiInvoker::new("https://api.openai.com/v1", "EXAM_BENCH_MISSING_KEY");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("not found"));
    }

    #[test]
    fn test_build_request_without_system_prompt() {
        let invoker = OpenAiInvoker::with_api_key("https://api.openai.com/v1", "test-key");
        let mut request = sample_request();
        request.system_prompt = None;

        let chat_request = invoker.build_request(&request).unwrap();
        assert_eq!(chat_request.messages.len(), 1);
        assert_eq!(chat_request.model, "gpt-test");
    }

    #[test]
    fn test_build_request_with_system_prompt() {
        let invoker = OpenAiInvoker::with_api_key("https://api.openai.com/v1", "test-key");
        let chat_request = invoker.build_request(&sample_request()).unwrap();
        assert_eq!(chat_request.messages.len(), 2);
        assert_eq!(chat_request.max_tokens, Some(22));
    }

    #[tokio::test]
    async fn test_invoke_against_mock_server() {
        let mut server = mockito::Server::new_async().await;

        let body = r#"{
            "id": "chatcmpl-test",
            "object": "chat.completion",
            "created": 1700000000,
            "model": "gpt-test",
            "choices": [
                {
                    "index": 0,
                    "message": {"role": "assistant", "content": "<resposta>A</resposta>"},
                    "finish_reason": "stop",
                    "logprobs": null
                }
            ],
            "usage": {"prompt_tokens": 120, "completion_tokens": 7, "total_tokens": 127}
        }"#;

        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await;

        let invoker = OpenAiInvoker::with_api_key(&server.url(), "test-key");
        let reply = invoker.invoke(&sample_request()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(reply.text, "<resposta>A</resposta>");
        assert_eq!(reply.input_tokens, 120);
        assert_eq!(reply.output_tokens, 7);
        assert_eq!(reply.total_tokens, 127);
    }

    #[tokio::test]
    async fn test_invoke_server_error_is_an_error() {
        let mut server = mockito::Server::new_async().await;

        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error": {"message": "rate limited", "type": "rate_limit_error"}}"#)
            .create_async()
            .await;

        let invoker = OpenAiInvoker::with_api_key(&server.url(), "test-key");
        let result = invoker.invoke(&sample_request()).await;
        assert!(result.is_err());
    }
}
