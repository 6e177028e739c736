//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）；本地 Ollama 的 `/v1` 同样适用。
//! 视觉请求把图片作为 image_url 内容片段发送；流式请求逐块转发 delta 文本。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestMessageContentPartImageArgs,
    ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContentPart,
    CreateChatCompletionRequest, CreateChatCompletionRequestArgs, ImageUrlArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use futures_util::StreamExt;

use crate::config::LlmSection;
use crate::llm::{LlmClient, Message, Role, TextStream};

/// Token 使用统计（累计值）
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Arc<AtomicU64>,
    pub completion_tokens: Arc<AtomicU64>,
    pub total_tokens: Arc<AtomicU64>,
}

impl TokenUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
        self.total_tokens.fetch_add(prompt + completion, Ordering::Relaxed);
    }

    pub fn get(&self) -> (u64, u64, u64) {
        (
            self.prompt_tokens.load(Ordering::Relaxed),
            self.completion_tokens.load(Ordering::Relaxed),
            self.total_tokens.load(Ordering::Relaxed),
        )
    }
}

/// OpenAI 兼容客户端：持有 Client、model 名与采样温度
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
    request_timeout: Duration,
    stream_timeout: Duration,
    /// 累计 token 使用统计
    pub usage: TokenUsage,
}

impl OpenAiClient {
    pub fn new(base_url: Option<&str>, model: &str, api_key: Option<&str>) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());

        let config = if let Some(url) = base_url {
            OpenAIConfig::new().with_api_base(url).with_api_key(api_key)
        } else {
            OpenAIConfig::new().with_api_key(api_key)
        };

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
            temperature: 0.7,
            request_timeout: Duration::from_secs(60),
            stream_timeout: Duration::from_secs(120),
            usage: TokenUsage::new(),
        }
    }

    /// 从 [llm] 段创建；model 与 temperature 区分视觉 / 文案两种用途
    pub fn from_config(cfg: &LlmSection, model: &str, temperature: f32) -> Self {
        let mut client = Self::new(cfg.base_url.as_deref(), model, cfg.api_key.as_deref());
        client.temperature = temperature;
        client.request_timeout = Duration::from_secs(cfg.timeouts.request);
        client.stream_timeout = Duration::from_secs(cfg.timeouts.stream);
        client
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn to_openai_message(m: &Message) -> Result<ChatCompletionRequestMessage, String> {
        let msg = match m.role {
            Role::System => ChatCompletionRequestSystemMessageArgs::default()
                .content(m.content.clone())
                .build()
                .map_err(|e| e.to_string())?
                .into(),
            Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                .content(m.content.clone())
                .build()
                .map_err(|e| e.to_string())?
                .into(),
            Role::User => match &m.image_url {
                None => ChatCompletionRequestUserMessageArgs::default()
                    .content(m.content.clone())
                    .build()
                    .map_err(|e| e.to_string())?
                    .into(),
                Some(url) => {
                    let text: ChatCompletionRequestUserMessageContentPart =
                        ChatCompletionRequestMessageContentPartTextArgs::default()
                            .text(m.content.clone())
                            .build()
                            .map_err(|e| e.to_string())?
                            .into();
                    let image: ChatCompletionRequestUserMessageContentPart =
                        ChatCompletionRequestMessageContentPartImageArgs::default()
                            .image_url(
                                ImageUrlArgs::default()
                                    .url(url.clone())
                                    .build()
                                    .map_err(|e| e.to_string())?,
                            )
                            .build()
                            .map_err(|e| e.to_string())?
                            .into();
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(vec![text, image])
                        .build()
                        .map_err(|e| e.to_string())?
                        .into()
                }
            },
        };
        Ok(msg)
    }

    fn build_request(&self, messages: &[Message]) -> Result<CreateChatCompletionRequest, String> {
        let messages = messages
            .iter()
            .map(Self::to_openai_message)
            .collect::<Result<Vec<_>, _>>()?;
        CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .temperature(self.temperature)
            .messages(messages)
            .build()
            .map_err(|e| e.to_string())
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        let request = self.build_request(messages)?;

        let response = tokio::time::timeout(self.request_timeout, self.client.chat().create(request))
            .await
            .map_err(|_| format!("request timed out after {:?}", self.request_timeout))?
            .map_err(|e| e.to_string())?;

        // 提取 token 使用统计
        if let Some(usage) = &response.usage {
            self.usage
                .add(usage.prompt_tokens as u64, usage.completion_tokens as u64);
        }

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        Ok(content)
    }

    async fn complete_stream(&self, messages: &[Message]) -> Result<TextStream, String> {
        let mut request = self.build_request(messages)?;
        request.stream = Some(true);

        let stream = tokio::time::timeout(
            self.request_timeout,
            self.client.chat().create_stream(request),
        )
        .await
        .map_err(|_| format!("stream open timed out after {:?}", self.request_timeout))?
        .map_err(|e| e.to_string())?;

        let deadline = tokio::time::Instant::now() + self.stream_timeout;
        let fragments = stream
            .take_until(tokio::time::sleep_until(deadline))
            .map(|chunk| {
                chunk
                    .map(|resp| {
                        resp.choices
                            .iter()
                            .filter_map(|c| c.delta.content.clone())
                            .collect::<String>()
                    })
                    .map_err(|e| e.to_string())
            });
        Ok(Box::pin(fragments))
    }
}
