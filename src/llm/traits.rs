//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Mock）实现 LlmClient：complete（阻塞式整段返回）、complete_stream（增量片段流）。
//! 流是有限的、不可重启的；调用方负责拼接片段。

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;

use crate::llm::Message;

/// 增量片段流
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, String>> + Send>>;

/// LLM 客户端 trait：非流式完成与流式完成（返回片段流）
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成
    async fn complete(&self, messages: &[Message]) -> Result<String, String>;

    /// 流式完成，返回片段流
    async fn complete_stream(&self, messages: &[Message]) -> Result<TextStream, String>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
