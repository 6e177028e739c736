//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 按脚本依次返回预置回复（文本 / 错误 / 中途断开的流），并记录收到的每次请求，
//! 便于断言 Prompt 拼装结果。脚本耗尽后返回错误。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::stream;

use crate::llm::{LlmClient, Message, TextStream};

/// 预置回复
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    Error(String),
    /// 流式：先输出 text 的片段，再返回错误
    BrokenStream(String, String),
}

/// Mock 客户端：按顺序消费预置回复
#[derive(Debug, Default)]
pub struct MockLlmClient {
    replies: Mutex<VecDeque<MockReply>>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(self, text: impl Into<String>) -> Self {
        self.push(MockReply::Text(text.into()));
        self
    }

    pub fn with_error(self, err: impl Into<String>) -> Self {
        self.push(MockReply::Error(err.into()));
        self
    }

    pub fn with_broken_stream(self, text: impl Into<String>, err: impl Into<String>) -> Self {
        self.push(MockReply::BrokenStream(text.into(), err.into()));
        self
    }

    pub fn push(&self, reply: MockReply) {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(reply);
    }

    pub fn push_text(&self, text: impl Into<String>) {
        self.push(MockReply::Text(text.into()));
    }

    /// 已收到的请求（按调用顺序）
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn next(&self, messages: &[Message]) -> MockReply {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(messages.to_vec());
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| MockReply::Error("mock: no scripted reply".to_string()))
    }
}

/// 按字符切成小片段，模拟逐 token 输出
fn fragments(text: &str) -> Vec<Result<String, String>> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(4)
        .map(|c| Ok(c.iter().collect::<String>()))
        .collect()
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        match self.next(messages) {
            MockReply::Text(t) => Ok(t),
            MockReply::Error(e) | MockReply::BrokenStream(_, e) => Err(e),
        }
    }

    async fn complete_stream(&self, messages: &[Message]) -> Result<TextStream, String> {
        match self.next(messages) {
            MockReply::Text(t) => Ok(Box::pin(stream::iter(fragments(&t)))),
            MockReply::Error(e) => Err(e),
            MockReply::BrokenStream(t, e) => {
                let mut items = fragments(&t);
                items.push(Err(e));
                Ok(Box::pin(stream::iter(items)))
            }
        }
    }
}
