//! 评论生成：检索上下文 + 文案模型 → 清洗后的短评论
//!
//! - **clean**: 推理块剥离与评论清洗
//! - **keyword**: 搜索关键词优化
//!
//! 生成永不向调用方报错：模型失败或清洗后为空都回退到配置的兜底文案。

pub mod clean;
pub mod keyword;

use std::pin::Pin;
use std::sync::Arc;

use futures_util::{stream, Stream, StreamExt};

pub use clean::{clean_comment, strip_think};
pub use keyword::optimize_keyword;

use crate::config::ComposerSection;
use crate::knowledge::{KnowledgeRetriever, RetrievedContext};
use crate::llm::{LlmClient, Message};
use crate::prompts::PromptSet;

/// 评论片段流（已处理错误：出错时以一个兜底片段结束）
pub type CommentStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// 评论生成器
pub struct CommentComposer {
    llm: Arc<dyn LlmClient>,
    retriever: KnowledgeRetriever,
    prompts: PromptSet,
    cfg: ComposerSection,
}

impl CommentComposer {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        retriever: KnowledgeRetriever,
        prompts: PromptSet,
        cfg: ComposerSection,
    ) -> Self {
        Self {
            llm,
            retriever,
            prompts,
            cfg,
        }
    }

    fn messages(&self, ctx: &RetrievedContext, template: &str, description: &str, keywords: &str) -> Vec<Message> {
        let system = self.prompts.comment_system.replace("{context}", &ctx.context_block);
        let user = template
            .replace("{description}", description)
            .replace("{keywords}", keywords);
        vec![Message::system(system), Message::user(user)]
    }

    /// 清洗并兜底：结果非空且不超过 max_chars
    pub fn finish(&self, raw: &str) -> String {
        let cleaned = clean_comment(raw, self.cfg.max_chars);
        if cleaned.is_empty() {
            self.cfg.fallback_comment.clone()
        } else {
            cleaned
        }
    }

    /// 生成一条评论，返回 (评论, 用到的检索片段)。
    /// 失败或为空时返回兜底文案与空片段列表
    pub async fn compose(&self, description: &str, keywords: &str) -> (String, Vec<String>) {
        let ctx = self.retriever.retrieve(keywords, self.retriever.top_k()).await;
        let messages = self.messages(&ctx, &self.prompts.comment_user, description, keywords);
        match self.llm.complete(&messages).await {
            Ok(raw) => {
                let cleaned = clean_comment(&raw, self.cfg.max_chars);
                if cleaned.is_empty() {
                    tracing::warn!("comment empty after cleaning, using fallback");
                    (self.cfg.fallback_comment.clone(), Vec::new())
                } else {
                    tracing::info!(comment = %cleaned, snippets = ctx.snippets.len(), "comment composed");
                    (cleaned, ctx.snippets)
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "comment generation failed, using fallback");
                (self.cfg.fallback_comment.clone(), Vec::new())
            }
        }
    }

    /// 流式生成：片段到达即产出；传输出错时产出一个兜底片段后结束。
    /// 调用方拼接后再经 `finish` / `clean_comment` 清洗
    pub async fn compose_stream(&self, description: &str, keywords: &str) -> CommentStream {
        let ctx = self.retriever.retrieve(keywords, self.retriever.top_k()).await;
        let messages = self.messages(&ctx, &self.prompts.comment_user_stream, description, keywords);
        let fallback = self.cfg.stream_fallback.clone();
        let inner = match self.llm.complete_stream(&messages).await {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "comment stream failed to start");
                return Box::pin(stream::once(async move { fallback }));
            }
        };
        Box::pin(stream::unfold(Some(inner), move |state| {
            let fallback = fallback.clone();
            async move {
                let Some(mut inner) = state else {
                    return None;
                };
                match inner.next().await {
                    Some(Ok(fragment)) => Some((fragment, Some(inner))),
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "comment stream interrupted");
                        Some((fallback, None))
                    }
                    None => None,
                }
            }
        }))
    }

    /// 用文案模型优化搜索词
    pub async fn optimize_keyword(&self, raw: &str) -> String {
        optimize_keyword(self.llm.as_ref(), &self.prompts.keyword, raw).await
    }
}
