//! 知识检索：按图片标签查询向量库，拼出评论 Prompt 的上下文块
//!
//! 检索永不向调用方报错：无命中与服务不可用都返回各自的哨兵文本与空片段列表，
//! 调用方把它当作合法（降级）结果继续生成。片段顺序保持服务返回的顺序，不重排。

pub mod memory;
pub mod pinecone;

use std::sync::Arc;

use async_trait::async_trait;

pub use memory::InMemoryIndex;
pub use pinecone::PineconeIndex;

/// 无命中时的上下文块
pub const NO_CONTEXT: &str = "暂无具体产品关联信息。";
/// 检索服务失败时的上下文块
pub const RETRIEVAL_UNAVAILABLE: &str = "知识库连接失败，请进行通用回复。";

/// 一条检索命中
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub id: String,
    pub score: f32,
    pub text: String,
}

/// 向量库 trait：按命名空间做相似度检索，按相关度降序返回
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn search(&self, namespace: &str, query: &str, top_k: usize) -> Result<Vec<Hit>, String>;
}

/// 一次检索的结果：拼好的上下文块 + 原始片段（供运行日志追溯）
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedContext {
    pub context_block: String,
    pub snippets: Vec<String>,
}

impl RetrievedContext {
    fn sentinel(text: &str) -> Self {
        Self {
            context_block: text.to_string(),
            snippets: Vec::new(),
        }
    }

    fn from_snippets(snippets: Vec<String>) -> Self {
        if snippets.is_empty() {
            return Self::sentinel(NO_CONTEXT);
        }
        let context_block = snippets
            .iter()
            .enumerate()
            .map(|(i, s)| format!("[关联产品库信息 {}]: {}", i + 1, s))
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            context_block,
            snippets,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }
}

/// 检索器：持有可选的向量库（None 表示未启用检索）与命名空间
pub struct KnowledgeRetriever {
    index: Option<Arc<dyn VectorIndex>>,
    namespace: String,
    top_k: usize,
}

impl KnowledgeRetriever {
    pub fn new(index: Arc<dyn VectorIndex>, namespace: impl Into<String>, top_k: usize) -> Self {
        Self {
            index: Some(index),
            namespace: namespace.into(),
            top_k,
        }
    }

    /// 未配置检索服务：总是返回无命中哨兵
    pub fn disabled() -> Self {
        Self {
            index: None,
            namespace: String::new(),
            top_k: 0,
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// 检索最多 top_k 条；不会失败
    pub async fn retrieve(&self, keywords: &str, top_k: usize) -> RetrievedContext {
        let Some(index) = &self.index else {
            return RetrievedContext::sentinel(NO_CONTEXT);
        };
        match index.search(&self.namespace, keywords, top_k).await {
            Ok(hits) => {
                let snippets: Vec<String> = hits
                    .into_iter()
                    .take(top_k)
                    .map(|h| h.text)
                    .filter(|t| !t.trim().is_empty())
                    .collect();
                tracing::debug!(keywords = %keywords, hits = snippets.len(), "knowledge retrieved");
                RetrievedContext::from_snippets(snippets)
            }
            Err(e) => {
                tracing::warn!(error = %e, keywords = %keywords, "knowledge search failed");
                RetrievedContext::sentinel(RETRIEVAL_UNAVAILABLE)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedIndex(Result<Vec<Hit>, String>);

    #[async_trait]
    impl VectorIndex for FixedIndex {
        async fn search(&self, _ns: &str, _q: &str, _k: usize) -> Result<Vec<Hit>, String> {
            self.0.clone()
        }
    }

    fn hit(text: &str, score: f32) -> Hit {
        Hit {
            id: text.to_string(),
            score,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_zero_hits_returns_no_context_sentinel() {
        let r = KnowledgeRetriever::new(Arc::new(FixedIndex(Ok(vec![]))), "ns", 2);
        let ctx = r.retrieve("#鱼油", r.top_k()).await;
        assert_eq!(ctx.context_block, NO_CONTEXT);
        assert!(ctx.snippets.is_empty());
    }

    #[tokio::test]
    async fn test_service_error_returns_unavailable_sentinel() {
        let r = KnowledgeRetriever::new(Arc::new(FixedIndex(Err("503".into()))), "ns", 2);
        let ctx = r.retrieve("#鱼油", r.top_k()).await;
        assert_eq!(ctx.context_block, RETRIEVAL_UNAVAILABLE);
        assert!(ctx.snippets.is_empty());
    }

    #[tokio::test]
    async fn test_order_preserved_and_bounded_by_top_k() {
        let hits = vec![hit("低分在前", 0.1), hit("高分在后", 0.9), hit("第三条", 0.5)];
        let r = KnowledgeRetriever::new(Arc::new(FixedIndex(Ok(hits))), "ns", 2);
        let ctx = r.retrieve("x", r.top_k()).await;
        assert_eq!(ctx.snippets, vec!["低分在前".to_string(), "高分在后".to_string()]);
        assert_eq!(
            ctx.context_block,
            "[关联产品库信息 1]: 低分在前\n[关联产品库信息 2]: 高分在后"
        );
    }

    #[tokio::test]
    async fn test_disabled_retriever() {
        let ctx = KnowledgeRetriever::disabled().retrieve("x", 3).await;
        assert_eq!(ctx.context_block, NO_CONTEXT);
        assert!(ctx.is_empty());
    }
}
