//! 本地内存知识库：按分词重叠（Jaccard）检索，无需向量服务
//!
//! 适合离线调试与小规模产品库；知识文件按空行分段，每段一条记录。

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::knowledge::{Hit, VectorIndex};
use crate::tokenizer;

struct Entry {
    id: String,
    text: String,
    tokens: HashSet<String>,
}

/// 内存索引：namespace -> 记录列表
#[derive(Default)]
pub struct InMemoryIndex {
    namespaces: RwLock<HashMap<String, Vec<Entry>>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加一条记录；空文本忽略
    pub fn add(&self, namespace: &str, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let mut guard = self.namespaces.write().unwrap_or_else(|e| e.into_inner());
        let entries = guard.entry(namespace.to_string()).or_default();
        let id = format!("{}-{}", namespace, entries.len() + 1);
        entries.push(Entry {
            id,
            text: text.to_string(),
            tokens: tokenizer::tokenize_to_set(text),
        });
    }

    /// 从知识文件加载（空行分隔段落），返回加载条数
    pub fn load_file(&self, namespace: &str, path: &Path) -> std::io::Result<usize> {
        let content = std::fs::read_to_string(path)?;
        let mut added = 0;
        for para in split_paragraphs(&content) {
            self.add(namespace, &para);
            added += 1;
        }
        tracing::info!(path = %path.display(), namespace = %namespace, added, "knowledge file loaded");
        Ok(added)
    }

    pub fn len(&self, namespace: &str) -> usize {
        self.namespaces
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(namespace)
            .map(|v| v.len())
            .unwrap_or(0)
    }
}

fn split_paragraphs(content: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in content.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                out.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line.trim_end());
        }
    }
    if !current.is_empty() {
        out.push(current.join("\n"));
    }
    out
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn search(&self, namespace: &str, query: &str, top_k: usize) -> Result<Vec<Hit>, String> {
        let query_tokens = tokenizer::tokenize_to_set(query);
        if query_tokens.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        let guard = self.namespaces.read().unwrap_or_else(|e| e.into_inner());
        let Some(entries) = guard.get(namespace) else {
            return Ok(Vec::new());
        };
        let mut scored: Vec<(f32, &Entry)> = entries
            .iter()
            .map(|e| (tokenizer::jaccard_similarity(&query_tokens, &e.tokens), e))
            .filter(|(score, _)| *score > 0.0)
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(score, e)| Hit {
                id: e.id.clone(),
                score,
                text: e.text.clone(),
            })
            .collect())
    }
}
