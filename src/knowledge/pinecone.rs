//! Pinecone 记录检索（integrated embedding 索引）
//!
//! POST https://{index_host}/records/namespaces/{namespace}/search，
//! 请求体 `{"query": {"inputs": {"text": ...}, "top_k": k}, "fields": ["text"]}`。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::config::RetrievalSection;
use crate::knowledge::{Hit, VectorIndex};

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: SearchResult,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResult {
    #[serde(default)]
    hits: Vec<RawHit>,
}

#[derive(Debug, Deserialize)]
struct RawHit {
    #[serde(rename = "_id", default)]
    id: String,
    #[serde(rename = "_score", default)]
    score: f32,
    #[serde(default)]
    fields: serde_json::Map<String, serde_json::Value>,
}

impl From<RawHit> for Hit {
    fn from(h: RawHit) -> Self {
        let text = h
            .fields
            .get("text")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        Hit {
            id: h.id,
            score: h.score,
            text,
        }
    }
}

/// Pinecone 客户端
pub struct PineconeIndex {
    client: Client,
    base_url: String,
    api_key: String,
    api_version: String,
}

impl PineconeIndex {
    pub fn new(
        index_host: &str,
        api_key: impl Into<String>,
        api_version: impl Into<String>,
        timeout_secs: u64,
    ) -> Self {
        let host = index_host.trim().trim_end_matches('/');
        let base_url = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{}", host)
        };
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url,
            api_key: api_key.into(),
            api_version: api_version.into(),
        }
    }

    /// 从 [retrieval] 段创建；缺少 host 或 API Key 时返回 None
    pub fn from_config(cfg: &RetrievalSection) -> Option<Self> {
        let host = cfg.index_host.as_deref().filter(|h| !h.trim().is_empty())?;
        let key = cfg
            .api_key
            .clone()
            .or_else(|| std::env::var("PINECONE_API_KEY").ok())
            .filter(|k| !k.is_empty())?;
        Some(Self::new(host, key, cfg.api_version.clone(), cfg.timeout_secs))
    }

    fn search_url(&self, namespace: &str) -> String {
        format!("{}/records/namespaces/{}/search", self.base_url, namespace)
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn search(&self, namespace: &str, query: &str, top_k: usize) -> Result<Vec<Hit>, String> {
        let body = serde_json::json!({
            "query": {
                "inputs": { "text": query },
                "top_k": top_k,
            },
            "fields": ["text"],
        });
        let resp = self
            .client
            .post(self.search_url(namespace))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", &self.api_version)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(format!("HTTP {}: {}", status, text.trim()));
        }
        let parsed: SearchResponse = resp
            .json()
            .await
            .map_err(|e| format!("Invalid response: {}", e))?;
        Ok(parsed.result.hits.into_iter().map(Hit::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_response() {
        let raw = r#"{"result": {"hits": [
            {"_id": "p1", "_score": 0.82, "fields": {"text": "奶蓟草与肝脏代谢"}},
            {"_id": "p2", "_score": 0.61, "fields": {}}
        ]}, "usage": {"read_units": 6}}"#;
        let parsed: SearchResponse = serde_json::from_str(raw).unwrap();
        let hits: Vec<Hit> = parsed.result.hits.into_iter().map(Hit::from).collect();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "p1");
        assert_eq!(hits[0].text, "奶蓟草与肝脏代谢");
        assert_eq!(hits[1].text, "");
    }

    #[test]
    fn test_parse_empty_result() {
        let parsed: SearchResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(parsed.result.hits.is_empty());
    }

    #[test]
    fn test_search_url_normalizes_host() {
        let idx = PineconeIndex::new("lurky-abc.svc.pinecone.io/", "k", "2025-04", 5);
        assert_eq!(
            idx.search_url("lurky"),
            "https://lurky-abc.svc.pinecone.io/records/namespaces/lurky/search"
        );
    }

    #[test]
    fn test_from_config_requires_host() {
        let cfg = RetrievalSection {
            api_key: Some("k".into()),
            ..Default::default()
        };
        assert!(PineconeIndex::from_config(&cfg).is_none());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_error_not_panic() {
        let idx = PineconeIndex::new("http://127.0.0.1:9", "k", "2025-04", 2);
        assert!(idx.search("ns", "鱼油", 2).await.is_err());
    }
}
