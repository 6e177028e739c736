//! 搜索关键词优化：让文案模型把口语化的输入改写成 2~3 个检索词

use crate::composer::clean::strip_think;
use crate::llm::{LlmClient, Message};

/// 改写关键词；出错或输出为空时原样返回 raw
pub async fn optimize_keyword(llm: &dyn LlmClient, template: &str, raw: &str) -> String {
    let prompt = template.replace("{raw}", raw);
    match llm.complete(&[Message::user(prompt)]).await {
        Ok(out) => {
            let visible = strip_think(&out);
            let cleaned = visible
                .lines()
                .map(|l| l.trim_matches(|c: char| c.is_whitespace() || "\"'“”‘’`".contains(c)))
                .find(|l| !l.is_empty())
                .unwrap_or_default()
                .to_string();
            if cleaned.is_empty() {
                tracing::warn!(raw = %raw, "keyword optimization returned empty text");
                raw.to_string()
            } else {
                tracing::info!(raw = %raw, optimized = %cleaned, "keyword optimized");
                cleaned
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, raw = %raw, "keyword optimization failed");
            raw.to_string()
        }
    }
}
