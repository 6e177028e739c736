//! 分词与文字脚本判断
//!
//! 中英文混合分词供本地知识库检索；脚本判断供文本注入选择路径（非拉丁文字走剪贴板）。
//! 使用 jieba-rs 进行中文分词，英文按空格分词；标签前缀 `#` 会被剥掉。

use std::collections::HashSet;
use std::sync::OnceLock;

use jieba_rs::Jieba;

/// 全局 Jieba 实例（延迟初始化）
static JIEBA: OnceLock<Jieba> = OnceLock::new();

fn get_jieba() -> &'static Jieba {
    JIEBA.get_or_init(Jieba::new)
}

/// 判断字符是否为 CJK（中日韩）字符
fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}' |   // CJK Unified Ideographs
        '\u{3400}'..='\u{4DBF}' |   // CJK Unified Ideographs Extension A
        '\u{F900}'..='\u{FAFF}' |   // CJK Compatibility Ideographs
        '\u{3000}'..='\u{303F}' |   // CJK Symbols and Punctuation
        '\u{3040}'..='\u{309F}' |   // Hiragana
        '\u{30A0}'..='\u{30FF}' |   // Katakana
        '\u{AC00}'..='\u{D7AF}'     // Hangul Syllables
    )
}

/// 判断文本是否包含 CJK 字符
pub fn contains_cjk(text: &str) -> bool {
    text.chars().any(is_cjk)
}

/// 判断文本是否含有非拉丁文字（CJK、西里尔、阿拉伯等；Latin Extended-B 之后的字母）
pub fn contains_non_latin(text: &str) -> bool {
    text.chars()
        .any(|c| is_cjk(c) || (c.is_alphabetic() && c > '\u{024F}'))
}

/// 智能分词：根据文本内容自动选择分词策略
/// - 包含 CJK 字符时使用 jieba 分词
/// - 纯英文时使用空格分词
pub fn tokenize(text: &str) -> Vec<String> {
    let cleaned = text.replace('#', " ");
    let text = cleaned.trim();
    if text.is_empty() {
        return Vec::new();
    }

    if contains_cjk(text) {
        // 搜索引擎模式，更细粒度
        get_jieba()
            .cut_for_search(text, true)
            .into_iter()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| s.chars().count() > 1 || s.chars().next().map(is_cjk).unwrap_or(false))
            .collect()
    } else {
        text.split_whitespace()
            .map(|s| s.to_lowercase())
            .filter(|s| s.len() > 1)
            .collect()
    }
}

/// 分词并返回词集合（用于相似度计算）
pub fn tokenize_to_set(text: &str) -> HashSet<String> {
    tokenize(text).into_iter().collect()
}

/// 计算两个词集合的相似度（Jaccard 相似度）
pub fn jaccard_similarity(set1: &HashSet<String>, set2: &HashSet<String>) -> f32 {
    if set1.is_empty() || set2.is_empty() {
        return 0.0;
    }
    let intersection = set1.intersection(set2).count() as f32;
    let union = set1.union(set2).count() as f32;
    intersection / union
}
