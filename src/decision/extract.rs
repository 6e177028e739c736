//! 决策抽取：从视觉模型的自由文本中逐字段恢复 Decision
//!
//! 模型输出不保证是合法 JSON（值内引号不配对、前后夹杂说明文字、思考过程、被截断），
//! 因此不做整体解析，而是每个字段独立用正则定位；任一字段失败只会落到该字段的默认值。

use std::sync::OnceLock;

use regex::Regex;

use crate::decision::{Decision, DESC_UNAVAILABLE, NO_TAG};

/// 锚定失败时的回退：从该 token 之后开始切片
const DESC_TOKEN: &str = r#""image_desc":"#;
/// 回退切片的终点（自 token 起算的字符数）
const DESC_SLICE_END: usize = 100;

fn like_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)"should_like"\s*:\s*(true|false)"#).expect("static regex"))
}

fn comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)"should_comment"\s*:\s*(true|false)"#).expect("static regex")
    })
}

fn desc_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)"image_desc"\s*:\s*"(.*?)"\s*,\s*"image_kw""#).expect("static regex")
    })
}

fn kw_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?s)"image_kw"\s*:\s*"(.*?)""#).expect("static regex"))
}

fn choice_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""choice_index"\s*:\s*(\d+)"#).expect("static regex"))
}

fn extract_bool(re: &Regex, text: &str) -> bool {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn extract_desc(text: &str) -> String {
    if let Some(m) = desc_re().captures(text).and_then(|c| c.get(1)) {
        return non_empty(m.as_str()).unwrap_or_else(|| DESC_UNAVAILABLE.to_string());
    }
    text.find(DESC_TOKEN)
        .and_then(|start| {
            let slice: String = text[start + DESC_TOKEN.len()..]
                .chars()
                .take(DESC_SLICE_END - DESC_TOKEN.chars().count())
                .collect();
            non_empty(slice.trim_start().trim_start_matches('"'))
        })
        .unwrap_or_else(|| DESC_UNAVAILABLE.to_string())
}

fn extract_kw(text: &str) -> String {
    kw_re()
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| non_empty(m.as_str()))
        .unwrap_or_else(|| NO_TAG.to_string())
}

fn extract_choice(text: &str) -> u32 {
    choice_re()
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(1)
}

/// 从任意模型输出中抽取 Decision；纯函数，不会失败
pub fn extract_decision(text: &str) -> Decision {
    let text = text.trim();
    Decision {
        should_like: extract_bool(like_re(), text),
        should_comment: extract_bool(comment_re(), text),
        image_desc: extract_desc(text),
        image_kw: extract_kw(text),
        choice_index: extract_choice(text),
    }
}
