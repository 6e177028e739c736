//! 模型输出清洗：去思考块、去引号句号、截断

use std::sync::OnceLock;

use regex::Regex;

static THINK_BLOCK: OnceLock<Regex> = OnceLock::new();

fn think_block() -> &'static Regex {
    THINK_BLOCK.get_or_init(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid regex"))
}

const STRIP_CHARS: [char; 8] = ['"', '\'', '“', '”', '‘', '’', '。', '`'];

/// 去掉 `<think>…</think>` 推理块。
/// 未闭合的 `<think>` 截掉其后全部内容；只有 `</think>` 的（模板隐式开头）取其后内容。
pub fn strip_think(raw: &str) -> String {
    let mut text = think_block().replace_all(raw, "").into_owned();
    if let Some(pos) = text.find("<think>") {
        text.truncate(pos);
    }
    if let Some(pos) = text.rfind("</think>") {
        text = text[pos + "</think>".len()..].to_string();
    }
    text
}

/// 清洗评论：去推理块、去引号与句号、trim、按字符截断到 max_chars。
/// 返回值可能为空，由调用方决定兜底。
pub fn clean_comment(raw: &str, max_chars: usize) -> String {
    let visible = strip_think(raw);
    let stripped: String = visible.chars().filter(|c| !STRIP_CHARS.contains(c)).collect();
    stripped.trim().chars().take(max_chars).collect::<String>().trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_think_block_removed() {
        assert_eq!(clean_comment("<think>先分析一下图片</think>\n这个颜色好温柔", 35), "这个颜色好温柔");
    }

    #[test]
    fn test_unclosed_think_dropped() {
        assert_eq!(clean_comment("好想试试<think>继续推理中", 35), "好想试试");
        assert_eq!(clean_comment("<think>只有思考", 35), "");
    }

    #[test]
    fn test_orphan_close_tag() {
        assert_eq!(clean_comment("推理内容</think>回复在这里", 35), "回复在这里");
    }

    #[test]
    fn test_quotes_and_periods_stripped() {
        assert_eq!(clean_comment("“真的很好看。”", 35), "真的很好看");
        assert_eq!(clean_comment("`'ok'` \"fine\"", 35), "ok fine");
    }

    #[test]
    fn test_truncated_by_chars() {
        let raw = "好".repeat(50);
        let out = clean_comment(&raw, 35);
        assert_eq!(out.chars().count(), 35);
    }

    #[test]
    fn test_multiple_think_blocks() {
        assert_eq!(strip_think("<think>a</think>x<think>b</think>y"), "xy");
    }
}
