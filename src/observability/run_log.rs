//! 运行日志：每次运行一个可读文本文件，逐帖追加结果
//!
//! 文件名 `{log_dir}/{YYYYmmdd_HHMMSS}_{关键词}.txt`，关键词中的 `\ / * ? : " < > |` 会被去掉。

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::sequencer::ReactionOutcome;

const RAG_PREVIEW_CHARS: usize = 30;

/// 去掉文件名中不允许的字符
pub fn sanitize_keyword(keyword: &str) -> String {
    keyword
        .chars()
        .filter(|c| !matches!(c, '\\' | '/' | '*' | '?' | ':' | '"' | '<' | '>' | '|'))
        .collect()
}

/// 检索片段摘要：`1. 前30字... | 2. ...`，无片段时为 `无关联产品`
pub fn format_snippets(snippets: &[String]) -> String {
    if snippets.is_empty() {
        return "无关联产品".to_string();
    }
    snippets
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let head: String = s.chars().take(RAG_PREVIEW_CHARS).collect();
            format!("{}. {}...", i + 1, head)
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

/// 追加写入的运行日志
pub struct RunLog {
    path: PathBuf,
    file: Box<dyn Write + Send>,
}

impl RunLog {
    /// 在 log_dir 下创建本次运行的日志文件并写入表头
    pub fn create(log_dir: &Path, keyword: &str) -> std::io::Result<Self> {
        std::fs::create_dir_all(log_dir)?;
        let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let path = log_dir.join(format!("{}_{}.txt", stamp, sanitize_keyword(keyword)));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        tracing::info!(path = %path.display(), "run log created");
        let mut log = Self {
            path,
            file: Box::new(file),
        };
        log.write_line(&format!("=== 任务启动: {} ===", stamp))?;
        log.write_line(&format!("=== 搜索关键词: {} ===\n", keyword))?;
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 写一行，前缀 `[HH:MM:SS]`
    pub fn write_line(&mut self, content: &str) -> std::io::Result<()> {
        let line = format!("[{}] {}", Local::now().format("%H:%M:%S"), content);
        writeln!(self.file, "{}", line)
    }

    /// 写一行；写入失败只告警，不中断运行
    pub fn note(&mut self, content: &str) {
        if let Err(e) = self.write_line(content) {
            tracing::warn!(path = %self.path.display(), error = %e, "run log write failed");
        }
    }

    /// 写入单帖结果块；失败只告警
    pub fn note_post(&mut self, outcome: &ReactionOutcome) {
        if let Err(e) = self.log_post_result(outcome) {
            tracing::warn!(path = %self.path.display(), index = outcome.index, error = %e, "run log write failed");
        }
    }

    #[cfg(test)]
    pub(crate) fn from_writer(path: PathBuf, writer: impl Write + Send + 'static) -> Self {
        Self {
            path,
            file: Box::new(writer),
        }
    }

    /// 写入单帖结果块
    pub fn log_post_result(&mut self, outcome: &ReactionOutcome) -> std::io::Result<()> {
        let (desc, kw, like, comm) = match &outcome.decision {
            Some(d) => (d.image_desc.as_str(), d.image_kw.as_str(), d.should_like, d.should_comment),
            None => ("分析失败", "", false, false),
        };
        let steps = outcome
            .steps
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        let block = format!(
            "\n----------------------------------------\n\
             🎬 [第 {} 个帖子]\n\
             👀 视觉描述: {}\n\
             🏷️ 关键词: {}\n\
             🧠 RAG匹配: {}\n\
             📊 决策结果: 点赞={} | 评论={}\n\
             💬 发送评论: {}\n\
             🧾 步骤: {}\n\
             ----------------------------------------\n",
            outcome.index,
            desc,
            kw,
            format_snippets(&outcome.snippets),
            like,
            comm,
            outcome.comment.as_deref().unwrap_or("无"),
            steps,
        );
        self.file.write_all(block.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::Decision;
    use crate::sequencer::{Step, StepRecord, StepStatus};

    #[test]
    fn test_sanitize_keyword() {
        assert_eq!(sanitize_keyword(r#"鱼油/护心:"好"?"#), "鱼油护心好");
    }

    #[test]
    fn test_format_snippets() {
        assert_eq!(format_snippets(&[]), "无关联产品");
        let long = "字".repeat(40);
        let out = format_snippets(&[long, "短".to_string()]);
        assert_eq!(out, format!("1. {}... | 2. 短...", "字".repeat(30)));
    }

    #[test]
    fn test_create_and_log_post() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = RunLog::create(&dir.path().join("log"), "鱼/油").unwrap();
        let name = log.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.ends_with("_鱼油.txt"));

        let outcome = ReactionOutcome {
            index: 2,
            decision: Some(Decision {
                should_like: true,
                should_comment: true,
                image_desc: "一杯咖啡".into(),
                image_kw: "#咖啡".into(),
                choice_index: 1,
            }),
            comment: Some("闻到香味了".into()),
            snippets: vec!["冷萃咖啡 低酸".into()],
            steps: vec![StepRecord {
                step: Step::Like,
                status: StepStatus::Done,
            }],
        };
        log.log_post_result(&outcome).unwrap();
        log.write_line("done").unwrap();

        let text = std::fs::read_to_string(log.path()).unwrap();
        assert!(text.contains("=== 搜索关键词: 鱼/油 ==="));
        assert!(text.contains("🎬 [第 2 个帖子]"));
        assert!(text.contains("🧠 RAG匹配: 1. 冷萃咖啡 低酸..."));
        assert!(text.contains("📊 决策结果: 点赞=true | 评论=true"));
        assert!(text.contains("💬 发送评论: 闻到香味了"));
        assert!(text.contains("🧾 步骤: like=done"));
        assert!(text.lines().last().unwrap().ends_with("] done"));
    }

    #[test]
    fn test_capture_failure_block() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = RunLog::create(dir.path(), "x").unwrap();
        let outcome = ReactionOutcome {
            index: 1,
            decision: None,
            comment: None,
            snippets: vec![],
            steps: vec![],
        };
        log.log_post_result(&outcome).unwrap();
        let text = std::fs::read_to_string(log.path()).unwrap();
        assert!(text.contains("👀 视觉描述: 分析失败"));
        assert!(text.contains("💬 发送评论: 无"));
        assert!(text.contains("🧠 RAG匹配: 无关联产品"));
    }

    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "no space left on device"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_note_swallows_write_errors() {
        let mut log = RunLog::from_writer(PathBuf::from("full.txt"), FullDisk);
        assert!(log.write_line("x").is_err());
        log.note("still running");
        log.note_post(&ReactionOutcome {
            index: 1,
            decision: None,
            comment: None,
            snippets: vec![],
            steps: vec![],
        });
    }
}
