//! 视觉判断：截图 + Prompt 送视觉模型，再交给 extract_decision

use std::path::Path;
use std::sync::Arc;

use crate::decision::{extract_decision, Decision};
use crate::llm::{image_data_url, LlmClient, Message};

/// 视觉判断器：持有视觉模型与两段 Prompt（详情页 / 列表页）
pub struct VisionJudge {
    llm: Arc<dyn LlmClient>,
    decide_prompt: String,
    feed_prompt: String,
}

impl VisionJudge {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        decide_prompt: impl Into<String>,
        feed_prompt: impl Into<String>,
    ) -> Self {
        Self {
            llm,
            decide_prompt: decide_prompt.into(),
            feed_prompt: feed_prompt.into(),
        }
    }

    async fn ask(&self, prompt: &str, image: &Path) -> Result<String, String> {
        let url = image_data_url(image).map_err(|e| format!("read {}: {}", image.display(), e))?;
        self.llm
            .complete(&[Message::user_with_image(prompt, url)])
            .await
    }

    /// 详情页：是否点赞 / 评论，以及描述与标签。
    /// 只有读图或模型调用本身失败时返回 Err；模型输出再乱也能得到 Decision
    pub async fn see_and_decide(&self, image: &Path) -> Result<Decision, String> {
        let raw = self.ask(&self.decide_prompt, image).await?;
        tracing::debug!(raw = %raw, "vision decision raw output");
        Ok(extract_decision(&raw))
    }

    /// 列表页：选出最相关的宫格位置；任何失败都回退到 1
    pub async fn choose_feed_post(&self, image: &Path) -> u32 {
        match self.ask(&self.feed_prompt, image).await {
            Ok(raw) => extract_decision(&raw).choice_index,
            Err(e) => {
                tracing::warn!(error = %e, "feed selection failed, defaulting to 1");
                1
            }
        }
    }
}
