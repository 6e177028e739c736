//! 决策层：视觉模型输出 → 规范化的 Decision
//!
//! - **extract**: 容错的逐字段抽取（纯函数）
//! - **vision**: 截图送视觉模型（详情页判断、列表页选帖）

pub mod extract;
pub mod vision;

use serde::{Deserialize, Serialize};

pub use extract::extract_decision;
pub use vision::VisionJudge;

/// image_desc 缺失时的占位
pub const DESC_UNAVAILABLE: &str = "无法解析描述";
/// image_kw 缺失时的占位
pub const NO_TAG: &str = "#无标签";

/// 单个帖子的规范化判断；所有字段总有值
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub should_like: bool,
    pub should_comment: bool,
    pub image_desc: String,
    /// 空格或 # 分隔的标签，作为检索查询
    pub image_kw: String,
    /// 2x2 宫格中的位置，从 1 开始
    pub choice_index: u32,
}

impl Default for Decision {
    fn default() -> Self {
        Self {
            should_like: false,
            should_comment: false,
            image_desc: DESC_UNAVAILABLE.to_string(),
            image_kw: NO_TAG.to_string(),
            choice_index: 1,
        }
    }
}
