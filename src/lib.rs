//! xhs-pilot - 小红书自动浏览 / 判断 / 互动编排器
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、组件装配、批量运行主循环
//! - **decision**: 视觉模型输出 → 规范化的点赞 / 评论判断
//! - **knowledge**: 产品知识检索（Pinecone / 本地内存索引）
//! - **composer**: 评论生成与清洗、搜索词优化
//! - **session**: 设备会话（连接、健康检查、一次修复）
//! - **sequencer**: 单帖动作序列与列表页导航
//! - **device**: 设备驱动抽象（adb / 记录型替身）
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **observability**: tracing 初始化与运行日志文件

pub mod composer;
pub mod config;
pub mod core;
pub mod decision;
pub mod device;
pub mod knowledge;
pub mod llm;
pub mod observability;
pub mod prompts;
pub mod sequencer;
pub mod session;
pub mod tokenizer;

pub use crate::core::{Orchestrator, PilotBuilder, RunSummary};
