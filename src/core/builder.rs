//! 组件装配：按配置创建设备、模型、检索与编排器
//!
//! 各组件只拿自己的配置段；测试可用 with_* 注入替身，未注入的按配置创建真实实现。

use std::sync::Arc;

use crate::composer::CommentComposer;
use crate::config::AppConfig;
use crate::core::Orchestrator;
use crate::decision::VisionJudge;
use crate::device::{AdbDevice, Device};
use crate::knowledge::{InMemoryIndex, KnowledgeRetriever, PineconeIndex, VectorIndex};
use crate::llm::{LlmClient, OpenAiClient};
use crate::prompts::PromptSet;
use crate::session::SessionManager;

/// 编排器构建器
pub struct PilotBuilder {
    config: AppConfig,
    device: Option<Arc<dyn Device>>,
    vision_llm: Option<Arc<dyn LlmClient>>,
    writer_llm: Option<Arc<dyn LlmClient>>,
    index: Option<Arc<dyn VectorIndex>>,
    prompts: Option<PromptSet>,
}

impl PilotBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            device: None,
            vision_llm: None,
            writer_llm: None,
            index: None,
            prompts: None,
        }
    }

    pub fn with_device(mut self, device: Arc<dyn Device>) -> Self {
        self.device = Some(device);
        self
    }

    pub fn with_vision_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.vision_llm = Some(llm);
        self
    }

    pub fn with_writer_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.writer_llm = Some(llm);
        self
    }

    pub fn with_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_prompts(mut self, prompts: PromptSet) -> Self {
        self.prompts = Some(prompts);
        self
    }

    /// 按 [retrieval].provider 选择检索后端：pinecone / memory / none
    fn build_index(&self) -> Option<Arc<dyn VectorIndex>> {
        if let Some(index) = &self.index {
            return Some(index.clone());
        }
        let cfg = &self.config.retrieval;
        match cfg.provider.to_lowercase().as_str() {
            "pinecone" => match PineconeIndex::from_config(cfg) {
                Some(idx) => {
                    tracing::info!(namespace = %cfg.namespace, "Using Pinecone retrieval");
                    Some(Arc::new(idx))
                }
                None => {
                    tracing::warn!("Pinecone index_host or api key missing, retrieval disabled");
                    None
                }
            },
            "memory" => {
                let idx = InMemoryIndex::new();
                if let Some(path) = &cfg.seed_file {
                    if let Err(e) = idx.load_file(&cfg.namespace, path) {
                        tracing::warn!(path = %path.display(), error = %e, "knowledge file not loaded");
                    }
                }
                tracing::info!(entries = idx.len(&cfg.namespace), "Using in-memory retrieval");
                Some(Arc::new(idx))
            }
            other => {
                tracing::info!(provider = %other, "retrieval disabled");
                None
            }
        }
    }

    fn build_retriever(&self) -> KnowledgeRetriever {
        match self.build_index() {
            Some(index) => KnowledgeRetriever::new(
                index,
                self.config.retrieval.namespace.clone(),
                self.config.retrieval.top_k,
            ),
            None => KnowledgeRetriever::disabled(),
        }
    }

    pub fn build(self) -> Orchestrator {
        let llm_cfg = &self.config.llm;
        let vision_llm = self.vision_llm.clone().unwrap_or_else(|| -> Arc<dyn LlmClient> {
            tracing::info!(model = %llm_cfg.vision_model, "Using OpenAI-compatible vision model");
            Arc::new(OpenAiClient::from_config(
                llm_cfg,
                &llm_cfg.vision_model,
                llm_cfg.vision_temperature,
            ))
        });
        let writer_llm = self.writer_llm.clone().unwrap_or_else(|| -> Arc<dyn LlmClient> {
            tracing::info!(model = %llm_cfg.writer_model, "Using OpenAI-compatible writer model");
            Arc::new(OpenAiClient::from_config(
                llm_cfg,
                &llm_cfg.writer_model,
                llm_cfg.writer_temperature,
            ))
        });
        let device: Arc<dyn Device> = match self.device.clone() {
            Some(d) => d,
            None => Arc::new(AdbDevice::new(&self.config.device)),
        };
        let prompts = self
            .prompts
            .clone()
            .unwrap_or_else(|| PromptSet::load(&self.config.prompts.dir));

        let retriever = self.build_retriever();
        let judge = VisionJudge::new(vision_llm.clone(), prompts.vision.clone(), prompts.feed.clone());
        let composer = CommentComposer::new(
            writer_llm.clone(),
            retriever,
            prompts,
            self.config.composer.clone(),
        );

        Orchestrator::new(
            self.config,
            SessionManager::new(device),
            vision_llm,
            writer_llm,
            judge,
            composer,
        )
    }
}
