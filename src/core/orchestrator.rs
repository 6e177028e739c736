//! 批量运行主循环
//!
//! 打开设备会话 → 启动 App 并搜索 → 每个帖子：列表页截图 → 选帖 → 点开 → 处理 → 写日志 → 上滑。
//! 单帖内的任何失败只影响该帖；只有会话修复失败（SessionError::Fatal）会终止运行。

use std::sync::Arc;

use uuid::Uuid;

use crate::composer::CommentComposer;
use crate::config::AppConfig;
use crate::core::RunError;
use crate::decision::VisionJudge;
use crate::llm::LlmClient;
use crate::observability::RunLog;
use crate::sequencer::{ActionSequencer, ReactionOutcome};
use crate::session::SessionManager;

/// 一次运行的汇总
#[derive(Debug, Default)]
pub struct RunSummary {
    /// 实际执行了单帖处理的结果（按顺序）
    pub outcomes: Vec<ReactionOutcome>,
    /// 未能进入详情页而跳过的轮次
    pub skipped: usize,
}

impl RunSummary {
    pub fn liked(&self) -> usize {
        self.outcomes.iter().filter(|o| o.liked()).count()
    }

    pub fn commented(&self) -> usize {
        self.outcomes.iter().filter(|o| o.sent()).count()
    }
}

/// 编排器：持有会话管理器与两个模型组件
pub struct Orchestrator {
    config: AppConfig,
    sessions: SessionManager,
    judge: Arc<VisionJudge>,
    composer: Arc<CommentComposer>,
    vision_llm: Arc<dyn LlmClient>,
    writer_llm: Arc<dyn LlmClient>,
}

impl Orchestrator {
    pub fn new(
        config: AppConfig,
        sessions: SessionManager,
        vision_llm: Arc<dyn LlmClient>,
        writer_llm: Arc<dyn LlmClient>,
        judge: VisionJudge,
        composer: CommentComposer,
    ) -> Self {
        Self {
            config,
            sessions,
            judge: Arc::new(judge),
            composer: Arc::new(composer),
            vision_llm,
            writer_llm,
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// 搜索 keyword 并依次处理 count 个帖子
    pub async fn run(&mut self, keyword: &str, count: usize) -> Result<RunSummary, RunError> {
        let keyword = if self.config.run.optimize_keyword {
            self.composer.optimize_keyword(keyword).await
        } else {
            keyword.to_string()
        };
        let mut log = RunLog::create(&self.config.app.log_dir, &keyword)?;
        self.run_with_log(&keyword, count, &mut log).await
    }

    /// 日志文件建好之后的运行主体；日志写入失败只告警
    async fn run_with_log(
        &mut self,
        keyword: &str,
        count: usize,
        log: &mut RunLog,
    ) -> Result<RunSummary, RunError> {
        let run_id = Uuid::new_v4();
        tracing::info!(%run_id, keyword = %keyword, count, "run started");

        let serial = self.config.device.serial.clone();
        let session = match self.sessions.open(&serial).await {
            Ok(s) => s,
            Err(e) => {
                log.note(&format!("❌ 连接失败: {}", e));
                return Err(e.into());
            }
        };
        if let Ok((w, h)) = session.window_size().await {
            log.note(&format!("📱 设备分辨率: {}x{}", w, h));
        }

        let seq = ActionSequencer::new(
            session,
            self.judge.clone(),
            self.composer.clone(),
            self.config.sequencer.clone(),
        )
        .with_timing(self.config.timing.clone())
        .with_navigation(self.config.navigation.clone(), self.config.device.app_package.clone())
        .with_screenshots(
            self.config.app.post_screenshot.clone(),
            self.config.app.feed_screenshot.clone(),
        );

        log.note(&format!("🔍 执行搜索: {}", keyword));
        match seq.start_app_and_search(keyword).await {
            Ok(()) => log.note("✅ 搜索完成"),
            Err(e) => {
                tracing::warn!(error = %e, "app start or search failed, continuing on current screen");
                log.note(&format!("⚠️ 搜索未完成: {}", e));
            }
        }

        let mut summary = RunSummary::default();
        for index in 1..=count {
            log.note(&format!("\n🔄 [流程进度 {}/{}] 正在列表页选贴...", index, count));

            if self.open_next(&seq, log).await {
                let outcome = seq.process_post(index).await;
                log.note_post(&outcome);
                summary.outcomes.push(outcome);
            } else {
                summary.skipped += 1;
            }

            if index < count {
                log.note("📉 下滑查看更多帖子...");
                if let Err(e) = seq.next_page().await {
                    tracing::warn!(index, error = %e, "swipe failed");
                    log.note(&format!("⚠️ 下滑失败: {}", e));
                }
            }
        }

        let (vp, vc, vt) = self.vision_llm.token_usage();
        let (wp, wc, wt) = self.writer_llm.token_usage();
        tracing::info!(
            %run_id,
            processed = summary.outcomes.len(),
            skipped = summary.skipped,
            liked = summary.liked(),
            commented = summary.commented(),
            vision_tokens = vt,
            writer_tokens = wt,
            "run finished"
        );
        log.note(&format!(
            "🛑 任务全部完成！处理 {} 个，跳过 {} 个；token 视觉 {}/{}，文案 {}/{}",
            summary.outcomes.len(),
            summary.skipped,
            vp,
            vc,
            wp,
            wc
        ));
        Ok(summary)
    }

    /// 列表页截图、选帖、点开；返回是否已进入详情页
    async fn open_next(&self, seq: &ActionSequencer, log: &mut RunLog) -> bool {
        let feed = match seq.capture_feed().await {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "feed capture failed, skipping");
                log.note(&format!("❌ 列表页截图失败: {}", e));
                return false;
            }
        };
        let choice = self.judge.choose_feed_post(&feed).await;
        log.note(&format!("🎯 AI 选择了位置: {}", choice));
        if let Err(e) = seq.open_feed_post(choice).await {
            tracing::warn!(choice, error = %e, "opening feed post failed, skipping");
            log.note(&format!("❌ 打开帖子失败: {}", e));
            return false;
        }
        true
    }
}
