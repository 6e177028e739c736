//! 动作序列：单个帖子的 截图 → 判断 → 点赞 → 评论 → 复位 → 返回
//!
//! - **step**: 步骤记录与继续/中止策略
//! - **navigate**: 启动 App、搜索、列表页选帖与翻页
//!
//! `process_post` 从不返回错误：每一步的失败都落在 StepRecord 里，由 `post_policy`
//! 决定是否跳过本帖剩余的反应步骤。打开过评论框就恰好复位一次，每帖最后按一次返回键。

pub mod navigate;
pub mod step;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub use step::{post_policy, PostAction, Step, StepRecord, StepStatus};

use crate::composer::CommentComposer;
use crate::config::{AppSection, DeviceSection, NavigationSection, SequencerSection, TimingSection};
use crate::core::StepError;
use crate::decision::{Decision, VisionJudge};
use crate::device::{Key, ScreenPoint, Selector};
use crate::session::Session;
use crate::tokenizer::contains_non_latin;
use step::StepLog;

/// 单帖结果
#[derive(Debug, Clone)]
pub struct ReactionOutcome {
    pub index: usize,
    /// 截图失败时为 None
    pub decision: Option<Decision>,
    /// 已发送的评论（未评论或发送失败时为 None）
    pub comment: Option<String>,
    /// 评论用到的检索片段
    pub snippets: Vec<String>,
    pub steps: Vec<StepRecord>,
}

impl ReactionOutcome {
    pub fn status_of(&self, step: Step) -> Option<&StepStatus> {
        self.steps.iter().find(|r| r.step == step).map(|r| &r.status)
    }

    pub fn liked(&self) -> bool {
        self.status_of(Step::Like) == Some(&StepStatus::Done)
    }

    pub fn sent(&self) -> bool {
        self.status_of(Step::Send) == Some(&StepStatus::Done)
    }
}

const COMMENT_FLOW: [Step; 4] = [Step::OpenBox, Step::Inject, Step::Activate, Step::Send];

pub(crate) async fn pause(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

/// 动作序列器：整个运行期间持有设备会话
pub struct ActionSequencer {
    session: Session,
    judge: Arc<VisionJudge>,
    composer: Arc<CommentComposer>,
    cfg: SequencerSection,
    nav: NavigationSection,
    timing: TimingSection,
    app_package: String,
    post_screenshot: PathBuf,
    feed_screenshot: PathBuf,
}

impl ActionSequencer {
    pub fn new(
        session: Session,
        judge: Arc<VisionJudge>,
        composer: Arc<CommentComposer>,
        cfg: SequencerSection,
    ) -> Self {
        let app = AppSection::default();
        Self {
            session,
            judge,
            composer,
            cfg,
            nav: NavigationSection::default(),
            timing: TimingSection::default(),
            app_package: DeviceSection::default().app_package,
            post_screenshot: app.post_screenshot,
            feed_screenshot: app.feed_screenshot,
        }
    }

    pub fn with_timing(mut self, timing: TimingSection) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_navigation(mut self, nav: NavigationSection, app_package: impl Into<String>) -> Self {
        self.nav = nav;
        self.app_package = app_package.into();
        self
    }

    pub fn with_screenshots(mut self, post: PathBuf, feed: PathBuf) -> Self {
        self.post_screenshot = post;
        self.feed_screenshot = feed;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// 处理当前详情页上的帖子
    pub async fn process_post(&self, index: usize) -> ReactionOutcome {
        tracing::info!(index, "processing post");
        let mut log = StepLog::new(index);

        let shot = match self.session.screenshot(&self.post_screenshot).await {
            Ok(path) => {
                log.push(Step::Capture, StepStatus::Done);
                path
            }
            Err(e) => {
                log.push(Step::Capture, StepStatus::Failed(e.to_string()));
                self.leave(&mut log).await;
                return ReactionOutcome {
                    index,
                    decision: None,
                    comment: None,
                    snippets: Vec::new(),
                    steps: log.into_records(),
                };
            }
        };

        let decision = match self.judge.see_and_decide(&shot).await {
            Ok(d) => {
                log.push(Step::Judge, StepStatus::Done);
                d
            }
            Err(e) => {
                log.push(Step::Judge, StepStatus::from(Err(StepError::Vision(e))));
                Decision::default()
            }
        };
        tracing::info!(
            index,
            like = decision.should_like,
            comment = decision.should_comment,
            kw = %decision.image_kw,
            "decision"
        );

        let like = decision.should_like || (self.cfg.like_on_comment && decision.should_comment);
        if like {
            let r = self.session.double_click(self.cfg.like_point).await;
            pause(self.timing.tap_ms).await;
            log.push(Step::Like, r.map_err(StepError::from).into());
        } else {
            log.push(Step::Like, StepStatus::Skipped);
        }

        let mut comment = None;
        let mut snippets = Vec::new();
        if decision.should_comment {
            let (text, used) = self
                .composer
                .compose(&decision.image_desc, &decision.image_kw)
                .await;
            log.push(Step::Compose, StepStatus::Done);
            let sent = self.comment_flow(&text, &mut log).await;
            self.reset(&mut log).await;
            if sent {
                comment = Some(text);
            } else {
                tracing::warn!(index, composed = %text, "comment not sent");
            }
            snippets = used;
        } else {
            log.push(Step::Compose, StepStatus::Skipped);
        }

        self.leave(&mut log).await;
        ReactionOutcome {
            index,
            decision: Some(decision),
            comment,
            snippets,
            steps: log.into_records(),
        }
    }

    /// 返回评论是否已发送
    async fn comment_flow(&self, text: &str, log: &mut StepLog) -> bool {
        let mut aborted = false;
        let mut sent = false;
        for step in COMMENT_FLOW {
            if aborted {
                log.push(step, StepStatus::Skipped);
                continue;
            }
            let result = match step {
                Step::OpenBox => self.open_comment_box().await,
                Step::Inject => self.inject_text(text).await,
                Step::Activate => self.activate_send().await,
                _ => self.send_comment().await,
            };
            if step == Step::Send {
                sent = result.is_ok();
            }
            if log.push(step, result.into()) == PostAction::AbortPost {
                aborted = true;
            }
        }
        sent
    }

    async fn open_comment_box(&self) -> Result<(), StepError> {
        for tap in &self.cfg.comment_open_taps {
            self.session.click(*tap).await?;
            pause(self.timing.settle_ms).await;
        }
        Ok(())
    }

    /// 文本注入：非拉丁文字先走剪贴板粘贴，再走输入法，最后直接按键注入
    async fn inject_text(&self, text: &str) -> Result<(), StepError> {
        let mut reasons = Vec::new();

        if contains_non_latin(text) {
            match self.paste(text).await {
                Ok(()) => return self.injected("clipboard").await,
                Err(e) => reasons.push(format!("clipboard: {}", e)),
            }
        }

        let via_ime = async {
            self.session.set_input_method_enabled(true).await?;
            self.session.send_keys(text).await
        };
        match via_ime.await {
            Ok(()) => return self.injected("ime").await,
            Err(e) => reasons.push(format!("ime: {}", e)),
        }

        if let Err(e) = self.session.set_input_method_enabled(false).await {
            tracing::debug!(error = %e, "disabling input method before direct keys failed");
        }
        match self.session.send_keys(text).await {
            Ok(()) => return self.injected("keys").await,
            Err(e) => reasons.push(format!("keys: {}", e)),
        }

        Err(StepError::Exhausted(reasons))
    }

    async fn injected(&self, path: &str) -> Result<(), StepError> {
        tracing::debug!(path, "comment text injected");
        pause(self.timing.tap_ms).await;
        Ok(())
    }

    pub(crate) async fn paste(&self, text: &str) -> Result<(), StepError> {
        self.session.set_clipboard(text).await?;
        self.session.press_key(Key::Code(self.cfg.paste_keycode)).await?;
        Ok(())
    }

    /// 空格 + 删除，让发送按钮进入可点击状态
    async fn activate_send(&self) -> Result<(), StepError> {
        for code in &self.cfg.activate_keycodes {
            self.session.shell(&format!("input keyevent {}", code)).await?;
            pause(self.timing.tap_ms).await;
        }
        Ok(())
    }

    /// 发送：先按回车，再依次尝试 发送按钮 → 输入框右侧偏移 → 固定坐标，第一个点中即止。
    /// 回车不算作发送成功，点击链总会执行
    async fn send_comment(&self) -> Result<(), StepError> {
        let mut reasons = Vec::new();

        if let Err(e) = self.session.press_key(Key::Enter).await {
            reasons.push(format!("enter: {}", e));
        }
        pause(self.timing.tap_ms).await;

        match self.click_element(&self.cfg.send_selector).await {
            Ok(true) => return self.sent("send_button").await,
            Ok(false) => reasons.push("send_button: not found".to_string()),
            Err(e) => reasons.push(format!("send_button: {}", e)),
        }

        match self.click_beside_input().await {
            Ok(true) => return self.sent("beside_input").await,
            Ok(false) => reasons.push("beside_input: input not found".to_string()),
            Err(e) => reasons.push(format!("beside_input: {}", e)),
        }

        match self.session.click(self.cfg.send_fallback_point).await {
            Ok(()) => return self.sent("fixed_point").await,
            Err(e) => reasons.push(format!("fixed_point: {}", e)),
        }

        Err(StepError::Exhausted(reasons))
    }

    async fn sent(&self, path: &str) -> Result<(), StepError> {
        tracing::info!(path, "comment sent");
        pause(self.timing.after_send_ms).await;
        Ok(())
    }

    async fn click_element(&self, selector: &Selector) -> Result<bool, StepError> {
        let Some(bounds) = self.session.find_element(selector).await? else {
            return Ok(false);
        };
        let (x, y) = bounds.center();
        self.session.click(ScreenPoint::pixels(x, y)).await?;
        Ok(true)
    }

    /// 输入框右边缘 + 偏移处点击，x 不超过 width - margin，y 限制在屏幕内
    async fn click_beside_input(&self) -> Result<bool, StepError> {
        let Some(bounds) = self.session.find_element(&self.cfg.input_selector).await? else {
            return Ok(false);
        };
        let (width, height) = self.session.window_size().await?;
        let x = (bounds.right + self.cfg.send_offset_px)
            .min(width - self.cfg.edge_margin_px)
            .max(0);
        let y = bounds.center().1.clamp(0, (height - 1).max(0));
        tracing::debug!(x, y, "clicking beside input box");
        self.session.click(ScreenPoint::pixels(x, y)).await?;
        Ok(true)
    }

    /// 关闭输入法、点空白处、返回；每一项失败都不影响后续项
    async fn reset(&self, log: &mut StepLog) {
        let mut reasons = Vec::new();
        if let Err(e) = self.session.set_input_method_enabled(false).await {
            reasons.push(format!("ime: {}", e));
        }
        if let Err(e) = self.session.click(self.cfg.neutral_point).await {
            reasons.push(format!("tap: {}", e));
        }
        pause(self.timing.tap_ms).await;
        if let Err(e) = self.session.press_key(Key::Back).await {
            reasons.push(format!("back: {}", e));
        }
        pause(self.timing.settle_ms).await;
        let status = if reasons.is_empty() {
            StepStatus::Done
        } else {
            StepStatus::Failed(reasons.join("; "))
        };
        log.push(Step::Reset, status);
    }

    /// 离开详情页
    async fn leave(&self, log: &mut StepLog) {
        let r = self.session.press_key(Key::Back).await;
        pause(self.timing.after_back_ms).await;
        log.push(Step::Leave, r.map_err(StepError::from).into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ComposerSection;
    use crate::device::{Bounds, DeviceCall, DeviceOp, RecordingDevice};
    use crate::knowledge::KnowledgeRetriever;
    use crate::llm::MockLlmClient;
    use crate::prompts::PromptSet;
    use crate::session::SessionManager;

    struct Rig {
        dev: Arc<RecordingDevice>,
        seq: ActionSequencer,
        _dir: tempfile::TempDir,
    }

    async fn rig(dev: RecordingDevice, vision: MockLlmClient, writer: MockLlmClient, cfg: SequencerSection) -> Rig {
        let dev = Arc::new(dev);
        let session = SessionManager::new(dev.clone()).open("test").await.unwrap();
        dev.clear_calls();
        let judge = Arc::new(VisionJudge::new(Arc::new(vision), "decide", "feed"));
        let composer = Arc::new(CommentComposer::new(
            Arc::new(writer),
            KnowledgeRetriever::disabled(),
            PromptSet::default(),
            ComposerSection::default(),
        ));
        let dir = tempfile::tempdir().unwrap();
        let seq = ActionSequencer::new(session, judge, composer, cfg)
            .with_timing(TimingSection::zero())
            .with_screenshots(dir.path().join("post.png"), dir.path().join("feed.png"));
        Rig { dev, seq, _dir: dir }
    }

    const LIKE_AND_COMMENT: &str = r##"{"should_like": true, "should_comment": true, "image_desc": "一碗热汤面", "image_kw": "#面食"}"##;

    fn backs(dev: &RecordingDevice) -> usize {
        dev.calls()
            .iter()
            .filter(|c| **c == DeviceCall::PressKey(Key::Back))
            .count()
    }

    fn ime_off(dev: &RecordingDevice) -> usize {
        dev.calls()
            .iter()
            .filter(|c| **c == DeviceCall::SetInputMethod(false))
            .count()
    }

    #[tokio::test]
    async fn test_capture_failure_presses_back_once() {
        let dev = RecordingDevice::new(1080, 2400);
        dev.fail_always(DeviceOp::Screenshot);
        let r = rig(dev, MockLlmClient::new(), MockLlmClient::new(), SequencerSection::default()).await;
        let out = r.seq.process_post(3).await;
        assert_eq!(out.index, 3);
        assert!(out.decision.is_none());
        assert!(out.comment.is_none());
        assert!(out.snippets.is_empty());
        assert_eq!(backs(&r.dev), 1);
        assert_eq!(r.dev.count(DeviceOp::Click), 0);
        assert!(matches!(out.status_of(Step::Capture), Some(StepStatus::Failed(_))));
    }

    #[tokio::test]
    async fn test_vision_failure_means_no_action() {
        let r = rig(
            RecordingDevice::new(1080, 2400),
            MockLlmClient::new().with_error("model offline"),
            MockLlmClient::new(),
            SequencerSection::default(),
        )
        .await;
        let out = r.seq.process_post(1).await;
        assert_eq!(out.decision, Some(Decision::default()));
        assert_eq!(r.dev.count(DeviceOp::DoubleClick), 0);
        assert_eq!(out.status_of(Step::Like), Some(&StepStatus::Skipped));
        assert_eq!(out.status_of(Step::Compose), Some(&StepStatus::Skipped));
        assert_eq!(backs(&r.dev), 1);
    }

    #[tokio::test]
    async fn test_like_and_comment_cjk_via_clipboard() {
        let r = rig(
            RecordingDevice::new(1000, 2000),
            MockLlmClient::new().with_reply(LIKE_AND_COMMENT),
            MockLlmClient::new().with_reply("看饿了，汤头好浓"),
            SequencerSection::default(),
        )
        .await;
        let out = r.seq.process_post(1).await;
        assert!(out.liked());
        assert!(out.sent());
        assert_eq!(out.comment.as_deref(), Some("看饿了，汤头好浓"));

        let calls = r.dev.calls();
        assert!(calls.contains(&DeviceCall::DoubleClick(500, 1000)));
        assert!(calls.contains(&DeviceCall::SetClipboard("看饿了，汤头好浓".into())));
        assert!(calls.contains(&DeviceCall::PressKey(Key::Code(279))));
        assert!(calls.contains(&DeviceCall::Shell("input keyevent 62".into())));
        assert!(calls.contains(&DeviceCall::Shell("input keyevent 67".into())));
        assert!(calls.contains(&DeviceCall::PressKey(Key::Enter)));
        assert_eq!(r.dev.count(DeviceOp::SendKeys), 0);
        assert_eq!(ime_off(&r.dev), 1);
        assert_eq!(backs(&r.dev), 2);
        assert_eq!(calls.last(), Some(&DeviceCall::PressKey(Key::Back)));
    }

    #[tokio::test]
    async fn test_clipboard_failure_falls_through_to_ime() {
        let dev = RecordingDevice::new(1080, 2400);
        dev.fail_always(DeviceOp::SetClipboard);
        let r = rig(
            dev,
            MockLlmClient::new().with_reply(LIKE_AND_COMMENT),
            MockLlmClient::new().with_reply("好香"),
            SequencerSection::default(),
        )
        .await;
        let out = r.seq.process_post(1).await;
        assert_eq!(out.status_of(Step::Inject), Some(&StepStatus::Done));
        let calls = r.dev.calls();
        assert!(calls.contains(&DeviceCall::SetInputMethod(true)));
        assert!(calls.contains(&DeviceCall::SendKeys("好香".into())));
    }

    #[tokio::test]
    async fn test_comment_without_like_by_default() {
        let r = rig(
            RecordingDevice::new(1080, 2400),
            MockLlmClient::new().with_reply(r#"{"should_like": false, "should_comment": true}"#),
            MockLlmClient::new().with_reply("nice"),
            SequencerSection::default(),
        )
        .await;
        let out = r.seq.process_post(1).await;
        assert!(!out.liked());
        assert_eq!(r.dev.count(DeviceOp::DoubleClick), 0);
        assert!(out.sent());
    }

    #[tokio::test]
    async fn test_like_on_comment_policy() {
        let cfg = SequencerSection {
            like_on_comment: true,
            ..Default::default()
        };
        let r = rig(
            RecordingDevice::new(1080, 2400),
            MockLlmClient::new().with_reply(r#"{"should_like": false, "should_comment": true}"#),
            MockLlmClient::new().with_reply("nice"),
            cfg,
        )
        .await;
        let out = r.seq.process_post(1).await;
        assert!(out.liked());
        assert_eq!(r.dev.count(DeviceOp::DoubleClick), 1);
    }

    #[tokio::test]
    async fn test_all_send_fallbacks_fail_reset_once() {
        let dev = RecordingDevice::new(1080, 2400);
        // 打开评论框的两次点击成功，之后的点击全部失败
        dev.fail_after(DeviceOp::Click, 2);
        dev.fail_times(DeviceOp::PressKey, 1);
        dev.fail_always(DeviceOp::FindElement);
        let r = rig(
            dev,
            MockLlmClient::new().with_reply(r#"{"should_comment": true}"#),
            MockLlmClient::new().with_reply("great shot"),
            SequencerSection::default(),
        )
        .await;
        let out = r.seq.process_post(1).await;

        match out.status_of(Step::Send) {
            Some(StepStatus::Failed(reason)) => {
                assert!(reason.contains("enter"));
                assert!(reason.contains("send_button"));
                assert!(reason.contains("beside_input"));
                assert!(reason.contains("fixed_point"));
            }
            other => panic!("unexpected send status: {:?}", other),
        }
        assert_eq!(out.steps.iter().filter(|s| s.step == Step::Reset).count(), 1);
        assert_eq!(ime_off(&r.dev), 1);
        assert_eq!(backs(&r.dev), 2);
    }

    #[tokio::test]
    async fn test_open_box_failure_skips_rest_but_resets() {
        let dev = RecordingDevice::new(1080, 2400);
        dev.fail_times(DeviceOp::Click, 1);
        let r = rig(
            dev,
            MockLlmClient::new().with_reply(r#"{"should_comment": true}"#),
            MockLlmClient::new().with_reply("great"),
            SequencerSection::default(),
        )
        .await;
        let out = r.seq.process_post(1).await;
        assert!(matches!(out.status_of(Step::OpenBox), Some(StepStatus::Failed(_))));
        assert_eq!(out.status_of(Step::Inject), Some(&StepStatus::Skipped));
        assert_eq!(out.status_of(Step::Send), Some(&StepStatus::Skipped));
        assert_eq!(r.dev.count(DeviceOp::SendKeys), 0);
        assert_eq!(out.status_of(Step::Reset), Some(&StepStatus::Done));
        assert!(out.comment.is_none());
        assert!(!out.sent());
    }

    #[tokio::test]
    async fn test_send_beside_input_clamped() {
        let input = Selector::class_name("android.widget.EditText");
        let dev = RecordingDevice::new(1080, 2400)
            .with_element(input, Bounds::new(40, 2200, 1040, 2300));
        dev.fail_times(DeviceOp::PressKey, 1);
        let r = rig(
            dev,
            MockLlmClient::new().with_reply(r#"{"should_comment": true}"#),
            MockLlmClient::new().with_reply("ok"),
            SequencerSection::default(),
        )
        .await;
        let out = r.seq.process_post(1).await;
        assert!(out.sent());
        // 1040 + 50 超出屏幕，收回到 1080 - 30
        assert!(r.dev.calls().contains(&DeviceCall::Click(1050, 2250)));
    }

    #[tokio::test]
    async fn test_send_button_element_preferred_over_offset() {
        let dev = RecordingDevice::new(1080, 2400)
            .with_element(Selector::text("发送"), Bounds::new(960, 2200, 1060, 2280));
        dev.fail_times(DeviceOp::PressKey, 1);
        let r = rig(
            dev,
            MockLlmClient::new().with_reply(r#"{"should_comment": true}"#),
            MockLlmClient::new().with_reply("ok"),
            SequencerSection::default(),
        )
        .await;
        r.seq.process_post(1).await;
        assert!(r.dev.calls().contains(&DeviceCall::Click(1010, 2240)));
    }

    #[tokio::test]
    async fn test_send_button_clicked_after_enter_succeeds() {
        let dev = RecordingDevice::new(1080, 2400)
            .with_element(Selector::text("发送"), Bounds::new(960, 2200, 1060, 2280));
        let r = rig(
            dev,
            MockLlmClient::new().with_reply(r#"{"should_comment": true}"#),
            MockLlmClient::new().with_reply("ok"),
            SequencerSection::default(),
        )
        .await;
        let out = r.seq.process_post(1).await;
        assert!(out.sent());
        assert_eq!(out.comment.as_deref(), Some("ok"));

        let calls = r.dev.calls();
        let enter = calls
            .iter()
            .position(|c| *c == DeviceCall::PressKey(Key::Enter))
            .unwrap();
        let button = calls
            .iter()
            .position(|c| *c == DeviceCall::Click(1010, 2240))
            .unwrap();
        assert!(enter < button);
        assert!(r.dev.count(DeviceOp::FindElement) >= 1);
    }

    #[tokio::test]
    async fn test_send_failure_leaves_comment_empty() {
        let dev = RecordingDevice::new(1080, 2400);
        dev.fail_after(DeviceOp::Click, 2);
        dev.fail_always(DeviceOp::FindElement);
        let r = rig(
            dev,
            MockLlmClient::new().with_reply(r#"{"should_comment": true}"#),
            MockLlmClient::new().with_reply("great shot"),
            SequencerSection::default(),
        )
        .await;
        let out = r.seq.process_post(1).await;
        // 回车成功但点击链全部失败，仍算发送失败
        assert!(matches!(out.status_of(Step::Send), Some(StepStatus::Failed(_))));
        assert!(out.comment.is_none());
        assert_eq!(out.status_of(Step::Compose), Some(&StepStatus::Done));
    }
}
