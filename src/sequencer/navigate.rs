//! 列表页导航：启动 App 并搜索、截取列表页、打开宫格中的帖子、上滑翻页

use std::path::PathBuf;
use std::time::Duration;

use crate::core::{DeviceError, StepError};
use crate::device::Key;
use crate::sequencer::{pause, ActionSequencer};
use crate::tokenizer::contains_non_latin;

impl ActionSequencer {
    /// 冷启动 App，打开搜索框输入关键词并回车，再按配置点选帖子范围
    pub async fn start_app_and_search(&self, keyword: &str) -> Result<(), StepError> {
        let session = self.session();
        tracing::info!(package = %self.app_package, "starting app");
        session.app_start(&self.app_package).await?;
        pause(self.timing.after_app_start_ms).await;

        tracing::info!(keyword = %keyword, "searching");
        session.click(self.nav.search_open_point).await?;
        pause(self.timing.settle_ms).await;
        session.click(self.nav.search_input_point).await?;
        pause(self.timing.tap_ms).await;

        self.enter_search_text(keyword).await?;
        pause(self.timing.tap_ms).await;
        session.press_key(Key::Enter).await?;
        pause(self.timing.after_search_ms).await;

        for tap in &self.nav.filter_taps {
            session.click(*tap).await?;
            pause(self.timing.settle_ms).await;
        }
        tracing::info!("search ready");
        Ok(())
    }

    /// 非拉丁关键词先粘贴，失败再直接按键输入
    async fn enter_search_text(&self, keyword: &str) -> Result<(), StepError> {
        if contains_non_latin(keyword) {
            match self.paste(keyword).await {
                Ok(()) => return Ok(()),
                Err(e) => tracing::warn!(error = %e, "keyword paste failed, typing instead"),
            }
        }
        self.session().send_keys(keyword).await?;
        Ok(())
    }

    /// 截取列表页
    pub async fn capture_feed(&self) -> Result<PathBuf, DeviceError> {
        self.session().screenshot(&self.feed_screenshot).await
    }

    /// 点开宫格中第 choice 个帖子（1 起）；越界时取最后一格
    pub async fn open_feed_post(&self, choice: u32) -> Result<(), DeviceError> {
        let Some(last) = self.nav.grid_points.last() else {
            return Err(DeviceError::CommandFailed("no grid points configured".to_string()));
        };
        let point = (choice as usize)
            .checked_sub(1)
            .and_then(|i| self.nav.grid_points.get(i))
            .unwrap_or(last);
        tracing::info!(choice, "opening feed post");
        self.session().click(*point).await?;
        pause(self.timing.after_open_post_ms).await;
        Ok(())
    }

    /// 上滑翻到下一屏
    pub async fn next_page(&self) -> Result<(), DeviceError> {
        self.session()
            .swipe(
                self.nav.swipe_from,
                self.nav.swipe_to,
                Duration::from_millis(self.nav.swipe_duration_ms),
            )
            .await?;
        pause(self.timing.after_swipe_ms).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::composer::CommentComposer;
    use crate::config::{
        ComposerSection, DeviceSection, NavigationSection, SequencerSection, TimingSection,
    };
    use crate::decision::VisionJudge;
    use crate::device::{DeviceCall, DeviceOp, Key, RecordingDevice};
    use crate::knowledge::KnowledgeRetriever;
    use crate::llm::MockLlmClient;
    use crate::prompts::PromptSet;
    use crate::sequencer::ActionSequencer;
    use crate::session::SessionManager;

    async fn seq(dev: Arc<RecordingDevice>) -> ActionSequencer {
        let session = SessionManager::new(dev.clone()).open("t").await.unwrap();
        dev.clear_calls();
        let judge = Arc::new(VisionJudge::new(Arc::new(MockLlmClient::new()), "d", "f"));
        let composer = Arc::new(CommentComposer::new(
            Arc::new(MockLlmClient::new()),
            KnowledgeRetriever::disabled(),
            PromptSet::default(),
            ComposerSection::default(),
        ));
        ActionSequencer::new(session, judge, composer, SequencerSection::default())
            .with_timing(TimingSection::zero())
            .with_navigation(NavigationSection::default(), "com.example.app")
    }

    #[tokio::test]
    async fn test_search_cjk_keyword_pastes() {
        let dev = Arc::new(RecordingDevice::new(1000, 2000));
        let s = seq(dev.clone()).await;
        s.start_app_and_search("鱼油").await.unwrap();
        let calls = dev.calls();
        assert_eq!(calls[0], DeviceCall::AppStart("com.example.app".into()));
        assert_eq!(calls[1], DeviceCall::Click(920, 120));
        assert!(calls.contains(&DeviceCall::SetClipboard("鱼油".into())));
        assert!(calls.contains(&DeviceCall::PressKey(Key::Code(279))));
        assert!(calls.contains(&DeviceCall::PressKey(Key::Enter)));
        assert_eq!(dev.count(DeviceOp::SendKeys), 0);
        assert_eq!(calls.last(), Some(&DeviceCall::Click(59, 287)));
    }

    #[tokio::test]
    async fn test_default_package_comes_from_device_config() {
        let dev = Arc::new(RecordingDevice::new(1000, 2000));
        let session = SessionManager::new(dev.clone()).open("t").await.unwrap();
        dev.clear_calls();
        let judge = Arc::new(VisionJudge::new(Arc::new(MockLlmClient::new()), "d", "f"));
        let composer = Arc::new(CommentComposer::new(
            Arc::new(MockLlmClient::new()),
            KnowledgeRetriever::disabled(),
            PromptSet::default(),
            ComposerSection::default(),
        ));
        let s = ActionSequencer::new(session, judge, composer, SequencerSection::default())
            .with_timing(TimingSection::zero());
        s.start_app_and_search("omega3").await.unwrap();
        let package = DeviceSection::default().app_package;
        assert_eq!(dev.calls()[0], DeviceCall::AppStart(package));
    }

    #[tokio::test]
    async fn test_search_latin_keyword_types() {
        let dev = Arc::new(RecordingDevice::new(1000, 2000));
        let s = seq(dev.clone()).await;
        s.start_app_and_search("omega3").await.unwrap();
        assert!(dev.calls().contains(&DeviceCall::SendKeys("omega3".into())));
        assert_eq!(dev.count(DeviceOp::SetClipboard), 0);
    }

    #[tokio::test]
    async fn test_search_app_start_failure_propagates() {
        let dev = Arc::new(RecordingDevice::new(1000, 2000));
        dev.fail_always(DeviceOp::AppStart);
        let s = seq(dev.clone()).await;
        assert!(s.start_app_and_search("x").await.is_err());
        assert_eq!(dev.count(DeviceOp::Click), 0);
    }

    #[tokio::test]
    async fn test_open_feed_post_grid_mapping() {
        let dev = Arc::new(RecordingDevice::new(1000, 2000));
        let s = seq(dev.clone()).await;
        for choice in [1, 2, 3, 4, 0, 9] {
            s.open_feed_post(choice).await.unwrap();
        }
        assert_eq!(
            dev.calls(),
            vec![
                DeviceCall::Click(250, 800),
                DeviceCall::Click(750, 800),
                DeviceCall::Click(250, 1500),
                DeviceCall::Click(750, 1500),
                DeviceCall::Click(750, 1500),
                DeviceCall::Click(750, 1500),
            ]
        );
    }

    #[tokio::test]
    async fn test_next_page_swipes_up() {
        let dev = Arc::new(RecordingDevice::new(1000, 2000));
        let s = seq(dev.clone()).await;
        s.next_page().await.unwrap();
        assert_eq!(dev.calls(), vec![DeviceCall::Swipe((500, 1600), (500, 400))]);
    }
}
