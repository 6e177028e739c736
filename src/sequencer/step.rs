//! 单帖步骤记录与继续/中止策略

use std::fmt;

use crate::core::StepError;

/// 单帖动作序列中的步骤
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Capture,
    Judge,
    Like,
    Compose,
    OpenBox,
    Inject,
    Activate,
    Send,
    Reset,
    Leave,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Capture => "capture",
            Step::Judge => "judge",
            Step::Like => "like",
            Step::Compose => "compose",
            Step::OpenBox => "open_box",
            Step::Inject => "inject",
            Step::Activate => "activate",
            Step::Send => "send",
            Step::Reset => "reset",
            Step::Leave => "leave",
        }
    }
}

/// 步骤结果
#[derive(Debug, Clone, PartialEq)]
pub enum StepStatus {
    Done,
    Failed(String),
    Skipped,
}

impl From<Result<(), StepError>> for StepStatus {
    fn from(r: Result<(), StepError>) -> Self {
        match r {
            Ok(()) => StepStatus::Done,
            Err(e) => StepStatus::Failed(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
    pub step: Step,
    pub status: StepStatus,
}

impl fmt::Display for StepRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            StepStatus::Done => write!(f, "{}=done", self.step.as_str()),
            StepStatus::Skipped => write!(f, "{}=skipped", self.step.as_str()),
            StepStatus::Failed(reason) => write!(f, "{}=failed({})", self.step.as_str(), reason),
        }
    }
}

/// 某步结束后，本帖剩余的反应步骤是否继续
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostAction {
    Continue,
    AbortPost,
}

/// 截图失败、评论框未能打开、文本注入全部失败时中止本帖剩余的反应步骤；
/// 其余失败只记录。复位与离开详情页不受中止影响。
pub fn post_policy(step: Step, status: &StepStatus) -> PostAction {
    match (step, status) {
        (Step::Capture | Step::OpenBox | Step::Inject, StepStatus::Failed(_)) => PostAction::AbortPost,
        _ => PostAction::Continue,
    }
}

/// 一个帖子的步骤日志
#[derive(Debug)]
pub(crate) struct StepLog {
    index: usize,
    records: Vec<StepRecord>,
}

impl StepLog {
    pub(crate) fn new(index: usize) -> Self {
        Self {
            index,
            records: Vec::new(),
        }
    }

    /// 记录一步并返回策略判定
    pub(crate) fn push(&mut self, step: Step, status: StepStatus) -> PostAction {
        match &status {
            StepStatus::Failed(reason) => {
                tracing::warn!(index = self.index, step = step.as_str(), reason = %reason, "step failed")
            }
            _ => tracing::debug!(index = self.index, step = step.as_str(), ?status, "step finished"),
        }
        let action = post_policy(step, &status);
        self.records.push(StepRecord { step, status });
        action
    }

    pub(crate) fn into_records(self) -> Vec<StepRecord> {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DeviceError;

    #[test]
    fn test_policy_aborts_only_on_gate_steps() {
        let failed = StepStatus::Failed("x".into());
        assert_eq!(post_policy(Step::Capture, &failed), PostAction::AbortPost);
        assert_eq!(post_policy(Step::OpenBox, &failed), PostAction::AbortPost);
        assert_eq!(post_policy(Step::Inject, &failed), PostAction::AbortPost);
        assert_eq!(post_policy(Step::Judge, &failed), PostAction::Continue);
        assert_eq!(post_policy(Step::Like, &failed), PostAction::Continue);
        assert_eq!(post_policy(Step::Send, &failed), PostAction::Continue);
        assert_eq!(post_policy(Step::Capture, &StepStatus::Done), PostAction::Continue);
    }

    #[test]
    fn test_status_from_result() {
        assert_eq!(StepStatus::from(Ok(())), StepStatus::Done);
        let err: Result<(), StepError> = Err(DeviceError::Timeout("tap".into()).into());
        assert_eq!(StepStatus::from(err), StepStatus::Failed("Command timeout: tap".into()));
    }

    #[test]
    fn test_record_display() {
        let r = StepRecord {
            step: Step::Send,
            status: StepStatus::Failed("enter: x".into()),
        };
        assert_eq!(r.to_string(), "send=failed(enter: x)");
    }
}
