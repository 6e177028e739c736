//! 错误类型
//!
//! 只有 SessionError::Fatal 会越过单帖边界终止整次运行；
//! DeviceError 在最小的步骤内被消化为 StepStatus::Failed。

use thiserror::Error;

/// 设备接口调用失败（截图、点击、按键、Shell 等）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    #[error("Device not connected")]
    NotConnected,

    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Command timeout: {0}")]
    Timeout(String),

    /// 当前模式不支持该操作（如未启用输入法时注入非 ASCII 文本）
    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for DeviceError {
    fn from(e: std::io::Error) -> Self {
        DeviceError::Io(e.to_string())
    }
}

/// 设备会话错误：修复后仍失败即为致命错误，由运行方决定退出
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("Device session for '{device}' could not be repaired: {reason}")]
    Fatal { device: String, reason: String },
}

/// 单帖动作序列中某一步的失败原因
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StepError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("Vision model failed: {0}")]
    Vision(String),

    /// 所有降级路径都失败，附带每条路径的原因
    #[error("All fallbacks failed: {}", .0.join("; "))]
    Exhausted(Vec<String>),
}

/// 一次批量运行的终止原因
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Run log I/O failed: {0}")]
    Log(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_lists_every_reason() {
        let e = StepError::Exhausted(vec!["enter: x".into(), "fixed_point: y".into()]);
        assert_eq!(e.to_string(), "All fallbacks failed: enter: x; fixed_point: y");
    }

    #[test]
    fn test_step_error_from_device() {
        let e: StepError = DeviceError::NotConnected.into();
        assert_eq!(e.to_string(), "Device not connected");
    }

    #[test]
    fn test_run_error_from_session() {
        let e: RunError = SessionError::Fatal {
            device: "d".into(),
            reason: "adb gone".into(),
        }
        .into();
        assert!(e.to_string().contains("adb gone"));
    }
}
