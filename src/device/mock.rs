//! 记录型设备替身（用于测试，无需真机）
//!
//! 记录每一次调用（坐标已换算为像素），可按操作类型注入失败、预置可查找的元素。

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::device::{Bounds, Device, DeviceError, Key, ScreenPoint, Selector};

/// 操作类型（用于注入失败与计数）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceOp {
    Connect,
    Probe,
    Repair,
    Screenshot,
    Click,
    DoubleClick,
    Swipe,
    SendKeys,
    SetClipboard,
    SetInputMethod,
    PressKey,
    Shell,
    FindElement,
    WindowSize,
    AppStart,
}

/// 一次已记录的调用
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    Connect(String),
    Probe,
    Repair,
    Screenshot(PathBuf),
    Click(i32, i32),
    DoubleClick(i32, i32),
    Swipe((i32, i32), (i32, i32)),
    SendKeys(String),
    SetClipboard(String),
    SetInputMethod(bool),
    PressKey(Key),
    Shell(String),
    FindElement(Selector),
    WindowSize,
    AppStart(String),
}

impl DeviceCall {
    pub fn op(&self) -> DeviceOp {
        match self {
            DeviceCall::Connect(_) => DeviceOp::Connect,
            DeviceCall::Probe => DeviceOp::Probe,
            DeviceCall::Repair => DeviceOp::Repair,
            DeviceCall::Screenshot(_) => DeviceOp::Screenshot,
            DeviceCall::Click(..) => DeviceOp::Click,
            DeviceCall::DoubleClick(..) => DeviceOp::DoubleClick,
            DeviceCall::Swipe(..) => DeviceOp::Swipe,
            DeviceCall::SendKeys(_) => DeviceOp::SendKeys,
            DeviceCall::SetClipboard(_) => DeviceOp::SetClipboard,
            DeviceCall::SetInputMethod(_) => DeviceOp::SetInputMethod,
            DeviceCall::PressKey(_) => DeviceOp::PressKey,
            DeviceCall::Shell(_) => DeviceOp::Shell,
            DeviceCall::FindElement(_) => DeviceOp::FindElement,
            DeviceCall::WindowSize => DeviceOp::WindowSize,
            DeviceCall::AppStart(_) => DeviceOp::AppStart,
        }
    }
}

#[derive(Debug, Clone)]
enum Failure {
    Always,
    Times(usize),
    After(usize),
    /// 该类操作的第 n 次调用失败（1 起，按已记录的调用计数）
    Nth(Vec<usize>),
}

/// 记录型设备：所有操作默认成功
pub struct RecordingDevice {
    size: (i32, i32),
    calls: Mutex<Vec<DeviceCall>>,
    failures: Mutex<HashMap<DeviceOp, Failure>>,
    elements: Mutex<Vec<(Selector, Bounds)>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl RecordingDevice {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            size: (width, height),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            elements: Mutex::new(Vec::new()),
        }
    }

    /// 该类操作此后一律失败
    pub fn fail_always(&self, op: DeviceOp) {
        lock(&self.failures).insert(op, Failure::Always);
    }

    /// 该类操作接下来 n 次失败，之后恢复
    pub fn fail_times(&self, op: DeviceOp, n: usize) {
        lock(&self.failures).insert(op, Failure::Times(n));
    }

    /// 该类操作再成功 n 次，之后一律失败
    pub fn fail_after(&self, op: DeviceOp, n: usize) {
        lock(&self.failures).insert(op, Failure::After(n));
    }

    /// 该类操作的第 n 次调用失败（1 起），其余成功
    pub fn fail_on(&self, op: DeviceOp, nth: &[usize]) {
        lock(&self.failures).insert(op, Failure::Nth(nth.to_vec()));
    }

    pub fn clear_failures(&self) {
        lock(&self.failures).clear();
    }

    /// 预置一个可被 find_element 找到的元素
    pub fn with_element(self, selector: Selector, bounds: Bounds) -> Self {
        lock(&self.elements).push((selector, bounds));
        self
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        lock(&self.calls).clone()
    }

    pub fn count(&self, op: DeviceOp) -> usize {
        lock(&self.calls).iter().filter(|c| c.op() == op).count()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    /// 记录调用并按失败计划决定结果
    fn record(&self, call: DeviceCall) -> Result<(), DeviceError> {
        let op = call.op();
        let nth = {
            let mut calls = lock(&self.calls);
            calls.push(call);
            calls.iter().filter(|c| c.op() == op).count()
        };
        let mut failures = lock(&self.failures);
        match failures.get(&op).cloned() {
            Some(Failure::Always) => Err(DeviceError::CommandFailed(format!("{:?} (injected)", op))),
            Some(Failure::Times(n)) if n > 0 => {
                failures.insert(op, Failure::Times(n - 1));
                Err(DeviceError::CommandFailed(format!("{:?} (injected)", op)))
            }
            Some(Failure::After(0)) => Err(DeviceError::CommandFailed(format!("{:?} (injected)", op))),
            Some(Failure::After(n)) => {
                failures.insert(op, Failure::After(n - 1));
                Ok(())
            }
            Some(Failure::Nth(ns)) if ns.contains(&nth) => {
                Err(DeviceError::CommandFailed(format!("{:?} #{} (injected)", op, nth)))
            }
            _ => Ok(()),
        }
    }

    fn pixel(&self, point: ScreenPoint) -> (i32, i32) {
        point.resolve(self.size.0, self.size.1)
    }
}

#[async_trait]
impl Device for RecordingDevice {
    async fn connect(&self, serial: &str) -> Result<(), DeviceError> {
        self.record(DeviceCall::Connect(serial.to_string()))
    }

    async fn probe(&self) -> Result<(), DeviceError> {
        self.record(DeviceCall::Probe)
    }

    async fn repair(&self) -> Result<(), DeviceError> {
        self.record(DeviceCall::Repair)
    }

    async fn screenshot(&self, dest: &Path) -> Result<PathBuf, DeviceError> {
        self.record(DeviceCall::Screenshot(dest.to_path_buf()))?;
        std::fs::write(dest, b"\x89PNG-recording")?;
        Ok(dest.to_path_buf())
    }

    async fn click(&self, point: ScreenPoint) -> Result<(), DeviceError> {
        let (x, y) = self.pixel(point);
        self.record(DeviceCall::Click(x, y))
    }

    async fn double_click(&self, point: ScreenPoint) -> Result<(), DeviceError> {
        let (x, y) = self.pixel(point);
        self.record(DeviceCall::DoubleClick(x, y))
    }

    async fn swipe(
        &self,
        from: ScreenPoint,
        to: ScreenPoint,
        _duration: Duration,
    ) -> Result<(), DeviceError> {
        self.record(DeviceCall::Swipe(self.pixel(from), self.pixel(to)))
    }

    async fn send_keys(&self, text: &str) -> Result<(), DeviceError> {
        self.record(DeviceCall::SendKeys(text.to_string()))
    }

    async fn set_clipboard(&self, text: &str) -> Result<(), DeviceError> {
        self.record(DeviceCall::SetClipboard(text.to_string()))
    }

    async fn set_input_method_enabled(&self, enabled: bool) -> Result<(), DeviceError> {
        self.record(DeviceCall::SetInputMethod(enabled))
    }

    async fn press_key(&self, key: Key) -> Result<(), DeviceError> {
        self.record(DeviceCall::PressKey(key))
    }

    async fn shell(&self, command: &str) -> Result<String, DeviceError> {
        self.record(DeviceCall::Shell(command.to_string()))?;
        Ok(String::new())
    }

    async fn find_element(&self, selector: &Selector) -> Result<Option<Bounds>, DeviceError> {
        self.record(DeviceCall::FindElement(selector.clone()))?;
        Ok(lock(&self.elements)
            .iter()
            .find(|(s, _)| s == selector)
            .map(|(_, b)| *b))
    }

    async fn window_size(&self) -> Result<(i32, i32), DeviceError> {
        self.record(DeviceCall::WindowSize)?;
        Ok(self.size)
    }

    async fn app_start(&self, package: &str) -> Result<(), DeviceError> {
        self.record(DeviceCall::AppStart(package.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fail_times_then_recovers() {
        let dev = RecordingDevice::new(1080, 2400);
        dev.fail_times(DeviceOp::Probe, 1);
        assert!(dev.probe().await.is_err());
        assert!(dev.probe().await.is_ok());
        assert_eq!(dev.count(DeviceOp::Probe), 2);
    }

    #[tokio::test]
    async fn test_fail_after_successes() {
        let dev = RecordingDevice::new(1080, 2400);
        dev.fail_after(DeviceOp::Click, 1);
        assert!(dev.click(ScreenPoint::new(0.1, 0.1)).await.is_ok());
        assert!(dev.click(ScreenPoint::new(0.1, 0.1)).await.is_err());
        assert!(dev.click(ScreenPoint::new(0.1, 0.1)).await.is_err());
    }

    #[tokio::test]
    async fn test_click_records_pixels() {
        let dev = RecordingDevice::new(1000, 2000);
        dev.click(ScreenPoint::new(0.5, 0.25)).await.unwrap();
        assert_eq!(dev.calls(), vec![DeviceCall::Click(500, 500)]);
    }

    #[tokio::test]
    async fn test_find_element_uses_preset() {
        let sel = Selector::text("发送");
        let dev = RecordingDevice::new(1080, 2400).with_element(sel.clone(), Bounds::new(1, 2, 3, 4));
        assert_eq!(dev.find_element(&sel).await.unwrap(), Some(Bounds::new(1, 2, 3, 4)));
        assert_eq!(dev.find_element(&Selector::text("x")).await.unwrap(), None);
    }
}
