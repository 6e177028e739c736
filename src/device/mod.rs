//! 设备接口层：移动端自动化驱动的抽象
//!
//! 编排核心（Session / Sequencer / Orchestrator）只依赖 `Device` trait；
//! 具体实现有 adb 驱动（AdbDevice）与记录调用的测试替身（RecordingDevice）。

pub mod adb;
pub mod mock;

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use crate::core::DeviceError;
pub use adb::AdbDevice;
pub use mock::{DeviceCall, DeviceOp, RecordingDevice};

/// 屏幕坐标：分量在 [0, 1] 内按屏幕比例解释，否则按像素解释（与 uiautomator2 一致）。
/// 运行时算出的像素坐标用 `pixels` 构造，不参与比例解释
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
    #[serde(skip)]
    absolute: bool,
}

impl ScreenPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            absolute: false,
        }
    }

    /// 绝对像素坐标
    pub fn pixels(x: i32, y: i32) -> Self {
        Self {
            x: x as f64,
            y: y as f64,
            absolute: true,
        }
    }

    /// 换算为像素坐标
    pub fn resolve(&self, width: i32, height: i32) -> (i32, i32) {
        if self.absolute {
            return (self.x.round() as i32, self.y.round() as i32);
        }
        (resolve_axis(self.x, width), resolve_axis(self.y, height))
    }
}

fn resolve_axis(v: f64, extent: i32) -> i32 {
    if (0.0..=1.0).contains(&v) {
        (v * extent as f64).round() as i32
    } else {
        v.round() as i32
    }
}

/// 元素边界（像素），对应 UI 层级中的 bounds="[l,t][r,b]"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Bounds {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn center(&self) -> (i32, i32) {
        ((self.left + self.right) / 2, (self.top + self.bottom) / 2)
    }
}

/// 元素选择器：所有已设置的字段都需匹配
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Selector {
    pub text: Option<String>,
    pub class_name: Option<String>,
    pub resource_id: Option<String>,
    pub description: Option<String>,
}

impl Selector {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn class_name(class_name: impl Into<String>) -> Self {
        Self {
            class_name: Some(class_name.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_none()
            && self.class_name.is_none()
            && self.resource_id.is_none()
            && self.description.is_none()
    }

    /// 按属性查找函数匹配（attr 名称为 UI dump 中的 text / class / resource-id / content-desc）
    pub fn matches<'a>(&self, attr: impl Fn(&str) -> Option<&'a str>) -> bool {
        if self.is_empty() {
            return false;
        }
        let checks = [
            ("text", &self.text),
            ("class", &self.class_name),
            ("resource-id", &self.resource_id),
            ("content-desc", &self.description),
        ];
        checks.iter().all(|(name, want)| match want {
            Some(w) => attr(name) == Some(w.as_str()),
            None => true,
        })
    }
}

/// 物理按键
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Back,
    Enter,
    Delete,
    Code(u32),
}

impl Key {
    /// Android KeyEvent 键码
    pub fn keycode(&self) -> u32 {
        match self {
            Key::Back => 4,
            Key::Enter => 66,
            Key::Delete => 67,
            Key::Code(c) => *c,
        }
    }
}

/// 设备驱动 trait：截图、点击、滑动、文本注入、元素查找等原语
///
/// 所有调用对调用方而言都是阻塞的（顺序 await），不做并发访问。
#[async_trait]
pub trait Device: Send + Sync {
    /// 建立到指定设备的连接
    async fn connect(&self, serial: &str) -> Result<(), DeviceError>;

    /// 无副作用的健康探测；默认读取屏幕尺寸
    async fn probe(&self) -> Result<(), DeviceError> {
        self.window_size().await.map(|_| ())
    }

    /// 重置设备端自动化服务
    async fn repair(&self) -> Result<(), DeviceError>;

    /// 截图写入 dest，返回实际文件路径
    async fn screenshot(&self, dest: &Path) -> Result<PathBuf, DeviceError>;

    async fn click(&self, point: ScreenPoint) -> Result<(), DeviceError>;

    async fn double_click(&self, point: ScreenPoint) -> Result<(), DeviceError>;

    async fn swipe(
        &self,
        from: ScreenPoint,
        to: ScreenPoint,
        duration: Duration,
    ) -> Result<(), DeviceError>;

    async fn send_keys(&self, text: &str) -> Result<(), DeviceError>;

    async fn set_clipboard(&self, text: &str) -> Result<(), DeviceError>;

    async fn set_input_method_enabled(&self, enabled: bool) -> Result<(), DeviceError>;

    async fn press_key(&self, key: Key) -> Result<(), DeviceError>;

    async fn shell(&self, command: &str) -> Result<String, DeviceError>;

    /// 查找第一个匹配的元素；不存在时返回 Ok(None)
    async fn find_element(&self, selector: &Selector) -> Result<Option<Bounds>, DeviceError>;

    /// 屏幕尺寸 (width, height)
    async fn window_size(&self) -> Result<(i32, i32), DeviceError>;

    /// 冷启动 App（先停止再启动）
    async fn app_start(&self, package: &str) -> Result<(), DeviceError>;
}
