//! adb 驱动：通过 adb 命令行操作 Android 设备
//!
//! 点击 / 滑动 / 按键走 `input`，截图走 `exec-out screencap -p`，
//! 元素查找解析 `uiautomator dump` 的 XML；中文输入依赖 ADBKeyboard 输入法广播。
//! 每条命令带超时与 tracing 审计。

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;

use crate::config::DeviceSection;
use crate::device::{Bounds, Device, DeviceError, Key, ScreenPoint, Selector};

/// ADBKeyboard 输入法（支持广播注入任意 Unicode 文本）
const ADB_IME: &str = "com.android.adbkeyboard/.AdbIME";

fn node_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<node\b[^>]*>").expect("static regex"))
}

fn attr_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"([\w:-]+)="([^"]*)""#).expect("static regex"))
}

fn bounds_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[(-?\d+),(-?\d+)\]\[(-?\d+),(-?\d+)\]").expect("static regex"))
}

fn size_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)x(\d+)").expect("static regex"))
}

/// 单引号包裹，供 `adb shell` 在设备端安全解析
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// `input text` 只接受 ASCII，空格需写作 %s
fn input_text_arg(text: &str) -> Result<String, DeviceError> {
    if !text.is_ascii() {
        return Err(DeviceError::Unsupported(
            "input text cannot inject non-ASCII without IME".to_string(),
        ));
    }
    Ok(shell_quote(&text.replace(' ', "%s")))
}

/// 从 UI dump 中找出第一个匹配 selector 的节点边界
pub fn find_in_dump(xml: &str, selector: &Selector) -> Option<Bounds> {
    node_regex().find_iter(xml).find_map(|node| {
        let attrs: Vec<(&str, &str)> = attr_regex()
            .captures_iter(node.as_str())
            .filter_map(|c| Some((c.get(1)?.as_str(), c.get(2)?.as_str())))
            .collect();
        let lookup = |name: &str| attrs.iter().find(|(k, _)| *k == name).map(|(_, v)| *v);
        if !selector.matches(lookup) {
            return None;
        }
        parse_bounds(lookup("bounds")?)
    })
}

fn parse_bounds(raw: &str) -> Option<Bounds> {
    let c = bounds_regex().captures(raw)?;
    let n = |i: usize| c.get(i)?.as_str().parse::<i32>().ok();
    Some(Bounds::new(n(1)?, n(2)?, n(3)?, n(4)?))
}

/// 解析 `wm size` 输出；存在 Override size 时以最后一行为准
fn parse_window_size(output: &str) -> Option<(i32, i32)> {
    output
        .lines()
        .filter_map(|line| size_regex().captures(line))
        .last()
        .and_then(|c| {
            let w = c.get(1)?.as_str().parse().ok()?;
            let h = c.get(2)?.as_str().parse().ok()?;
            Some((w, h))
        })
}

/// adb 驱动
pub struct AdbDevice {
    adb_path: String,
    remote_tmp_dir: String,
    timeout_secs: u64,
    serial: Mutex<String>,
    ime_enabled: AtomicBool,
    /// 屏幕尺寸缓存（修复后清空）
    size: Mutex<Option<(i32, i32)>>,
}

impl AdbDevice {
    pub fn new(cfg: &DeviceSection) -> Self {
        Self {
            adb_path: cfg.adb_path.clone(),
            remote_tmp_dir: cfg.remote_tmp_dir.trim_end_matches('/').to_string(),
            timeout_secs: cfg.command_timeout_secs,
            serial: Mutex::new(cfg.serial.clone()),
            ime_enabled: AtomicBool::new(false),
            size: Mutex::new(None),
        }
    }

    fn serial(&self) -> String {
        self.serial
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    async fn run_raw(&self, args: &[&str]) -> Result<Vec<u8>, DeviceError> {
        let serial = self.serial();
        let mut cmd = Command::new(&self.adb_path);
        if !serial.is_empty() {
            cmd.args(["-s", serial.as_str()]);
        }
        cmd.args(args);

        tracing::debug!(serial = %serial, args = ?args, "adb");

        let output = tokio::time::timeout(Duration::from_secs(self.timeout_secs), cmd.output())
            .await
            .map_err(|_| DeviceError::Timeout(format!("adb {}", args.join(" "))))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DeviceError::CommandFailed(format!(
                "adb {} exited with {:?}: {}",
                args.join(" "),
                output.status.code(),
                stderr.trim()
            )));
        }
        Ok(output.stdout)
    }

    async fn run(&self, args: &[&str]) -> Result<String, DeviceError> {
        let out = self.run_raw(args).await?;
        Ok(String::from_utf8_lossy(&out).to_string())
    }

    async fn input(&self, command: &str) -> Result<(), DeviceError> {
        self.run(&["shell", &format!("input {}", command)]).await.map(|_| ())
    }

    async fn pixel(&self, point: ScreenPoint) -> Result<(i32, i32), DeviceError> {
        let (w, h) = self.window_size().await?;
        Ok(point.resolve(w, h))
    }
}

#[async_trait]
impl Device for AdbDevice {
    async fn connect(&self, serial: &str) -> Result<(), DeviceError> {
        *self.serial.lock().unwrap_or_else(|e| e.into_inner()) = serial.to_string();
        let state = self.run(&["get-state"]).await?;
        if state.trim() != "device" {
            return Err(DeviceError::NotConnected);
        }
        tracing::info!(serial = %serial, "adb device connected");
        Ok(())
    }

    async fn repair(&self) -> Result<(), DeviceError> {
        *self.size.lock().unwrap_or_else(|e| e.into_inner()) = None;
        self.ime_enabled.store(false, Ordering::Relaxed);
        self.run(&["kill-server"]).await?;
        self.run(&["start-server"]).await?;
        self.run(&["wait-for-device"]).await?;
        self.probe().await
    }

    async fn screenshot(&self, dest: &Path) -> Result<PathBuf, DeviceError> {
        let png = self.run_raw(&["exec-out", "screencap", "-p"]).await?;
        if png.is_empty() {
            return Err(DeviceError::CommandFailed("empty screenshot".to_string()));
        }
        if let Some(parent) = dest.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(dest, &png).await?;
        Ok(dest.to_path_buf())
    }

    async fn click(&self, point: ScreenPoint) -> Result<(), DeviceError> {
        let (x, y) = self.pixel(point).await?;
        self.input(&format!("tap {} {}", x, y)).await
    }

    async fn double_click(&self, point: ScreenPoint) -> Result<(), DeviceError> {
        let (x, y) = self.pixel(point).await?;
        // 两次 tap 放在同一条 shell 里，间隔足够短才会被识别为双击
        self.run(&[
            "shell",
            &format!("input tap {x} {y} && input tap {x} {y}"),
        ])
        .await
        .map(|_| ())
    }

    async fn swipe(
        &self,
        from: ScreenPoint,
        to: ScreenPoint,
        duration: Duration,
    ) -> Result<(), DeviceError> {
        let (w, h) = self.window_size().await?;
        let (x1, y1) = from.resolve(w, h);
        let (x2, y2) = to.resolve(w, h);
        self.input(&format!(
            "swipe {} {} {} {} {}",
            x1,
            y1,
            x2,
            y2,
            duration.as_millis()
        ))
        .await
    }

    async fn send_keys(&self, text: &str) -> Result<(), DeviceError> {
        if self.ime_enabled.load(Ordering::Relaxed) {
            self.run(&[
                "shell",
                &format!("am broadcast -a ADB_INPUT_TEXT --es msg {}", shell_quote(text)),
            ])
            .await
            .map(|_| ())
        } else {
            let arg = input_text_arg(text)?;
            self.input(&format!("text {}", arg)).await
        }
    }

    async fn set_clipboard(&self, text: &str) -> Result<(), DeviceError> {
        let out = self
            .run(&[
                "shell",
                &format!("am broadcast -a clipper.set -e text {}", shell_quote(text)),
            ])
            .await?;
        // 未安装 Clipper 时广播无人接收，result=0
        if out.contains("result=0") {
            return Err(DeviceError::Unsupported("clipboard receiver missing".to_string()));
        }
        Ok(())
    }

    async fn set_input_method_enabled(&self, enabled: bool) -> Result<(), DeviceError> {
        if enabled {
            self.run(&["shell", &format!("ime enable {}", ADB_IME)]).await?;
            self.run(&["shell", &format!("ime set {}", ADB_IME)]).await?;
        } else {
            self.run(&["shell", "ime reset"]).await?;
        }
        self.ime_enabled.store(enabled, Ordering::Relaxed);
        Ok(())
    }

    async fn press_key(&self, key: Key) -> Result<(), DeviceError> {
        self.input(&format!("keyevent {}", key.keycode())).await
    }

    async fn shell(&self, command: &str) -> Result<String, DeviceError> {
        self.run(&["shell", command]).await
    }

    async fn find_element(&self, selector: &Selector) -> Result<Option<Bounds>, DeviceError> {
        let remote = format!("{}/window_dump.xml", self.remote_tmp_dir);
        self.run(&["shell", &format!("uiautomator dump {}", remote)]).await?;
        let xml = self.run(&["exec-out", "cat", remote.as_str()]).await?;
        Ok(find_in_dump(&xml, selector))
    }

    async fn window_size(&self) -> Result<(i32, i32), DeviceError> {
        if let Some(size) = *self.size.lock().unwrap_or_else(|e| e.into_inner()) {
            return Ok(size);
        }
        let out = self.run(&["shell", "wm size"]).await?;
        let size = parse_window_size(&out)
            .ok_or_else(|| DeviceError::Parse(format!("wm size: {}", out.trim())))?;
        *self.size.lock().unwrap_or_else(|e| e.into_inner()) = Some(size);
        Ok(size)
    }

    async fn app_start(&self, package: &str) -> Result<(), DeviceError> {
        self.run(&["shell", &format!("am force-stop {}", package)]).await?;
        self.run(&[
            "shell",
            &format!("monkey -p {} -c android.intent.category.LAUNCHER 1", package),
        ])
        .await
        .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUMP: &str = r#"<?xml version='1.0' encoding='UTF-8' standalone='yes' ?>
<hierarchy rotation="0">
  <node index="0" text="" resource-id="" class="android.widget.FrameLayout" content-desc="" bounds="[0,0][1080,2400]">
    <node index="1" text="说点什么..." resource-id="com.xingin.xhs:id/input" class="android.widget.EditText" content-desc="" bounds="[40,2180][860,2280]" />
    <node index="2" text="发送" resource-id="" class="android.widget.TextView" content-desc="" bounds="[900,2190][1040,2270]" />
  </node>
</hierarchy>"#;

    #[test]
    fn test_find_in_dump_by_class() {
        let b = find_in_dump(DUMP, &Selector::class_name("android.widget.EditText"));
        assert_eq!(b, Some(Bounds::new(40, 2180, 860, 2280)));
    }

    #[test]
    fn test_find_in_dump_by_text() {
        let b = find_in_dump(DUMP, &Selector::text("发送"));
        assert_eq!(b, Some(Bounds::new(900, 2190, 1040, 2270)));
    }

    #[test]
    fn test_find_in_dump_missing() {
        assert_eq!(find_in_dump(DUMP, &Selector::text("评论")), None);
        assert_eq!(find_in_dump("", &Selector::text("发送")), None);
    }

    #[test]
    fn test_parse_window_size_prefers_override() {
        assert_eq!(parse_window_size("Physical size: 1080x2400\n"), Some((1080, 2400)));
        assert_eq!(
            parse_window_size("Physical size: 1440x3200\nOverride size: 1080x2400\n"),
            Some((1080, 2400))
        );
        assert_eq!(parse_window_size("error"), None);
    }

    #[test]
    fn test_input_text_rejects_non_ascii() {
        assert_eq!(input_text_arg("hi there").unwrap(), "'hi%sthere'");
        assert!(matches!(
            input_text_arg("你好"),
            Err(DeviceError::Unsupported(_))
        ));
    }

    #[test]
    fn test_shell_quote_escapes_single_quote() {
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }
}
