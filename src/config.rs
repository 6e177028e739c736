//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `PILOT__*` 覆盖（双下划线表示嵌套，如 `PILOT__DEVICE__SERIAL=xxx`）。
//! 各组件只拿自己的配置段（构造时传入），不存在全局可变配置。

use std::path::PathBuf;

use serde::Deserialize;

use crate::device::{ScreenPoint, Selector};

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub device: DeviceSection,
    pub llm: LlmSection,
    pub retrieval: RetrievalSection,
    pub composer: ComposerSection,
    pub prompts: PromptsSection,
    pub sequencer: SequencerSection,
    pub navigation: NavigationSection,
    pub timing: TimingSection,
    pub run: RunSection,
}

/// [app] 段：日志目录、截图临时文件
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    /// 运行日志目录（每次运行一个文件）
    pub log_dir: PathBuf,
    /// 详情页截图路径
    pub post_screenshot: PathBuf,
    /// 列表页截图路径
    pub feed_screenshot: PathBuf,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("log"),
            post_screenshot: PathBuf::from("temp_post.png"),
            feed_screenshot: PathBuf::from("temp_feed.png"),
        }
    }
}

/// [device] 段：设备序列号、目标 App 包名、adb 可执行文件
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeviceSection {
    pub serial: String,
    pub app_package: String,
    pub adb_path: String,
    /// 设备端临时文件目录（截图、UI dump）
    pub remote_tmp_dir: String,
    /// 单条 adb 命令超时（秒）
    pub command_timeout_secs: u64,
}

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            serial: String::new(),
            app_package: "com.xingin.xhs".to_string(),
            adb_path: "adb".to_string(),
            remote_tmp_dir: "/sdcard".to_string(),
            command_timeout_secs: 20,
        }
    }
}

/// [llm] 段：OpenAI 兼容端点（默认本地 Ollama）、视觉模型与文案模型
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub base_url: Option<String>,
    /// 未设置时读取环境变量 OPENAI_API_KEY
    pub api_key: Option<String>,
    /// 视觉模型：负责看图
    pub vision_model: String,
    /// 文案模型：负责优化搜索词与写评论
    pub writer_model: String,
    pub vision_temperature: f32,
    pub writer_temperature: f32,
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            base_url: Some("http://localhost:11434/v1".to_string()),
            api_key: None,
            vision_model: "llava:latest".to_string(),
            writer_model: "qwen3-vl:4b".to_string(),
            vision_temperature: 0.1,
            writer_temperature: 0.7,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    pub request: u64,
    pub stream: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: 60,
            stream: 120,
        }
    }
}

/// [retrieval] 段：向量检索后端
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalSection {
    /// pinecone / memory / none
    pub provider: String,
    /// Pinecone index host（如 `xxx.svc.aped-1234.pinecone.io`）
    pub index_host: Option<String>,
    /// 未设置时读取环境变量 PINECONE_API_KEY
    pub api_key: Option<String>,
    pub api_version: String,
    pub namespace: String,
    pub top_k: usize,
    pub timeout_secs: u64,
    /// provider = memory 时的本地知识文件（空行分隔的段落）
    pub seed_file: Option<PathBuf>,
}

impl Default for RetrievalSection {
    fn default() -> Self {
        Self {
            provider: "pinecone".to_string(),
            index_host: None,
            api_key: None,
            api_version: "2025-04".to_string(),
            namespace: "lurky".to_string(),
            top_k: 2,
            timeout_secs: 15,
            seed_file: None,
        }
    }
}

/// [composer] 段：评论长度上限与兜底文案
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ComposerSection {
    /// 清洗后评论最大字符数
    pub max_chars: usize,
    pub fallback_comment: String,
    pub stream_fallback: String,
}

impl Default for ComposerSection {
    fn default() -> Self {
        Self {
            max_chars: 35,
            fallback_comment: "看起来很不错！👍".to_string(),
            stream_fallback: "赞！👍".to_string(),
        }
    }
}

/// [prompts] 段：Prompt 文件目录；目录下同名 .md 覆盖内置模板
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PromptsSection {
    pub dir: PathBuf,
}

impl Default for PromptsSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("config/prompts"),
        }
    }
}

/// [sequencer] 段：单帖动作序列的坐标、选择器与策略开关
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SequencerSection {
    /// 决定评论时是否强制点赞（false 表示两者独立）
    pub like_on_comment: bool,
    /// 双击点赞位置
    pub like_point: ScreenPoint,
    /// 唤起评论框的点击序列
    pub comment_open_taps: Vec<ScreenPoint>,
    /// 剪贴板粘贴键码
    pub paste_keycode: u32,
    /// 注入文本后用于激活发送按钮的按键（空格 + 删除）
    pub activate_keycodes: Vec<u32>,
    /// 可直接点击的发送按钮
    pub send_selector: Selector,
    /// 评论输入框
    pub input_selector: Selector,
    /// 发送按钮相对输入框右边缘的偏移（像素）
    pub send_offset_px: i32,
    /// 计算坐标超出屏幕时距右边缘的留白（像素）
    pub edge_margin_px: i32,
    /// 找不到任何元素时的兜底发送坐标
    pub send_fallback_point: ScreenPoint,
    /// 复位时点击的空白区域
    pub neutral_point: ScreenPoint,
}

impl Default for SequencerSection {
    fn default() -> Self {
        Self {
            like_on_comment: false,
            like_point: ScreenPoint::new(0.5, 0.5),
            comment_open_taps: vec![ScreenPoint::new(964.0, 2259.0), ScreenPoint::new(964.0, 2259.0)],
            paste_keycode: 279,
            activate_keycodes: vec![62, 67],
            send_selector: Selector::text("发送"),
            input_selector: Selector::class_name("android.widget.EditText"),
            send_offset_px: 50,
            edge_margin_px: 30,
            send_fallback_point: ScreenPoint::new(0.92, 0.965),
            neutral_point: ScreenPoint::new(0.5, 0.2),
        }
    }
}

/// [navigation] 段：启动搜索、列表页宫格、翻页滑动
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NavigationSection {
    pub search_open_point: ScreenPoint,
    pub search_input_point: ScreenPoint,
    /// 搜索完成后设置帖子范围的点击序列
    pub filter_taps: Vec<ScreenPoint>,
    /// 2x2 宫格中心点，按 choice_index 1..=4 排列
    pub grid_points: Vec<ScreenPoint>,
    pub swipe_from: ScreenPoint,
    pub swipe_to: ScreenPoint,
    pub swipe_duration_ms: u64,
}

impl Default for NavigationSection {
    fn default() -> Self {
        Self {
            search_open_point: ScreenPoint::new(0.92, 0.06),
            search_input_point: ScreenPoint::new(0.5, 0.06),
            filter_taps: vec![
                ScreenPoint::new(120.0, 297.0),
                ScreenPoint::new(425.0, 1518.0),
                ScreenPoint::new(59.0, 287.0),
            ],
            grid_points: vec![
                ScreenPoint::new(0.25, 0.40),
                ScreenPoint::new(0.75, 0.40),
                ScreenPoint::new(0.25, 0.75),
                ScreenPoint::new(0.75, 0.75),
            ],
            swipe_from: ScreenPoint::new(0.5, 0.8),
            swipe_to: ScreenPoint::new(0.5, 0.2),
            swipe_duration_ms: 100,
        }
    }
}

/// [timing] 段：UI 变更后的等待（毫秒），给目标 App 渲染留时间
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimingSection {
    pub tap_ms: u64,
    pub settle_ms: u64,
    pub after_send_ms: u64,
    pub after_back_ms: u64,
    pub after_open_post_ms: u64,
    pub after_swipe_ms: u64,
    pub after_app_start_ms: u64,
    pub after_search_ms: u64,
}

impl TimingSection {
    /// 全部为 0（测试用）
    pub fn zero() -> Self {
        Self {
            tap_ms: 0,
            settle_ms: 0,
            after_send_ms: 0,
            after_back_ms: 0,
            after_open_post_ms: 0,
            after_swipe_ms: 0,
            after_app_start_ms: 0,
            after_search_ms: 0,
        }
    }
}

impl Default for TimingSection {
    fn default() -> Self {
        Self {
            tap_ms: 500,
            settle_ms: 1000,
            after_send_ms: 2000,
            after_back_ms: 2000,
            after_open_post_ms: 3000,
            after_swipe_ms: 4000,
            after_app_start_ms: 5000,
            after_search_ms: 4000,
        }
    }
}

/// [run] 段：命令行未指定时的默认值
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunSection {
    pub default_keyword: String,
    pub default_count: usize,
    /// 搜索前是否让文案模型改写关键词
    pub optimize_keyword: bool,
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            default_keyword: "鱼油".to_string(),
            default_count: 5,
            optimize_keyword: false,
        }
    }
}

/// 从 config 目录加载配置，环境变量 PILOT__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 PILOT__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("PILOT")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
