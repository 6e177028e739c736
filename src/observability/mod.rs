//! 可观测性：tracing 订阅器与每次运行的文本日志

pub mod run_log;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub use run_log::RunLog;

/// 安装全局订阅器：默认 info，可通过 RUST_LOG 覆盖
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init();
}
