//! xhs-pilot 命令行入口
//!
//! 初始化日志、加载配置、装配编排器，搜索关键词并处理指定数量的帖子。

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use xhs_pilot::{config::load_config, observability, PilotBuilder};

#[derive(Parser, Debug)]
#[command(name = "xhs-pilot", about = "小红书自动浏览 / 判断 / 互动")]
struct Args {
    /// 搜索关键词（默认取 [run].default_keyword）
    #[arg(short, long)]
    keyword: Option<String>,

    /// 处理的帖子数量（默认取 [run].default_count）
    #[arg(short, long)]
    count: Option<usize>,

    /// 额外的配置文件，覆盖 config/default.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// 搜索前让文案模型优化关键词
    #[arg(long)]
    optimize: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();
    let args = Args::parse();

    let mut cfg = load_config(args.config.clone()).context("Failed to load config")?;
    if args.optimize {
        cfg.run.optimize_keyword = true;
    }
    let keyword = args
        .keyword
        .filter(|k| !k.trim().is_empty())
        .unwrap_or_else(|| cfg.run.default_keyword.clone());
    let count = args.count.unwrap_or(cfg.run.default_count);

    let mut orchestrator = PilotBuilder::new(cfg).build();
    let summary = orchestrator
        .run(&keyword, count)
        .await
        .context("Run aborted")?;

    tracing::info!(
        processed = summary.outcomes.len(),
        skipped = summary.skipped,
        liked = summary.liked(),
        commented = summary.commented(),
        "done"
    );
    Ok(())
}
