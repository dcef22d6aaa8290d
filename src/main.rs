use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use cross_post_importer::config::{Config, DestinationKind};
use cross_post_importer::orchestrator::{App, Mode, RunOutcome};
use cross_post_importer::utils::logging;

#[derive(Parser)]
#[command(name = "cross-post-importer")]
#[command(about = "把博客订阅源中的文章导入到 Medium / Substack")]
#[command(version)]
struct Cli {
    /// 打开有界面的浏览器，手动登录各平台
    #[arg(long, conflicts_with_all = ["check", "dry_run"])]
    login: bool,

    /// 只检查各平台登录状态
    #[arg(long, conflicts_with = "dry_run")]
    check: bool,

    /// 只输出导入计划，不启动浏览器
    #[arg(long)]
    dry_run: bool,

    /// 无界面模式运行浏览器
    #[arg(long)]
    headless: bool,

    /// 强制导入指定条目（URL 或订阅源中的 id），忽略导入记录
    #[arg(long, value_name = "URL_OR_ID")]
    force: Option<String>,

    /// 只导入 Medium
    #[arg(long, conflicts_with = "substack_only")]
    medium_only: bool,

    /// 只导入 Substack
    #[arg(long)]
    substack_only: bool,

    /// 配置文件路径（默认 xpost.toml）
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// 输出 debug 日志
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn mode(&self) -> Mode {
        if self.login {
            Mode::Login
        } else if self.check {
            Mode::Check
        } else if self.dry_run {
            Mode::DryRun
        } else {
            Mode::Import
        }
    }

    fn apply_overrides(&self, config: &mut Config) {
        if self.medium_only {
            config.restrict_to(DestinationKind::Medium);
        }
        if self.substack_only {
            config.restrict_to(DestinationKind::Substack);
        }
        if self.headless {
            config.headless = true;
        }
        if self.verbose {
            config.verbose_logging = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 加载配置
    let mut config = Config::load(cli.config.as_deref()).context("加载配置失败")?;
    cli.apply_overrides(&mut config);

    // 初始化日志
    logging::init(&config.log_file, config.verbose_logging)?;

    // 初始化并运行应用
    let outcome = App::new(config, cli.mode(), cli.force.clone()).run().await?;

    if outcome == RunOutcome::Degraded {
        std::process::exit(outcome.exit_code());
    }
    Ok(())
}
