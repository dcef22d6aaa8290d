//! 应用入口 - 编排层
//!
//! ## 职责
//!
//! 1. **模式分发**：导入 / 演练（dry-run）/ 登录检查 / 交互式登录
//! 2. **资源管理**：唯一持有浏览器的模块，只在确实需要时才启动
//! 3. **结果汇总**：输出统计并给出运行结果
//!
//! 演练模式和"没有待导入文章"时都不会启动浏览器。

use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info, warn};

use crate::browser::{BrowserHandle, SessionManager};
use crate::config::Config;
use crate::infrastructure::PageOps;
use crate::orchestrator::reconciler::{Reconciler, RunOptions, RunOutcome, RunPlan, RunReport};
use crate::services::{
    ArtifactWriter, JsonFileLedgerStore, RssFeedSource, TitleMatcher, TopicService,
};
use crate::utils::logging::{log_startup, print_final_stats};
use crate::utils::truncate_text;
use crate::workflow::{build_driver, DriverServices, FlowTimeouts, ImportDriver};

/// 运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// 导入所有未导入的文章
    Import,
    /// 只输出计划
    DryRun,
    /// 检查登录状态
    Check,
    /// 交互式登录
    Login,
}

impl Mode {
    fn describe(self) -> &'static str {
        match self {
            Mode::Import => "导入模式",
            Mode::DryRun => "演练模式（不会启动浏览器）",
            Mode::Check => "登录检查模式",
            Mode::Login => "交互式登录模式",
        }
    }
}

/// 应用主结构
pub struct App {
    config: Config,
    mode: Mode,
    force: Option<String>,
}

impl App {
    pub fn new(config: Config, mode: Mode, force: Option<String>) -> Self {
        Self {
            config,
            mode,
            force,
        }
    }

    /// 运行应用主逻辑
    pub async fn run(self) -> Result<RunOutcome> {
        let destinations = self.destination_names();
        log_startup(self.mode.describe(), &destinations);

        if destinations.is_empty() {
            warn!("⚠️ 没有启用的目标平台，程序结束");
            return Ok(RunOutcome::Ok);
        }

        match self.mode {
            Mode::Import | Mode::DryRun => self.import().await,
            Mode::Check => self.check().await,
            Mode::Login => self.login().await,
        }
    }

    fn destination_names(&self) -> Vec<String> {
        self.config
            .enabled_destinations()
            .map(|d| d.name.clone())
            .collect()
    }

    async fn import(&self) -> Result<RunOutcome> {
        let store = JsonFileLedgerStore::open(&self.config.ledger_path)?;
        let feed = RssFeedSource::new(
            self.config.feed_urls.clone(),
            &self.config.user_agent,
            self.config.fetch_timeout,
        )?;
        let options = RunOptions {
            force: self.force.clone(),
            remote_title_dedup: self.config.remote_title_dedup,
            import_delay: self.config.import_delay,
        };
        let mut reconciler = Reconciler::new(store, Box::new(feed), self.destination_names(), options)
            .with_matcher(TitleMatcher::new(self.config.title_suffixes.clone()));

        let plan = reconciler.prepare().await?;

        if self.mode == Mode::DryRun {
            log_plan(&plan);
            return Ok(RunOutcome::Ok);
        }
        if plan.is_empty() {
            info!("✓ 所有文章均已导入，无需启动浏览器");
            return Ok(RunOutcome::Ok);
        }

        let browser = BrowserHandle::open(&self.config).await?;
        let page: Arc<dyn PageOps> = browser.executor();
        let drivers = self.build_drivers(page)?;

        let result = reconciler.execute(plan, &drivers).await;
        browser.shutdown().await;
        let report = result?;

        log_report(&report);
        print_final_stats(
            report.imported(),
            report.skipped + report.title_matches.len(),
            report.failed(),
            &self.config.log_file,
        );
        Ok(report.outcome())
    }

    fn build_drivers(&self, page: Arc<dyn PageOps>) -> Result<Vec<Box<dyn ImportDriver>>> {
        let services = DriverServices {
            timeouts: FlowTimeouts::from_config(&self.config),
            artifacts: Arc::new(ArtifactWriter::with_dir(&self.config.artifact_dir)),
            topics: Arc::new(TopicService::new(
                &self.config.user_agent,
                self.config.fetch_timeout,
                self.config.default_topics.clone(),
            )?),
        };
        Ok(self
            .config
            .enabled_destinations()
            .map(|dest| build_driver(dest.clone(), Arc::clone(&page), &services))
            .collect())
    }

    async fn check(&self) -> Result<RunOutcome> {
        let browser = BrowserHandle::open(&self.config).await?;
        let sessions = SessionManager::new(browser.executor(), self.config.nav_timeout);

        let mut all_valid = true;
        for dest in self.config.enabled_destinations() {
            if !sessions.is_valid(dest).await {
                all_valid = false;
            }
        }
        browser.shutdown().await;

        if all_valid {
            info!("✅ 所有登录状态有效");
            Ok(RunOutcome::Ok)
        } else {
            warn!("❌ 存在失效的登录状态，请运行 --login 重新登录");
            Ok(RunOutcome::Degraded)
        }
    }

    async fn login(&self) -> Result<RunOutcome> {
        let mut config = self.config.clone();
        config.headless = false;
        let browser = BrowserHandle::open(&config).await?;
        let sessions = SessionManager::new(browser.executor(), config.nav_timeout);

        let mut all_valid = true;
        for dest in config.enabled_destinations() {
            match sessions.login(dest).await {
                Ok(true) => {}
                Ok(false) => all_valid = false,
                Err(e) => {
                    error!("[{}] 登录流程出错: {:#}", dest.name, e);
                    all_valid = false;
                }
            }
        }
        browser.shutdown().await;

        info!("登录状态已保存到 {}", config.browser_data_dir.display());
        Ok(if all_valid {
            RunOutcome::Ok
        } else {
            RunOutcome::Degraded
        })
    }
}

fn log_plan(plan: &RunPlan) {
    info!("\n{}", "=".repeat(60));
    info!("📋 演练计划（不会导入任何内容）");
    info!("{}", "=".repeat(60));
    for planned in &plan.destinations {
        info!(
            "[{}] 待导入 {} 篇，已导入 {} 篇",
            planned.destination,
            planned.pending.len(),
            planned.already_imported
        );
        for item in &planned.pending {
            info!("  • {} ({})", truncate_text(&item.title, 60), item.url);
        }
    }
}

fn log_report(report: &RunReport) {
    for m in &report.title_matches {
        info!("[{}] ⏭️  平台上已存在: {}", m.destination, m.item_id);
    }
    for attempt in report.attempts.iter().filter(|a| !a.is_success()) {
        if let crate::models::ImportOutcome::Failure(failure) = &attempt.outcome {
            warn!(
                "[{}] ❌ {} - {}{}",
                attempt.destination,
                truncate_text(&attempt.item.title, 50),
                failure,
                attempt
                    .artifact
                    .as_ref()
                    .map(|p| format!(" (现场: {})", p.display()))
                    .unwrap_or_default()
            );
        }
    }
}
