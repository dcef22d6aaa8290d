//! 对账器 - 编排层
//!
//! ## 职责
//!
//! 对比订阅源与导入记录，找出每个目标平台尚未导入的文章，逐篇交给驱动导入，
//! 每次成功都立即写入导入记录。
//!
//! ## 流程
//!
//! ```text
//! 加载导入记录 → 拉取订阅源（失败即中止）
//!     ↓
//! 每个目标平台：差集 → 登录检查 → 已发布标题去重 → 逐篇导入
//!     ↓
//! 汇总：全部成功为 Ok，否则 Degraded
//! ```
//!
//! ## 不变量
//!
//! - 只有驱动报告成功的条目才会写入导入记录
//! - 写入失败立即中止整次运行（该次成功视为未确认）
//! - 不删除任何记录

use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{AppResult, ConfigError, ImportFailure};
use crate::models::{sort_oldest_first, FeedItem, ImportAttempt, Ledger};
use crate::services::{FeedSource, LedgerLoad, LedgerStore, TitleMatcher};
use crate::utils::logging::{log_destination_start, log_feed_loaded};
use crate::utils::truncate_text;
use crate::workflow::{ImportCtx, ImportDriver};

/// 运行选项
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// `--force` 指定的 URL 或条目 ID
    pub force: Option<String>,
    /// 导入前按已发布标题去重
    pub remote_title_dedup: bool,
    /// 同一目标两次导入之间的间隔
    pub import_delay: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            force: None,
            remote_title_dedup: true,
            import_delay: Duration::from_secs(3),
        }
    }
}

/// 单个目标平台的待办
#[derive(Debug, Clone)]
pub struct PlannedDestination {
    pub destination: String,
    /// 待导入条目，按发布时间从旧到新
    pub pending: Vec<FeedItem>,
    /// 已在导入记录中的条目数
    pub already_imported: usize,
}

/// 本次运行的计划
#[derive(Debug, Clone)]
pub struct RunPlan {
    /// 订阅源条目总数（--force URL 时为 1）
    pub feed_total: usize,
    /// 是否为 --force 运行
    pub forced: bool,
    pub destinations: Vec<PlannedDestination>,
}

impl RunPlan {
    /// 待导入的 (条目, 平台) 总数
    pub fn pending(&self) -> usize {
        self.destinations.iter().map(|d| d.pending.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.pending() == 0
    }
}

/// 运行结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// 没有失败（包括无事可做）
    Ok,
    /// 至少一项导入失败
    Degraded,
}

impl RunOutcome {
    pub fn exit_code(self) -> i32 {
        match self {
            RunOutcome::Ok => 0,
            RunOutcome::Degraded => 1,
        }
    }
}

/// 按已发布标题判定为已存在的条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleMatch {
    pub destination: String,
    pub item_id: String,
}

/// 运行报告
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// 所有导入尝试（含登录失效导致的失败）
    pub attempts: Vec<ImportAttempt>,
    /// 因已在导入记录中而跳过的数量
    pub skipped: usize,
    /// 按标题去重后直接记为已导入的条目
    pub title_matches: Vec<TitleMatch>,
}

impl RunReport {
    pub fn imported(&self) -> usize {
        self.attempts.iter().filter(|a| a.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.attempts.iter().filter(|a| !a.is_success()).count()
    }

    pub fn outcome(&self) -> RunOutcome {
        if self.failed() == 0 {
            RunOutcome::Ok
        } else {
            RunOutcome::Degraded
        }
    }
}

/// `--force` 的目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForceTarget {
    /// http(s) 地址：不在订阅源中也可导入
    Url(String),
    /// 条目 ID：必须存在于订阅源
    Id(String),
}

impl ForceTarget {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match url::Url::parse(raw) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {
                ForceTarget::Url(raw.to_string())
            }
            _ => ForceTarget::Id(raw.to_string()),
        }
    }
}

/// 在订阅源中查找 --force 指定的条目
pub fn resolve_forced_item(raw: &str, items: &[FeedItem]) -> Result<FeedItem, ConfigError> {
    let needle = raw.trim();
    if let Some(item) = items.iter().find(|i| i.id == needle || i.url == needle) {
        return Ok(item.clone());
    }
    match ForceTarget::parse(needle) {
        ForceTarget::Url(url) => Ok(FeedItem::manual(url)),
        ForceTarget::Id(id) => Err(ConfigError::UnknownForceTarget(id)),
    }
}

/// 计算每个目标平台的待导入列表（纯函数）
///
/// `forced` 存在时只处理该条目，并且无视导入记录。
pub fn plan(
    items: &[FeedItem],
    ledger: &Ledger,
    destinations: &[String],
    forced: Option<&FeedItem>,
) -> RunPlan {
    let planned = destinations
        .iter()
        .map(|dest| match forced {
            Some(item) => PlannedDestination {
                destination: dest.clone(),
                pending: vec![item.clone()],
                already_imported: 0,
            },
            None => {
                let (done, pending): (Vec<&FeedItem>, Vec<&FeedItem>) =
                    items.iter().partition(|i| ledger.contains(dest, &i.id));
                let mut pending: Vec<FeedItem> = pending.into_iter().cloned().collect();
                sort_oldest_first(&mut pending);
                PlannedDestination {
                    destination: dest.clone(),
                    pending,
                    already_imported: done.len(),
                }
            }
        })
        .collect();

    RunPlan {
        feed_total: if forced.is_some() { 1 } else { items.len() },
        forced: forced.is_some(),
        destinations: planned,
    }
}

fn driver_for<'a>(
    drivers: &'a [Box<dyn ImportDriver>],
    destination: &str,
) -> Option<&'a dyn ImportDriver> {
    drivers
        .iter()
        .find(|d| d.destination() == destination)
        .map(|d| d.as_ref())
}

/// 对账器
///
/// 持有导入记录存储、订阅源与内存中的导入记录；一次运行一个实例。
pub struct Reconciler<S: LedgerStore> {
    store: S,
    feed: Box<dyn FeedSource>,
    destinations: Vec<String>,
    options: RunOptions,
    matcher: TitleMatcher,
    ledger: Ledger,
}

impl<S: LedgerStore> Reconciler<S> {
    pub fn new(
        store: S,
        feed: Box<dyn FeedSource>,
        destinations: Vec<String>,
        options: RunOptions,
    ) -> Self {
        Self {
            store,
            feed,
            destinations,
            options,
            matcher: TitleMatcher::default(),
            ledger: Ledger::new(),
        }
    }

    pub fn with_matcher(mut self, matcher: TitleMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// 加载导入记录、拉取订阅源并生成计划；不导入任何内容
    pub async fn prepare(&mut self) -> AppResult<RunPlan> {
        let loaded = self.store.load()?;
        match &loaded.status {
            LedgerLoad::Missing => info!("📒 导入记录不存在，从空记录开始"),
            LedgerLoad::Loaded => info!("📒 已加载导入记录: {} 条", loaded.ledger.len()),
            LedgerLoad::Corrupt { reason, backup } => warn!(
                "⚠️ 导入记录已损坏 ({})，从空记录开始；原文件备份: {:?}",
                reason, backup
            ),
        }
        self.ledger = loaded.ledger;

        let plan = match self.options.force.as_deref().map(ForceTarget::parse) {
            Some(ForceTarget::Url(url)) => {
                info!("🎯 强制导入: {}", url);
                let item = FeedItem::manual(url);
                plan(&[], &self.ledger, &self.destinations, Some(&item))
            }
            Some(ForceTarget::Id(id)) => {
                let items = self.feed.fetch().await?;
                let item = resolve_forced_item(&id, &items)?;
                info!("🎯 强制导入: {}", item.url);
                plan(&items, &self.ledger, &self.destinations, Some(&item))
            }
            None => {
                let items = self.feed.fetch().await?;
                plan(&items, &self.ledger, &self.destinations, None)
            }
        };

        log_feed_loaded(plan.feed_total, plan.pending());
        Ok(plan)
    }

    /// 执行计划
    ///
    /// 单条导入失败只进入报告；导入记录写入失败立即返回错误。
    /// 有待导入条目的目标缺少驱动时，在导入任何内容之前返回错误。
    pub async fn execute(
        &mut self,
        plan: RunPlan,
        drivers: &[Box<dyn ImportDriver>],
    ) -> AppResult<RunReport> {
        if let Some(missing) = plan
            .destinations
            .iter()
            .find(|p| !p.pending.is_empty() && driver_for(drivers, &p.destination).is_none())
        {
            return Err(ConfigError::MissingDriver(missing.destination.clone()).into());
        }

        let mut report = RunReport::default();

        for planned in plan.destinations {
            report.skipped += planned.already_imported;
            if planned.pending.is_empty() {
                info!("[{}] ✓ 没有需要导入的文章", planned.destination);
                continue;
            }
            let Some(driver) = driver_for(drivers, &planned.destination) else {
                return Err(ConfigError::MissingDriver(planned.destination).into());
            };

            self.run_destination(driver, planned, plan.forced, &mut report)
                .await?;
        }

        Ok(report)
    }

    async fn run_destination(
        &mut self,
        driver: &dyn ImportDriver,
        planned: PlannedDestination,
        forced: bool,
        report: &mut RunReport,
    ) -> AppResult<()> {
        let dest = planned.destination;
        log_destination_start(&dest, planned.pending.len());

        if !driver.session_valid().await {
            warn!(
                "[{}] 🔒 登录状态已失效，{} 篇文章全部跳过；请运行 --login 重新登录",
                dest,
                planned.pending.len()
            );
            for item in &planned.pending {
                report.attempts.push(ImportAttempt::failure(
                    item,
                    &dest,
                    ImportFailure::SessionExpired,
                    None,
                ));
            }
            return Ok(());
        }

        let mut pending = planned.pending;
        if self.options.remote_title_dedup && !forced {
            pending = self
                .skip_already_published(driver, &dest, pending, report)
                .await?;
        }

        let total = pending.len();
        for (index, item) in pending.iter().enumerate() {
            if index > 0 && !self.options.import_delay.is_zero() {
                sleep(self.options.import_delay).await;
            }

            let ctx = ImportCtx::new(dest.as_str(), index + 1, total);
            info!("{} 📄 {}", ctx, truncate_text(&item.title, 60));
            let attempt = driver.import_item(item, &ctx).await;

            if attempt.is_success() {
                self.store.record_success(&mut self.ledger, &dest, &item.id)?;
            }
            report.attempts.push(attempt);
        }
        Ok(())
    }

    /// 平台上已有同名文章的条目直接记为已导入
    async fn skip_already_published(
        &mut self,
        driver: &dyn ImportDriver,
        dest: &str,
        pending: Vec<FeedItem>,
        report: &mut RunReport,
    ) -> AppResult<Vec<FeedItem>> {
        let published = self.matcher.normalize_all(&driver.published_titles().await);
        if published.is_empty() {
            return Ok(pending);
        }

        let mut remaining = Vec::with_capacity(pending.len());
        for item in pending {
            if self.matcher.is_already_published(&item.title, &published) {
                info!("[{}] ⏭️  平台上已有同名文章，记为已导入: {}", dest, item.title);
                self.store.record_success(&mut self.ledger, dest, &item.id)?;
                report.title_matches.push(TitleMatch {
                    destination: dest.to_string(),
                    item_id: item.id.clone(),
                });
            } else {
                remaining.push(item);
            }
        }
        Ok(remaining)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::*;
    use crate::error::{AppError, FeedError, LedgerError};
    use crate::models::ImportOutcome;
    use crate::services::{InMemoryLedgerStore, StaticFeedSource};

    /// 按条目 ID 决定成败的驱动
    struct FakeDriver {
        name: String,
        session_ok: bool,
        failing: Vec<String>,
        published: Vec<String>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl FakeDriver {
        fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                session_ok: true,
                failing: Vec::new(),
                published: Vec::new(),
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn failing(mut self, ids: &[&str]) -> Self {
            self.failing = ids.iter().map(|s| s.to_string()).collect();
            self
        }

        fn calls(&self) -> Arc<Mutex<Vec<String>>> {
            Arc::clone(&self.calls)
        }
    }

    #[async_trait]
    impl ImportDriver for FakeDriver {
        fn destination(&self) -> &str {
            &self.name
        }

        async fn session_valid(&self) -> bool {
            self.session_ok
        }

        async fn published_titles(&self) -> Vec<String> {
            self.published.clone()
        }

        async fn import_item(&self, item: &FeedItem, _ctx: &ImportCtx) -> ImportAttempt {
            self.calls.lock().unwrap().push(item.id.clone());
            if self.failing.contains(&item.id) {
                ImportAttempt::failure(item, &self.name, ImportFailure::selector("url_input"), None)
            } else {
                ImportAttempt::success(item, &self.name)
            }
        }
    }

    fn feed(ids: &[&str]) -> Vec<FeedItem> {
        ids.iter().map(|id| FeedItem::new(*id, id.to_uppercase())).collect()
    }

    fn options() -> RunOptions {
        RunOptions {
            import_delay: Duration::ZERO,
            ..RunOptions::default()
        }
    }

    fn reconciler(
        store: InMemoryLedgerStore,
        items: Vec<FeedItem>,
        options: RunOptions,
    ) -> Reconciler<InMemoryLedgerStore> {
        Reconciler::new(
            store,
            Box::new(StaticFeedSource::new(items)),
            vec!["medium".to_string()],
            options,
        )
    }

    #[test]
    fn plan_skips_ledger_entries_per_destination() {
        let mut ledger = Ledger::new();
        ledger.insert("medium", "a");
        let items = feed(&["a", "b"]);
        let dests = vec!["medium".to_string(), "substack".to_string()];

        let plan = plan(&items, &ledger, &dests, None);
        assert_eq!(plan.destinations[0].pending, feed(&["b"]));
        assert_eq!(plan.destinations[0].already_imported, 1);
        assert_eq!(plan.destinations[1].pending, feed(&["a", "b"]));
        assert_eq!(plan.pending(), 3);
    }

    #[test]
    fn forced_item_ignores_ledger() {
        let mut ledger = Ledger::new();
        ledger.insert("medium", "a");
        let items = feed(&["a", "b"]);
        let forced = items[0].clone();

        let plan = plan(&items, &ledger, &["medium".to_string()], Some(&forced));
        assert!(plan.forced);
        assert_eq!(plan.destinations[0].pending, vec![forced]);
    }

    #[test]
    fn force_target_resolution() {
        let items = feed(&["https://x/a"]);
        assert_eq!(resolve_forced_item("https://x/a", &items).unwrap().title, "HTTPS://X/A");
        assert_eq!(
            resolve_forced_item(" https://x/new ", &items).unwrap(),
            FeedItem::manual("https://x/new")
        );
        assert!(matches!(
            resolve_forced_item("post-42", &items),
            Err(ConfigError::UnknownForceTarget(id)) if id == "post-42"
        ));
    }

    struct DownFeed;

    #[async_trait]
    impl FeedSource for DownFeed {
        async fn fetch(&self) -> Result<Vec<FeedItem>, FeedError> {
            Err(FeedError::BadStatus {
                url: "https://x/feed.xml".to_string(),
                status: 502,
            })
        }
    }

    #[tokio::test]
    async fn unavailable_feed_is_fatal_before_any_side_effect() {
        let mut ledger = Ledger::new();
        ledger.insert("medium", "a");
        let mut rec = Reconciler::new(
            InMemoryLedgerStore::with_ledger(ledger.clone()),
            Box::new(DownFeed),
            vec!["medium".to_string()],
            options(),
        );

        let err = rec.prepare().await.unwrap_err();
        assert!(matches!(err, AppError::FeedUnavailable(FeedError::BadStatus { status: 502, .. })));

        let store = rec.into_store();
        assert_eq!(store.persist_count(), 0);
        assert_eq!(store.persisted(), Some(&ledger));
    }

    #[tokio::test]
    async fn pending_destination_without_driver_is_an_error() {
        let mut rec = Reconciler::new(
            InMemoryLedgerStore::new(),
            Box::new(StaticFeedSource::new(feed(&["a"]))),
            vec!["medium".to_string(), "substack".to_string()],
            options(),
        );
        let medium = FakeDriver::new("medium");
        let calls = medium.calls();
        let drivers: Vec<Box<dyn ImportDriver>> = vec![Box::new(medium)];

        let plan = rec.prepare().await.unwrap();
        let err = rec.execute(plan, &drivers).await.unwrap_err();

        assert!(matches!(err, AppError::Config(ConfigError::MissingDriver(d)) if d == "substack"));
        assert!(calls.lock().unwrap().is_empty());
        assert!(rec.ledger().is_empty());
    }

    #[tokio::test]
    async fn partial_failure_records_only_successes() {
        let mut ledger = Ledger::new();
        ledger.insert("medium", "a");
        let store = InMemoryLedgerStore::with_ledger(ledger);
        let mut rec = reconciler(store, feed(&["a", "b", "c"]), options());
        let driver: Box<dyn ImportDriver> = Box::new(FakeDriver::new("medium").failing(&["c"]));

        let plan = rec.prepare().await.unwrap();
        let report = rec.execute(plan, &[driver]).await.unwrap();

        assert_eq!(rec.ledger().ids("medium"), ["a".to_string(), "b".to_string()]);
        assert_eq!(report.imported(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.outcome(), RunOutcome::Degraded);
        assert_eq!(rec.into_store().persisted().unwrap().ids("medium").len(), 2);
    }

    #[tokio::test]
    async fn expired_session_fails_every_item_without_importing() {
        let store = InMemoryLedgerStore::new();
        let mut rec = reconciler(store, feed(&["a", "b"]), options());
        let mut driver = FakeDriver::new("medium");
        driver.session_ok = false;
        let calls = driver.calls();
        let driver: Box<dyn ImportDriver> = Box::new(driver);

        let plan = rec.prepare().await.unwrap();
        let report = rec.execute(plan, &[driver]).await.unwrap();

        assert!(calls.lock().unwrap().is_empty());
        assert_eq!(report.failed(), 2);
        assert!(report
            .attempts
            .iter()
            .all(|a| a.outcome == ImportOutcome::Failure(ImportFailure::SessionExpired)));
        assert!(rec.ledger().is_empty());
    }

    #[tokio::test]
    async fn persist_failure_aborts_run() {
        let mut store = InMemoryLedgerStore::new();
        store.fail_persists(true);
        let mut rec = reconciler(store, feed(&["a", "b"]), options());
        let driver: Box<dyn ImportDriver> = Box::new(FakeDriver::new("medium"));

        let plan = rec.prepare().await.unwrap();
        let err = rec.execute(plan, &[driver]).await.unwrap_err();

        assert!(matches!(err, AppError::Ledger(LedgerError::PersistFailed { .. })));
        assert!(rec.ledger().is_empty());
    }

    #[tokio::test]
    async fn published_titles_are_recorded_without_import() {
        let store = InMemoryLedgerStore::new();
        let items = vec![
            FeedItem::new("https://x/a", "Async Rust in Practice - a developer's story"),
            FeedItem::new("https://x/b", "Something New"),
        ];
        let mut rec = reconciler(store, items, options());
        let mut driver = FakeDriver::new("medium");
        driver.published = vec!["Async Rust in Practice".to_string()];
        let driver: Box<dyn ImportDriver> = Box::new(driver);

        let plan = rec.prepare().await.unwrap();
        let report = rec.execute(plan, &[driver]).await.unwrap();

        assert_eq!(
            report.title_matches,
            vec![TitleMatch {
                destination: "medium".to_string(),
                item_id: "https://x/a".to_string()
            }]
        );
        assert_eq!(report.imported(), 1);
        assert_eq!(
            rec.ledger().ids("medium"),
            ["https://x/a".to_string(), "https://x/b".to_string()]
        );
    }

    #[tokio::test]
    async fn forced_url_skips_feed_and_title_dedup() {
        let mut ledger = Ledger::new();
        ledger.insert("medium", "https://x/a");
        let store = InMemoryLedgerStore::with_ledger(ledger);
        let force = RunOptions {
            force: Some("https://x/a".to_string()),
            ..options()
        };
        // 订阅源为空：强制 URL 不需要订阅源
        let mut rec = reconciler(store, Vec::new(), force);
        let mut driver = FakeDriver::new("medium");
        driver.published = vec!["Manual Import".to_string()];
        let driver: Box<dyn ImportDriver> = Box::new(driver);

        let plan = rec.prepare().await.unwrap();
        assert_eq!(plan.pending(), 1);
        let report = rec.execute(plan, &[driver]).await.unwrap();

        assert_eq!(report.imported(), 1);
        assert!(report.title_matches.is_empty());
        assert_eq!(rec.ledger().ids("medium"), ["https://x/a".to_string()]);
    }
}
