//! Substack 导入流程 - 流程层
//!
//! 流程顺序：
//! 1. 打开导入页（被重定向到登录页 → 登录失效）
//! 2. 输入文章 URL → 等待 "Get started" 可用并点击
//! 3. 等待 "Import" 并点击
//! 4. 出现所有权确认对话框时勾选并点击 Next

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::DestinationConfig;
use crate::error::ImportFailure;
use crate::infrastructure::{Locator, PageOps, SelectorChain};
use crate::models::{FeedItem, ImportAttempt};
use crate::workflow::driver::{
    check_session, finish_attempt, open_published_page, DriverServices, ImportDriver, PageSteps,
};
use crate::workflow::import_ctx::ImportCtx;

/// 解析订阅源后 Import 按钮出现的等待上限
const IMPORT_BUTTON_WAIT: Duration = Duration::from_secs(30);
const OWNERSHIP_DIALOG_WAIT: Duration = Duration::from_secs(10);
const NEXT_BUTTON_WAIT: Duration = Duration::from_secs(5);
const PAGE_PAUSE: Duration = Duration::from_secs(3);
/// 已发布列表最多翻页次数
const MAX_PAGES: usize = 50;

/// 帖子链接文本形如 "标题 12 Mar • 作者"，去掉日期后缀
const COLLECT_TITLES_JS: &str = r#"
(() => Array.from(document.querySelectorAll('a[href*="/publish/posts/detail/"]'))
    .map(a => (a.textContent || '').trim())
    .filter(t => t.length > 5)
    .map(t => {
        const m = t.match(/^(.+?)\d{1,2}\s+(Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)\s+•/);
        return m ? m[1].trim() : t;
    }))()
"#;

/// 有下一页时点击并返回 true
const NEXT_PAGE_JS: &str = r#"
(() => {
    const btn = document.querySelector('button[aria-label="Chevron Right"]');
    if (!btn || btn.disabled) return false;
    btn.click();
    return true;
})()
"#;

/// Substack 默认选择器
pub fn default_selectors() -> BTreeMap<String, SelectorChain> {
    let mut selectors = BTreeMap::new();
    selectors.insert(
        "url_input".to_string(),
        SelectorChain::new(vec![
            Locator::css(r#"input[type="url"]"#),
            Locator::css(r#"input[type="text"]"#),
            Locator::css(
                r#"input[placeholder*="URL"], input[placeholder*="url"], input[placeholder*="link"], input[placeholder*="paste"]"#,
            ),
            Locator::first_of("input"),
        ]),
    );
    selectors.insert(
        "get_started".to_string(),
        SelectorChain::new(vec![
            Locator::text("button", "Get started"),
            Locator::css(r#"button[type="submit"]"#),
            Locator::first_of("form button"),
        ]),
    );
    selectors.insert(
        "import_button".to_string(),
        SelectorChain::new(vec![Locator::text("button", "Import")]),
    );
    selectors.insert(
        "ownership_dialog".to_string(),
        SelectorChain::new(vec![Locator::any_text("Confirm Ownership")]),
    );
    selectors.insert(
        "ownership_checkbox".to_string(),
        SelectorChain::new(vec![
            Locator::css(r#"button[role="checkbox"][aria-label*="Yes, this is my publication"]"#),
            Locator::first_of(r#"button[role="checkbox"]"#),
        ]),
    );
    selectors.insert(
        "next_button".to_string(),
        SelectorChain::new(vec![Locator::text("button", "Next")]),
    );
    selectors
}

/// Substack 驱动
pub struct SubstackDriver {
    dest: DestinationConfig,
    page: Arc<dyn PageOps>,
    services: DriverServices,
}

impl SubstackDriver {
    pub fn new(dest: DestinationConfig, page: Arc<dyn PageOps>, services: DriverServices) -> Self {
        Self {
            dest,
            page,
            services,
        }
    }

    async fn run(&self, item: &FeedItem, ctx: &ImportCtx) -> Result<(), ImportFailure> {
        let timeouts = self.services.timeouts;
        let steps = PageSteps::new(self.page.as_ref(), &self.dest, timeouts);

        debug!("{} 打开导入页...", ctx);
        steps.open_import_page().await?;

        steps.type_into("url_input", &item.url).await?;
        debug!("{} 已输入 URL: {}", ctx, item.url);

        // 平台异步校验 URL，按钮可用前处于禁用状态
        let get_started = match steps.locate("get_started", timeouts.selector).await {
            Ok(locator) => locator,
            Err(unresolved) if unresolved.seen_inactionable => {
                return Err(ImportFailure::rejected("URL rejected"));
            }
            Err(unresolved) => return Err(ImportFailure::selector(unresolved.step)),
        };
        steps.click_located("get_started", &get_started).await?;
        info!("{} 已点击 Get started，等待解析...", ctx);

        steps.click_within("import_button", IMPORT_BUTTON_WAIT).await?;
        info!("{} 已点击 Import", ctx);

        if steps.appears("ownership_dialog", OWNERSHIP_DIALOG_WAIT).await {
            info!("{} 出现所有权确认对话框", ctx);
            if let Err(failure) = steps.click("ownership_checkbox").await {
                warn!("{} 勾选所有权确认失败: {}", ctx, failure);
            }
            match steps.click_within("next_button", NEXT_BUTTON_WAIT).await {
                Ok(()) => debug!("{} 已点击 Next", ctx),
                Err(failure) => warn!("{} 点击 Next 失败: {}", ctx, failure),
            }
        } else {
            debug!("{} 没有所有权确认对话框", ctx);
        }

        sleep(timeouts.settle).await;
        Ok(())
    }
}

#[async_trait]
impl ImportDriver for SubstackDriver {
    fn destination(&self) -> &str {
        &self.dest.name
    }

    async fn session_valid(&self) -> bool {
        check_session(&self.page, &self.dest, self.services.timeouts).await
    }

    async fn published_titles(&self) -> Vec<String> {
        let page = self.page.as_ref();
        if !open_published_page(page, &self.dest, self.services.timeouts).await {
            return Vec::new();
        }
        sleep(PAGE_PAUSE).await;

        let mut titles = Vec::new();
        for _ in 0..MAX_PAGES {
            match page.eval(COLLECT_TITLES_JS).await {
                Ok(value) => {
                    let batch: Vec<String> = serde_json::from_value(value).unwrap_or_default();
                    titles.extend(batch);
                }
                Err(e) => {
                    warn!("[{}] 读取已发布标题失败: {:#}", self.dest.name, e);
                    break;
                }
            }

            let has_next = matches!(page.eval(NEXT_PAGE_JS).await, Ok(serde_json::Value::Bool(true)));
            if !has_next {
                break;
            }
            sleep(PAGE_PAUSE).await;
        }

        info!("[{}] 找到 {} 篇已发布文章用于去重", self.dest.name, titles.len());
        titles
    }

    async fn import_item(&self, item: &FeedItem, ctx: &ImportCtx) -> ImportAttempt {
        let result = self.run(item, ctx).await;
        finish_attempt(
            self.page.as_ref(),
            &self.services.artifacts,
            &self.dest,
            item,
            ctx,
            result,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DestinationKind;
    use crate::infrastructure::testing::ScriptedPage;
    use crate::infrastructure::Probe;
    use crate::models::ImportOutcome;
    use crate::workflow::driver::test_support::services;
    use serde_json::json;

    const IMPORT_URL: &str = "https://pominaus.substack.com/publish/import";
    const ITEM_URL: &str = "https://blog.example.com/tokio-tips";

    fn setup() -> (Arc<ScriptedPage>, SubstackDriver, tempfile::TempDir) {
        let page = Arc::new(ScriptedPage::new());
        let dest = DestinationKind::Substack.default_config();
        let dir = tempfile::tempdir().unwrap();
        let driver = SubstackDriver::new(dest, page.clone(), services(dir.path()));
        (page, driver, dir)
    }

    fn item() -> FeedItem {
        FeedItem::new(ITEM_URL, "Tokio Tips")
    }

    fn ready_form(page: &ScriptedPage) {
        page.set_probe(&Locator::css(r#"input[type="url"]"#), Probe::actionable(1));
        page.set_probe(&Locator::text("button", "Get started"), Probe::actionable(1));
        page.set_probe(&Locator::text("button", "Import"), Probe::actionable(1));
    }

    #[tokio::test(start_paused = true)]
    async fn import_with_ownership_dialog() {
        let (page, driver, _dir) = setup();
        ready_form(&page);
        page.set_probe(&Locator::any_text("Confirm Ownership"), Probe::actionable(1));
        page.set_probe(
            &Locator::first_of(r#"button[role="checkbox"]"#),
            Probe::actionable(1),
        );
        page.set_probe_sequence(
            &Locator::text("button", "Next"),
            vec![Probe { present: 1, actionable: 0 }, Probe::actionable(1)],
        );

        let attempt = driver.import_item(&item(), &ImportCtx::new("substack", 1, 1)).await;
        assert!(attempt.is_success());
        assert_eq!(
            page.actions(),
            vec![
                format!("goto {}", IMPORT_URL),
                format!("type css=input[type=\"url\"] <- {}", ITEM_URL),
                "click button:has-text(\"Get started\")".to_string(),
                "click button:has-text(\"Import\")".to_string(),
                "click first-of=button[role=\"checkbox\"]".to_string(),
                "click button:has-text(\"Next\")".to_string(),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn import_without_ownership_dialog() {
        let (page, driver, _dir) = setup();
        ready_form(&page);

        let attempt = driver.import_item(&item(), &ImportCtx::new("substack", 1, 1)).await;
        assert!(attempt.is_success());
        assert!(!page.actions().iter().any(|a| a.contains("Next")));
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_get_started_means_rejected_url() {
        let (page, driver, _dir) = setup();
        page.set_probe(&Locator::css(r#"input[type="url"]"#), Probe::actionable(1));
        page.set_probe(
            &Locator::text("button", "Get started"),
            Probe { present: 1, actionable: 0 },
        );

        let attempt = driver.import_item(&item(), &ImportCtx::new("substack", 1, 1)).await;
        assert_eq!(
            attempt.outcome,
            ImportOutcome::Failure(ImportFailure::rejected("URL rejected"))
        );
        assert!(attempt.artifact.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn missing_get_started_is_selector_failure() {
        let (page, driver, _dir) = setup();
        page.set_probe(&Locator::css(r#"input[type="url"]"#), Probe::actionable(1));

        let attempt = driver.import_item(&item(), &ImportCtx::new("substack", 1, 1)).await;
        assert_eq!(
            attempt.outcome,
            ImportOutcome::Failure(ImportFailure::selector("get_started"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn signin_markers_detect_expired_session() {
        let (page, driver, _dir) = setup();
        page.redirect(IMPORT_URL, "https://substack.com/sign-in?next=%2Fpublish");

        assert!(!driver.session_valid().await);
        let attempt = driver.import_item(&item(), &ImportCtx::new("substack", 1, 1)).await;
        assert_eq!(attempt.outcome, ImportOutcome::Failure(ImportFailure::SessionExpired));
    }

    #[tokio::test(start_paused = true)]
    async fn published_titles_follow_pagination() {
        let (page, driver, _dir) = setup();
        page.push_eval_result(json!(["Tokio Tips", "Rust Feeds"]));
        page.push_eval_result(json!(true));
        page.push_eval_result(json!(["Older Post"]));
        page.push_eval_result(json!(false));

        let titles = driver.published_titles().await;
        assert_eq!(titles, vec!["Tokio Tips", "Rust Feeds", "Older Post"]);
    }
}
