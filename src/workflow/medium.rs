//! Medium 导入流程 - 流程层
//!
//! 流程顺序：
//! 1. 打开导入页（被重定向到登录页 → 登录失效）
//! 2. 输入文章 URL → 点击 Import
//! 3. 等待 "See your story"
//! 4. 发布：打开草稿 → Publish → 填写话题 → 确认发布（失败只记警告）

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

/// 已发布列表最多滚动次数（无限滚动加载）
const MAX_SCROLLS: usize = 20;
const SCROLL_PAUSE: Duration = Duration::from_secs(2);
const SHORT_PAUSE: Duration = Duration::from_secs(2);

/// 统计当前标题数量后滚动到底部
const SCROLL_AND_COUNT_JS: &str = r#"
(() => {
    const count = document.querySelectorAll('h2, h3').length;
    window.scrollTo(0, document.body.scrollHeight);
    return count;
})()
"#;

const COLLECT_TITLES_JS: &str = r#"
(() => Array.from(document.querySelectorAll('h2, h3'))
    .map(h => (h.textContent || '').trim())
    .filter(t => t.length > 0))()
"#;

/// Medium 默认选择器
pub fn default_selectors() -> BTreeMap<String, SelectorChain> {
    let mut selectors = BTreeMap::new();
    selectors.insert(
        "url_input".to_string(),
        SelectorChain::new(vec![
            Locator::css(".js-importUrl"),
            Locator::css(r#"[contenteditable][data-default-value*="yoursite"]"#),
            Locator::css(r#"input[type="url"]"#),
            Locator::first_of(r#"[contenteditable="true"]"#),
        ]),
    );
    selectors.insert(
        "import_button".to_string(),
        SelectorChain::new(vec![
            Locator::css(r#"button[data-action="import-url"]"#),
            Locator::text("button", "Import"),
            Locator::css(r#"button[type="submit"]"#),
            Locator::first_of("form button"),
        ]),
    );
    selectors.insert(
        "see_story".to_string(),
        SelectorChain::new(vec![Locator::text("button", "See your story")]),
    );
    selectors.insert(
        "publish_button".to_string(),
        SelectorChain::new(vec![
            Locator::Text {
                text: "Publish".to_string(),
                tag: Some("button".to_string()),
                exact: true,
            },
            Locator::first_of(r#"button[data-action="show-prepublish"]"#),
        ]),
    );
    selectors.insert(
        "topic_input".to_string(),
        SelectorChain::new(vec![
            Locator::css(".js-tagInput"),
            Locator::css(r#"[data-testid="publishTopicsInput"]"#),
        ]),
    );
    selectors.insert(
        "publish_confirm".to_string(),
        SelectorChain::new(vec![
            Locator::text("button", "Publish and send now"),
            Locator::text("button", "Publish now"),
        ]),
    );
    selectors
}

/// Medium 驱动
pub struct MediumDriver {
    dest: DestinationConfig,
    page: Arc<dyn PageOps>,
    services: DriverServices,
}

impl MediumDriver {
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
        steps.click("import_button").await?;
        info!("{} 已点击 Import，等待导入完成...", ctx);

        let see_story = match steps.find("see_story", timeouts.import).await {
            Ok(locator) => locator,
            Err(_) if self.dest.timeout_is_success => {
                warn!("{} ⚠️ 未出现 'See your story'，导入可能仍在处理中，按成功处理", ctx);
                return Ok(());
            }
            Err(_) => {
                return Err(ImportFailure::rejected("导入完成标志未出现"));
            }
        };

        if self.dest.publish {
            if let Err(failure) = self.publish(&steps, &see_story, item, ctx).await {
                // 草稿已存在，重复导入会产生重复文章
                warn!("{} ⚠️ 发布步骤未完成: {}，草稿已保留", ctx, failure);
            }
        }
        Ok(())
    }

    async fn publish(
        &self,
        steps: &PageSteps<'_>,
        see_story: &Locator,
        item: &FeedItem,
        ctx: &ImportCtx,
    ) -> Result<(), ImportFailure> {
        let timeouts = self.services.timeouts;

        steps.click_located("see_story", see_story).await?;
        sleep(timeouts.settle).await;
        steps.press("Escape").await;
        sleep(SHORT_PAUSE).await;

        steps.click("publish_button").await?;
        info!("{} 已打开发布对话框", ctx);

        let topics = self.services.topics.topics_for(&item.url).await;
        match steps.find("topic_input", timeouts.selector).await {
            Ok(input) => {
                for topic in &topics {
                    if let Err(e) = steps.page().type_text(&input, topic).await {
                        warn!("{} 添加话题 {} 失败: {:#}", ctx, topic, e);
                        continue;
                    }
                    steps.press("Enter").await;
                }
                info!("{} 已添加话题: {:?}", ctx, topics);
            }
            Err(_) => warn!("{} 找不到话题输入框，跳过话题", ctx),
        }

        steps.click("publish_confirm").await?;
        info!("{} 🚀 已发布", ctx);
        sleep(SHORT_PAUSE).await;
        Ok(())
    }
}

#[async_trait]
impl ImportDriver for MediumDriver {
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
        sleep(SHORT_PAUSE).await;

        let mut previous = None;
        for _ in 0..MAX_SCROLLS {
            let count = match page.eval(SCROLL_AND_COUNT_JS).await {
                Ok(value) => value.as_u64(),
                Err(e) => {
                    warn!("[{}] 滚动已发布列表失败: {:#}", self.dest.name, e);
                    break;
                }
            };
            if count.is_none() || count == previous {
                break;
            }
            previous = count;
            sleep(SCROLL_PAUSE).await;
        }

        let titles: Vec<String> = match page.eval(COLLECT_TITLES_JS).await {
            Ok(value) => serde_json::from_value(value).unwrap_or_default(),
            Err(e) => {
                warn!("[{}] 读取已发布标题失败: {:#}", self.dest.name, e);
                Vec::new()
            }
        };
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

    const ITEM_URL: &str = "https://blog.example.com/rust-feeds";

    fn setup(publish: bool) -> (Arc<ScriptedPage>, MediumDriver, tempfile::TempDir) {
        let page = Arc::new(ScriptedPage::new());
        let mut dest = DestinationKind::Medium.default_config();
        dest.publish = publish;
        let dir = tempfile::tempdir().unwrap();
        let driver = MediumDriver::new(dest, page.clone(), services(dir.path()));
        (page, driver, dir)
    }

    fn item() -> FeedItem {
        FeedItem::new(ITEM_URL, "Rust Feeds")
    }

    #[tokio::test(start_paused = true)]
    async fn import_and_publish() {
        let (page, driver, _dir) = setup(true);
        page.set_probe(&Locator::css(".js-importUrl"), Probe::actionable(1));
        page.set_probe(&Locator::text("button", "Import"), Probe::actionable(1));
        page.set_probe_sequence(
            &Locator::text("button", "See your story"),
            vec![Probe::default(), Probe::default(), Probe::actionable(1)],
        );
        let publish = driver.dest.chain("publish_button").locators()[0].clone();
        page.set_probe(&publish, Probe::actionable(1));
        page.set_probe(&Locator::css(".js-tagInput"), Probe::actionable(1));
        page.set_probe(&Locator::text("button", "Publish now"), Probe::actionable(1));

        let attempt = driver.import_item(&item(), &ImportCtx::new("medium", 1, 1)).await;
        assert!(attempt.is_success());

        let actions = page.actions();
        assert_eq!(actions[0], "goto https://medium.com/p/import");
        assert!(actions.contains(&format!("type css=.js-importUrl <- {}", ITEM_URL)));
        assert!(actions.contains(&"click button:has-text(\"Import\")".to_string()));
        assert!(actions.contains(&"key Escape".to_string()));
        assert!(actions.contains(&"type css=.js-tagInput <- Rust".to_string()));
        assert!(actions.contains(&"type css=.js-tagInput <- Tokio".to_string()));
        assert_eq!(actions.last().unwrap(), "click button:has-text(\"Publish now\")");
    }

    #[tokio::test(start_paused = true)]
    async fn missing_completion_marker_counts_as_success_by_default() {
        let (page, driver, _dir) = setup(true);
        page.set_probe(&Locator::css(".js-importUrl"), Probe::actionable(1));
        page.set_probe(&Locator::text("button", "Import"), Probe::actionable(1));

        let attempt = driver.import_item(&item(), &ImportCtx::new("medium", 1, 1)).await;
        assert!(attempt.is_success());
        assert!(!page.actions().iter().any(|a| a.contains("Escape")));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_completion_marker_fails_when_configured() {
        let (page, mut driver, _dir) = setup(false);
        driver.dest.timeout_is_success = false;
        page.set_probe(&Locator::css(".js-importUrl"), Probe::actionable(1));
        page.set_probe(&Locator::text("button", "Import"), Probe::actionable(1));

        let attempt = driver.import_item(&item(), &ImportCtx::new("medium", 1, 1)).await;
        assert!(matches!(
            attempt.outcome,
            ImportOutcome::Failure(ImportFailure::SubmissionRejected { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn publish_failure_is_only_a_warning() {
        let (page, driver, _dir) = setup(true);
        page.set_probe(&Locator::css(".js-importUrl"), Probe::actionable(1));
        page.set_probe(&Locator::text("button", "Import"), Probe::actionable(1));
        page.set_probe(&Locator::text("button", "See your story"), Probe::actionable(1));

        let attempt = driver.import_item(&item(), &ImportCtx::new("medium", 1, 1)).await;
        assert!(attempt.is_success());
        assert!(attempt.artifact.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn signin_redirect_is_session_expired() {
        let (page, driver, _dir) = setup(false);
        page.redirect("https://medium.com/p/import", "https://medium.com/m/signin");

        let attempt = driver.import_item(&item(), &ImportCtx::new("medium", 1, 1)).await;
        assert_eq!(attempt.outcome, ImportOutcome::Failure(ImportFailure::SessionExpired));
    }

    #[tokio::test(start_paused = true)]
    async fn unresolved_input_captures_artifact() {
        let (_page, driver, dir) = setup(false);

        let attempt = driver.import_item(&item(), &ImportCtx::new("medium", 1, 1)).await;
        assert_eq!(
            attempt.outcome,
            ImportOutcome::Failure(ImportFailure::selector("url_input"))
        );
        let artifact = attempt.artifact.unwrap();
        assert!(artifact.starts_with(dir.path()));
        assert!(artifact.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_timeout() {
        let (page, driver, _dir) = setup(false);
        page.hang_on("https://medium.com/p/import");

        let attempt = driver.import_item(&item(), &ImportCtx::new("medium", 1, 1)).await;
        assert_eq!(
            attempt.outcome,
            ImportOutcome::Failure(ImportFailure::NavigationTimeout {
                url: "https://medium.com/p/import".to_string()
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn published_titles_scroll_until_stable() {
        let (page, driver, _dir) = setup(false);
        page.push_eval_result(json!(3));
        page.push_eval_result(json!(7));
        page.push_eval_result(json!(7));
        page.push_eval_result(json!(["First Story", "Second Story"]));

        let titles = driver.published_titles().await;
        assert_eq!(titles, vec!["First Story", "Second Story"]);
        assert_eq!(
            page.actions(),
            vec!["goto https://medium.com/me/stories?tab=posts-published"]
        );
    }
}
