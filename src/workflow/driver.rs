//! 目标平台驱动 - 流程层
//!
//! 核心职责：把"一篇文章导入到一个平台"封装成一次调用，
//! 任何失败都变成 [`ImportAttempt`] 中的数据，不会越过驱动边界。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::browser::SessionManager;
use crate::config::{Config, DestinationConfig, DestinationKind};
use crate::error::ImportFailure;
use crate::infrastructure::{resolve, Locator, PageOps, Unresolved};
use crate::models::{FeedItem, ImportAttempt};
use crate::services::{ArtifactWriter, TopicSource};
use crate::utils::truncate_text;
use crate::workflow::import_ctx::ImportCtx;
use crate::workflow::medium::MediumDriver;
use crate::workflow::substack::SubstackDriver;

/// 目标平台驱动
#[async_trait]
pub trait ImportDriver: Send + Sync {
    /// 导入记录中的平台名称
    fn destination(&self) -> &str;

    /// 登录状态是否有效
    async fn session_valid(&self) -> bool;

    /// 平台上已发布文章的标题（尽力而为，失败返回空列表）
    async fn published_titles(&self) -> Vec<String>;

    /// 导入单篇文章；不修改导入记录
    async fn import_item(&self, item: &FeedItem, ctx: &ImportCtx) -> ImportAttempt;
}

/// 流程中各类等待的上限
#[derive(Debug, Clone, Copy)]
pub struct FlowTimeouts {
    pub navigation: Duration,
    pub import: Duration,
    pub selector: Duration,
    pub settle: Duration,
}

impl FlowTimeouts {
    pub fn from_config(config: &Config) -> Self {
        Self {
            navigation: config.nav_timeout,
            import: config.import_timeout,
            selector: config.selector_timeout,
            settle: config.settle_delay,
        }
    }
}

/// 驱动共享的服务
#[derive(Clone)]
pub struct DriverServices {
    pub timeouts: FlowTimeouts,
    pub artifacts: Arc<ArtifactWriter>,
    pub topics: Arc<dyn TopicSource>,
}

/// 按平台类型构建驱动
pub fn build_driver(
    dest: DestinationConfig,
    page: Arc<dyn PageOps>,
    services: &DriverServices,
) -> Box<dyn ImportDriver> {
    match dest.kind {
        DestinationKind::Medium => Box::new(MediumDriver::new(dest, page, services.clone())),
        DestinationKind::Substack => Box::new(SubstackDriver::new(dest, page, services.clone())),
    }
}

/// 页面上的一步步操作，失败统一转换为 [`ImportFailure`]
pub(crate) struct PageSteps<'a> {
    page: &'a dyn PageOps,
    dest: &'a DestinationConfig,
    timeouts: FlowTimeouts,
}

impl<'a> PageSteps<'a> {
    pub fn new(page: &'a dyn PageOps, dest: &'a DestinationConfig, timeouts: FlowTimeouts) -> Self {
        Self {
            page,
            dest,
            timeouts,
        }
    }

    pub fn page(&self) -> &'a dyn PageOps {
        self.page
    }

    /// 打开导入页并确认仍处于登录状态
    pub async fn open_import_page(&self) -> Result<(), ImportFailure> {
        let url = &self.dest.import_url;
        match tokio::time::timeout(self.timeouts.navigation, self.page.goto(url)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!("[{}] 导航失败: {:#}", self.dest.name, e);
                return Err(ImportFailure::NavigationTimeout { url: url.clone() });
            }
            Err(_) => return Err(ImportFailure::NavigationTimeout { url: url.clone() }),
        }

        let landed = self.page.current_url().await.unwrap_or_default();
        if self.dest.is_signin_url(&landed) {
            return Err(ImportFailure::SessionExpired);
        }
        Ok(())
    }

    /// 解析步骤的选择器链，保留原始的未解析信息
    pub async fn locate(&self, step: &str, wait: Duration) -> Result<Locator, Unresolved> {
        resolve(self.page, step, &self.dest.chain(step), wait).await
    }

    /// 解析步骤的选择器链
    pub async fn find(&self, step: &str, wait: Duration) -> Result<Locator, ImportFailure> {
        self.locate(step, wait)
            .await
            .map_err(|u| ImportFailure::selector(u.step))
    }

    /// 元素是否在限定时间内出现
    pub async fn appears(&self, step: &str, wait: Duration) -> bool {
        self.locate(step, wait).await.is_ok()
    }

    /// 点击已解析的元素
    pub async fn click_located(&self, step: &str, locator: &Locator) -> Result<(), ImportFailure> {
        self.page.click(locator).await.map_err(|e| {
            error!("[{}] 点击 {} ({}) 失败: {:#}", self.dest.name, step, locator, e);
            ImportFailure::selector(step)
        })
    }

    /// 解析并点击
    pub async fn click(&self, step: &str) -> Result<(), ImportFailure> {
        self.click_within(step, self.timeouts.selector).await
    }

    pub async fn click_within(&self, step: &str, wait: Duration) -> Result<(), ImportFailure> {
        let locator = self.find(step, wait).await?;
        self.click_located(step, &locator).await
    }

    /// 解析后清空并输入文本
    pub async fn type_into(&self, step: &str, text: &str) -> Result<(), ImportFailure> {
        let locator = self.find(step, self.timeouts.selector).await?;
        self.page.type_text(&locator, text).await.map_err(|e| {
            error!("[{}] 向 {} 输入失败: {:#}", self.dest.name, step, e);
            ImportFailure::selector(step)
        })
    }

    pub async fn press(&self, key: &str) {
        if let Err(e) = self.page.press_key(key).await {
            warn!("[{}] 按键 {} 失败: {:#}", self.dest.name, key, e);
        }
    }
}

/// 把流程结果整理为导入尝试；失败时保存现场
pub(crate) async fn finish_attempt(
    page: &dyn PageOps,
    artifacts: &ArtifactWriter,
    dest: &DestinationConfig,
    item: &FeedItem,
    ctx: &ImportCtx,
    result: Result<(), ImportFailure>,
) -> ImportAttempt {
    match result {
        Ok(()) => {
            info!("{} ✅ 导入成功: {}", ctx, truncate_text(&item.title, 60));
            ImportAttempt::success(item, &dest.name)
        }
        Err(failure) => {
            error!("{} ❌ 导入失败: {} ({})", ctx, failure, item.url);
            let artifact = artifacts.capture(page, &dest.name, item, &failure).await;
            ImportAttempt::failure(item, &dest.name, failure, artifact)
        }
    }
}

/// 登录检查（两个驱动共用）
pub(crate) async fn check_session(
    page: &Arc<dyn PageOps>,
    dest: &DestinationConfig,
    timeouts: FlowTimeouts,
) -> bool {
    SessionManager::new(Arc::clone(page), timeouts.navigation)
        .is_valid(dest)
        .await
}

/// 导航到已发布列表页（标题去重用），失败返回 false
pub(crate) async fn open_published_page(
    page: &dyn PageOps,
    dest: &DestinationConfig,
    timeouts: FlowTimeouts,
) -> bool {
    match tokio::time::timeout(timeouts.navigation, page.goto(&dest.published_url)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!("[{}] 打开已发布列表失败: {:#}", dest.name, e);
            false
        }
        Err(_) => {
            warn!("[{}] 打开已发布列表超时", dest.name);
            false
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::services::StaticTopics;

    pub fn services(artifact_dir: &std::path::Path) -> DriverServices {
        DriverServices {
            timeouts: FlowTimeouts {
                navigation: Duration::from_secs(30),
                import: Duration::from_secs(60),
                selector: Duration::from_secs(10),
                settle: Duration::from_secs(10),
            },
            artifacts: Arc::new(ArtifactWriter::with_dir(artifact_dir)),
            topics: Arc::new(StaticTopics(vec!["Rust".to_string(), "Tokio".to_string()])),
        }
    }
}
