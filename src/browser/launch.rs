use std::path::Path;

use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::error::BrowserError;

const VIEWPORT_WIDTH: u32 = 1280;
const VIEWPORT_HEIGHT: u32 = 900;

/// 以持久化配置目录启动浏览器
///
/// 登录状态保存在 `browser_data_dir` 中，下次启动时复用。
pub async fn launch_persistent_browser(
    config: &Config,
) -> Result<(Browser, Page, JoinHandle<()>), BrowserError> {
    info!(
        "🚀 启动浏览器 ({}模式)...",
        if config.headless { "无头" } else { "有界面" }
    );
    debug!("配置目录: {}", config.browser_data_dir.display());

    std::fs::create_dir_all(&config.browser_data_dir).map_err(|e| {
        BrowserError::ConfigurationFailed(format!(
            "无法创建配置目录 {}: {}",
            config.browser_data_dir.display(),
            e
        ))
    })?;

    let mut builder = BrowserConfig::builder()
        .user_data_dir(&config.browser_data_dir)
        .window_size(VIEWPORT_WIDTH, VIEWPORT_HEIGHT)
        .viewport(Viewport {
            width: VIEWPORT_WIDTH,
            height: VIEWPORT_HEIGHT,
            ..Default::default()
        })
        .args(vec![
            "--disable-blink-features=AutomationControlled", // 降低被识别为自动化的概率
            "--no-first-run",
            "--disable-dev-shm-usage", // 防止共享内存不足
        ]);

    builder = if config.headless {
        builder.new_headless_mode()
    } else {
        builder.with_head()
    };
    if let Some(executable) = &config.chrome_executable {
        builder = builder.chrome_executable(Path::new(executable));
    }

    let browser_config = builder.build().map_err(|e| {
        error!("配置浏览器失败: {}", e);
        BrowserError::ConfigurationFailed(e)
    })?;

    let (browser, mut handler) = Browser::launch(browser_config).await.map_err(|source| {
        error!("启动浏览器失败: {}", source);
        BrowserError::LaunchFailed { source }
    })?;
    debug!("浏览器启动成功");

    // 在后台处理浏览器事件
    let events = tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // 添加短暂延迟以等待浏览器状态同步
    sleep(tokio::time::Duration::from_millis(300)).await;

    let page = browser.new_page("about:blank").await.map_err(|source| {
        error!("创建页面失败: {}", source);
        BrowserError::PageCreationFailed { source }
    })?;

    info!("✅ 浏览器已就绪");
    Ok((browser, page, events))
}
