use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::error::BrowserError;

/// 连接到已运行的浏览器（需以 `--remote-debugging-port` 启动）并获取页面
///
/// 优先复用已打开的第一个普通页面，没有时新建空白页。
pub async fn connect_to_browser_and_page(
    port: u16,
) -> Result<(Browser, Page, JoinHandle<()>), BrowserError> {
    let browser_url = format!("http://localhost:{}", port);
    info!("正在连接到浏览器: {}", browser_url);

    let (browser, mut handler) = Browser::connect(&browser_url).await.map_err(|source| {
        error!("连接浏览器失败: {}", source);
        BrowserError::ConnectionFailed { port, source }
    })?;
    debug!("浏览器连接成功");

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

    let pages = browser
        .pages()
        .await
        .map_err(|source| BrowserError::ConnectionFailed { port, source })?;
    debug!("获取到 {} 个页面", pages.len());

    for p in pages.iter() {
        if let Ok(Some(url)) = p.url().await {
            debug!("检查页面: {}", url);
            if url.starts_with("http") || url == "about:blank" {
                info!("✓ 复用已打开的页面: {}", url);
                return Ok((browser, p.clone(), events));
            }
        }
    }

    debug!("没有可复用的页面，创建空白页面");
    let page = browser.new_page("about:blank").await.map_err(|source| {
        error!("创建空白页面失败: {}", source);
        BrowserError::PageCreationFailed { source }
    })?;

    Ok((browser, page, events))
}
