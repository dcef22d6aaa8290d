//! 浏览器生命周期：启动或连接、提供页面、结束时关闭

mod connection;
mod launch;
pub mod session;

use std::sync::Arc;

use chromiumoxide::Browser;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::BrowserError;
use crate::infrastructure::JsExecutor;

pub use connection::connect_to_browser_and_page;
pub use launch::launch_persistent_browser;
pub use session::SessionManager;

/// 一次运行期间使用的浏览器
///
/// 自己启动的浏览器在 [`shutdown`](Self::shutdown) 时关闭；
/// 通过调试端口连接的浏览器只断开，不关闭用户的窗口。
pub struct BrowserHandle {
    browser: Browser,
    executor: Arc<JsExecutor>,
    events: JoinHandle<()>,
    owned: bool,
}

impl BrowserHandle {
    /// 按配置连接已运行的浏览器，或启动新的持久化浏览器
    pub async fn open(config: &Config) -> Result<Self, BrowserError> {
        let (browser, page, events, owned) = match config.browser_debug_port {
            Some(port) => {
                let (browser, page, events) = connect_to_browser_and_page(port).await?;
                (browser, page, events, false)
            }
            None => {
                let (browser, page, events) = launch_persistent_browser(config).await?;
                (browser, page, events, true)
            }
        };
        Ok(Self {
            browser,
            executor: Arc::new(JsExecutor::new(page)),
            events,
            owned,
        })
    }

    /// 当前页面的执行器
    pub fn executor(&self) -> Arc<JsExecutor> {
        Arc::clone(&self.executor)
    }

    /// 关闭（或断开）浏览器
    pub async fn shutdown(mut self) {
        if self.owned {
            if let Err(e) = self.browser.close().await {
                warn!("关闭浏览器失败: {}", e);
            } else if let Err(e) = self.browser.wait().await {
                debug!("等待浏览器进程退出失败: {}", e);
            }
        }
        self.events.abort();
        debug!("浏览器已{}", if self.owned { "关闭" } else { "断开" });
    }
}
