//! 登录状态检查与交互式登录

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::config::DestinationConfig;
use crate::infrastructure::PageOps;

/// 登录状态管理
///
/// 浏览器配置目录中的 cookie 即登录状态；这里只负责判断它是否仍然有效，
/// 以及引导用户在打开的浏览器中手动登录。
pub struct SessionManager {
    page: Arc<dyn PageOps>,
    nav_timeout: Duration,
}

impl SessionManager {
    pub fn new(page: Arc<dyn PageOps>, nav_timeout: Duration) -> Self {
        Self { page, nav_timeout }
    }

    /// 打开导入页，未被重定向到登录页即视为有效
    ///
    /// 导航失败或超时都按无效处理。
    pub async fn is_valid(&self, dest: &DestinationConfig) -> bool {
        match tokio::time::timeout(self.nav_timeout, self.page.goto(&dest.import_url)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("[{}] 打开导入页失败: {}", dest.name, e);
                return false;
            }
            Err(_) => {
                warn!("[{}] 打开导入页超时 ({:?})", dest.name, self.nav_timeout);
                return false;
            }
        }

        let landed = match self.page.current_url().await {
            Ok(url) => url,
            Err(e) => {
                warn!("[{}] 读取当前地址失败: {}", dest.name, e);
                return false;
            }
        };
        debug!("[{}] 导入页落地地址: {}", dest.name, landed);

        if dest.is_signin_url(&landed) {
            info!("[{}] 🔒 未登录（被重定向到 {}）", dest.name, landed);
            false
        } else {
            info!("[{}] 🔓 登录状态有效", dest.name);
            true
        }
    }

    /// 打开登录页，等待用户在终端按回车后重新检查
    pub async fn login(&self, dest: &DestinationConfig) -> Result<bool> {
        self.login_with(dest, wait_for_enter()).await
    }

    /// 同 [`login`](Self::login)，由调用方决定何时认为用户已完成登录
    pub async fn login_with<F>(&self, dest: &DestinationConfig, user_done: F) -> Result<bool>
    where
        F: Future<Output = Result<()>>,
    {
        info!("[{}] 打开登录页: {}", dest.name, dest.signin_url);
        if tokio::time::timeout(self.nav_timeout, self.page.goto(&dest.signin_url))
            .await
            .is_err()
        {
            warn!("[{}] 登录页加载超时，请在浏览器中手动打开", dest.name);
        }

        println!();
        println!("👉 请在浏览器窗口中登录 {}，完成后回到这里按回车继续...", dest.name);
        user_done.await?;

        let valid = self.is_valid(dest).await;
        if valid {
            info!("[{}] ✅ 登录成功，状态已保存到浏览器配置目录", dest.name);
        } else {
            warn!("[{}] ❌ 仍未检测到登录状态", dest.name);
        }
        Ok(valid)
    }
}

async fn wait_for_enter() -> Result<()> {
    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(())
}
