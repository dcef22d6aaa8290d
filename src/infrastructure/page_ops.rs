//! 页面能力接口
//!
//! 目标驱动、会话检查与选择器解析只依赖这个 trait，不直接接触 chromiumoxide。

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::infrastructure::selector::Locator;

/// 一次元素探测的结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Probe {
    /// 匹配到的元素数量
    pub present: usize,
    /// 其中可见且可用的数量（`first_of` 至多为 1）
    pub actionable: usize,
}

impl Probe {
    pub fn actionable(count: usize) -> Self {
        Self {
            present: count,
            actionable: count,
        }
    }
}

/// 浏览器页面能力
#[async_trait]
pub trait PageOps: Send + Sync {
    /// 导航到指定地址并等待加载
    async fn goto(&self, url: &str) -> Result<()>;

    /// 当前页面地址（重定向之后）
    async fn current_url(&self) -> Result<String>;

    /// 探测定位方式匹配到的元素
    async fn probe(&self, locator: &Locator) -> Result<Probe>;

    /// 点击唯一匹配的元素
    async fn click(&self, locator: &Locator) -> Result<()>;

    /// 点击元素、全选已有内容后输入文本
    async fn type_text(&self, locator: &Locator, text: &str) -> Result<()>;

    /// 向当前焦点元素发送按键
    async fn press_key(&self, key: &str) -> Result<()>;

    /// 执行 JS 并返回 JSON 结果
    async fn eval(&self, js: &str) -> Result<JsonValue>;

    /// 保存整页截图
    async fn screenshot(&self, path: &Path) -> Result<()>;
}
