//! JS 执行器 - 基础设施层
//!
//! 持有唯一的 page 资源，对外只暴露 [`PageOps`] 能力

use std::path::Path;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::infrastructure::page_ops::{PageOps, Probe};
use crate::infrastructure::selector::Locator;

/// 解析成功后打在目标元素上的标记属性
const TARGET_ATTR: &str = "data-xpost-target";

/// JS 执行器
///
/// 职责：
/// - 持有唯一的 Page 资源
/// - 暴露导航、元素探测与操作、截图能力
/// - 不认识 FeedItem / 目标平台
pub struct JsExecutor {
    page: Page,
}

impl JsExecutor {
    /// 创建新的 JS 执行器
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(&self, js_code: impl Into<String>) -> Result<T> {
        let result = self.page.evaluate(js_code.into()).await?;
        let json_value: JsonValue = result.into_value()?;
        let typed_value = serde_json::from_value(json_value)?;
        Ok(typed_value)
    }

    /// 探测并在唯一可操作元素上打标记，返回该元素
    async fn target(&self, locator: &Locator) -> Result<chromiumoxide::Element> {
        let probe = self.probe(locator).await?;
        if probe.actionable != 1 {
            bail!(
                "选择器 {} 未定位到唯一元素 (匹配 {}, 可操作 {})",
                locator,
                probe.present,
                probe.actionable
            );
        }
        let element = self
            .page
            .find_element(format!("[{}]", TARGET_ATTR))
            .await
            .with_context(|| format!("找不到已标记的元素: {}", locator))?;
        element.scroll_into_view().await?;
        Ok(element)
    }
}

#[async_trait]
impl PageOps for JsExecutor {
    async fn goto(&self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .with_context(|| format!("导航到 {} 失败", url))?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.page.url().await?.unwrap_or_default())
    }

    async fn probe(&self, locator: &Locator) -> Result<Probe> {
        self.eval_as(probe_script(locator)?).await
    }

    async fn click(&self, locator: &Locator) -> Result<()> {
        let element = self.target(locator).await?;
        element.click().await?;
        Ok(())
    }

    async fn type_text(&self, locator: &Locator, text: &str) -> Result<()> {
        let element = self.target(locator).await?;
        element.click().await?;
        self.eval(SELECT_ACTIVE_CONTENT_JS).await?;
        element.type_str(text).await?;
        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<()> {
        let body = self.page.find_element("body").await?;
        body.press_key(key).await?;
        Ok(())
    }

    async fn eval(&self, js: &str) -> Result<JsonValue> {
        let result = self.page.evaluate(js.to_string()).await?;
        let json_value = result.into_value()?;
        Ok(json_value)
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        let params = ScreenshotParams::builder().full_page(true).build();
        self.page.save_screenshot(params, path).await?;
        Ok(())
    }
}

/// 全选当前焦点元素的内容（input 与 contenteditable 都适用）
const SELECT_ACTIVE_CONTENT_JS: &str = r#"
(() => {
    const el = document.activeElement;
    if (!el) return false;
    if (typeof el.select === 'function') {
        el.select();
    } else {
        const range = document.createRange();
        range.selectNodeContents(el);
        const sel = window.getSelection();
        sel.removeAllRanges();
        sel.addRange(range);
    }
    return true;
})()
"#;

/// 生成探测脚本：统计匹配与可操作元素数量，唯一时打上标记
fn probe_script(locator: &Locator) -> Result<String> {
    let spec = serde_json::to_string(locator)?;
    Ok(format!(
        r#"
(() => {{
    const spec = {spec};
    const attr = '{attr}';
    document.querySelectorAll('[' + attr + ']').forEach(e => e.removeAttribute(attr));

    const visible = el => {{
        const r = el.getBoundingClientRect();
        const s = window.getComputedStyle(el);
        return r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none';
    }};
    const enabled = el => !el.disabled && el.getAttribute('aria-disabled') !== 'true';

    let found = [];
    try {{
        if (spec.by === 'text') {{
            const needle = spec.text.trim().toLowerCase();
            const matches = el => {{
                const t = (el.textContent || '').trim().toLowerCase();
                return spec.exact ? t === needle : t.includes(needle);
            }};
            const all = Array.from(document.querySelectorAll(spec.tag || 'body *')).filter(matches);
            found = all.filter(el => !all.some(other => other !== el && el.contains(other)));
        }} else {{
            found = Array.from(document.querySelectorAll(spec.css));
        }}
    }} catch (e) {{
        return {{ present: 0, actionable: 0 }};
    }}

    let actionable = found.filter(el => visible(el) && enabled(el));
    if (spec.by === 'first_of') actionable = actionable.slice(0, 1);
    if (actionable.length === 1) actionable[0].setAttribute(attr, '1');
    return {{ present: found.length, actionable: actionable.length }};
}})()
"#,
        spec = spec,
        attr = TARGET_ATTR
    ))
}
