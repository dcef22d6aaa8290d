//! 级联选择器 - 基础设施层
//!
//! 每个页面元素由一组按优先级排列的候选定位方式描述：最具体（平台提供的稳定标识）
//! 在前，最通用（"第一个可见的输入框"）在后。第一个恰好定位到一个可见且可用元素的
//! 候选胜出。候选列表是数据，可以在配置文件中覆盖。

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::infrastructure::page_ops::{PageOps, Probe};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// 单个定位方式
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum Locator {
    /// CSS 选择器，要求唯一
    Css { css: String },
    /// 按文本定位（大小写不敏感，只取最内层元素），要求唯一
    Text {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tag: Option<String>,
        #[serde(default)]
        exact: bool,
    },
    /// 通用兜底：匹配 CSS 的第一个可见可用元素
    FirstOf { css: String },
}

impl Locator {
    pub fn css(css: impl Into<String>) -> Self {
        Locator::Css { css: css.into() }
    }

    /// 文本包含匹配，例如 `Locator::text("button", "Import")`
    pub fn text(tag: &str, text: impl Into<String>) -> Self {
        Locator::Text {
            text: text.into(),
            tag: Some(tag.to_string()),
            exact: false,
        }
    }

    /// 不限标签的文本匹配
    pub fn any_text(text: impl Into<String>) -> Self {
        Locator::Text {
            text: text.into(),
            tag: None,
            exact: false,
        }
    }

    pub fn first_of(css: impl Into<String>) -> Self {
        Locator::FirstOf { css: css.into() }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css { css } => write!(f, "css={}", css),
            Locator::Text { text, tag, exact } => write!(
                f,
                "{}:has-text{}(\"{}\")",
                tag.as_deref().unwrap_or("*"),
                if *exact { "-exact" } else { "" },
                text
            ),
            Locator::FirstOf { css } => write!(f, "first-of={}", css),
        }
    }
}

/// 按优先级排列的候选定位方式
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectorChain(Vec<Locator>);

impl SelectorChain {
    pub fn new(locators: Vec<Locator>) -> Self {
        Self(locators)
    }

    pub fn locators(&self) -> &[Locator] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Locator>> for SelectorChain {
    fn from(locators: Vec<Locator>) -> Self {
        Self(locators)
    }
}

/// 在限定时间内未能解析
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unresolved {
    pub step: String,
    /// 有候选元素存在，但不可见、被禁用或不唯一
    pub seen_inactionable: bool,
}

/// 解析选择器链
///
/// 每一轮按顺序尝试所有候选，直到某个候选恰好匹配一个可操作元素或等待超时。
/// 至少尝试一轮。页面脚本执行失败的候选按"未匹配"处理。
pub async fn resolve(
    page: &dyn PageOps,
    step: &str,
    chain: &SelectorChain,
    wait: Duration,
) -> Result<Locator, Unresolved> {
    let deadline = Instant::now() + wait;
    let mut seen_inactionable = false;

    loop {
        for locator in chain.locators() {
            let probe = match page.probe(locator).await {
                Ok(probe) => probe,
                Err(e) => {
                    debug!("[{}] 探测 {} 失败: {}", step, locator, e);
                    Probe::default()
                }
            };
            if probe.actionable == 1 {
                debug!("[{}] 使用选择器 {}", step, locator);
                return Ok(locator.clone());
            }
            if probe.present > 0 {
                seen_inactionable = true;
            }
        }

        let now = Instant::now();
        if now >= deadline {
            break;
        }
        sleep(POLL_INTERVAL.min(deadline - now)).await;
    }

    Err(Unresolved {
        step: step.to_string(),
        seen_inactionable,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::testing::ScriptedPage;

    fn chain() -> SelectorChain {
        SelectorChain::new(vec![
            Locator::css(".js-importUrl"),
            Locator::text("button", "Import"),
            Locator::first_of("input"),
        ])
    }

    #[tokio::test]
    async fn first_unique_candidate_wins() {
        let page = ScriptedPage::new();
        page.set_probe(&Locator::text("button", "Import"), Probe::actionable(1));
        page.set_probe(&Locator::first_of("input"), Probe::actionable(1));

        let found = resolve(&page, "url_input", &chain(), Duration::ZERO).await.unwrap();
        assert_eq!(found, Locator::text("button", "Import"));
    }

    #[tokio::test]
    async fn ambiguous_candidate_falls_through() {
        let page = ScriptedPage::new();
        page.set_probe(&Locator::css(".js-importUrl"), Probe { present: 2, actionable: 2 });
        page.set_probe(&Locator::first_of("input"), Probe::actionable(1));

        let found = resolve(&page, "url_input", &chain(), Duration::ZERO).await.unwrap();
        assert_eq!(found, Locator::first_of("input"));
    }

    #[tokio::test]
    async fn waits_until_element_appears() {
        let page = ScriptedPage::new();
        page.set_probe_sequence(
            &Locator::css(".js-importUrl"),
            vec![Probe::default(), Probe::default(), Probe::actionable(1)],
        );

        let found = resolve(&page, "url_input", &chain(), Duration::from_secs(5)).await.unwrap();
        assert_eq!(found, Locator::css(".js-importUrl"));
    }

    #[tokio::test]
    async fn reports_disabled_elements_on_timeout() {
        let page = ScriptedPage::new();
        page.set_probe(&Locator::text("button", "Import"), Probe { present: 1, actionable: 0 });

        let err = resolve(&page, "import_button", &chain(), Duration::from_millis(300))
            .await
            .unwrap_err();
        assert_eq!(err.step, "import_button");
        assert!(err.seen_inactionable);
    }

    #[test]
    fn chain_is_readable_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            url_input: SelectorChain,
        }
        let raw = r#"
url_input = [
  { by = "css", css = ".js-importUrl" },
  { by = "text", text = "Import", tag = "button" },
  { by = "first_of", css = "input" },
]
"#;
        let parsed: Wrapper = toml::from_str(raw).unwrap();
        assert_eq!(parsed.url_input, chain());
    }
}
