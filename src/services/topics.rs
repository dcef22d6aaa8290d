//! 文章话题获取 - 业务能力层
//!
//! 发布到 Medium 时需要填写话题，直接读取原文页面的 `<meta name="keywords">`。

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};

/// 只读取页面开头这么多字节（meta 标签在 head 中）
const HEAD_BYTES: usize = 10 * 1024;
/// Medium 最多接受的话题数
const MAX_TOPICS: usize = 5;

static RE_NAME_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta\s+name=["']keywords["']\s+content=["']([^"']+)["']"#)
        .expect("valid regex")
});
static RE_CONTENT_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta\s+content=["']([^"']+)["']\s+name=["']keywords["']"#)
        .expect("valid regex")
});

/// 从 HTML 中提取 keywords（最多五个）
pub fn extract_keywords(html: &str) -> Vec<String> {
    let Some(caps) = RE_NAME_FIRST
        .captures(html)
        .or_else(|| RE_CONTENT_FIRST.captures(html))
    else {
        return Vec::new();
    };
    caps[1]
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .take(MAX_TOPICS)
        .map(str::to_string)
        .collect()
}

/// 文章话题来源
#[async_trait]
pub trait TopicSource: Send + Sync {
    /// 获取文章话题，永不失败（失败时返回默认话题）
    async fn topics_for(&self, url: &str) -> Vec<String>;
}

/// 固定话题（测试与离线使用）
pub struct StaticTopics(pub Vec<String>);

#[async_trait]
impl TopicSource for StaticTopics {
    async fn topics_for(&self, _url: &str) -> Vec<String> {
        self.0.clone()
    }
}

/// 话题服务：通过 HTTP 读取原文页面
pub struct TopicService {
    client: reqwest::Client,
    fallback: Vec<String>,
}

impl TopicService {
    pub fn new(user_agent: &str, timeout: Duration, fallback: Vec<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client, fallback })
    }

    async fn fetch_head(&self, url: &str) -> anyhow::Result<String> {
        let mut response = self.client.get(url).send().await?.error_for_status()?;
        let mut head = Vec::with_capacity(HEAD_BYTES);
        while let Some(chunk) = response.chunk().await? {
            head.extend_from_slice(&chunk);
            if head.len() >= HEAD_BYTES {
                head.truncate(HEAD_BYTES);
                break;
            }
        }
        Ok(String::from_utf8_lossy(&head).into_owned())
    }
}

#[async_trait]
impl TopicSource for TopicService {
    /// 没有 keywords 或请求失败时返回默认话题
    async fn topics_for(&self, url: &str) -> Vec<String> {
        match self.fetch_head(url).await {
            Ok(head) => {
                let topics = extract_keywords(&head);
                if topics.is_empty() {
                    debug!("{} 没有 keywords，使用默认话题", url);
                    self.fallback.clone()
                } else {
                    topics
                }
            }
            Err(e) => {
                warn!("获取 {} 的话题失败: {}", url, e);
                self.fallback.clone()
            }
        }
    }
}
