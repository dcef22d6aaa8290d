//! 订阅源服务 - 业务能力层
//!
//! 只负责"读订阅源"能力：拉取一个或多个 RSS/Atom 地址，按 URL 合并去重。
//! 任一地址失败都视为整个订阅源不可用。

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::FeedError;
use crate::models::FeedItem;

/// 订阅源
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// 拉取全部条目（每次调用都重新请求）
    async fn fetch(&self) -> Result<Vec<FeedItem>, FeedError>;
}

/// RSS / Atom 订阅源
pub struct RssFeedSource {
    client: reqwest::Client,
    urls: Vec<String>,
}

impl RssFeedSource {
    pub fn new(urls: Vec<String>, user_agent: &str, timeout: Duration) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|source| FeedError::RequestFailed {
                url: String::new(),
                source,
            })?;
        Ok(Self { client, urls })
    }

    async fn fetch_one(&self, url: &str) -> Result<Vec<FeedItem>, FeedError> {
        debug!("请求订阅源: {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FeedError::RequestFailed {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::BadStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| FeedError::RequestFailed {
                url: url.to_string(),
                source,
            })?;

        parse_feed_items(&body, url)
    }
}

#[async_trait]
impl FeedSource for RssFeedSource {
    async fn fetch(&self) -> Result<Vec<FeedItem>, FeedError> {
        let mut batches = Vec::with_capacity(self.urls.len());
        for url in &self.urls {
            let items = self.fetch_one(url).await?;
            info!("订阅源 {} 返回 {} 篇文章", url, items.len());
            batches.push(items);
        }
        Ok(merge_unique(batches))
    }
}

/// 解析订阅源内容，丢弃没有链接的条目
pub fn parse_feed_items(content: &[u8], source_url: &str) -> Result<Vec<FeedItem>, FeedError> {
    let feed = feed_rs::parser::parse(content).map_err(|source| FeedError::ParseFailed {
        url: source_url.to_string(),
        source,
    })?;

    let items = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let link = canonical_link(&entry.links)?;
            let title = entry
                .title
                .map(|t| t.content.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "Untitled".to_string());
            let item = FeedItem::new(link, title);
            Some(match entry.published.or(entry.updated) {
                Some(at) => item.with_published_at(at),
                None => item,
            })
        })
        .collect();

    Ok(items)
}

/// 文章本身的链接：优先 `rel` 缺省或为 alternate 的链接，都没有时取第一个
///
/// Atom 条目可能把 replies / edit / self 链接排在前面（如 Blogger）。
fn canonical_link(links: &[feed_rs::model::Link]) -> Option<String> {
    links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| links.first())
        .map(|l| l.href.trim().to_string())
        .filter(|href| !href.is_empty())
}

/// 按 id 合并多个订阅源，先出现者优先
pub fn merge_unique(batches: Vec<Vec<FeedItem>>) -> Vec<FeedItem> {
    let mut seen = HashSet::new();
    batches
        .into_iter()
        .flatten()
        .filter(|item| seen.insert(item.id.clone()))
        .collect()
}

/// 固定内容的订阅源（测试与离线演练用）
#[derive(Debug, Clone, Default)]
pub struct StaticFeedSource {
    items: Vec<FeedItem>,
}

impl StaticFeedSource {
    pub fn new(items: Vec<FeedItem>) -> Self {
        Self { items }
    }
}

#[async_trait]
impl FeedSource for StaticFeedSource {
    async fn fetch(&self) -> Result<Vec<FeedItem>, FeedError> {
        Ok(self.items.clone())
    }
}
