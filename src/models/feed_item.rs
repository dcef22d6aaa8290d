use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 订阅源中的一篇文章
///
/// `id` 即文章的规范 URL，导入记录以它为唯一标识。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: String,
    pub url: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

impl FeedItem {
    /// 以规范 URL 创建条目
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        let url = url.into().trim().to_string();
        Self {
            id: url.clone(),
            url,
            title: title.into(),
            published_at: None,
        }
    }

    /// 手动指定的导入（--force URL）
    pub fn manual(url: impl Into<String>) -> Self {
        Self::new(url, "Manual Import")
    }

    pub fn with_published_at(mut self, published_at: DateTime<Utc>) -> Self {
        self.published_at = Some(published_at);
        self
    }
}

/// 按发布时间从旧到新排序（稳定排序，没有时间的条目保持原顺序排在最后）
pub fn sort_oldest_first(items: &mut [FeedItem]) {
    items.sort_by_key(|item| (item.published_at.is_none(), item.published_at));
}
