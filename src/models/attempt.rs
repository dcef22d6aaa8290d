use std::path::PathBuf;

use crate::error::ImportFailure;
use crate::models::feed_item::FeedItem;

/// 单次导入的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    Success,
    Failure(ImportFailure),
}

/// 一次导入尝试（不持久化）
#[derive(Debug, Clone)]
pub struct ImportAttempt {
    pub item: FeedItem,
    pub destination: String,
    pub outcome: ImportOutcome,
    /// 失败时保存的调试产物
    pub artifact: Option<PathBuf>,
}

impl ImportAttempt {
    pub fn success(item: &FeedItem, destination: &str) -> Self {
        Self {
            item: item.clone(),
            destination: destination.to_string(),
            outcome: ImportOutcome::Success,
            artifact: None,
        }
    }

    pub fn failure(
        item: &FeedItem,
        destination: &str,
        failure: ImportFailure,
        artifact: Option<PathBuf>,
    ) -> Self {
        Self {
            item: item.clone(),
            destination: destination.to_string(),
            outcome: ImportOutcome::Failure(failure),
            artifact,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ImportOutcome::Success)
    }
}
