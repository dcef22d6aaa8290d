use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// 导入记录：目标平台 → 已成功导入的条目 id 列表
///
/// 列表内保持插入顺序且不重复。正常流程中只增不减。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    entries: BTreeMap<String, Vec<String>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 该条目是否已导入到该目标
    pub fn contains(&self, destination: &str, item_id: &str) -> bool {
        self.entries
            .get(destination)
            .is_some_and(|ids| ids.iter().any(|id| id == item_id))
    }

    /// 记录一条成功导入，返回是否为新增
    pub fn insert(&mut self, destination: &str, item_id: &str) -> bool {
        let ids = self.entries.entry(destination.to_string()).or_default();
        if ids.iter().any(|id| id == item_id) {
            return false;
        }
        ids.push(item_id.to_string());
        true
    }

    /// 撤销刚插入但未能持久化的条目
    pub(crate) fn forget_unconfirmed(&mut self, destination: &str, item_id: &str) {
        if let Some(ids) = self.entries.get_mut(destination) {
            if ids.last().map(String::as_str) == Some(item_id) {
                ids.pop();
            }
            if ids.is_empty() {
                self.entries.remove(destination);
            }
        }
    }

    /// 某个目标下的全部 id
    pub fn ids(&self, destination: &str) -> &[String] {
        self.entries
            .get(destination)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
