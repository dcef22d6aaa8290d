//! 调试产物写入服务 - 业务能力层
//!
//! 只负责"导入失败时留下现场"能力：整页截图 + 页面状态 JSON，不关心流程

use std::path::PathBuf;
use std::sync::LazyLock;

use chrono::{DateTime, Local};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::ImportFailure;
use crate::infrastructure::PageOps;
use crate::models::FeedItem;

/// 文件名中条目 ID 部分的最大长度
const MAX_ID_CHARS: usize = 60;

static RE_UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("valid regex"));

/// 生成产物文件名（不含扩展名）：`<平台>_<条目ID>_<时间>`
pub fn artifact_file_stem(destination: &str, item_id: &str, at: DateTime<Local>) -> String {
    let id = item_id
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    let id = RE_UNSAFE_CHARS.replace_all(id, "_");
    let id: String = id.trim_matches('_').chars().take(MAX_ID_CHARS).collect();
    format!("{}_{}_{}", destination, id, at.format("%Y%m%d-%H%M%S"))
}

#[derive(Serialize)]
struct StateDump<'a> {
    destination: &'a str,
    item: &'a FeedItem,
    failure: &'static str,
    detail: String,
    page_url: Option<String>,
    screenshot: Option<String>,
    captured_at: String,
}

/// 调试产物写入服务
///
/// 写入失败只记录日志，不影响导入结果。
pub struct ArtifactWriter {
    dir: PathBuf,
}

impl ArtifactWriter {
    /// 使用自定义目录创建
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// 保存当前页面现场，返回状态 JSON 的路径
    pub async fn capture(
        &self,
        page: &dyn PageOps,
        destination: &str,
        item: &FeedItem,
        failure: &ImportFailure,
    ) -> Option<PathBuf> {
        if let Err(e) = std::fs::create_dir_all(&self.dir) {
            warn!("无法创建产物目录 {}: {}", self.dir.display(), e);
            return None;
        }

        let now = Local::now();
        let stem = artifact_file_stem(destination, &item.id, now);
        let png = self.dir.join(format!("{}.png", stem));
        let json = self.dir.join(format!("{}.json", stem));

        let screenshot = match page.screenshot(&png).await {
            Ok(()) => Some(png.display().to_string()),
            Err(e) => {
                debug!("截图失败: {}", e);
                None
            }
        };

        let dump = StateDump {
            destination,
            item,
            failure: failure.label(),
            detail: failure.to_string(),
            page_url: page.current_url().await.ok(),
            screenshot,
            captured_at: now.to_rfc3339(),
        };

        let written = serde_json::to_vec_pretty(&dump)
            .map_err(anyhow::Error::from)
            .and_then(|bytes| std::fs::write(&json, bytes).map_err(anyhow::Error::from));
        match written {
            Ok(()) => {
                info!("📸 调试产物已保存: {}", json.display());
                Some(json)
            }
            Err(e) => {
                warn!("写入调试产物失败: {}", e);
                None
            }
        }
    }
}
