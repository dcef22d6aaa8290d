//! 测试用的脚本化页面

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::infrastructure::page_ops::{PageOps, Probe};
use crate::infrastructure::selector::Locator;

/// 按预设脚本响应的假页面
///
/// - 导航可以重定向（模拟跳转到登录页）或挂起（模拟超时）
/// - 元素探测结果按定位方式预设，可以是随时间变化的序列
/// - 所有操作都记录在 `actions()` 中
#[derive(Default)]
pub struct ScriptedPage {
    url: Mutex<String>,
    redirects: Mutex<HashMap<String, String>>,
    hanging: Mutex<HashSet<String>>,
    probes: Mutex<HashMap<String, VecDeque<Probe>>>,
    eval_results: Mutex<VecDeque<JsonValue>>,
    actions: Mutex<Vec<String>>,
}

impl ScriptedPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn redirect(&self, from: &str, to: &str) {
        self.redirects
            .lock()
            .unwrap()
            .insert(from.to_string(), to.to_string());
    }

    pub fn hang_on(&self, url: &str) {
        self.hanging.lock().unwrap().insert(url.to_string());
    }

    pub fn set_probe(&self, locator: &Locator, probe: Probe) {
        self.set_probe_sequence(locator, vec![probe]);
    }

    /// 依次返回序列中的结果，最后一个结果保持不变
    pub fn set_probe_sequence(&self, locator: &Locator, probes: Vec<Probe>) {
        self.probes
            .lock()
            .unwrap()
            .insert(locator.to_string(), probes.into());
    }

    pub fn push_eval_result(&self, value: JsonValue) {
        self.eval_results.lock().unwrap().push_back(value);
    }

    pub fn actions(&self) -> Vec<String> {
        self.actions.lock().unwrap().clone()
    }

    fn record(&self, action: String) {
        self.actions.lock().unwrap().push(action);
    }
}

#[async_trait]
impl PageOps for ScriptedPage {
    async fn goto(&self, url: &str) -> Result<()> {
        self.record(format!("goto {}", url));
        let hangs = self.hanging.lock().unwrap().contains(url);
        if hangs {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        let landed = self
            .redirects
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_else(|| url.to_string());
        *self.url.lock().unwrap() = landed;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.url.lock().unwrap().clone())
    }

    async fn probe(&self, locator: &Locator) -> Result<Probe> {
        let mut probes = self.probes.lock().unwrap();
        let Some(queue) = probes.get_mut(&locator.to_string()) else {
            return Ok(Probe::default());
        };
        let probe = if queue.len() > 1 {
            queue.pop_front().unwrap_or_default()
        } else {
            queue.front().copied().unwrap_or_default()
        };
        Ok(probe)
    }

    async fn click(&self, locator: &Locator) -> Result<()> {
        let probe = self.probe(locator).await?;
        if probe.actionable != 1 {
            bail!("不可点击: {}", locator);
        }
        self.record(format!("click {}", locator));
        Ok(())
    }

    async fn type_text(&self, locator: &Locator, text: &str) -> Result<()> {
        self.record(format!("type {} <- {}", locator, text));
        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<()> {
        self.record(format!("key {}", key));
        Ok(())
    }

    async fn eval(&self, _js: &str) -> Result<JsonValue> {
        Ok(self
            .eval_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(JsonValue::Null))
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        std::fs::write(path, b"\x89PNG")?;
        self.record(format!("screenshot {}", path.display()));
        Ok(())
    }
}
