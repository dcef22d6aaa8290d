//! 程序配置
//!
//! 优先级：默认值 < TOML 配置文件 < 环境变量 < 命令行参数

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::infrastructure::SelectorChain;

/// 未指定 `--config` 时自动读取的配置文件
pub const DEFAULT_CONFIG_FILE: &str = "xpost.toml";

/// 目标平台类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationKind {
    Medium,
    Substack,
}

impl DestinationKind {
    /// 该类型的默认配置
    pub fn default_config(self) -> DestinationConfig {
        match self {
            DestinationKind::Medium => DestinationConfig {
                name: "medium".to_string(),
                kind: self,
                enabled: true,
                import_url: "https://medium.com/p/import".to_string(),
                signin_url: "https://medium.com/m/signin".to_string(),
                published_url: "https://medium.com/me/stories?tab=posts-published".to_string(),
                signin_markers: vec!["sign".to_string()],
                publish: true,
                timeout_is_success: true,
                selectors: crate::workflow::medium::default_selectors(),
            },
            DestinationKind::Substack => DestinationConfig {
                name: "substack".to_string(),
                kind: self,
                enabled: true,
                import_url: "https://pominaus.substack.com/publish/import".to_string(),
                signin_url: "https://substack.com/sign-in".to_string(),
                published_url: "https://pominaus.substack.com/publish/posts/published".to_string(),
                signin_markers: vec![
                    "sign-in".to_string(),
                    "sign_in".to_string(),
                    "signin".to_string(),
                ],
                publish: false,
                timeout_is_success: false,
                selectors: crate::workflow::substack::default_selectors(),
            },
        }
    }
}

/// 单个目标平台的配置
#[derive(Clone, Debug)]
pub struct DestinationConfig {
    /// 导入记录中的键名
    pub name: String,
    pub kind: DestinationKind,
    pub enabled: bool,
    /// 导入工具入口
    pub import_url: String,
    /// 登录页
    pub signin_url: String,
    /// 已发布文章列表（远端标题去重用）
    pub published_url: String,
    /// 落地地址包含这些片段即视为未登录
    pub signin_markers: Vec<String>,
    /// 导入后是否继续发布（仅 Medium）
    pub publish: bool,
    /// 等待完成标志超时时是否仍算成功
    pub timeout_is_success: bool,
    /// 每个步骤的候选选择器
    pub selectors: BTreeMap<String, SelectorChain>,
}

impl DestinationConfig {
    /// 某个步骤的选择器链
    pub fn chain(&self, step: &str) -> SelectorChain {
        self.selectors.get(step).cloned().unwrap_or_default()
    }

    /// 落地地址是否为登录页
    pub fn is_signin_url(&self, landed: &str) -> bool {
        let landed = landed.to_lowercase();
        self.signin_markers
            .iter()
            .any(|marker| landed.contains(&marker.to_lowercase()))
    }
}

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 订阅源地址，按顺序合并
    pub feed_urls: Vec<String>,
    /// 导入记录文件
    pub ledger_path: PathBuf,
    /// 操作日志文件（追加写入）
    pub log_file: String,
    /// 调试产物目录
    pub artifact_dir: PathBuf,
    /// 浏览器持久化配置目录（保存登录状态）
    pub browser_data_dir: PathBuf,
    /// 指定后连接已运行的浏览器而不是启动新的
    pub browser_debug_port: Option<u16>,
    pub chrome_executable: Option<PathBuf>,
    pub headless: bool,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    pub user_agent: String,
    pub fetch_timeout: Duration,
    pub nav_timeout: Duration,
    pub import_timeout: Duration,
    pub selector_timeout: Duration,
    /// 提交后等待页面处理的时间
    pub settle_delay: Duration,
    /// 同一目标两次导入之间的间隔
    pub import_delay: Duration,
    /// 导入前是否按已发布标题去重
    pub remote_title_dedup: bool,
    /// 标题比较前去掉的后缀
    pub title_suffixes: Vec<String>,
    /// 文章页没有 keywords 时使用的话题
    pub default_topics: Vec<String>,
    pub destinations: Vec<DestinationConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed_urls: vec![
                "https://ghost.daintytrading.com/feed-today.xml".to_string(),
                "https://ghost.daintytrading.com/feed.xml".to_string(),
            ],
            ledger_path: PathBuf::from("imported.json"),
            log_file: "import_log.txt".to_string(),
            artifact_dir: PathBuf::from("debug_artifacts"),
            browser_data_dir: PathBuf::from("browser_data"),
            browser_debug_port: None,
            chrome_executable: None,
            headless: false,
            verbose_logging: false,
            user_agent: "Mozilla/5.0".to_string(),
            fetch_timeout: Duration::from_secs(30),
            nav_timeout: Duration::from_millis(30_000),
            import_timeout: Duration::from_millis(60_000),
            selector_timeout: Duration::from_millis(10_000),
            settle_delay: Duration::from_millis(10_000),
            import_delay: Duration::from_millis(3_000),
            remote_title_dedup: true,
            title_suffixes: vec![
                " - a developer's story".to_string(),
                "— a developer's story".to_string(),
            ],
            default_topics: vec!["Technology".to_string(), "Software Development".to_string()],
            destinations: vec![
                DestinationKind::Medium.default_config(),
                DestinationKind::Substack.default_config(),
            ],
        }
    }
}

impl Config {
    /// 加载配置：默认值 → 配置文件 → 环境变量
    ///
    /// `path` 为空时若当前目录存在 `xpost.toml` 则读取它。
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let file = match path {
            Some(p) => Some(p.to_path_buf()),
            None => {
                let p = PathBuf::from(DEFAULT_CONFIG_FILE);
                p.exists().then_some(p)
            }
        };
        if let Some(file) = file {
            let content = std::fs::read_to_string(&file).map_err(|source| ConfigError::ReadFailed {
                path: file.clone(),
                source,
            })?;
            config.apply_toml(&content, &file)?;
        }

        config.apply_env()?;
        Ok(config)
    }

    /// 用 TOML 内容覆盖配置
    pub fn apply_toml(&mut self, content: &str, origin: &Path) -> Result<(), ConfigError> {
        let file: FileConfig = toml::from_str(content).map_err(|source| ConfigError::ParseFailed {
            path: origin.to_path_buf(),
            source,
        })?;
        file.apply_to(self)
    }

    /// 用环境变量覆盖配置
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(urls) = std::env::var("XPOST_FEED_URLS") {
            let urls: Vec<String> = urls
                .split(',')
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty())
                .collect();
            if !urls.is_empty() {
                self.feed_urls = urls;
            }
        }
        if let Ok(v) = std::env::var("XPOST_LEDGER_PATH") {
            self.ledger_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("XPOST_LOG_FILE") {
            self.log_file = v;
        }
        if let Ok(v) = std::env::var("XPOST_ARTIFACT_DIR") {
            self.artifact_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("XPOST_BROWSER_DATA_DIR") {
            self.browser_data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("XPOST_CHROME_EXECUTABLE") {
            self.chrome_executable = Some(PathBuf::from(v));
        }
        if let Some(port) = env_parse::<u16>("BROWSER_DEBUG_PORT", "u16")? {
            self.browser_debug_port = Some(port);
        }
        if let Some(ms) = env_parse::<u64>("XPOST_IMPORT_DELAY_MS", "u64")? {
            self.import_delay = Duration::from_millis(ms);
        }
        if let Some(verbose) = env_parse::<bool>("XPOST_VERBOSE", "bool")? {
            self.verbose_logging = verbose;
        }
        Ok(())
    }

    /// 只保留指定的目标平台
    pub fn restrict_to(&mut self, kind: DestinationKind) {
        for dest in &mut self.destinations {
            if dest.kind != kind {
                dest.enabled = false;
            }
        }
    }

    /// 启用中的目标平台
    pub fn enabled_destinations(&self) -> impl Iterator<Item = &DestinationConfig> {
        self.destinations.iter().filter(|d| d.enabled)
    }
}

fn env_parse<T: FromStr>(var_name: &str, expected_type: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(var_name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type: expected_type.to_string(),
            }),
        Err(_) => Ok(None),
    }
}

// ========== 配置文件结构 ==========

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    feed_urls: Option<Vec<String>>,
    ledger_path: Option<PathBuf>,
    log_file: Option<String>,
    artifact_dir: Option<PathBuf>,
    browser_data_dir: Option<PathBuf>,
    browser_debug_port: Option<u16>,
    chrome_executable: Option<PathBuf>,
    headless: Option<bool>,
    verbose_logging: Option<bool>,
    user_agent: Option<String>,
    import_delay_ms: Option<u64>,
    remote_title_dedup: Option<bool>,
    title_suffixes: Option<Vec<String>>,
    default_topics: Option<Vec<String>>,
    timeouts: TimeoutsFile,
    destinations: BTreeMap<String, DestinationFile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct TimeoutsFile {
    fetch_secs: Option<u64>,
    navigation_ms: Option<u64>,
    import_ms: Option<u64>,
    selector_ms: Option<u64>,
    settle_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct DestinationFile {
    /// 新增目标时必填
    kind: Option<DestinationKind>,
    enabled: Option<bool>,
    import_url: Option<String>,
    signin_url: Option<String>,
    published_url: Option<String>,
    signin_markers: Option<Vec<String>>,
    publish: Option<bool>,
    timeout_is_success: Option<bool>,
    /// 按步骤覆盖选择器链（整条替换）
    selectors: BTreeMap<String, SelectorChain>,
}

impl FileConfig {
    fn apply_to(self, config: &mut Config) -> Result<(), ConfigError> {
        if let Some(v) = self.feed_urls {
            config.feed_urls = v;
        }
        if let Some(v) = self.ledger_path {
            config.ledger_path = v;
        }
        if let Some(v) = self.log_file {
            config.log_file = v;
        }
        if let Some(v) = self.artifact_dir {
            config.artifact_dir = v;
        }
        if let Some(v) = self.browser_data_dir {
            config.browser_data_dir = v;
        }
        if let Some(v) = self.browser_debug_port {
            config.browser_debug_port = Some(v);
        }
        if let Some(v) = self.chrome_executable {
            config.chrome_executable = Some(v);
        }
        if let Some(v) = self.headless {
            config.headless = v;
        }
        if let Some(v) = self.verbose_logging {
            config.verbose_logging = v;
        }
        if let Some(v) = self.user_agent {
            config.user_agent = v;
        }
        if let Some(v) = self.import_delay_ms {
            config.import_delay = Duration::from_millis(v);
        }
        if let Some(v) = self.remote_title_dedup {
            config.remote_title_dedup = v;
        }
        if let Some(v) = self.title_suffixes {
            config.title_suffixes = v;
        }
        if let Some(v) = self.default_topics {
            config.default_topics = v;
        }
        if let Some(v) = self.timeouts.fetch_secs {
            config.fetch_timeout = Duration::from_secs(v);
        }
        if let Some(v) = self.timeouts.navigation_ms {
            config.nav_timeout = Duration::from_millis(v);
        }
        if let Some(v) = self.timeouts.import_ms {
            config.import_timeout = Duration::from_millis(v);
        }
        if let Some(v) = self.timeouts.selector_ms {
            config.selector_timeout = Duration::from_millis(v);
        }
        if let Some(v) = self.timeouts.settle_ms {
            config.settle_delay = Duration::from_millis(v);
        }

        for (name, overrides) in self.destinations {
            let index = match config.destinations.iter().position(|d| d.name == name) {
                Some(index) => index,
                None => {
                    let kind = overrides
                        .kind
                        .ok_or_else(|| ConfigError::UnknownDestination(name.clone()))?;
                    let mut dest = kind.default_config();
                    dest.name = name.clone();
                    config.destinations.push(dest);
                    config.destinations.len() - 1
                }
            };
            overrides.apply_to(&mut config.destinations[index]);
        }
        Ok(())
    }
}

impl DestinationFile {
    fn apply_to(self, dest: &mut DestinationConfig) {
        if let Some(v) = self.enabled {
            dest.enabled = v;
        }
        if let Some(v) = self.import_url {
            dest.import_url = v;
        }
        if let Some(v) = self.signin_url {
            dest.signin_url = v;
        }
        if let Some(v) = self.published_url {
            dest.published_url = v;
        }
        if let Some(v) = self.signin_markers {
            dest.signin_markers = v;
        }
        if let Some(v) = self.publish {
            dest.publish = v;
        }
        if let Some(v) = self.timeout_is_success {
            dest.timeout_is_success = v;
        }
        dest.selectors.extend(self.selectors);
    }
}
