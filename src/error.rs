use std::path::PathBuf;

use thiserror::Error;

/// 应用程序错误类型
///
/// 只有会中止整次运行的错误才进入这里；单条导入的失败是数据（见 [`ImportFailure`]）。
#[derive(Debug, Error)]
pub enum AppError {
    /// 订阅源不可用（致命，任何副作用之前）
    #[error("订阅源不可用: {0}")]
    FeedUnavailable(#[from] FeedError),
    /// 导入记录读写错误
    #[error("导入记录错误: {0}")]
    Ledger(#[from] LedgerError),
    /// 浏览器相关错误
    #[error("浏览器错误: {0}")]
    Browser(#[from] BrowserError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

/// 订阅源错误
#[derive(Debug, Error)]
pub enum FeedError {
    /// 网络请求失败
    #[error("请求 {url} 失败: {source}")]
    RequestFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// HTTP 状态码异常
    #[error("请求 {url} 返回状态码 {status}")]
    BadStatus { url: String, status: u16 },
    /// 解析失败
    #[error("解析 {url} 失败: {source}")]
    ParseFailed {
        url: String,
        #[source]
        source: feed_rs::parser::ParseFeedError,
    },
}

/// 导入记录（ledger）错误
#[derive(Debug, Error)]
pub enum LedgerError {
    /// 读取失败（文件不存在不算错误）
    #[error("读取导入记录失败 ({}): {source}", path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 持久化失败：本次成功视为未确认
    #[error("写入导入记录失败 ({}): {source}", path.display())]
    PersistFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 序列化失败
    #[error("序列化导入记录失败: {0}")]
    Serialize(#[from] serde_json::Error),
    /// 另一个进程正在使用同一个导入记录
    #[error("导入记录已被其他进程锁定: {}", path.display())]
    Locked { path: PathBuf },
}

/// 浏览器相关错误
#[derive(Debug, Error)]
pub enum BrowserError {
    /// 浏览器配置失败
    #[error("浏览器配置失败: {0}")]
    ConfigurationFailed(String),
    /// 启动浏览器失败
    #[error("启动浏览器失败: {source}")]
    LaunchFailed {
        #[source]
        source: chromiumoxide::error::CdpError,
    },
    /// 连接浏览器失败
    #[error("无法连接到浏览器 (端口: {port}): {source}")]
    ConnectionFailed {
        port: u16,
        #[source]
        source: chromiumoxide::error::CdpError,
    },
    /// 创建页面失败
    #[error("创建页面失败: {source}")]
    PageCreationFailed {
        #[source]
        source: chromiumoxide::error::CdpError,
    },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置文件读取失败
    #[error("读取配置文件失败 ({}): {source}", path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 配置文件解析失败
    #[error("解析配置文件失败 ({}): {source}", path.display())]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 配置文件中新增的目标平台缺少 kind
    #[error("未知的目标平台 '{0}'（新增目标需要指定 kind）")]
    UnknownDestination(String),
    /// 计划中的目标平台没有对应的驱动
    #[error("目标平台 '{0}' 没有可用的驱动")]
    MissingDriver(String),
    /// --force 指定的条目既不是 URL 也不在订阅源中
    #[error("找不到要强制导入的条目: {0}")]
    UnknownForceTarget(String),
}

/// 单条导入失败原因
///
/// 由目标驱动返回给对账器，不会越过驱动边界抛出。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImportFailure {
    /// 所有候选选择器都没有定位到唯一的可见可用元素
    #[error("无法定位页面元素: {step}")]
    SelectorResolutionFailed { step: String },
    /// 导航超时
    #[error("导航超时: {url}")]
    NavigationTimeout { url: String },
    /// 登录状态失效
    #[error("登录状态已失效，请使用 --login 重新登录")]
    SessionExpired,
    /// 平台拒绝了提交
    #[error("提交被拒绝: {reason}")]
    SubmissionRejected { reason: String },
}

// ========== 便捷构造函数 ==========

impl ImportFailure {
    /// 创建选择器解析失败
    pub fn selector(step: impl Into<String>) -> Self {
        ImportFailure::SelectorResolutionFailed { step: step.into() }
    }

    /// 创建提交被拒绝
    pub fn rejected(reason: impl Into<String>) -> Self {
        ImportFailure::SubmissionRejected {
            reason: reason.into(),
        }
    }

    /// 简短的原因标签（用于产物文件和汇总）
    pub fn label(&self) -> &'static str {
        match self {
            ImportFailure::SelectorResolutionFailed { .. } => "selector_resolution_failed",
            ImportFailure::NavigationTimeout { .. } => "navigation_timeout",
            ImportFailure::SessionExpired => "session_expired",
            ImportFailure::SubmissionRejected { .. } => "submission_rejected",
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
