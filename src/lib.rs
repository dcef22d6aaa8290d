//! # Cross Post Importer
//!
//! 把个人博客订阅源（RSS/Atom）中的文章导入到 Medium、Substack 等平台的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Page），只暴露能力
//! - `JsExecutor` - 唯一的 page owner，实现 `PageOps`
//! - `SelectorChain` - 级联选择器，按顺序尝试候选定位方式
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，不关心流程
//! - `FeedSource` - 拉取并合并订阅源
//! - `LedgerStore` - 导入记录（每次成功立即原子落盘）
//! - `TitleMatcher` - 按标题判断平台上是否已存在
//! - `ArtifactWriter` - 失败时保存截图和页面状态
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一篇文章导入一个平台"的完整流程
//! - `ImportCtx` - 上下文封装（平台 + 序号）
//! - `MediumDriver` / `SubstackDriver` - 各平台的导入驱动
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/reconciler` - 订阅源与导入记录对账，逐条驱动导入
//! - `orchestrator/app` - 模式分发，管理浏览器资源
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use browser::{BrowserHandle, SessionManager};
pub use config::{Config, DestinationConfig, DestinationKind};
pub use error::{AppError, AppResult, ImportFailure};
pub use infrastructure::{JsExecutor, PageOps};
pub use models::{FeedItem, ImportAttempt, ImportOutcome, Ledger};
pub use orchestrator::{App, Mode, Reconciler, RunOptions, RunOutcome, RunPlan, RunReport};
pub use workflow::{ImportCtx, ImportDriver};
