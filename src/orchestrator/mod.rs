//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `app` - 应用入口
//! - 按模式分发（导入 / 演练 / 检查 / 登录）
//! - 管理浏览器资源（只在需要时启动）
//! - 输出全局统计信息
//!
//! ### `reconciler` - 对账器
//! - 订阅源与导入记录求差集
//! - 逐个目标平台、逐篇文章调用驱动
//! - 每次成功立即落盘
//!
//! ## 层次关系
//!
//! ```text
//! app (模式与资源)
//!     ↓
//! reconciler (订阅源 × 目标平台)
//!     ↓
//! workflow::ImportDriver (单篇文章 → 单个平台)
//!     ↓
//! services (能力层：feed / ledger / artifacts / topics)
//!     ↓
//! infrastructure (基础设施：PageOps / JsExecutor)
//! ```

pub mod app;
pub mod reconciler;

pub use app::{App, Mode};
pub use reconciler::{
    plan, resolve_forced_item, ForceTarget, PlannedDestination, Reconciler, RunOptions,
    RunOutcome, RunPlan, RunReport, TitleMatch,
};
