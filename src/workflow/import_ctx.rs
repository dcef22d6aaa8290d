//! 导入上下文
//!
//! 封装"我正在把第几篇文章导入到哪个平台"这一信息

use std::fmt::Display;

/// 导入上下文（仅用于日志显示）
#[derive(Debug, Clone)]
pub struct ImportCtx {
    /// 目标平台名称
    pub destination: String,

    /// 本平台待导入列表中的序号（从1开始）
    pub position: usize,

    /// 本平台待导入总数
    pub total: usize,
}

impl ImportCtx {
    /// 创建新的导入上下文
    pub fn new(destination: impl Into<String>, position: usize, total: usize) -> Self {
        Self {
            destination: destination.into(),
            position,
            total,
        }
    }
}

impl Display for ImportCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} {}/{}]", self.destination, self.position, self.total)
    }
}
