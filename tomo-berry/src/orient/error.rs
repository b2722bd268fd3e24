//! 取向提取的运行时错误.

use crate::tool::ToolError;

/// 模型查看工具 (inspector) 错误.
#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    /// 外部工具运行失败.
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// 读写标注表或中间文件失败.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// 取向提取错误.
///
/// [`ExtractError::NoAnnotations`] 与其余两种 (均属于 "解析失败") 必须可区分,
/// 以便诊断.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// 外部工具无法解析资源.
    #[error("inspector failed: {0}")]
    Inspect(#[from] InspectError),

    /// 某一行不是 6 个有限数值.
    #[error("malformed row {line}: {reason}")]
    Malformed {
        /// 行号 (从 1 开始).
        line: usize,

        /// 原因.
        reason: String,
    },

    /// 资源可以解析, 但不含任何标注.
    #[error("no annotations")]
    NoAnnotations,
}

impl ExtractError {
    /// 是否属于 "解析失败" 一类.
    #[inline]
    pub fn is_parse_failure(&self) -> bool {
        !matches!(self, Self::NoAnnotations)
    }
}
