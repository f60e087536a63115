//! 统一错误类型定义.
//!
//! 所有 CPK crate 共用的错误类型, 支持跨模块传播.

use thiserror::Error;

/// CPK 框架统一错误类型
#[derive(Debug, Error)]
pub enum CpkError {
    /// 无效参数
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 不支持的操作
    #[error("不支持的操作: {0}")]
    Unsupported(String),

    /// 容器格式错误
    #[error("格式错误: {0}")]
    Format(String),

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 已到达流末尾
    #[error("已到达流末尾")]
    Eof,

    /// 未找到指定的容器格式
    #[error("未找到容器格式: {0}")]
    FormatNotFound(String),

    /// 未找到指定的流
    #[error("未找到流: 索引 {0}")]
    StreamNotFound(usize),

    /// 无效数据 (损坏的码流等)
    #[error("无效数据: {0}")]
    InvalidData(String),

    /// 头部数据被截断, 读取越过了缓冲区末尾
    #[error("头部被截断: 偏移 {offset} 处需要 {needed} 字节, 仅剩 {available} 字节")]
    TruncatedHeader {
        /// 读取起始偏移
        offset: usize,
        /// 需要的字节数
        needed: usize,
        /// 实际剩余字节数
        available: usize,
    },

    /// 内部错误 (不应发生)
    #[error("内部错误: {0}")]
    Internal(String),
}

impl CpkError {
    /// 是否为"不是本格式"一类的拒绝错误
    ///
    /// 注册表据此决定是否继续尝试下一个候选解封装器.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::InvalidData(_)
                | Self::TruncatedHeader { .. }
                | Self::Unsupported(_)
                | Self::Format(_)
                | Self::Eof
        )
    }
}

/// CPK 框架统一 Result 类型
pub type CpkResult<T> = Result<T, CpkError>;
