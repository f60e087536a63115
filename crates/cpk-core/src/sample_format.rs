//! 音频采样格式定义.

use std::fmt;

/// 音频采样格式
///
/// FILM 只携带 8 位和 16 位 PCM. 8 位采样在分发时被转换为无符号,
/// 16 位采样保持大端有符号. 多声道采样总是交错排列.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum SampleFormat {
    /// 未指定
    None,
    /// 无符号 8 位整数, 交错
    U8,
    /// 有符号 16 位整数, 交错
    S16,
}

impl SampleFormat {
    /// 根据位深选择交错格式
    pub const fn from_bits(bits: u32) -> Self {
        match bits {
            8 => Self::U8,
            16 => Self::S16,
            _ => Self::None,
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::U8 => "u8",
            Self::S16 => "s16",
        };
        write!(f, "{name}")
    }
}
