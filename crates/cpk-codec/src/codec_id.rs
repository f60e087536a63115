//! 编解码器标识符.
//!
//! 为每种编解码算法分配唯一标识, 并提供 FourCC 到标识的映射.

use std::fmt;
use cpk_core::MediaType;

/// 编解码器标识符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CodecId {
    /// 未知编解码器
    None,

    // ========================
    // 视频编解码器
    // ========================
    /// Cinepak (FourCC "cvid")
    Cinepak,
    /// Sega Saturn FILM 专用视频
    SegaVideo,
    /// Raw 视频 (未压缩)
    RawVideo,
    /// 无法识别 FourCC 的视频
    UnknownVideo,

    // ========================
    // 音频编解码器
    // ========================
    /// PCM 无符号 8 位
    PcmU8,
    /// PCM 有符号 16 位大端
    PcmS16be,
}

impl CodecId {
    /// 获取编解码器对应的媒体类型
    pub const fn media_type(&self) -> MediaType {
        match self {
            Self::None => MediaType::Data,
            Self::Cinepak | Self::SegaVideo | Self::RawVideo | Self::UnknownVideo => {
                MediaType::Video
            }
            Self::PcmU8 | Self::PcmS16be => MediaType::Audio,
        }
    }

    /// 获取编解码器名称
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Cinepak => "cinepak",
            Self::SegaVideo => "sega_film",
            Self::RawVideo => "rawvideo",
            Self::UnknownVideo => "unknown_video",
            Self::PcmU8 => "pcm_u8",
            Self::PcmS16be => "pcm_s16be",
        }
    }

    /// 根据视频 FourCC 查找编解码器
    ///
    /// 未登记的 FourCC 映射为 [`CodecId::UnknownVideo`], 不会失败.
    pub fn from_video_fourcc(fourcc: &[u8; 4]) -> Self {
        match fourcc {
            b"cvid" | b"CVID" => Self::Cinepak,
            b"SEGA" | b"sega" => Self::SegaVideo,
            b"raw " | b"RAW " => Self::RawVideo,
            _ => Self::UnknownVideo,
        }
    }

    /// 根据 PCM 位深选择音频编解码器
    ///
    /// FILM 的 8 位采样在分发时统一转换为无符号, 16 位为大端有符号.
    pub const fn from_pcm_bits(bits: u32) -> Self {
        match bits {
            8 => Self::PcmU8,
            16 => Self::PcmS16be,
            _ => Self::None,
        }
    }
}

impl fmt::Display for CodecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
