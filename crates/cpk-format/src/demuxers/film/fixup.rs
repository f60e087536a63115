//! 分发时对负载做的字节级修正.
//!
//! - Cinepak: FILM 中的 Cinepak 帧多出 2 或 6 字节封装, 帧头中的 24 位长度
//!   字段仍是封装前的值, 分发时去掉多余字节并改写长度.
//! - 8 位音频: 文件中为有符号 (或 Sega 的符号-幅值) 编码, 转换为无符号.

use cpk_codec::CodecId;

/// Cinepak 帧头长度, 多余的封装字节紧跟其后
pub const CINEPAK_FRAME_HEADER_SIZE: usize = 10;

/// 根据文件版本字段选择 Cinepak 封装修正量
///
/// 早期文件 (版本字段全为 0) 多出 6 字节, 其余为 2 字节.
pub fn cinepak_correction(version: &[u8; 4]) -> u32 {
    if version.iter().all(|&b| b == 0) { 6 } else { 2 }
}

/// 把 Cinepak 帧头中的 24 位大端长度字段 (字节 1..4) 改写为 `chunk_size`
///
/// 分片不足 4 字节或长度超出 24 位时不做修改, 返回 `false`.
pub fn patch_cinepak_frame_size(fragment: &mut [u8], chunk_size: u32) -> bool {
    if fragment.len() < 4 || chunk_size > 0x00FF_FFFF {
        return false;
    }
    fragment[1..4].copy_from_slice(&chunk_size.to_be_bytes()[1..4]);
    true
}

/// 8 位音频的字节编码转换
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioTransform {
    /// 原样转发
    Passthrough,
    /// 有符号 -> 无符号
    SignedToUnsigned,
    /// 符号-幅值 -> 无符号 (Sega 视频配套的音频)
    SignMagnitudeToUnsigned,
}

impl AudioTransform {
    /// 根据音频位深和视频编解码器选择转换
    pub fn for_track(bits: u32, video_codec: CodecId) -> Self {
        match (bits, video_codec) {
            (8, CodecId::SegaVideo) => Self::SignMagnitudeToUnsigned,
            (8, _) => Self::SignedToUnsigned,
            _ => Self::Passthrough,
        }
    }

    /// 原地转换
    pub fn apply(self, buf: &mut [u8]) {
        match self {
            Self::Passthrough => {}
            Self::SignedToUnsigned => signed_to_unsigned(buf),
            Self::SignMagnitudeToUnsigned => sign_magnitude_to_unsigned(buf),
        }
    }
}

/// 有符号 8 位 -> 无符号 8 位
pub fn signed_to_unsigned(buf: &mut [u8]) {
    for b in buf {
        *b ^= 0x80;
    }
}

/// 符号-幅值 8 位 -> 无符号 8 位
///
/// 最高位为符号, 低 7 位为幅值.
pub fn sign_magnitude_to_unsigned(buf: &mut [u8]) {
    for b in buf {
        let magnitude = *b & 0x7F;
        *b = if *b & 0x80 != 0 {
            0x80 - magnitude
        } else {
            0x80 + magnitude
        };
    }
}
