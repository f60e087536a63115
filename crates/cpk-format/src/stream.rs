//! 流信息定义.
//!
//! 描述容器中的一条音频或视频轨道. 打开文件时构建一次, 之后只读.

use cpk_codec::CodecId;
use cpk_core::{ChannelLayout, MediaType, Rational, SampleFormat};

/// 流信息
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    /// 流索引 (在容器中的位置, 从 0 开始)
    pub index: usize,
    /// 媒体类型
    pub media_type: MediaType,
    /// 编解码器标识
    pub codec_id: CodecId,
    /// 时间基
    pub time_base: Rational,
    /// 流时长 (以 time_base 为单位, -1 表示未知)
    pub duration: i64,
    /// 起始时间 (以 time_base 为单位)
    pub start_time: i64,
    /// 采样表中属于此流的条目数
    pub nb_frames: u64,
    /// 流特定参数
    pub params: StreamParams,
}

/// 流特定参数
#[derive(Debug, Clone, PartialEq)]
pub enum StreamParams {
    /// 视频流参数
    Video(VideoStreamParams),
    /// 音频流参数
    Audio(AudioStreamParams),
}

/// 视频流参数
#[derive(Debug, Clone, PartialEq)]
pub struct VideoStreamParams {
    /// 宽度 (像素)
    pub width: u32,
    /// 高度 (像素)
    pub height: u32,
    /// 容器中记录的原始 FourCC
    pub fourcc: [u8; 4],
    /// 帧率 (由首两帧的时间差推导, 未知时为 `Rational::UNDEFINED`)
    pub frame_rate: Rational,
}

/// 音频流参数
#[derive(Debug, Clone, PartialEq)]
pub struct AudioStreamParams {
    /// 采样率 (Hz)
    pub sample_rate: u32,
    /// 声道布局
    pub channel_layout: ChannelLayout,
    /// 采样格式 (分发后的格式)
    pub sample_format: SampleFormat,
    /// 位深
    pub bits_per_sample: u32,
    /// 码率 (bps)
    pub bit_rate: u64,
}

impl Stream {
    /// 视频参数 (非视频流返回 `None`)
    pub fn video(&self) -> Option<&VideoStreamParams> {
        match &self.params {
            StreamParams::Video(v) => Some(v),
            StreamParams::Audio(_) => None,
        }
    }

    /// 音频参数 (非音频流返回 `None`)
    pub fn audio(&self) -> Option<&AudioStreamParams> {
        match &self.params {
            StreamParams::Audio(a) => Some(a),
            StreamParams::Video(_) => None,
        }
    }
}
