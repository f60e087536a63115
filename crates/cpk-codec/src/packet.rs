//! 解封装输出的数据包 (Packet).
//!
//! 一个 Packet 对应输出队列中的一个缓冲区单元. 较大的采样会被切分成多个
//! Packet, 同一采样的所有分片共享相同的 PTS, 仅最后一个分片带有
//! [`PacketFlags::FRAME_END`].

use bitflags::bitflags;
use bytes::Bytes;
use cpk_core::Rational;

use crate::CodecId;

bitflags! {
    /// 数据包标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PacketFlags: u32 {
        /// 所属采样为关键帧
        const KEYFRAME   = 1 << 0;
        /// 采样的最后一个分片
        const FRAME_END  = 1 << 1;
        /// `duration` 字段携带帧时长提示
        const FRAME_RATE = 1 << 2;
    }
}

/// 压缩数据包
#[derive(Debug, Clone)]
pub struct Packet {
    /// 压缩数据
    pub data: Bytes,
    /// 显示时间戳 (PTS)
    pub pts: i64,
    /// 帧时长提示 (以 time_base 为单位, 0 表示未知)
    pub duration: i64,
    /// 时间基
    pub time_base: Rational,
    /// 所属流的索引
    pub stream_index: usize,
    /// 数据所用的编解码器
    pub codec_id: CodecId,
    /// 标志
    pub flags: PacketFlags,
    /// 在输入中的字节偏移量 (-1 表示未知)
    pub pos: i64,
    /// 输入数据区总大小 (用于进度计算, 0 表示未知)
    pub input_total: u64,
}

impl Packet {
    /// 创建空数据包
    pub fn empty() -> Self {
        Self {
            data: Bytes::new(),
            pts: cpk_core::timestamp::NOPTS_VALUE,
            duration: 0,
            time_base: Rational::UNDEFINED,
            stream_index: 0,
            codec_id: CodecId::None,
            flags: PacketFlags::empty(),
            pos: -1,
            input_total: 0,
        }
    }

    /// 从数据创建数据包
    pub fn from_data(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            ..Self::empty()
        }
    }

    /// 数据大小 (字节)
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// 是否为空包
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 是否为关键帧
    pub fn is_keyframe(&self) -> bool {
        self.flags.contains(PacketFlags::KEYFRAME)
    }

    /// 是否为采样的最后一个分片
    pub fn is_frame_end(&self) -> bool {
        self.flags.contains(PacketFlags::FRAME_END)
    }
}
