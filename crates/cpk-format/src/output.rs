//! 输出队列.
//!
//! 解封装器不关心下游如何解码, 只把带标签的数据包写入 [`OutputSink`]:
//! 流头部, 按缓冲区单元切分的数据分片, 以及时间线控制事件 (新时间线 / 清空).
//!
//! [`BufferQueue`] 是一个简单的内存实现, 按到达顺序记录所有事件,
//! 供探测工具和测试使用.

use std::collections::VecDeque;

use cpk_codec::Packet;
use cpk_core::MediaType;
use serde::{Deserialize, Serialize};

use crate::stream::Stream;

/// 缓冲区单元的最小字节数
///
/// Cinepak 修补需要首个分片至少容纳 10 字节帧头.
pub const MIN_BUFFER_SIZE: usize = 16;

/// 新时间线的类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discontinuity {
    /// 播放起点, 时间戳为 0, 不需要丢弃缓冲
    Start,
    /// 用户发起的定位, 下游应丢弃过时缓冲
    Seek,
}

impl Discontinuity {
    /// 根据新时间线的锚点时间戳判断类型
    pub const fn for_pts(pts: i64) -> Self {
        if pts == 0 { Self::Start } else { Self::Seek }
    }
}

/// 输出目标 trait
///
/// 对应播放引擎的音频/视频队列. 某个媒体类型没有队列时,
/// `accepts()` 返回 `false`, 解封装器会跳过该类型的采样.
pub trait OutputSink {
    /// 是否存在此媒体类型的队列
    fn accepts(&self, media_type: MediaType) -> bool;

    /// 此媒体类型队列的单个缓冲区容量 (字节)
    fn buffer_size(&self, media_type: MediaType) -> usize;

    /// 发送流头部
    fn put_header(&mut self, stream: &Stream);

    /// 发送一个数据分片
    fn put_packet(&mut self, packet: Packet);

    /// 声明新时间线, 锚定在 `pts` (90 kHz)
    fn new_timeline(&mut self, pts: i64, kind: Discontinuity);

    /// 清空下游已缓冲的数据
    fn flush(&mut self);
}

/// 输出队列配置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct QueueConfig {
    /// 视频缓冲区单元大小 (字节)
    #[serde(default = "default_buffer_size")]
    pub video_buffer_size: usize,
    /// 音频缓冲区单元大小 (字节)
    #[serde(default = "default_buffer_size")]
    pub audio_buffer_size: usize,
    /// 是否接收视频
    #[serde(default = "default_true")]
    pub video: bool,
    /// 是否接收音频
    #[serde(default = "default_true")]
    pub audio: bool,
}

fn default_buffer_size() -> usize {
    8192
}

fn default_true() -> bool {
    true
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            video_buffer_size: default_buffer_size(),
            audio_buffer_size: default_buffer_size(),
            video: true,
            audio: true,
        }
    }
}

/// 输出事件
#[derive(Debug, Clone)]
pub enum SinkEvent {
    /// 流头部
    Header(Stream),
    /// 数据分片
    Packet(Packet),
    /// 新时间线
    NewTimeline {
        /// 锚点时间戳 (90 kHz)
        pts: i64,
        /// 类型
        kind: Discontinuity,
    },
    /// 清空
    Flush,
}

/// 内存输出队列
///
/// 按顺序记录所有事件.
#[derive(Debug, Default)]
pub struct BufferQueue {
    config: QueueConfig,
    events: VecDeque<SinkEvent>,
}

impl BufferQueue {
    /// 按配置创建队列
    ///
    /// 缓冲区单元小于 [`MIN_BUFFER_SIZE`] 时按最小值处理.
    pub fn new(config: QueueConfig) -> Self {
        Self {
            config,
            events: VecDeque::new(),
        }
    }

    /// 取出最早的事件
    pub fn pop(&mut self) -> Option<SinkEvent> {
        self.events.pop_front()
    }

    /// 取出全部事件
    pub fn drain(&mut self) -> Vec<SinkEvent> {
        self.events.drain(..).collect()
    }

    /// 当前记录的全部事件
    pub fn events(&self) -> impl Iterator<Item = &SinkEvent> {
        self.events.iter()
    }

    /// 当前记录的全部数据分片
    pub fn packets(&self) -> impl Iterator<Item = &Packet> {
        self.events.iter().filter_map(|e| match e {
            SinkEvent::Packet(p) => Some(p),
            _ => None,
        })
    }

    /// 事件数量
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// 是否没有事件
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// 队列配置
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }
}

impl OutputSink for BufferQueue {
    fn accepts(&self, media_type: MediaType) -> bool {
        match media_type {
            MediaType::Video => self.config.video,
            MediaType::Audio => self.config.audio,
            MediaType::Data => false,
        }
    }

    fn buffer_size(&self, media_type: MediaType) -> usize {
        let size = match media_type {
            MediaType::Video => self.config.video_buffer_size,
            _ => self.config.audio_buffer_size,
        };
        size.max(MIN_BUFFER_SIZE)
    }

    fn put_header(&mut self, stream: &Stream) {
        self.events.push_back(SinkEvent::Header(stream.clone()));
    }

    fn put_packet(&mut self, packet: Packet) {
        self.events.push_back(SinkEvent::Packet(packet));
    }

    fn new_timeline(&mut self, pts: i64, kind: Discontinuity) {
        self.events.push_back(SinkEvent::NewTimeline { pts, kind });
    }

    fn flush(&mut self) {
        self.events.push_back(SinkEvent::Flush);
    }
}
