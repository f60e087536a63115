//! 解封装器 (Demuxer) trait 定义.
//!
//! 解封装器由播放引擎以"拉"的方式驱动: 打开后先发送一次流头部,
//! 然后反复调用 `send_chunk()`, 每次处理一个采样表条目, 把分片写入
//! 输出队列. 打开成功之后的任何失败都退化为 [`DemuxStatus::Finished`].

use cpk_core::CpkResult;

use crate::format_id::FormatId;
use crate::io::IoContext;
use crate::output::OutputSink;
use crate::stream::Stream;

/// 解封装状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemuxStatus {
    /// 可以继续分发
    Ok,
    /// 已结束 (自然结束, 读取失败或定位越界)
    Finished,
}

/// 解封装器 trait
///
/// 使用流程:
/// 1. 调用 `open()` 打开容器并解析头部
/// 2. 调用 `send_headers()` 向输出队列发送流头部
/// 3. 循环调用 `send_chunk()` 直到返回 `Finished`
/// 4. 可选: 调用 `seek()` 重新定位
///
/// 所有调用都在同一个线程上串行发生, 实现无需内部加锁.
pub trait Demuxer: Send {
    /// 获取格式标识
    fn format_id(&self) -> FormatId;

    /// 获取格式名称
    fn name(&self) -> &str;

    /// 打开容器并解析头部信息
    ///
    /// 失败表示"不是本格式或无法处理", 调用方应尝试下一个候选格式.
    fn open(&mut self, io: &mut IoContext) -> CpkResult<()>;

    /// 获取所有流信息
    fn streams(&self) -> &[Stream];

    /// 向输出队列发送流头部, 并把分发游标复位到开头
    fn send_headers(&mut self, out: &mut dyn OutputSink);

    /// 分发一个采样表条目
    fn send_chunk(&mut self, io: &mut IoContext, out: &mut dyn OutputSink) -> DemuxStatus;

    /// 定位
    ///
    /// # 参数
    /// - `target`: 字节偏移 (相对数据区起始) 或 90 kHz 时间戳, 由 `flags.byte` 决定
    /// - `flags`: Seek 标志
    fn seek(
        &mut self,
        io: &mut IoContext,
        out: &mut dyn OutputSink,
        target: i64,
        flags: SeekFlags,
    ) -> DemuxStatus;

    /// 当前状态
    fn status(&self) -> DemuxStatus;

    /// 获取容器时长 (秒), None 表示未知
    fn duration(&self) -> Option<f64>;

    /// 获取容器元数据
    fn metadata(&self) -> &[(String, String)] {
        &[]
    }
}

/// Seek 标志
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekFlags {
    /// 基于字节位置 seek (而非时间戳)
    pub byte: bool,
    /// 播放引擎是否正在运行
    ///
    /// 为 `false` 时表示播放前的预定位, 不等待关键帧.
    pub playing: bool,
}

impl SeekFlags {
    /// 按字节偏移定位
    pub const fn byte_offset() -> Self {
        Self {
            byte: true,
            playing: true,
        }
    }

    /// 按 90 kHz 时间戳定位
    pub const fn time() -> Self {
        Self {
            byte: false,
            playing: true,
        }
    }

    /// 标记为播放前的预定位
    pub const fn primed(self) -> Self {
        Self {
            playing: false,
            ..self
        }
    }
}

impl Default for SeekFlags {
    fn default() -> Self {
        Self::byte_offset()
    }
}
