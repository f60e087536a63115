//! # cpk-format
//!
//! CPK 解封装框架容器格式库.
//!
//! 提供 I/O 抽象、解封装器 trait、输出队列、格式探测与注册表,
//! 以及 Sega FILM/CPK 解封装器.

pub mod demuxer;
pub mod demuxers;
pub mod format_id;
pub mod io;
pub mod output;
pub mod probe;
pub mod registry;
pub mod stream;

// 重导出常用类型
pub use demuxer::{DemuxStatus, Demuxer, SeekFlags};
pub use format_id::FormatId;
pub use io::IoContext;
pub use output::{BufferQueue, Discontinuity, OutputSink, QueueConfig, SinkEvent};
pub use probe::ProbeResult;
pub use registry::FormatRegistry;
pub use stream::Stream;

/// 注册所有内置容器格式
pub fn register_all(registry: &mut FormatRegistry) {
    demuxers::register_all_demuxers(registry);
}
