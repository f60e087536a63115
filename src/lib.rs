//! # CPK
//!
//! 纯 Rust 实现的 Sega FILM/CPK 解封装框架.
//!
//! FILM (扩展名 .cpk / .cak / .film) 是 Sega Saturn 及同期 PC 游戏使用的
//! 交错音视频容器. 本框架负责:
//! - **探测与打开**: 魔数/扩展名探测, 候选格式依次尝试
//! - **采样表**: 解析头部, 推导 90 kHz 显示时间戳
//! - **分发**: 按输出队列的缓冲区单元切分采样, 修正 Cinepak 帧头与 8 位音频
//! - **定位**: 二分查找 + 关键帧回退
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use cpk::format::{BufferQueue, DemuxStatus, IoContext, QueueConfig};
//!
//! let registry = cpk::default_format_registry();
//! let mut io = IoContext::open_read("intro.cpk").unwrap();
//! let (_, mut demuxer) = registry.open_input(&mut io, Some("intro.cpk")).unwrap();
//!
//! let mut out = BufferQueue::new(QueueConfig::default());
//! demuxer.send_headers(&mut out);
//! while demuxer.send_chunk(&mut io, &mut out) == DemuxStatus::Ok {
//!     for event in out.drain() {
//!         println!("{event:?}");
//!     }
//! }
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `cpk-core` | 核心类型与错误 |
//! | `cpk-codec` | 编解码器标识与数据包 |
//! | `cpk-format` | I/O、解封装器、输出队列、FILM 解封装 |

/// 核心类型与工具
pub use cpk_core as core;

/// 编解码器标识与数据包
pub use cpk_codec as codec;

/// 容器格式框架
pub use cpk_format as format;

/// 获取版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// 创建已注册所有内置容器格式的注册表
pub fn default_format_registry() -> cpk_format::FormatRegistry {
    let mut registry = cpk_format::FormatRegistry::new();
    cpk_format::register_all(&mut registry);
    registry
}
