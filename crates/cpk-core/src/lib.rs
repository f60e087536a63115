//! # cpk-core
//!
//! CPK 解封装框架核心库, 提供基础类型定义、错误处理和时间戳工具.
//!
//! 所有上层 crate (编解码标识、容器格式) 共用这里的类型.

pub mod channel_layout;
pub mod error;
pub mod media_type;
pub mod rational;
pub mod sample_format;
pub mod timestamp;

// 重导出常用类型
pub use channel_layout::ChannelLayout;
pub use error::{CpkError, CpkResult};
pub use media_type::MediaType;
pub use rational::Rational;
pub use sample_format::SampleFormat;
pub use timestamp::PTS_CLOCK_HZ;
