//! # cpk-codec
//!
//! 编解码器标识 (`CodecId`) 与解封装输出的数据包 (`Packet`).
//!
//! 本框架不做任何解码, 这里只定义解封装器与下游解码器之间交换的类型.

pub mod codec_id;
pub mod packet;

// 重导出常用类型
pub use codec_id::CodecId;
pub use packet::{Packet, PacketFlags};
