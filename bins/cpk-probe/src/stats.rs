//! 分发统计.

use cpk_core::MediaType;
use cpk_format::SinkEvent;
use serde::Serialize;

/// 单一媒体类型的统计
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct TrackStats {
    /// 分片数
    pub fragments: u64,
    /// 完整采样数 (以采样结束标志计)
    pub samples: u64,
    /// 字节数
    pub bytes: u64,
    /// 关键帧数
    pub keyframes: u64,
    /// 首个采样的时间戳
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_pts: Option<i64>,
    /// 最后一个采样的时间戳
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_pts: Option<i64>,
}

/// 全部分发统计
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SampleStats {
    pub video: TrackStats,
    pub audio: TrackStats,
    /// 新时间线事件数
    pub discontinuities: u64,
    /// 清空事件数
    pub flushes: u64,
    /// 流头部数
    pub headers: u64,
}

impl SampleStats {
    /// 统计一个输出事件
    pub fn observe(&mut self, event: &SinkEvent) {
        match event {
            SinkEvent::Header(_) => self.headers += 1,
            SinkEvent::NewTimeline { .. } => self.discontinuities += 1,
            SinkEvent::Flush => self.flushes += 1,
            SinkEvent::Packet(p) => {
                let track = match p.codec_id.media_type() {
                    MediaType::Video => &mut self.video,
                    MediaType::Audio => &mut self.audio,
                    MediaType::Data => return,
                };
                track.fragments += 1;
                track.bytes += p.size() as u64;
                if p.is_frame_end() {
                    track.samples += 1;
                    if p.is_keyframe() {
                        track.keyframes += 1;
                    }
                    track.first_pts.get_or_insert(p.pts);
                    track.last_pts = Some(p.pts);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpk_codec::{CodecId, Packet, PacketFlags};
    use cpk_format::Discontinuity;

    fn packet(codec_id: CodecId, size: usize, pts: i64, flags: PacketFlags) -> Packet {
        Packet {
            pts,
            codec_id,
            flags,
            ..Packet::from_data(vec![0u8; size])
        }
    }

    #[test]
    fn test_统计_按媒体类型累计() {
        let mut stats = SampleStats::default();
        let events = [
            SinkEvent::NewTimeline {
                pts: 0,
                kind: Discontinuity::Start,
            },
            SinkEvent::Packet(packet(CodecId::Cinepak, 16, 0, PacketFlags::KEYFRAME)),
            SinkEvent::Packet(packet(
                CodecId::Cinepak,
                4,
                0,
                PacketFlags::KEYFRAME | PacketFlags::FRAME_END,
            )),
            SinkEvent::Packet(packet(CodecId::PcmU8, 100, 0, PacketFlags::FRAME_END)),
            SinkEvent::Flush,
            SinkEvent::Packet(packet(CodecId::Cinepak, 8, 6000, PacketFlags::FRAME_END)),
        ];
        for e in &events {
            stats.observe(e);
        }
        assert_eq!(stats.video.fragments, 3);
        assert_eq!(stats.video.samples, 2);
        assert_eq!(stats.video.keyframes, 1);
        assert_eq!(stats.video.bytes, 28);
        assert_eq!(stats.video.first_pts, Some(0));
        assert_eq!(stats.video.last_pts, Some(6000));
        assert_eq!(stats.audio.samples, 1);
        assert_eq!(stats.discontinuities, 1);
        assert_eq!(stats.flushes, 1);
    }
}
