//! FILM 采样分发.
//!
//! 每次调用处理采样表中的一个条目: 检测游标跳变并声明新时间线,
//! 定位后丢弃视频非关键帧, 然后按输出队列的缓冲区单元切分负载.

use std::io::SeekFrom;

use bytes::Bytes;
use cpk_codec::{CodecId, Packet, PacketFlags};
use cpk_core::timestamp::PTS_TIME_BASE;
use cpk_core::{CpkResult, MediaType};
use log::{trace, warn};

use super::FilmDemuxer;
use super::fixup::{CINEPAK_FRAME_HEADER_SIZE, patch_cinepak_frame_size};
use super::table::SampleEntry;
use crate::demuxer::DemuxStatus;
use crate::io::IoContext;
use crate::output::{Discontinuity, MIN_BUFFER_SIZE, OutputSink};

impl FilmDemuxer {
    /// 分发下一个条目
    pub(super) fn dispatch_next(
        &mut self,
        io: &mut IoContext,
        out: &mut dyn OutputSink,
    ) -> DemuxStatus {
        let index = self.cursor.current;
        let Some(entry) = self.table.get(index).copied() else {
            return DemuxStatus::Finished;
        };

        if index != self.cursor.last_dispatched + 1 {
            out.new_timeline(entry.pts, Discontinuity::for_pts(entry.pts));
        }
        self.cursor.last_dispatched = index;
        self.cursor.current = index + 1;

        if entry.is_video() && self.cursor.waiting_for_keyframe {
            if !entry.is_keyframe() {
                trace!("FILM: 等待关键帧, 丢弃条目 {}", index);
                return DemuxStatus::Ok;
            }
            self.cursor.waiting_for_keyframe = false;
        }

        if !out.accepts(entry.media_type()) {
            return DemuxStatus::Ok;
        }

        match self.send_sample(io, out, &entry) {
            Ok(()) => DemuxStatus::Ok,
            Err(e) => {
                warn!("FILM: 读取条目 {} (偏移 {}) 失败: {}", index, entry.offset, e);
                DemuxStatus::Finished
            }
        }
    }

    /// 按缓冲区单元切分并发送一个采样
    fn send_sample(
        &self,
        io: &mut IoContext,
        out: &mut dyn OutputSink,
        entry: &SampleEntry,
    ) -> CpkResult<()> {
        let media_type = entry.media_type();
        let (stream_index, codec_id) = self.stream_of(entry);
        let unit = out.buffer_size(media_type).max(MIN_BUFFER_SIZE);
        let correction = self.cinepak_correction as usize;

        let mut remaining = entry.size as usize;
        let mut cinepak_size = None;
        if codec_id == CodecId::Cinepak && remaining >= CINEPAK_FRAME_HEADER_SIZE + correction {
            remaining -= correction;
            cinepak_size = u32::try_from(remaining).ok();
        }

        let mut base_flags = PacketFlags::empty();
        let mut duration = 0;
        if media_type == MediaType::Video {
            base_flags |= PacketFlags::FRAME_RATE;
            duration = entry.frame_duration;
            if entry.is_keyframe() {
                base_flags |= PacketFlags::KEYFRAME;
            }
        }

        io.seek(SeekFrom::Start(entry.offset))?;
        let mut first = true;
        while remaining > 0 {
            let len = remaining.min(unit);
            let pos = io.position()?;
            let mut buf = vec![0u8; len];

            match cinepak_size {
                Some(chunk_size) if first => {
                    io.read_exact(&mut buf[..CINEPAK_FRAME_HEADER_SIZE])?;
                    io.skip(correction)?;
                    io.read_exact(&mut buf[CINEPAK_FRAME_HEADER_SIZE..])?;
                    if !patch_cinepak_frame_size(&mut buf, chunk_size) {
                        warn!(
                            "FILM: Cinepak 帧长度 {} 超出 24 位, 帧头未修正 (偏移 {})",
                            chunk_size, entry.offset
                        );
                    }
                }
                _ => io.read_exact(&mut buf)?,
            }
            if media_type == MediaType::Audio {
                self.audio_transform.apply(&mut buf);
            }

            trace!(
                "FILM: 分片 pos={} len={} pts={} codec={}",
                pos, len, entry.pts, codec_id
            );
            remaining -= len;
            let mut flags = base_flags;
            if remaining == 0 {
                flags |= PacketFlags::FRAME_END;
            }
            out.put_packet(Packet {
                data: Bytes::from(buf),
                pts: entry.pts,
                duration,
                time_base: PTS_TIME_BASE,
                stream_index,
                codec_id,
                flags,
                pos: pos as i64,
                input_total: self.data_size,
            });
            first = false;
        }
        Ok(())
    }
}
