//! Sega FILM / CPK 解封装器.
//!
//! FILM 是 Sega Saturn 及同期 PC 游戏使用的交错音视频容器.
//! 文件头部包含一个完整的采样表 (STAB), 因此打开时即可建立全部索引,
//! 定位时在采样表上二分查找, 再回退到关键帧和它之前的音频.
//!
//! 文件结构:
//! ```text
//! [签名 16 字节][FDSC][STAB] | [采样数据 ...]
//!                             ^ 数据区起始 = 头部总长
//! ```
//!
//! 子模块:
//! - `header`: 签名与头部块解析
//! - `table`: 采样表与时间戳推导
//! - `seek`: 定位
//! - `dispatch`: 采样分发
//! - `fixup`: Cinepak 帧头修正与 8 位音频转换

mod dispatch;
mod fixup;
mod header;
mod seek;
mod table;

#[cfg(test)]
mod fixture;

pub use fixup::{
    AudioTransform, cinepak_correction, patch_cinepak_frame_size, sign_magnitude_to_unsigned,
    signed_to_unsigned,
};
pub use header::{AudioTrack, Signature, VideoTrack};
pub use table::{AUDIO_SYNC_MARKER, SampleEntry, SampleTable};

use std::io::SeekFrom;

use cpk_codec::CodecId;
use cpk_core::timestamp::PTS_TIME_BASE;
use cpk_core::{ChannelLayout, CpkError, CpkResult, MediaType, Rational, SampleFormat};
use log::debug;

use crate::demuxer::{DemuxStatus, Demuxer, SeekFlags};
use crate::format_id::FormatId;
use crate::io::IoContext;
use crate::output::OutputSink;
use crate::probe::{FormatProbe, ProbeScore, SCORE_EXTENSION, SCORE_MAX};
use crate::stream::{AudioStreamParams, Stream, StreamParams, VideoStreamParams};

/// 视频流索引
const VIDEO_STREAM_INDEX: usize = 0;
/// 音频流索引 (存在音频时)
const AUDIO_STREAM_INDEX: usize = 1;

/// 分发游标
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Cursor {
    /// 下一个要分发的条目
    current: usize,
    /// 上一次分发的条目, 用于检测定位造成的跳变
    last_dispatched: usize,
    /// 定位后丢弃视频非关键帧, 直到遇到关键帧
    waiting_for_keyframe: bool,
}

/// FILM 解封装器
#[derive(Debug)]
pub struct FilmDemuxer {
    /// 流信息
    streams: Vec<Stream>,
    /// 采样表
    table: SampleTable,
    /// 视频轨道
    video: Option<VideoTrack>,
    /// 音频轨道
    audio: Option<AudioTrack>,
    /// 数据区起始偏移 (= 头部总长)
    data_start: u64,
    /// 数据区大小
    data_size: u64,
    /// Cinepak 封装修正量
    cinepak_correction: u32,
    /// 8 位音频转换
    audio_transform: AudioTransform,
    /// 分发游标
    cursor: Cursor,
    /// 状态
    status: DemuxStatus,
    /// 元数据
    metadata: Vec<(String, String)>,
}

impl FilmDemuxer {
    /// 创建 FILM 解封装器 (工厂函数)
    pub fn create() -> CpkResult<Box<dyn Demuxer>> {
        Ok(Box::new(Self::new()))
    }

    fn new() -> Self {
        Self {
            streams: Vec::new(),
            table: SampleTable::default(),
            video: None,
            audio: None,
            data_start: 0,
            data_size: 0,
            cinepak_correction: 0,
            audio_transform: AudioTransform::Passthrough,
            cursor: Cursor::default(),
            status: DemuxStatus::Finished,
            metadata: Vec::new(),
        }
    }

    /// 采样表
    pub fn sample_table(&self) -> &SampleTable {
        &self.table
    }

    /// 数据区大小 (字节)
    pub fn data_size(&self) -> u64 {
        self.data_size
    }

    /// 总时长 (整秒, 向下取整)
    pub fn total_duration_secs(&self) -> u64 {
        self.table.duration_secs()
    }

    /// 下一个要分发的条目
    pub fn current_index(&self) -> usize {
        self.cursor.current
    }

    fn build_streams(&mut self) {
        self.streams.clear();
        let Some(video) = &self.video else {
            return;
        };

        let video_indices = self.table.video_indices();
        let frame_rate = video_indices
            .first()
            .and_then(|&i| self.table.get(i))
            .and_then(|e| i32::try_from(e.frame_duration).ok())
            .filter(|&d| d > 0)
            .map_or(Rational::UNDEFINED, |d| Rational::new(90_000, d).reduce());
        let video_duration = video_indices
            .last()
            .and_then(|&i| self.table.get(i))
            .map_or(0, |e| e.pts + e.frame_duration);

        self.streams.push(Stream {
            index: VIDEO_STREAM_INDEX,
            media_type: MediaType::Video,
            codec_id: video.codec_id,
            time_base: PTS_TIME_BASE,
            duration: video_duration,
            start_time: 0,
            nb_frames: video_indices.len() as u64,
            params: StreamParams::Video(VideoStreamParams {
                width: video.width,
                height: video.height,
                fourcc: video.fourcc,
                frame_rate,
            }),
        });

        if let Some(audio) = &self.audio {
            let audio_duration = self
                .table
                .entries()
                .iter()
                .filter(|e| e.is_audio())
                .map(|e| e.pts)
                .max()
                .unwrap_or(0);
            self.streams.push(Stream {
                index: AUDIO_STREAM_INDEX,
                media_type: MediaType::Audio,
                codec_id: audio.codec_id(),
                time_base: PTS_TIME_BASE,
                duration: audio_duration,
                start_time: 0,
                nb_frames: self.table.audio_count() as u64,
                params: StreamParams::Audio(AudioStreamParams {
                    sample_rate: audio.sample_rate,
                    channel_layout: ChannelLayout::from_channels(audio.channels),
                    sample_format: SampleFormat::from_bits(audio.bits),
                    bits_per_sample: audio.bits,
                    bit_rate: audio.bytes_per_second() * 8,
                }),
            });
        }
    }

    /// 条目所属的流索引与编解码器
    fn stream_of(&self, entry: &SampleEntry) -> (usize, CodecId) {
        if entry.is_audio() {
            let codec = self.audio.as_ref().map_or(CodecId::None, AudioTrack::codec_id);
            (AUDIO_STREAM_INDEX, codec)
        } else {
            let codec = self.video.as_ref().map_or(CodecId::None, |v| v.codec_id);
            (VIDEO_STREAM_INDEX, codec)
        }
    }
}

impl Demuxer for FilmDemuxer {
    fn format_id(&self) -> FormatId {
        FormatId::Film
    }

    fn name(&self) -> &str {
        "film_cpk"
    }

    fn open(&mut self, io: &mut IoContext) -> CpkResult<()> {
        if !io.is_seekable() {
            return Err(CpkError::Unsupported(
                "FILM 解封装需要可随机访问的输入".into(),
            ));
        }
        io.seek(SeekFrom::Start(0))?;

        let sig_buf = io.read_bytes(header::SIGNATURE_SIZE)?;
        let signature = Signature::parse(&sig_buf)?;
        let header_size = u64::from(signature.header_size);
        if let Some(size) = io.size() {
            if header_size > size {
                return Err(CpkError::InvalidData(format!(
                    "头部长度 {} 超出文件大小 {}",
                    header_size, size
                )));
            }
        }

        let body = io.read_bytes(signature.body_size())?;
        let parsed = header::parse_header(&body)?;
        let table = SampleTable::build(
            &parsed.records,
            header_size,
            parsed.frequency,
            parsed.audio.as_ref(),
        )?;

        let data_end = match io.size() {
            Some(size) => size,
            None => table.data_end().unwrap_or(header_size),
        };

        self.data_start = header_size;
        self.data_size = data_end.saturating_sub(header_size);
        self.cinepak_correction = cinepak_correction(&signature.version);
        self.audio_transform = parsed
            .audio
            .as_ref()
            .map_or(AudioTransform::Passthrough, |a| {
                AudioTransform::for_track(a.bits, parsed.video.codec_id)
            });
        self.metadata = vec![
            (
                "version".to_string(),
                String::from_utf8_lossy(&signature.version)
                    .trim_end_matches('\0')
                    .to_string(),
            ),
            (
                "fourcc".to_string(),
                String::from_utf8_lossy(&parsed.video.fourcc).to_string(),
            ),
        ];
        self.video = Some(parsed.video);
        self.audio = parsed.audio;
        self.table = table;
        self.build_streams();
        self.cursor = Cursor::default();
        self.status = DemuxStatus::Ok;

        debug!(
            "FILM: 头部 {} 字节, 数据区 {} 字节, {} 个采样 (视频 {}), 时长 {} 秒",
            header_size,
            self.data_size,
            self.table.len(),
            self.table.video_indices().len(),
            self.table.duration_secs()
        );
        Ok(())
    }

    fn streams(&self) -> &[Stream] {
        &self.streams
    }

    fn send_headers(&mut self, out: &mut dyn OutputSink) {
        self.cursor = Cursor::default();
        self.status = DemuxStatus::Ok;
        for stream in &self.streams {
            if out.accepts(stream.media_type) {
                out.put_header(stream);
            }
        }
    }

    fn send_chunk(&mut self, io: &mut IoContext, out: &mut dyn OutputSink) -> DemuxStatus {
        self.status = self.dispatch_next(io, out);
        self.status
    }

    fn seek(
        &mut self,
        _io: &mut IoContext,
        out: &mut dyn OutputSink,
        target: i64,
        flags: SeekFlags,
    ) -> DemuxStatus {
        self.status = self.locate(out, target, flags);
        self.status
    }

    fn status(&self) -> DemuxStatus {
        self.status
    }

    fn duration(&self) -> Option<f64> {
        if self.table.is_empty() {
            return None;
        }
        Some(self.table.duration_secs() as f64)
    }

    fn metadata(&self) -> &[(String, String)] {
        &self.metadata
    }
}

/// FILM 格式探测器
pub struct FilmProbe;

impl FormatProbe for FilmProbe {
    fn probe(&self, data: &[u8], filename: Option<&str>) -> Option<ProbeScore> {
        if data.starts_with(b"FILM") {
            return Some(SCORE_MAX);
        }

        if let Some(name) = filename {
            if FormatId::from_filename(name) == Some(FormatId::Film) {
                return Some(SCORE_EXTENSION);
            }
        }

        None
    }

    fn format_id(&self) -> FormatId {
        FormatId::Film
    }
}
