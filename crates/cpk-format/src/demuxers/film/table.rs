//! FILM 采样表.
//!
//! 采样表在打开文件时由 STAB 记录一次性构建, 之后只读.
//! 每个条目的显示时间戳 (90 kHz) 在构建时计算:
//! - 音频: `round(90000 * 之前所有音频字节数 / 每秒字节数)`
//! - 视频: `90000 * (sync_primary & 0x7FFFFFFF) / 时钟频率`

use cpk_core::timestamp::{ticks_to_90k_floor, ticks_to_90k_rounded};
use cpk_core::{CpkError, CpkResult, MediaType};

use super::header::AudioTrack;

/// 音频条目的 sync_primary 标记
pub const AUDIO_SYNC_MARKER: u32 = 0xFFFF_FFFF;

/// 视频帧计数器掩码, 最高位为 "非关键帧" 标志
pub const SYNC_COUNTER_MASK: u32 = 0x7FFF_FFFF;

const DELTA_FRAME_BIT: u32 = 0x8000_0000;

/// STAB 中的原始记录 (偏移相对于头部末尾)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSample {
    pub offset: u32,
    pub size: u32,
    pub sync_primary: u32,
    pub sync_secondary: u32,
}

/// 采样表条目
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleEntry {
    /// 文件中的绝对偏移
    pub offset: u64,
    /// 字节数
    pub size: u32,
    /// 音频标记或视频帧计数器 + 关键帧标志
    pub sync_primary: u32,
    /// 编解码器相关, 不解释
    pub sync_secondary: u32,
    /// 显示时间戳 (90 kHz)
    pub pts: i64,
    /// 到下一视频帧的时间差 (90 kHz), 仅视频条目有意义
    pub frame_duration: i64,
}

impl SampleEntry {
    pub fn is_audio(&self) -> bool {
        self.sync_primary == AUDIO_SYNC_MARKER
    }

    pub fn is_video(&self) -> bool {
        !self.is_audio()
    }

    /// 视频关键帧 (最高位为 0). 音频条目不是关键帧.
    pub fn is_keyframe(&self) -> bool {
        self.is_video() && self.sync_primary & DELTA_FRAME_BIT == 0
    }

    pub fn media_type(&self) -> MediaType {
        if self.is_audio() {
            MediaType::Audio
        } else {
            MediaType::Video
        }
    }

    /// 条目结束位置 (不含)
    pub fn end(&self) -> u64 {
        self.offset + u64::from(self.size)
    }
}

/// 采样表
#[derive(Debug, Clone, Default)]
pub struct SampleTable {
    entries: Vec<SampleEntry>,
    /// 视频条目在 `entries` 中的下标, 升序
    video_indices: Vec<usize>,
    max_pts: i64,
}

impl SampleTable {
    /// 由原始记录构建采样表
    ///
    /// # 参数
    /// - `header_size`: 头部总长, 加到每条记录的偏移上
    /// - `frequency`: 视频时钟频率
    /// - `audio`: 音频轨道, `None` 时出现音频条目即失败
    pub fn build(
        records: &[RawSample],
        header_size: u64,
        frequency: u32,
        audio: Option<&AudioTrack>,
    ) -> CpkResult<Self> {
        let audio_rate = audio.map_or(0, AudioTrack::bytes_per_second);
        let mut audio_bytes: u64 = 0;
        let mut max_pts = 0i64;
        let mut entries = Vec::new();
        entries
            .try_reserve_exact(records.len())
            .map_err(|e| CpkError::InvalidData(format!("采样表分配失败: {}", e)))?;

        for (i, r) in records.iter().enumerate() {
            let pts = if r.sync_primary == AUDIO_SYNC_MARKER {
                let pts = ticks_to_90k_rounded(audio_bytes, audio_rate).ok_or_else(|| {
                    CpkError::InvalidData(format!("采样 {} 为音频, 但文件没有有效的音频参数", i))
                })?;
                audio_bytes += u64::from(r.size);
                pts
            } else {
                let counter = u64::from(r.sync_primary & SYNC_COUNTER_MASK);
                ticks_to_90k_floor(counter, u64::from(frequency)).ok_or_else(|| {
                    CpkError::InvalidData(format!("采样 {} 为视频, 但时钟频率为 0", i))
                })?
            };
            max_pts = max_pts.max(pts);
            entries.push(SampleEntry {
                offset: u64::from(r.offset) + header_size,
                size: r.size,
                sync_primary: r.sync_primary,
                sync_secondary: r.sync_secondary,
                pts,
                frame_duration: 0,
            });
        }

        let video_indices: Vec<usize> = entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_video())
            .map(|(i, _)| i)
            .collect();
        fill_frame_durations(&mut entries, &video_indices);

        let table = Self {
            entries,
            video_indices,
            max_pts,
        };
        table.validate()?;
        Ok(table)
    }

    /// 检查条目在文件中按偏移升序排列且互不重叠
    ///
    /// 定位时的二分查找依赖这一点.
    pub fn validate(&self) -> CpkResult<()> {
        for (i, pair) in self.entries.windows(2).enumerate() {
            if pair[0].end() > pair[1].offset {
                return Err(CpkError::InvalidData(format!(
                    "采样 {} [{}, {}) 与采样 {} (偏移 {}) 重叠或乱序",
                    i,
                    pair[0].offset,
                    pair[0].end(),
                    i + 1,
                    pair[1].offset
                )));
            }
        }
        Ok(())
    }

    pub fn entries(&self) -> &[SampleEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&SampleEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 视频条目下标 (升序)
    pub fn video_indices(&self) -> &[usize] {
        &self.video_indices
    }

    /// 音频条目数
    pub fn audio_count(&self) -> usize {
        self.entries.len() - self.video_indices.len()
    }

    /// 所有条目中最大的时间戳
    pub fn max_pts(&self) -> i64 {
        self.max_pts
    }

    /// 总时长 (整秒, 向下取整)
    pub fn duration_secs(&self) -> u64 {
        (self.max_pts as u64) / cpk_core::PTS_CLOCK_HZ
    }

    /// 数据区末尾 (最后一个采样的结束位置)
    pub fn data_end(&self) -> Option<u64> {
        self.entries.last().map(SampleEntry::end)
    }
}

/// 为每个视频条目计算到下一视频条目的时间差
///
/// 最后一帧沿用前一帧的时间差, 只有一帧时为 0.
fn fill_frame_durations(entries: &mut [SampleEntry], video_indices: &[usize]) {
    for pair in video_indices.windows(2) {
        let delta = entries[pair[1]].pts - entries[pair[0]].pts;
        entries[pair[0]].frame_duration = delta.max(0);
    }
    if let [.., prev, last] = *video_indices {
        entries[last].frame_duration = entries[prev].frame_duration;
    }
}
