//! FILM 定位.
//!
//! 先在采样表上二分查找目标位置所在的条目, 再回退到关键帧,
//! 然后继续回退到时间戳早于该关键帧的音频条目, 保证音频不晚于视频开始.

use log::debug;

use super::FilmDemuxer;
use super::table::SampleTable;
use crate::demuxer::{DemuxStatus, SeekFlags};
use crate::output::OutputSink;

impl FilmDemuxer {
    /// 定位并复位分发游标
    ///
    /// 目标越过数据区末尾时返回 `Finished`, 游标保持不变.
    pub(super) fn locate(
        &mut self,
        out: &mut dyn OutputSink,
        target: i64,
        flags: SeekFlags,
    ) -> DemuxStatus {
        let found = if flags.byte {
            self.index_for_offset(target)
        } else {
            self.index_for_time(target)
        };
        let Some(found) = found else {
            debug!("FILM: 定位目标 {} 超出范围 (byte={})", target, flags.byte);
            return DemuxStatus::Finished;
        };

        let anchor = keyframe_anchor(&self.table, found);
        let resume = resume_index(&self.table, anchor);
        debug!(
            "FILM: 定位 {} -> 条目 {}, 关键帧 {}, 从 {} 恢复",
            target, found, anchor, resume
        );

        if flags.playing {
            self.cursor.waiting_for_keyframe = true;
        } else {
            self.cursor.waiting_for_keyframe = false;
            self.cursor.last_dispatched = 0;
        }
        self.cursor.current = resume;
        out.flush();
        DemuxStatus::Ok
    }

    /// 数据区内的字节偏移 -> 条目下标
    fn index_for_offset(&self, offset: i64) -> Option<usize> {
        if self.table.is_empty() {
            return None;
        }
        if offset <= 0 {
            return Some(0);
        }
        let offset = offset as u64;
        if offset >= self.data_size {
            return None;
        }
        Some(locate_position(&self.table, self.data_start + offset))
    }

    /// 90 kHz 时间戳 -> 条目下标
    ///
    /// 有视频时取时间戳不晚于目标的最后一个视频条目.
    fn index_for_time(&self, pts: i64) -> Option<usize> {
        if self.table.is_empty() || pts > self.table.max_pts() {
            return None;
        }
        if pts <= 0 {
            return Some(0);
        }
        let entries = self.table.entries();
        let video = self.table.video_indices();
        if video.is_empty() {
            let p = entries.partition_point(|e| e.pts <= pts);
            Some(p.saturating_sub(1))
        } else {
            let p = video.partition_point(|&i| entries[i].pts <= pts);
            Some(video[p.saturating_sub(1)])
        }
    }
}

/// 包含绝对位置 `pos` 的条目: 偏移不大于 `pos` 的最后一个条目
///
/// 位置落在两个采样之间的空隙时归属前一个采样.
pub(super) fn locate_position(table: &SampleTable, pos: u64) -> usize {
    table
        .entries()
        .partition_point(|e| e.offset <= pos)
        .saturating_sub(1)
}

/// 从 `index` 向前找到最近的视频关键帧
///
/// 没有视频条目时原样返回.
pub(super) fn keyframe_anchor(table: &SampleTable, mut index: usize) -> usize {
    if table.video_indices().is_empty() {
        return index;
    }
    let entries = table.entries();
    while index > 0 && !entries[index].is_keyframe() {
        index -= 1;
    }
    index
}

/// 从关键帧向前找到时间戳早于它的音频条目, 找不到时为 0
///
/// 只有一种轨道时直接从锚点恢复.
pub(super) fn resume_index(table: &SampleTable, anchor: usize) -> usize {
    if table.audio_count() == 0 || table.video_indices().is_empty() {
        return anchor;
    }
    let entries = table.entries();
    let keyframe_pts = entries[anchor].pts;
    let mut index = anchor;
    while index > 0 {
        let e = &entries[index];
        if e.is_audio() && e.pts < keyframe_pts {
            break;
        }
        index -= 1;
    }
    index
}
