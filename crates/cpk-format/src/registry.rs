//! 容器格式注册表.
//!
//! 管理所有已注册的解封装器, 支持按格式标识查找和自动探测.
//! 自动打开时按探测分数从高到低依次尝试, 某个候选 `open()` 失败就换下一个.

use std::collections::HashMap;

use cpk_core::{CpkError, CpkResult};
use log::{debug, warn};

use crate::demuxer::Demuxer;
use crate::format_id::FormatId;
use crate::io::IoContext;
use crate::probe::{FormatProbe, ProbeResult};

/// 解封装器工厂函数类型
pub type DemuxerFactory = fn() -> CpkResult<Box<dyn Demuxer>>;

/// 探测时读取的最大字节数
const PROBE_SIZE: u64 = 8192;

/// 容器格式注册表
pub struct FormatRegistry {
    /// 解封装器工厂映射
    demuxers: HashMap<FormatId, DemuxerEntry>,
    /// 格式探测器列表
    probes: Vec<Box<dyn FormatProbe + Send>>,
}

/// 解封装器注册条目
struct DemuxerEntry {
    /// 格式名称
    name: String,
    /// 工厂函数
    factory: DemuxerFactory,
}

impl FormatRegistry {
    /// 创建空的注册表
    pub fn new() -> Self {
        Self {
            demuxers: HashMap::new(),
            probes: Vec::new(),
        }
    }

    /// 注册一个解封装器
    pub fn register_demuxer(
        &mut self,
        format_id: FormatId,
        name: impl Into<String>,
        factory: DemuxerFactory,
    ) {
        self.demuxers.insert(
            format_id,
            DemuxerEntry {
                name: name.into(),
                factory,
            },
        );
    }

    /// 注册一个格式探测器
    pub fn register_probe(&mut self, probe: Box<dyn FormatProbe + Send>) {
        self.probes.push(probe);
    }

    /// 查找指定格式的注册条目
    fn entry(&self, format_id: FormatId) -> CpkResult<&DemuxerEntry> {
        self.demuxers.get(&format_id).ok_or_else(|| {
            CpkError::FormatNotFound(format!("未找到 {} 的解封装器", format_id))
        })
    }

    /// 探测数据的容器格式, 返回所有候选 (按置信度从高到低)
    pub fn probe_all(&self, data: &[u8], filename: Option<&str>) -> Vec<ProbeResult> {
        let mut results: Vec<ProbeResult> = self
            .probes
            .iter()
            .filter_map(|probe| {
                probe.probe(data, filename).map(|score| ProbeResult {
                    format_id: probe.format_id(),
                    score,
                })
            })
            .collect();
        results.sort_by(|a, b| b.score.cmp(&a.score));
        results
    }

    /// 读取输入头部并探测所有候选格式, 然后 seek 回起始位置
    fn probe_candidates(
        &self,
        io: &mut IoContext,
        filename: Option<&str>,
    ) -> CpkResult<Vec<ProbeResult>> {
        let probe_size = io.size().unwrap_or(PROBE_SIZE).min(PROBE_SIZE) as usize;
        let probe_buf = io.read_bytes(probe_size)?;

        // seek 回起始位置, 供后续 demuxer 读取
        io.seek(std::io::SeekFrom::Start(0))?;
        Ok(self.probe_all(&probe_buf, filename))
    }

    /// 根据文件自动探测格式并打开解封装器
    ///
    /// 候选按置信度依次尝试. 某个候选打开失败时回到起始位置, 继续下一个;
    /// 全部失败时返回 `FormatNotFound`.
    pub fn open_input(
        &self,
        io: &mut IoContext,
        filename: Option<&str>,
    ) -> CpkResult<(ProbeResult, Box<dyn Demuxer>)> {
        let candidates = self.probe_candidates(io, filename)?;
        for candidate in candidates {
            let entry = self.entry(candidate.format_id)?;
            let mut demuxer = (entry.factory)()?;
            match demuxer.open(io) {
                Ok(()) => {
                    debug!(
                        "选中格式 {} ({}, 置信度 {})",
                        candidate.format_id, entry.name, candidate.score
                    );
                    return Ok((candidate, demuxer));
                }
                Err(e) => {
                    if e.is_rejection() {
                        debug!("{} 拒绝了输入: {}", candidate.format_id, e);
                    } else {
                        warn!("{} 打开失败: {}", candidate.format_id, e);
                    }
                    io.seek(std::io::SeekFrom::Start(0))?;
                }
            }
        }
        Err(CpkError::FormatNotFound(
            "没有解封装器能够处理输入文件".to_string(),
        ))
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::new()
    }
}
