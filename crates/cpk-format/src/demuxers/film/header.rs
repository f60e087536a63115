//! FILM 文件头解析.
//!
//! ```text
//! 签名 (16 字节): "FILM" + 头部总长 (BE32) + 版本 (4 字节) + 保留 (4 字节)
//! 头部块序列:     tag (BE32) + size (BE32, 含 8 字节前导) + payload
//!   FDSC: 轨道描述 (视频 FourCC/宽高, 32 字节时附带音频参数)
//!   STAB: 采样表 (时钟频率 + 条目数 + N 条 16 字节记录)
//! ```
//!
//! 头部整体读入内存后, 用带边界检查的 [`ByteCursor`] 遍历,
//! 任何越界读取都报告为 [`CpkError::TruncatedHeader`].

use byteorder::{BigEndian, ByteOrder};
use cpk_codec::CodecId;
use cpk_core::{CpkError, CpkResult};
use log::debug;

use super::table::RawSample;

/// 文件签名长度
pub(crate) const SIGNATURE_SIZE: usize = 16;

/// 头部总长的上限, 超过即视为损坏文件
pub(crate) const MAX_HEADER_SIZE: u32 = 64 * 1024 * 1024;

const FILM_TAG: [u8; 4] = *b"FILM";
const FDSC_TAG: [u8; 4] = *b"FDSC";
const STAB_TAG: [u8; 4] = *b"STAB";

/// 块前导 (tag + size) 长度
const CHUNK_PREAMBLE_SIZE: usize = 8;
/// STAB 前导 (tag + size + 频率 + 条目数) 长度
const STAB_PREAMBLE_SIZE: usize = 16;
/// 单条采样记录长度
const STAB_RECORD_SIZE: usize = 16;
/// 带音频参数的完整 FDSC 块长度
const FDSC_FULL_SIZE: usize = 32;
/// 读取视频参数所需的最小 FDSC 长度
const FDSC_MIN_SIZE: usize = 20;

/// 文件签名
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    /// 头部总长 (含 16 字节签名), 也是数据区起始偏移
    pub header_size: u32,
    /// 版本字段, 早期文件全为 0
    pub version: [u8; 4],
}

impl Signature {
    /// 解析 16 字节签名
    pub fn parse(buf: &[u8]) -> CpkResult<Self> {
        let cur = ByteCursor::new(buf);
        if cur.tag_at(0)? != FILM_TAG {
            return Err(CpkError::InvalidData("不是 FILM 文件".into()));
        }
        let header_size = cur.u32_at(4)?;
        if (header_size as usize) < SIGNATURE_SIZE {
            return Err(CpkError::InvalidData(format!(
                "头部长度 {} 小于签名长度",
                header_size
            )));
        }
        if header_size > MAX_HEADER_SIZE {
            return Err(CpkError::InvalidData(format!(
                "头部长度 {} 超出上限",
                header_size
            )));
        }
        Ok(Self {
            header_size,
            version: cur.tag_at(8)?,
        })
    }

    /// 签名之后剩余的头部长度
    pub fn body_size(&self) -> usize {
        self.header_size as usize - SIGNATURE_SIZE
    }
}

/// 视频轨道描述
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoTrack {
    /// 编解码器
    pub codec_id: CodecId,
    /// 原始 FourCC
    pub fourcc: [u8; 4],
    /// 宽度
    pub width: u32,
    /// 高度
    pub height: u32,
}

/// 音频轨道描述
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioTrack {
    /// 声道数
    pub channels: u32,
    /// 位深
    pub bits: u32,
    /// 采样率 (Hz), 非 0
    pub sample_rate: u32,
}

impl AudioTrack {
    /// 每秒字节数, 位深小于 8 或声道为 0 时为 0
    pub fn bytes_per_second(&self) -> u64 {
        u64::from(self.sample_rate) * u64::from(self.channels) * u64::from(self.bits / 8)
    }

    /// 分发后的音频编解码器
    pub fn codec_id(&self) -> CodecId {
        CodecId::from_pcm_bits(self.bits)
    }
}

/// 头部解析结果
#[derive(Debug, Clone)]
pub struct ParsedHeader {
    /// 视频轨道
    pub video: VideoTrack,
    /// 音频轨道 (`None` 表示没有声明音频)
    pub audio: Option<AudioTrack>,
    /// 视频时钟频率 (采样表全局)
    pub frequency: u32,
    /// 采样记录 (偏移尚未加上头部长度)
    pub records: Vec<RawSample>,
}

/// 头部块
enum HeaderChunk<'a> {
    /// FDSC 轨道描述, 整块数据 (含前导)
    Description(&'a [u8]),
    /// STAB 采样表
    SampleTable {
        /// 时钟频率
        frequency: u32,
        /// 记录区
        records: &'a [u8],
    },
    /// 无法识别的块
    Unknown([u8; 4]),
}

/// 解析签名之后的头部块序列
///
/// 遇到无法识别的块立即失败, 不会跳过.
pub fn parse_header(buf: &[u8]) -> CpkResult<ParsedHeader> {
    let cur = ByteCursor::new(buf);
    let mut video = None;
    let mut audio = None;
    let mut table = None;

    let mut pos = 0usize;
    while pos < buf.len() {
        let (chunk, advance) = next_chunk(&cur, pos)?;
        match chunk {
            HeaderChunk::Description(body) => {
                let (v, a) = parse_description(body)?;
                debug!(
                    "FDSC: codec={}, {}x{}, 音频={:?}",
                    v.codec_id, v.width, v.height, a
                );
                video = Some(v);
                audio = a;
            }
            HeaderChunk::SampleTable { frequency, records } => {
                let parsed = parse_records(records);
                debug!("STAB: 频率={}, 条目数={}", frequency, parsed.len());
                table = Some((frequency, parsed));
            }
            HeaderChunk::Unknown(tag) => {
                return Err(CpkError::InvalidData(format!(
                    "无法识别的 FILM 块 '{}' (偏移 {})",
                    String::from_utf8_lossy(&tag),
                    pos + SIGNATURE_SIZE
                )));
            }
        }
        pos += advance;
    }

    let video = video.ok_or_else(|| CpkError::InvalidData("缺少 FDSC 块".into()))?;
    let (frequency, records) =
        table.ok_or_else(|| CpkError::InvalidData("缺少 STAB 块".into()))?;

    Ok(ParsedHeader {
        video,
        audio,
        frequency,
        records,
    })
}

/// 读取 `pos` 处的块, 返回块内容与前进的字节数
///
/// 块的声明长度在访问任何 payload 之前就与剩余头部长度比较.
fn next_chunk<'a>(cur: &ByteCursor<'a>, pos: usize) -> CpkResult<(HeaderChunk<'a>, usize)> {
    let tag = cur.tag_at(pos)?;
    let size = cur.u32_at(pos + 4)? as usize;
    let remaining = cur.len() - pos;
    if size > remaining {
        return Err(CpkError::InvalidData(format!(
            "FILM 块大小 {} 超出头部剩余长度 {}",
            size, remaining
        )));
    }

    match tag {
        FDSC_TAG => {
            if size < CHUNK_PREAMBLE_SIZE {
                return Err(CpkError::InvalidData(format!("FDSC 块大小 {} 过小", size)));
            }
            Ok((HeaderChunk::Description(cur.slice(pos, size)?), size))
        }
        STAB_TAG => {
            let frequency = cur.u32_at(pos + 8)?;
            let count = cur.u32_at(pos + 12)? as usize;
            let records_len = count.checked_mul(STAB_RECORD_SIZE).ok_or_else(|| {
                CpkError::InvalidData(format!("STAB 条目数 {} 溢出", count))
            })?;
            let records = cur.slice(pos + STAB_PREAMBLE_SIZE, records_len)?;

            // 部分编码器写出的块长度没有计入 16 字节前导
            let advance = if size == records_len {
                size + STAB_PREAMBLE_SIZE
            } else {
                size
            };
            if advance < STAB_PREAMBLE_SIZE {
                return Err(CpkError::InvalidData(format!("STAB 块大小 {} 过小", size)));
            }
            Ok((HeaderChunk::SampleTable { frequency, records }, advance))
        }
        other => Ok((HeaderChunk::Unknown(other), size)),
    }
}

/// 解析 FDSC 块
fn parse_description(body: &[u8]) -> CpkResult<(VideoTrack, Option<AudioTrack>)> {
    let cur = ByteCursor::new(body);
    if body.len() < FDSC_MIN_SIZE {
        return Err(CpkError::TruncatedHeader {
            offset: 0,
            needed: FDSC_MIN_SIZE,
            available: body.len(),
        });
    }

    let fourcc = cur.tag_at(8)?;
    let video = VideoTrack {
        codec_id: CodecId::from_video_fourcc(&fourcc),
        fourcc,
        height: cur.u32_at(12)?,
        width: cur.u32_at(16)?,
    };

    let (channels, bits, sample_rate) = if body.len() == FDSC_FULL_SIZE {
        (
            u32::from(cur.u8_at(21)?),
            u32::from(cur.u8_at(22)?),
            u32::from(cur.u16_at(24)?),
        )
    } else {
        legacy_audio_profile(video.codec_id)
    };

    let audio = (sample_rate != 0).then_some(AudioTrack {
        channels,
        bits,
        sample_rate,
    });
    Ok((video, audio))
}

/// 早期 (非 32 字节 FDSC) 文件的音频参数, 由视频编解码器推断
///
/// 返回 (声道数, 位深, 采样率), 采样率为 0 表示没有音频.
fn legacy_audio_profile(codec_id: CodecId) -> (u32, u32, u32) {
    match codec_id {
        CodecId::Cinepak => (1, 8, 22050),
        CodecId::SegaVideo => (1, 8, 16000),
        _ => (0, 0, 0),
    }
}

/// 把记录区切分为采样记录
fn parse_records(records: &[u8]) -> Vec<RawSample> {
    records
        .chunks_exact(STAB_RECORD_SIZE)
        .map(|r| RawSample {
            offset: BigEndian::read_u32(&r[0..4]),
            size: BigEndian::read_u32(&r[4..8]),
            sync_primary: BigEndian::read_u32(&r[8..12]),
            sync_secondary: BigEndian::read_u32(&r[12..16]),
        })
        .collect()
}

/// 带边界检查的只读字节游标
pub(crate) struct ByteCursor<'a> {
    buf: &'a [u8],
}

impl<'a> ByteCursor<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub(crate) fn len(&self) -> usize {
        self.buf.len()
    }

    /// 取 `[offset, offset + len)` 子切片
    pub(crate) fn slice(&self, offset: usize, len: usize) -> CpkResult<&'a [u8]> {
        let end = offset.checked_add(len);
        match end {
            Some(end) if end <= self.buf.len() => Ok(&self.buf[offset..end]),
            _ => Err(CpkError::TruncatedHeader {
                offset,
                needed: len,
                available: self.buf.len().saturating_sub(offset),
            }),
        }
    }

    pub(crate) fn u8_at(&self, offset: usize) -> CpkResult<u8> {
        Ok(self.slice(offset, 1)?[0])
    }

    pub(crate) fn u16_at(&self, offset: usize) -> CpkResult<u16> {
        Ok(BigEndian::read_u16(self.slice(offset, 2)?))
    }

    pub(crate) fn u32_at(&self, offset: usize) -> CpkResult<u32> {
        Ok(BigEndian::read_u32(self.slice(offset, 4)?))
    }

    pub(crate) fn tag_at(&self, offset: usize) -> CpkResult<[u8; 4]> {
        let s = self.slice(offset, 4)?;
        Ok([s[0], s[1], s[2], s[3]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fdsc(fourcc: &[u8; 4], width: u32, height: u32, audio: Option<(u8, u8, u16)>) -> Vec<u8> {
        let size: u32 = if audio.is_some() { 32 } else { 20 };
        let mut buf = Vec::new();
        buf.extend_from_slice(b"FDSC");
        buf.extend_from_slice(&size.to_be_bytes());
        buf.extend_from_slice(fourcc);
        buf.extend_from_slice(&height.to_be_bytes());
        buf.extend_from_slice(&width.to_be_bytes());
        if let Some((channels, bits, rate)) = audio {
            buf.push(0);
            buf.push(channels);
            buf.push(bits);
            buf.push(0);
            buf.extend_from_slice(&rate.to_be_bytes());
            buf.extend_from_slice(&[0u8; 6]);
        }
        buf
    }

    fn stab(frequency: u32, records: &[[u32; 4]], quirk: bool) -> Vec<u8> {
        let records_len = (records.len() * 16) as u32;
        let size = if quirk { records_len } else { records_len + 16 };
        let mut buf = Vec::new();
        buf.extend_from_slice(b"STAB");
        buf.extend_from_slice(&size.to_be_bytes());
        buf.extend_from_slice(&frequency.to_be_bytes());
        buf.extend_from_slice(&(records.len() as u32).to_be_bytes());
        for r in records {
            for v in r {
                buf.extend_from_slice(&v.to_be_bytes());
            }
        }
        buf
    }

    #[test]
    fn test_签名_解析() {
        let mut sig = b"FILM".to_vec();
        sig.extend_from_slice(&64u32.to_be_bytes());
        sig.extend_from_slice(b"1.09");
        sig.extend_from_slice(&[0; 4]);
        let s = Signature::parse(&sig).unwrap();
        assert_eq!(s.header_size, 64);
        assert_eq!(&s.version, b"1.09");
        assert_eq!(s.body_size(), 48);
    }

    #[test]
    fn test_签名_魔数错误() {
        let sig = b"RIFF\x00\x00\x00\x40WAVE\x00\x00\x00\x00";
        assert!(matches!(
            Signature::parse(sig),
            Err(CpkError::InvalidData(_))
        ));
    }

    #[test]
    fn test_签名_头部长度过小() {
        let sig = b"FILM\x00\x00\x00\x08\x00\x00\x00\x00\x00\x00\x00\x00";
        assert!(Signature::parse(sig).is_err());
    }

    #[test]
    fn test_完整_fdsc_带音频() {
        let mut buf = fdsc(b"cvid", 320, 240, Some((2, 16, 44100)));
        buf.extend(stab(30, &[[0, 10, 0, 0]], false));
        let h = parse_header(&buf).unwrap();
        assert_eq!(h.video.codec_id, CodecId::Cinepak);
        assert_eq!((h.video.width, h.video.height), (320, 240));
        let a = h.audio.unwrap();
        assert_eq!((a.channels, a.bits, a.sample_rate), (2, 16, 44100));
        assert_eq!(a.bytes_per_second(), 176_400);
        assert_eq!(h.frequency, 30);
        assert_eq!(h.records.len(), 1);
    }

    #[test]
    fn test_短_fdsc_按编解码器推断音频() {
        let mut buf = fdsc(b"cvid", 160, 120, None);
        buf.extend(stab(30, &[], false));
        let a = parse_header(&buf).unwrap().audio.unwrap();
        assert_eq!((a.channels, a.bits, a.sample_rate), (1, 8, 22050));

        let mut buf = fdsc(b"SEGA", 160, 120, None);
        buf.extend(stab(30, &[], false));
        let a = parse_header(&buf).unwrap().audio.unwrap();
        assert_eq!((a.channels, a.bits, a.sample_rate), (1, 8, 16000));

        let mut buf = fdsc(b"raw ", 160, 120, None);
        buf.extend(stab(30, &[], false));
        assert!(parse_header(&buf).unwrap().audio.is_none());
    }

    #[test]
    fn test_未知_fourcc_映射为未知视频() {
        let mut buf = fdsc(b"zzzz", 8, 8, Some((1, 8, 0)));
        buf.extend(stab(30, &[], false));
        let h = parse_header(&buf).unwrap();
        assert_eq!(h.video.codec_id, CodecId::UnknownVideo);
        assert!(h.audio.is_none());
    }

    #[test]
    fn test_stab_缺少前导长度的怪癖() {
        let records = [[0, 100, 0, 0], [100, 50, 0xFFFF_FFFF, 0]];
        let mut buf = fdsc(b"cvid", 8, 8, Some((1, 8, 22050)));
        buf.extend(stab(30, &records, true));
        // 紧跟一个真实的块, 怪癖处理错误时会把它当成采样数据或未知块
        buf.extend(fdsc(b"raw ", 16, 16, Some((1, 16, 11025))));
        let h = parse_header(&buf).unwrap();
        assert_eq!(h.records.len(), 2);
        assert_eq!(h.records[1].sync_primary, 0xFFFF_FFFF);
        assert_eq!(h.video.codec_id, CodecId::RawVideo);
        assert_eq!(h.audio.unwrap().sample_rate, 11025);
    }

    #[test]
    fn test_未知块_失败() {
        let mut buf = fdsc(b"cvid", 8, 8, None);
        buf.extend_from_slice(b"JUNK\x00\x00\x00\x08");
        buf.extend(stab(30, &[], false));
        let err = parse_header(&buf).unwrap_err();
        assert!(matches!(err, CpkError::InvalidData(ref m) if m.contains("JUNK")));
    }

    #[test]
    fn test_块大小越界_失败() {
        let mut buf = fdsc(b"cvid", 8, 8, None);
        buf[4..8].copy_from_slice(&0x7FFF_FFFFu32.to_be_bytes());
        assert!(matches!(
            parse_header(&buf),
            Err(CpkError::InvalidData(_))
        ));
    }

    #[test]
    fn test_stab_记录越界_报告截断() {
        let mut buf = fdsc(b"cvid", 8, 8, None);
        let mut table = stab(30, &[[0, 1, 0, 0]], false);
        // 声明 1000 条记录, 实际只有 1 条
        table[12..16].copy_from_slice(&1000u32.to_be_bytes());
        buf.extend(table);
        assert!(matches!(
            parse_header(&buf),
            Err(CpkError::TruncatedHeader { needed: 16000, .. })
        ));
    }

    #[test]
    fn test_零长度块_不会死循环() {
        let mut buf = fdsc(b"cvid", 8, 8, None);
        buf.extend_from_slice(b"FDSC\x00\x00\x00\x00");
        assert!(parse_header(&buf).is_err());
    }

    #[test]
    fn test_缺少必需块() {
        assert!(parse_header(&fdsc(b"cvid", 8, 8, None)).is_err());
        assert!(parse_header(&stab(30, &[], false)).is_err());
    }

    #[test]
    fn test_游标_截断信息() {
        let cur = ByteCursor::new(&[1, 2, 3]);
        assert_eq!(cur.u16_at(1).unwrap(), 0x0203);
        match cur.u32_at(1) {
            Err(CpkError::TruncatedHeader {
                offset,
                needed,
                available,
            }) => assert_eq!((offset, needed, available), (1, 4, 2)),
            other => panic!("意外结果: {:?}", other),
        }
        assert!(cur.slice(usize::MAX, 2).is_err());
    }
}
