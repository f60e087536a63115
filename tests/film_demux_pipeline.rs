//! FILM/CPK 解封装器集成测试.
//!
//! 构造完整的 FILM 文件 (签名 + FDSC + STAB + 数据区), 通过注册表探测打开,
//! 验证流信息、时间戳、分片、定位与错误回退的完整流程.

use std::io::Write;

use cpk::codec::CodecId;
use cpk::core::{CpkError, MediaType};
use cpk::format::io::MemoryBackend;
use cpk::format::{
    BufferQueue, DemuxStatus, Demuxer, Discontinuity, FormatId, IoContext, QueueConfig,
    SeekFlags, SinkEvent,
};

const AUDIO: u32 = 0xFFFF_FFFF;

// ========================
// 辅助函数: 构造 FILM 文件
// ========================

/// FILM 文件描述
struct FilmSpec<'a> {
    version: [u8; 4],
    fourcc: &'a [u8; 4],
    audio: Option<(u8, u8, u16)>,
    frequency: u32,
    samples: Vec<(u32, Vec<u8>)>,
}

/// 构造完整的 FILM 文件
fn build_film(spec: &FilmSpec<'_>) -> Vec<u8> {
    let mut fdsc = Vec::new();
    fdsc.extend_from_slice(b"FDSC");
    fdsc.extend_from_slice(&(if spec.audio.is_some() { 32u32 } else { 20 }).to_be_bytes());
    fdsc.extend_from_slice(spec.fourcc);
    fdsc.extend_from_slice(&240u32.to_be_bytes());
    fdsc.extend_from_slice(&320u32.to_be_bytes());
    if let Some((channels, bits, rate)) = spec.audio {
        fdsc.extend_from_slice(&[0, channels, bits, 0]);
        fdsc.extend_from_slice(&rate.to_be_bytes());
        fdsc.extend_from_slice(&[0u8; 6]);
    }

    let mut stab = Vec::new();
    stab.extend_from_slice(b"STAB");
    stab.extend_from_slice(&((spec.samples.len() * 16 + 16) as u32).to_be_bytes());
    stab.extend_from_slice(&spec.frequency.to_be_bytes());
    stab.extend_from_slice(&(spec.samples.len() as u32).to_be_bytes());
    let mut offset = 0u32;
    for (sync, payload) in &spec.samples {
        stab.extend_from_slice(&offset.to_be_bytes());
        stab.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        stab.extend_from_slice(&sync.to_be_bytes());
        stab.extend_from_slice(&0u32.to_be_bytes());
        offset += payload.len() as u32;
    }

    let header_size = (16 + fdsc.len() + stab.len()) as u32;
    let mut data = Vec::new();
    data.extend_from_slice(b"FILM");
    data.extend_from_slice(&header_size.to_be_bytes());
    data.extend_from_slice(&spec.version);
    data.extend_from_slice(&[0u8; 4]);
    data.extend(fdsc);
    data.extend(stab);
    for (_, payload) in &spec.samples {
        data.extend_from_slice(payload);
    }
    data
}

/// 30 帧 15fps 视频 (每 10 帧一个关键帧), 每帧前一段 1/15 秒的 8 位单声道音频
fn movie_spec() -> FilmSpec<'static> {
    let mut samples = Vec::new();
    for frame in 0..30u32 {
        let audio: Vec<u8> = (0..1470).map(|i| (i + frame as usize) as u8).collect();
        samples.push((AUDIO, audio));
        let sync = if frame % 10 == 0 {
            frame
        } else {
            frame | 0x8000_0000
        };
        samples.push((sync, vec![frame as u8; 500 + frame as usize]));
    }
    FilmSpec {
        version: *b"1.09",
        fourcc: b"raw ",
        audio: Some((1, 8, 22050)),
        frequency: 15,
        samples,
    }
}

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn open(data: Vec<u8>, filename: &str) -> (IoContext, Box<dyn Demuxer>) {
    let registry = cpk::default_format_registry();
    let mut io = IoContext::from_memory(data);
    let (probe, demuxer) = registry.open_input(&mut io, Some(filename)).unwrap();
    assert_eq!(probe.format_id, FormatId::Film);
    (io, demuxer)
}

fn run_to_end(
    io: &mut IoContext,
    demuxer: &mut dyn Demuxer,
    out: &mut BufferQueue,
) -> Vec<SinkEvent> {
    let mut events = Vec::new();
    while demuxer.send_chunk(io, out) == DemuxStatus::Ok {
        events.extend(out.drain());
    }
    events.extend(out.drain());
    events
}

/// 以采样结束标志为界的 (媒体类型, pts, 关键帧) 序列
fn samples_of(events: &[SinkEvent]) -> Vec<(MediaType, i64, bool)> {
    events
        .iter()
        .filter_map(|e| match e {
            SinkEvent::Packet(p) if p.is_frame_end() => {
                Some((p.codec_id.media_type(), p.pts, p.is_keyframe()))
            }
            _ => None,
        })
        .collect()
}

// ========================
// 测试
// ========================

#[test]
fn test_完整管线_探测打开分发() {
    init_logger();
    let (mut io, mut demuxer) = open(build_film(&movie_spec()), "movie.cpk");

    let streams = demuxer.streams();
    assert_eq!(streams.len(), 2);
    assert_eq!(streams[0].codec_id, CodecId::RawVideo);
    assert_eq!(streams[0].nb_frames, 30);
    assert_eq!(streams[1].codec_id, CodecId::PcmU8);
    assert_eq!(streams[1].nb_frames, 30);
    // 最大时间戳 29 * 6000 = 174000, 1.93 秒向下取整
    assert_eq!(demuxer.duration(), Some(1.0));

    let mut out = BufferQueue::new(QueueConfig::default());
    demuxer.send_headers(&mut out);
    assert_eq!(out.drain().len(), 2);

    let events = run_to_end(&mut io, demuxer.as_mut(), &mut out);
    assert_eq!(demuxer.status(), DemuxStatus::Finished);

    let timelines: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, SinkEvent::NewTimeline { .. }))
        .collect();
    assert_eq!(timelines.len(), 1);
    assert!(matches!(
        timelines[0],
        SinkEvent::NewTimeline {
            pts: 0,
            kind: Discontinuity::Start
        }
    ));

    let samples = samples_of(&events);
    for kind in [MediaType::Video, MediaType::Audio] {
        let pts: Vec<i64> = samples
            .iter()
            .filter(|s| s.0 == kind)
            .map(|s| s.1)
            .collect();
        assert_eq!(pts.len(), 30);
        assert!(pts.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(pts[1], 6000);
    }
    let keyframes = samples.iter().filter(|s| s.2).count();
    assert_eq!(keyframes, 3);
}

#[test]
fn test_真实文件_音频转换为无符号() {
    init_logger();
    let spec = movie_spec();
    let mut file = tempfile::Builder::new().suffix(".cpk").tempfile().unwrap();
    file.write_all(&build_film(&spec)).unwrap();
    file.flush().unwrap();
    let path = file.path().to_str().unwrap().to_string();

    let registry = cpk::default_format_registry();
    let mut io = IoContext::open_read(&path).unwrap();
    let (probe, mut demuxer) = registry.open_input(&mut io, Some(&path)).unwrap();
    assert_eq!(probe.score, cpk::format::probe::SCORE_MAX);

    let mut out = BufferQueue::new(QueueConfig {
        audio_buffer_size: 512,
        video: false,
        ..QueueConfig::default()
    });
    demuxer.send_headers(&mut out);
    let events = run_to_end(&mut io, demuxer.as_mut(), &mut out);

    let audio: Vec<u8> = events
        .iter()
        .filter_map(|e| match e {
            SinkEvent::Packet(p) => Some(p.data.to_vec()),
            _ => None,
        })
        .flatten()
        .collect();
    let expected: Vec<u8> = spec
        .samples
        .iter()
        .filter(|(sync, _)| *sync == AUDIO)
        .flat_map(|(_, payload)| payload.iter().map(|b| b ^ 0x80))
        .collect();
    assert_eq!(audio, expected);
}

#[test]
fn test_定位后从关键帧开始() {
    init_logger();
    let data = build_film(&movie_spec());
    let (mut io, mut demuxer) = open(data, "movie.cpk");
    let mut out = BufferQueue::new(QueueConfig::default());
    demuxer.send_headers(&mut out);
    for _ in 0..5 {
        demuxer.send_chunk(&mut io, &mut out);
    }
    out.drain();

    // 第 25 帧附近, 回退到第 20 帧的关键帧
    let target = 25 * (1470 + 512);
    let status = demuxer.seek(&mut io, &mut out, target, SeekFlags::byte_offset());
    assert_eq!(status, DemuxStatus::Ok);
    let events = run_to_end(&mut io, demuxer.as_mut(), &mut out);

    assert!(matches!(events[0], SinkEvent::Flush));
    assert!(matches!(
        events[1],
        SinkEvent::NewTimeline {
            kind: Discontinuity::Seek,
            ..
        }
    ));
    let samples = samples_of(&events);
    let first_video = samples
        .iter()
        .find(|s| s.0 == MediaType::Video)
        .unwrap();
    assert!(first_video.2);
    assert_eq!(first_video.1, 20 * 6000);
    let first_audio = samples
        .iter()
        .find(|s| s.0 == MediaType::Audio)
        .unwrap();
    assert!(first_audio.1 < first_video.1);
}

#[test]
fn test_按时间定位() {
    let (mut io, mut demuxer) = open(build_film(&movie_spec()), "movie.cpk");
    let mut out = BufferQueue::new(QueueConfig::default());
    demuxer.send_headers(&mut out);
    let status = demuxer.seek(&mut io, &mut out, 15 * 6000, SeekFlags::time());
    assert_eq!(status, DemuxStatus::Ok);
    let events = run_to_end(&mut io, demuxer.as_mut(), &mut out);
    let first_video = samples_of(&events)
        .into_iter()
        .find(|s| s.0 == MediaType::Video)
        .unwrap();
    assert_eq!(first_video.1, 10 * 6000);

    let status = demuxer.seek(&mut io, &mut out, 10 * 90_000, SeekFlags::time());
    assert_eq!(status, DemuxStatus::Finished);
}

#[test]
fn test_定位越过末尾() {
    let data = build_film(&movie_spec());
    let total = data.len() as i64;
    let (mut io, mut demuxer) = open(data, "movie.cpk");
    let mut out = BufferQueue::new(QueueConfig::default());
    demuxer.send_headers(&mut out);
    // A0 V0 A1
    for _ in 0..3 {
        demuxer.send_chunk(&mut io, &mut out);
    }
    out.drain();

    let status = demuxer.seek(&mut io, &mut out, total, SeekFlags::byte_offset());
    assert_eq!(status, DemuxStatus::Finished);
    assert!(out.is_empty());

    // 游标未动: 继续分发 V1, 不声明新时间线
    assert_eq!(demuxer.send_chunk(&mut io, &mut out), DemuxStatus::Ok);
    let events = out.drain();
    assert!(
        events
            .iter()
            .all(|e| !matches!(e, SinkEvent::NewTimeline { .. }))
    );
    assert_eq!(samples_of(&events), vec![(MediaType::Video, 6000, false)]);
}

#[test]
fn test_cinepak_帧头修正_早期版本() {
    let mut frame = vec![0x00, 0xFF, 0xFF, 0xFF, 0x01, 0x40, 0x00, 0xF0, 0x00, 0x01];
    frame.extend_from_slice(&[0xEE; 6]);
    frame.extend((0..100).map(|i| i as u8));
    let spec = FilmSpec {
        version: [0; 4],
        fourcc: b"cvid",
        audio: None,
        frequency: 30,
        samples: vec![(0, frame)],
    };
    let (mut io, mut demuxer) = open(build_film(&spec), "old.cak");
    let mut out = BufferQueue::new(QueueConfig::default());
    demuxer.send_headers(&mut out);
    let events = run_to_end(&mut io, demuxer.as_mut(), &mut out);
    let packet = events
        .iter()
        .find_map(|e| match e {
            SinkEvent::Packet(p) => Some(p),
            _ => None,
        })
        .unwrap();
    assert_eq!(packet.size(), 110);
    let size = u32::from_be_bytes([0, packet.data[1], packet.data[2], packet.data[3]]);
    assert_eq!(size, 110);
    assert_eq!(&packet.data[10..13], &[0, 1, 2]);
}

#[test]
fn test_非_film_文件_回退失败() {
    init_logger();
    let registry = cpk::default_format_registry();

    // 扩展名匹配但魔数不符
    let mut io = IoContext::from_memory(b"RIFF\x24\x00\x00\x00WAVEfmt ".to_vec());
    let err = registry.open_input(&mut io, Some("fake.cpk")).err().unwrap();
    assert!(matches!(err, CpkError::FormatNotFound(_)));

    // 既无魔数也无扩展名
    let mut io = IoContext::from_memory(vec![0u8; 64]);
    assert!(registry.open_input(&mut io, Some("a.bin")).is_err());
}

#[test]
fn test_不可随机访问的输入被拒绝() {
    let registry = cpk::default_format_registry();
    let data = build_film(&movie_spec());
    let mut io = IoContext::new(Box::new(MemoryBackend::streaming(data)));
    let err = registry.open_input(&mut io, Some("movie.cpk")).err().unwrap();
    assert!(matches!(err, CpkError::FormatNotFound(_)));
}

#[test]
fn test_未知头部块_拒绝打开() {
    let mut data = build_film(&movie_spec());
    // 把 FDSC 标签改为未知标签
    data[16..20].copy_from_slice(b"XXXX");
    let registry = cpk::default_format_registry();
    let mut io = IoContext::from_memory(data);
    assert!(registry.open_input(&mut io, Some("movie.cpk")).is_err());
}
