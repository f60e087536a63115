//! cpk-probe - Sega FILM/CPK 文件信息探测工具
//!
//! 输出容器格式、流信息与元数据; 可选地把全部采样分发一遍并统计分片,
//! 用于检查采样表、时间戳与定位行为.

mod config;
mod logging;
mod stats;

use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::Parser;
use log::{debug, info};
use serde::Serialize;

use cpk_core::MediaType;
use cpk_format::stream::{AudioStreamParams, StreamParams, VideoStreamParams};
use cpk_format::{
    BufferQueue, DemuxStatus, Demuxer, FormatRegistry, IoContext, SeekFlags, Stream,
};

use config::ProbeConfig;
use stats::SampleStats;

/// Sega FILM/CPK 文件信息探测工具
#[derive(Parser, Debug)]
#[command(name = "cpk-probe", version, about = "Sega FILM/CPK 文件信息探测工具")]
struct Cli {
    /// 输入文件路径
    input: Option<String>,

    /// 分发全部采样并输出统计
    #[arg(long)]
    show_samples: bool,

    /// 分发前按字节偏移 (相对数据区) 定位
    #[arg(long, value_name = "BYTES", conflicts_with = "seek_time")]
    seek: Option<i64>,

    /// 分发前按时间戳 (90 kHz) 定位
    #[arg(long, value_name = "PTS")]
    seek_time: Option<i64>,

    /// 配置文件 (JSON)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// 视频缓冲区单元大小 (覆盖配置文件)
    #[arg(long, value_name = "BYTES")]
    video_buffer_size: Option<usize>,

    /// 音频缓冲区单元大小 (覆盖配置文件)
    #[arg(long, value_name = "BYTES")]
    audio_buffer_size: Option<usize>,

    /// 不接收音频
    #[arg(long)]
    no_audio: bool,

    /// 不接收视频
    #[arg(long)]
    no_video: bool,

    /// 输出 JSON 格式
    #[arg(long)]
    json: bool,

    /// 静默模式 (只输出探测结果)
    #[arg(short, long)]
    quiet: bool,

    /// 日志详细程度 (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

// ============================================================
// JSON 输出结构体
// ============================================================

/// 完整探测结果
#[derive(Serialize)]
struct ProbeOutput {
    format: FormatInfo,
    streams: Vec<StreamInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    samples: Option<SampleStats>,
}

/// 格式信息
#[derive(Serialize)]
struct FormatInfo {
    filename: String,
    format_name: String,
    nb_streams: usize,
    nb_samples: usize,
    file_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration: Option<f64>,
    probe_score: u32,
    metadata: Vec<(String, String)>,
}

/// 流信息
#[derive(Serialize)]
struct StreamInfo {
    index: usize,
    codec_type: String,
    codec_name: String,
    time_base: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration: Option<f64>,
    // 视频字段
    #[serde(skip_serializing_if = "Option::is_none")]
    width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fourcc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frame_rate: Option<String>,
    // 音频字段
    #[serde(skip_serializing_if = "Option::is_none")]
    sample_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    channels: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel_layout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sample_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bits_per_sample: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bit_rate: Option<u64>,
    nb_frames: u64,
}

// ============================================================
// 主逻辑
// ============================================================

fn main() {
    let cli = Cli::parse();

    let Some(input_path) = cli.input.clone() else {
        print_banner();
        return;
    };

    if let Err(e) = run(&cli, &input_path) {
        eprintln!("错误: {e:#}");
        process::exit(1);
    }
}

fn run(cli: &Cli, input_path: &str) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => ProbeConfig::load(path)?,
        None => ProbeConfig::default(),
    };
    apply_overrides(cli, &mut config);

    if let Err(e) = logging::init(&config.log_dir, &config.log_prefix, cli.verbose) {
        eprintln!("警告: 日志初始化失败: {e:#}");
    }
    debug!("配置: {:?}", config);

    if !cli.quiet {
        eprintln!(
            "cpk-probe 版本 {} -- Sega FILM/CPK 探测工具",
            env!("CARGO_PKG_VERSION")
        );
        eprintln!("输入文件: {input_path}");
    }

    let mut registry = FormatRegistry::new();
    cpk_format::register_all(&mut registry);

    let mut io = IoContext::open_read(input_path)
        .with_context(|| format!("无法打开文件 '{input_path}'"))?;
    let (probe_result, mut demuxer) = registry
        .open_input(&mut io, Some(input_path))
        .context("无法识别文件格式")?;
    info!(
        "{}: 格式 {} (置信度 {})",
        input_path, probe_result.format_id, probe_result.score
    );

    let format_info = FormatInfo {
        filename: input_path.to_string(),
        format_name: probe_result.format_id.name().to_string(),
        nb_streams: demuxer.streams().len(),
        nb_samples: demuxer
            .streams()
            .iter()
            .map(|s| s.nb_frames as usize)
            .sum(),
        file_size: io.size().unwrap_or(0),
        duration: demuxer.duration(),
        probe_score: probe_result.score,
        metadata: demuxer.metadata().to_vec(),
    };
    let streams_info: Vec<StreamInfo> = demuxer.streams().iter().map(build_stream_info).collect();

    let samples = if cli.show_samples {
        let seek = match (cli.seek, cli.seek_time) {
            (Some(offset), _) => Some((offset, SeekFlags::byte_offset())),
            (None, Some(pts)) => Some((pts, SeekFlags::time())),
            (None, None) => None,
        };
        Some(walk_samples(demuxer.as_mut(), &mut io, &config, seek))
    } else {
        None
    };

    if cli.json {
        let output = ProbeOutput {
            format: format_info,
            streams: streams_info,
            samples,
        };
        let json = serde_json::to_string_pretty(&output).context("序列化探测结果失败")?;
        println!("{json}");
    } else {
        print_format_text(&format_info);
        print_streams_text(&streams_info);
        if let Some(ref stats) = samples {
            print_samples_text(stats);
        }
    }
    Ok(())
}

/// 命令行参数覆盖配置文件
fn apply_overrides(cli: &Cli, config: &mut ProbeConfig) {
    if let Some(size) = cli.video_buffer_size {
        config.queue.video_buffer_size = size;
    }
    if let Some(size) = cli.audio_buffer_size {
        config.queue.audio_buffer_size = size;
    }
    if cli.no_audio {
        config.queue.audio = false;
    }
    if cli.no_video {
        config.queue.video = false;
    }
}

/// 发送头部, 可选地定位, 然后分发全部采样
fn walk_samples(
    demuxer: &mut dyn Demuxer,
    io: &mut IoContext,
    config: &ProbeConfig,
    seek: Option<(i64, SeekFlags)>,
) -> SampleStats {
    let mut out = BufferQueue::new(config.queue.clone());
    let mut stats = SampleStats::default();

    demuxer.send_headers(&mut out);
    if let Some((target, flags)) = seek {
        // 播放开始前的定位
        let status = demuxer.seek(io, &mut out, target, flags.primed());
        debug!("定位 {} -> {:?}", target, status);
    }

    while demuxer.status() == DemuxStatus::Ok {
        demuxer.send_chunk(io, &mut out);
        for event in out.drain() {
            stats.observe(&event);
        }
    }
    for event in out.drain() {
        stats.observe(&event);
    }
    stats
}

/// 从 Stream 构建 StreamInfo
fn build_stream_info(stream: &Stream) -> StreamInfo {
    let codec_type = match stream.media_type {
        MediaType::Video => "video",
        MediaType::Audio => "audio",
        MediaType::Data => "data",
    }
    .to_string();

    let duration = if stream.duration > 0 && stream.time_base.is_valid() {
        Some(stream.duration as f64 * stream.time_base.to_f64())
    } else {
        None
    };

    let mut info = StreamInfo {
        index: stream.index,
        codec_type,
        codec_name: format!("{}", stream.codec_id),
        time_base: format!("{}/{}", stream.time_base.num, stream.time_base.den),
        duration,
        width: None,
        height: None,
        fourcc: None,
        frame_rate: None,
        sample_rate: None,
        channels: None,
        channel_layout: None,
        sample_format: None,
        bits_per_sample: None,
        bit_rate: None,
        nb_frames: stream.nb_frames,
    };

    match &stream.params {
        StreamParams::Video(VideoStreamParams {
            width,
            height,
            fourcc,
            frame_rate,
        }) => {
            info.width = Some(*width);
            info.height = Some(*height);
            info.fourcc = Some(String::from_utf8_lossy(fourcc).to_string());
            if frame_rate.is_valid() {
                info.frame_rate = Some(format!("{}/{}", frame_rate.num, frame_rate.den));
            }
        }
        StreamParams::Audio(AudioStreamParams {
            sample_rate,
            channel_layout,
            sample_format,
            bits_per_sample,
            bit_rate,
        }) => {
            info.sample_rate = Some(*sample_rate);
            info.channels = Some(channel_layout.channels);
            info.channel_layout = Some(format!("{channel_layout}"));
            info.sample_format = Some(format!("{sample_format}"));
            info.bits_per_sample = Some(*bits_per_sample);
            if *bit_rate > 0 {
                info.bit_rate = Some(*bit_rate);
            }
        }
    }

    info
}

/// 文本输出: 格式信息
fn print_format_text(info: &FormatInfo) {
    println!("[FORMAT]");
    println!("  文件名       : {}", info.filename);
    println!("  格式名称     : {}", info.format_name);
    println!("  流数量       : {}", info.nb_streams);
    println!("  采样数       : {}", info.nb_samples);
    if let Some(dur) = info.duration {
        println!("  时长         : {dur:.0} 秒");
    }
    println!("  探测置信度   : {}", info.probe_score);
    for (key, value) in &info.metadata {
        println!("  {key:<12} : {value}");
    }
    println!("[/FORMAT]");
    println!();
}

/// 文本输出: 流信息
fn print_streams_text(streams: &[StreamInfo]) {
    for stream in streams {
        println!("[STREAM #{}]", stream.index);
        println!("  类型         : {}", stream.codec_type);
        println!("  编解码器     : {}", stream.codec_name);
        println!("  时间基       : {}", stream.time_base);
        if let Some(dur) = stream.duration {
            println!("  时长         : {dur:.3} 秒");
        }

        // 视频特有
        if let (Some(w), Some(h)) = (stream.width, stream.height) {
            println!("  分辨率       : {w}x{h}");
        }
        if let Some(ref cc) = stream.fourcc {
            println!("  FourCC       : {cc}");
        }
        if let Some(ref fr) = stream.frame_rate {
            println!("  帧率         : {fr}");
        }

        // 音频特有
        if let Some(sr) = stream.sample_rate {
            println!("  采样率       : {sr} Hz");
        }
        if let Some(ref cl) = stream.channel_layout {
            println!("  声道布局     : {cl}");
        }
        if let Some(ref sf) = stream.sample_format {
            println!("  采样格式     : {sf}");
        }
        if let Some(bits) = stream.bits_per_sample {
            println!("  位深         : {bits}");
        }

        if let Some(br) = stream.bit_rate {
            println!("  码率         : {} kbps", br / 1000);
        }
        println!("  帧数         : {}", stream.nb_frames);
        println!("[/STREAM]");
        println!();
    }
}

/// 文本输出: 分发统计
fn print_samples_text(stats: &SampleStats) {
    println!("[SAMPLES]");
    for (name, track) in [("视频", &stats.video), ("音频", &stats.audio)] {
        println!(
            "  {name}         : {} 个采样, {} 个分片, {} 字节, {} 个关键帧",
            track.samples, track.fragments, track.bytes, track.keyframes
        );
        if let (Some(first), Some(last)) = (track.first_pts, track.last_pts) {
            println!("                 时间戳 {first} .. {last}");
        }
    }
    println!("  新时间线     : {}", stats.discontinuities);
    println!("  清空         : {}", stats.flushes);
    println!("[/SAMPLES]");
    println!();
}

/// 打印版本横幅
fn print_banner() {
    println!(
        "cpk-probe 版本 {} -- Sega FILM/CPK 探测工具",
        env!("CARGO_PKG_VERSION")
    );
    println!();
    println!("用法: cpk-probe [选项] <输入文件>");
    println!();
    println!("选项:");
    println!("  --show-samples    分发全部采样并输出统计");
    println!("  --seek <BYTES>    分发前按字节偏移定位");
    println!("  --seek-time <PTS> 分发前按 90 kHz 时间戳定位");
    println!("  --config <FILE>   JSON 配置文件");
    println!("  --json            以 JSON 格式输出");
    println!("  -v, -vv           提高日志详细程度");
    println!("  -q, --quiet       静默模式");
    println!();
    println!("使用 --help 查看完整用法.");
}
