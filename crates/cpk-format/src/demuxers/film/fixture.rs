//! 测试用 FILM 文件构造器.

use super::table::AUDIO_SYNC_MARKER;

/// 内存中的 FILM 文件构造器
///
/// 采样按添加顺序紧密排列在数据区.
pub(crate) struct FilmBuilder {
    version: [u8; 4],
    fourcc: [u8; 4],
    width: u32,
    height: u32,
    audio: Option<(u8, u8, u16)>,
    frequency: u32,
    stab_quirk: bool,
    samples: Vec<(u32, Vec<u8>)>,
}

impl FilmBuilder {
    /// 320x240 Cinepak, 版本 "1.09", 时钟 30 Hz, 无音频
    pub(crate) fn cinepak() -> Self {
        Self {
            version: *b"1.09",
            fourcc: *b"cvid",
            width: 320,
            height: 240,
            audio: None,
            frequency: 30,
            stab_quirk: false,
            samples: Vec::new(),
        }
    }

    pub(crate) fn fourcc(mut self, fourcc: &[u8; 4]) -> Self {
        self.fourcc = *fourcc;
        self
    }

    pub(crate) fn version(mut self, version: [u8; 4]) -> Self {
        self.version = version;
        self
    }

    /// 写出 32 字节 FDSC, 带音频参数
    pub(crate) fn audio(mut self, channels: u8, bits: u8, rate: u16) -> Self {
        self.audio = Some((channels, bits, rate));
        self
    }

    pub(crate) fn frequency(mut self, frequency: u32) -> Self {
        self.frequency = frequency;
        self
    }

    pub(crate) fn stab_quirk(mut self) -> Self {
        self.stab_quirk = true;
        self
    }

    /// 添加视频采样, 负载为按序号生成的字节
    pub(crate) fn video(self, sync: u32, size: usize) -> Self {
        let payload = pattern(self.samples.len(), size);
        self.sample(sync, payload)
    }

    /// 添加音频采样
    pub(crate) fn audio_sample(self, size: usize) -> Self {
        let payload = pattern(self.samples.len(), size);
        self.sample(AUDIO_SYNC_MARKER, payload)
    }

    pub(crate) fn sample(mut self, sync: u32, payload: Vec<u8>) -> Self {
        self.samples.push((sync, payload));
        self
    }

    pub(crate) fn build(&self) -> Vec<u8> {
        let mut fdsc = Vec::new();
        let fdsc_size: u32 = if self.audio.is_some() { 32 } else { 20 };
        fdsc.extend_from_slice(b"FDSC");
        fdsc.extend_from_slice(&fdsc_size.to_be_bytes());
        fdsc.extend_from_slice(&self.fourcc);
        fdsc.extend_from_slice(&self.height.to_be_bytes());
        fdsc.extend_from_slice(&self.width.to_be_bytes());
        if let Some((channels, bits, rate)) = self.audio {
            fdsc.extend_from_slice(&[0, channels, bits, 0]);
            fdsc.extend_from_slice(&rate.to_be_bytes());
            fdsc.extend_from_slice(&[0u8; 6]);
        }

        let records_len = (self.samples.len() * 16) as u32;
        let mut stab = Vec::new();
        stab.extend_from_slice(b"STAB");
        let stab_size = if self.stab_quirk {
            records_len
        } else {
            records_len + 16
        };
        stab.extend_from_slice(&stab_size.to_be_bytes());
        stab.extend_from_slice(&self.frequency.to_be_bytes());
        stab.extend_from_slice(&(self.samples.len() as u32).to_be_bytes());
        let mut offset = 0u32;
        for (sync, payload) in &self.samples {
            stab.extend_from_slice(&offset.to_be_bytes());
            stab.extend_from_slice(&(payload.len() as u32).to_be_bytes());
            stab.extend_from_slice(&sync.to_be_bytes());
            stab.extend_from_slice(&0u32.to_be_bytes());
            offset += payload.len() as u32;
        }

        let header_size = (16 + fdsc.len() + stab.len()) as u32;
        let mut out = Vec::new();
        out.extend_from_slice(b"FILM");
        out.extend_from_slice(&header_size.to_be_bytes());
        out.extend_from_slice(&self.version);
        out.extend_from_slice(&[0u8; 4]);
        out.extend(fdsc);
        out.extend(stab);
        for (_, payload) in &self.samples {
            out.extend_from_slice(payload);
        }
        out
    }
}

/// 第 `index` 个采样的负载
pub(crate) fn pattern(index: usize, size: usize) -> Vec<u8> {
    (0..size).map(|i| (index * 31 + i) as u8).collect()
}

/// 头部总长
pub(crate) fn header_size(data: &[u8]) -> u64 {
    u64::from(u32::from_be_bytes([data[4], data[5], data[6], data[7]]))
}
