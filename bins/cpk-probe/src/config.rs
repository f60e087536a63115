//! 探测工具配置.
//!
//! 配置文件为 JSON, 所有字段都可省略. 命令行参数优先于配置文件.
//!
//! ```json
//! {
//!   "queue": { "video_buffer_size": 4096, "audio": false },
//!   "log_dir": "logs",
//!   "log_prefix": "cpk-probe"
//! }
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use cpk_format::QueueConfig;
use serde::{Deserialize, Serialize};

/// 探测工具配置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// 输出队列配置
    pub queue: QueueConfig,
    /// 日志目录
    pub log_dir: PathBuf,
    /// 日志文件前缀
    pub log_prefix: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            queue: QueueConfig::default(),
            log_dir: PathBuf::from("logs"),
            log_prefix: "cpk-probe".to_string(),
        }
    }
}

impl ProbeConfig {
    /// 从 JSON 文件加载
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("读取配置文件 {} 失败", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("解析配置文件 {} 失败", path.display()))
    }
}
