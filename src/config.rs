//! Batch/CLI settings, optionally loaded from a JSON file.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Worker threads for directory batches. 0 picks the available parallelism.
    pub jobs: usize,
    /// Where artifacts go. `None` writes them next to each source file.
    pub output_dir: Option<PathBuf>,
    pub source_extension: String,
    pub artifact_extension: String,
    /// Per-stage compiler timeout. 0 disables it.
    pub stage_timeout_ms: u64,
    pub entry_point: String,
    /// Also dump each stage's SPIR-V as `<stem>.<pass>.<stage>.spv`.
    pub emit_spirv: bool,
    /// Stop after semantic validation; nothing is compiled or written.
    pub check_only: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            jobs: 0,
            output_dir: None,
            source_extension: "kfx".to_string(),
            artifact_extension: "kfxb".to_string(),
            stage_timeout_ms: 30_000,
            entry_point: "main".to_string(),
            emit_spirv: false,
            check_only: false,
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config json {}", path.display()))
    }

    pub fn stage_timeout(&self) -> Option<Duration> {
        (self.stage_timeout_ms > 0).then(|| Duration::from_millis(self.stage_timeout_ms))
    }

    pub fn worker_count(&self) -> usize {
        if self.jobs > 0 {
            return self.jobs;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}
