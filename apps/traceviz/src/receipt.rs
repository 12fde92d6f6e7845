//! JSON record of one finished session.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tempfile::NamedTempFile;
use traceviz_model::{Hop, TerminalError, VisualizationTargets};
use traceviz_session::{CloseInfo, Phase, Session};

#[derive(Serialize)]
struct HostInfo {
    os: String,
    arch: String,
}

#[derive(Serialize)]
pub struct SessionReceipt<'a> {
    version: String,
    target: &'a str,
    preference: String,
    phase: Phase,
    status: &'static str,
    started_at_utc: String,
    finished_at_utc: String,
    hops: &'a [Hop],
    error: Option<&'a TerminalError>,
    visualization: Option<&'a VisualizationTargets>,
    close: Option<&'a CloseInfo>,
    host: HostInfo,
}

impl<'a> SessionReceipt<'a> {
    pub fn new(session: &'a Session, started_at_utc: String, finished_at_utc: String) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            target: session.target(),
            preference: session.preference().to_string(),
            phase: session.phase(),
            status: session.status_text(),
            started_at_utc,
            finished_at_utc,
            hops: session.records(),
            error: session.error(),
            visualization: session.visualization_targets(),
            close: session.close_info(),
            host: HostInfo {
                os: std::env::consts::OS.to_string(),
                arch: std::env::consts::ARCH.to_string(),
            },
        }
    }
}

/// Pretty-print `value` to `path`, replacing any existing file in one rename.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)
        .with_context(|| format!("failed to create output directory {}", parent.display()))?;

    let mut file = NamedTempFile::new_in(parent)
        .with_context(|| format!("failed to create temp file in {}", parent.display()))?;
    serde_json::to_writer_pretty(&mut file, value)?;
    file.as_file().sync_all()?;
    file.persist(path)
        .with_context(|| format!("failed to replace output {}", path.display()))?;
    Ok(())
}
