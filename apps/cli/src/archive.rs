//! Directory compression into `.tar.zst` archives.
//!
//! Level 0 stores files without compression and writes a plain `.tar`.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use chrono::{DateTime, Local};
use sshpoint_transfer::sanitize_file_name;
use tar::Builder;
use tracing::{info, warn};
use walkdir::WalkDir;

/// Files between two progress log lines.
const LOG_EVERY: u64 = 10;

/// Outcome of [`compress_directory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub path: PathBuf,
    /// Files written into the archive.
    pub files: u64,
    pub original_bytes: u64,
    pub compressed_bytes: u64,
}

impl ArchiveSummary {
    /// Space saved, as a percentage of the original size.
    pub fn ratio(&self) -> f64 {
        if self.original_bytes == 0 {
            return 0.0;
        }
        (1.0 - self.compressed_bytes as f64 / self.original_bytes as f64) * 100.0
    }
}

/// Output sink: plain tar for level 0, zstd otherwise.
enum ArchiveWriter {
    Stored(File),
    Zstd(zstd::Encoder<'static, File>),
}

impl ArchiveWriter {
    fn new(file: File, level: u8) -> io::Result<Self> {
        if level == 0 {
            Ok(Self::Stored(file))
        } else {
            Ok(Self::Zstd(zstd::Encoder::new(file, i32::from(level))?))
        }
    }

    fn finish(self) -> io::Result<File> {
        match self {
            Self::Stored(mut file) => {
                file.flush()?;
                Ok(file)
            }
            Self::Zstd(encoder) => encoder.finish(),
        }
    }
}

impl Write for ArchiveWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Stored(file) => file.write(buf),
            Self::Zstd(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Stored(file) => file.flush(),
            Self::Zstd(encoder) => encoder.flush(),
        }
    }
}

/// Archive extension for a compression level.
pub fn archive_extension(level: u8) -> &'static str {
    if level == 0 { "tar" } else { "tar.zst" }
}

/// `<parent>/<dir>_<YYYYmmdd_HHMMSS>.<ext>` for `source`.
pub fn archive_path(source: &Path, now: DateTime<Local>, level: u8) -> PathBuf {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "archive".into());
    let file = format!(
        "{}_{}.{}",
        name,
        now.format("%Y%m%d_%H%M%S"),
        archive_extension(level)
    );
    source
        .parent()
        .map(|p| p.join(&file))
        .unwrap_or_else(|| PathBuf::from(file))
}

/// Entry name inside the archive: `rel` with every component sanitized.
fn archive_entry_name(rel: &Path) -> String {
    rel.components()
        .map(|c| sanitize_file_name(&c.as_os_str().to_string_lossy()))
        .collect::<Vec<_>>()
        .join("/")
}

/// Packs every regular file under `source` into one tar, zstd-compressed
/// unless `level` is 0.
///
/// `output` defaults to [`archive_path`]. Files that cannot be read are
/// skipped with a warning. Blocking; run it off the async runtime.
pub fn compress_directory(
    source: &Path,
    output: Option<&Path>,
    level: u8,
) -> anyhow::Result<ArchiveSummary> {
    if !source.is_dir() {
        anyhow::bail!("not a directory: {}", source.display());
    }
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| archive_path(source, Local::now(), level));

    let total = WalkDir::new(source)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .count() as u64;
    info!(source = %source.display(), output = %output.display(), files = total, "compressing directory");

    let file = File::create(&output)
        .with_context(|| format!("cannot create archive {}", output.display()))?;
    let mut builder = Builder::new(ArchiveWriter::new(file, level)?);

    let started = Instant::now();
    let mut files = 0u64;
    let mut original_bytes = 0u64;

    for entry in WalkDir::new(source).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(source) else {
            continue;
        };
        let name = archive_entry_name(rel);
        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);

        if let Err(e) = builder.append_path_with_name(entry.path(), &name) {
            warn!(file = %entry.path().display(), error = %e, "skipping problematic file");
            continue;
        }
        files += 1;
        original_bytes += size;

        if files % LOG_EVERY == 0 || files == total {
            log_progress(files, total, started);
        }
    }

    builder.into_inner()?.finish()?;

    let compressed_bytes = std::fs::metadata(&output)?.len();
    let summary = ArchiveSummary {
        path: output,
        files,
        original_bytes,
        compressed_bytes,
    };
    info!(
        path = %summary.path.display(),
        files = summary.files,
        original_bytes = summary.original_bytes,
        compressed_bytes = summary.compressed_bytes,
        ratio = %format!("{:.1}%", summary.ratio()),
        "compression complete"
    );
    Ok(summary)
}

fn log_progress(done: u64, total: u64, started: Instant) {
    let percent = if total > 0 {
        done as f64 / total as f64 * 100.0
    } else {
        100.0
    };
    let elapsed = started.elapsed().as_secs_f64();
    if elapsed > 0.0 {
        let rate = done as f64 / elapsed;
        let left = total.saturating_sub(done) as f64 / rate;
        let eta = Local::now() + chrono::Duration::milliseconds((left * 1000.0) as i64);
        info!(done, total, percent = %format!("{percent:.1}"), eta = %eta.format("%H:%M:%S"), "compressing");
    } else {
        info!(done, total, percent = %format!("{percent:.1}"), "compressing");
    }
}
