use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::captions::script::{JobStyle, build_caption_script, parse_lyrics_cell};
use crate::config::PresetName;
use crate::foundation::core::Rgba8;
use crate::foundation::error::{PulseError, PulseResult};
use crate::session::{CancelToken, RenderJob, RenderSession, RenderStats};

/// Metadata file looked up inside the songs directory.
pub const METADATA_FILE_NAME: &str = "songs.csv";

/// One `songs.csv` row: `filename,hookText,bgColor,lyrics`. Empty cells are `None`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SongRow {
    /// Audio file name the row applies to.
    pub filename: String,
    /// Hook text override.
    pub hook_text: Option<String>,
    /// Background colour override (`#RRGGBB`).
    pub bg_color: Option<String>,
    /// Raw lyrics cell: JSON array of `{start, text}` or plain text.
    pub lyrics: Option<String>,
}

/// Per-file overrides loaded from the batch metadata CSV.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SongsMetadata {
    rows: HashMap<String, SongRow>,
}

impl SongsMetadata {
    /// Parse CSV text.
    ///
    /// The first three fields are comma separated (optionally double-quoted); everything after
    /// the third comma is the lyrics cell, so unquoted JSON with commas survives. A header row
    /// is skipped when its first field mentions `filename` and its second mentions `hook`.
    pub fn parse(text: &str) -> Self {
        let mut rows = HashMap::new();
        for (i, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let row = parse_row(line);
            if i == 0 && is_header(&row) {
                continue;
            }
            if row.filename.is_empty() {
                continue;
            }
            rows.insert(row.filename.clone(), row);
        }
        Self { rows }
    }

    /// Read `path`; a missing file is empty metadata.
    pub fn from_path(path: &Path) -> PulseResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no batch metadata");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read metadata '{}'", path.display()))?;
        let meta = Self::parse(&text);
        tracing::info!(songs = meta.len(), path = %path.display(), "loaded batch metadata");
        Ok(meta)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row for `file_name`, if any.
    pub fn get(&self, file_name: &str) -> Option<&SongRow> {
        self.rows.get(file_name)
    }

    /// Style for `file_name`: file-name defaults overridden by non-empty CSV cells.
    ///
    /// An unparsable colour keeps the default and logs a warning.
    pub fn resolve_style(&self, file_name: &str) -> JobStyle {
        let mut style = JobStyle::default_for_file(file_name);
        let Some(row) = self.rows.get(file_name) else {
            return style;
        };
        if let Some(hook) = &row.hook_text {
            style.hook_text = hook.clone();
        }
        if let Some(bg) = &row.bg_color {
            match Rgba8::from_hex(bg) {
                Ok(c) => style.bg_color = c,
                Err(e) => tracing::warn!(file = file_name, error = %e, "ignoring bgColor"),
            }
        }
        if let Some(lyrics) = &row.lyrics {
            style.lyrics = parse_lyrics_cell(lyrics);
        }
        style
    }
}

fn is_header(row: &SongRow) -> bool {
    row.filename.to_lowercase().contains("filename")
        && row
            .hook_text
            .as_deref()
            .is_some_and(|h| h.to_lowercase().contains("hook"))
}

fn parse_row(line: &str) -> SongRow {
    let mut rest = line.trim_end_matches('\r');
    let mut fields = Vec::with_capacity(3);
    for _ in 0..3 {
        let (field, tail) = split_field(rest);
        fields.push(field);
        match tail {
            Some(tail) => rest = tail,
            None => {
                rest = "";
                break;
            }
        }
    }
    let lyrics = unquote(rest.trim());
    let cell = |s: Option<&String>| {
        s.map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
    };
    SongRow {
        filename: fields.first().map(|f| f.trim().to_owned()).unwrap_or_default(),
        hook_text: cell(fields.get(1)),
        bg_color: cell(fields.get(2)),
        lyrics: Some(lyrics).filter(|l| !l.trim().is_empty()),
    }
}

/// Split one field off the front of `s`; the tail starts after the separating comma.
fn split_field(s: &str) -> (String, Option<&str>) {
    let trimmed = s.trim_start();
    if let Some(body) = trimmed.strip_prefix('"') {
        let mut out = String::new();
        let mut chars = body.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            if c != '"' {
                out.push(c);
                continue;
            }
            if let Some(&(_, '"')) = chars.peek() {
                out.push('"');
                chars.next();
                continue;
            }
            let after = &body[i + 1..];
            return match after.find(',') {
                Some(pos) => (out, Some(&after[pos + 1..])),
                None => (out, None),
            };
        }
        return (out, None);
    }
    match s.find(',') {
        Some(pos) => (s[..pos].to_owned(), Some(&s[pos + 1..])),
        None => (s.to_owned(), None),
    }
}

fn unquote(s: &str) -> String {
    match s.strip_prefix('"').and_then(|b| b.strip_suffix('"')) {
        Some(body) => body.replace("\"\"", "\""),
        None => s.to_owned(),
    }
}

/// Output path for `audio` inside `out_dir`: the input stem with an `.mp4` extension.
pub fn output_path_for(out_dir: &Path, audio: &Path) -> PathBuf {
    let stem = audio
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| "output".into());
    let mut name = stem;
    name.push(".mp4");
    out_dir.join(name)
}

/// `.mp3` files directly inside `dir`, sorted by name.
pub fn discover_audio(dir: &Path) -> PulseResult<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read songs directory '{}'", dir.display()))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("failed to list '{}'", dir.display()))?
            .path();
        let is_mp3 = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("mp3"));
        if is_mp3 && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// What a batch run should process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchOptions {
    /// Directory containing the `.mp3` inputs.
    pub songs_dir: PathBuf,
    /// Directory receiving the `.mp4` outputs.
    pub out_dir: PathBuf,
    /// Process at most this many inputs (after sorting).
    pub limit: Option<usize>,
    /// Metadata CSV; `<songs_dir>/songs.csv` when `None`.
    pub metadata: Option<PathBuf>,
    /// Skip inputs whose output already exists.
    pub skip_existing: bool,
}

impl BatchOptions {
    /// Process every song in `songs_dir` into `out_dir`.
    pub fn new(songs_dir: impl Into<PathBuf>, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            songs_dir: songs_dir.into(),
            out_dir: out_dir.into(),
            limit: None,
            metadata: None,
            skip_existing: false,
        }
    }

    fn metadata_path(&self) -> PathBuf {
        self.metadata
            .clone()
            .unwrap_or_else(|| self.songs_dir.join(METADATA_FILE_NAME))
    }
}

/// Result of one batch entry.
#[derive(Debug)]
pub struct JobOutcome {
    /// Input audio.
    pub audio: PathBuf,
    /// Output path (deleted again if the job failed).
    pub output: PathBuf,
    /// Render result.
    pub result: PulseResult<RenderStats>,
}

/// Per-job results of a batch run, in processing order.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// One entry per attempted job.
    pub outcomes: Vec<JobOutcome>,
    /// Inputs skipped because their output already existed.
    pub skipped: Vec<PathBuf>,
}

impl BatchReport {
    /// Jobs that produced an output file.
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    /// Jobs that failed.
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

/// Build the render job for one input: style from metadata, captions from the style, preset
/// from the file name. The probed asset travels with the job so rendering does not probe again.
pub fn job_for(
    session: &RenderSession,
    meta: &SongsMetadata,
    audio: &Path,
    out_dir: &Path,
) -> PulseResult<RenderJob> {
    let file_name = audio
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| PulseError::validation("audio path has no file name"))?;
    let style = meta.resolve_style(&file_name);
    let asset = session.probe(audio)?;
    let captions = build_caption_script(&style, asset.duration_secs)?;
    Ok(RenderJob {
        audio: audio.to_path_buf(),
        captions,
        output: output_path_for(out_dir, audio),
        preset: Some(PresetName::for_file_name(&file_name)),
        background: Some(style.bg_color),
        asset: Some(asset),
    })
}

/// Render every input with `session`.
pub fn run_batch(
    session: &RenderSession,
    opts: &BatchOptions,
    cancel: &CancelToken,
) -> PulseResult<BatchReport> {
    run_batch_with(session, opts, cancel, |job| session.render(job, cancel))
}

/// Batch driver with a caller-supplied render step.
///
/// A failing job is recorded and the batch moves on; only cancellation stops it early.
#[tracing::instrument(skip_all, fields(songs = %opts.songs_dir.display()))]
pub fn run_batch_with<F>(
    session: &RenderSession,
    opts: &BatchOptions,
    cancel: &CancelToken,
    mut render: F,
) -> PulseResult<BatchReport>
where
    F: FnMut(&RenderJob) -> PulseResult<RenderStats>,
{
    let meta = SongsMetadata::from_path(&opts.metadata_path())?;
    let mut inputs = discover_audio(&opts.songs_dir)?;
    if let Some(limit) = opts.limit {
        inputs.truncate(limit);
    }
    std::fs::create_dir_all(&opts.out_dir)
        .with_context(|| format!("failed to create '{}'", opts.out_dir.display()))?;

    let total = inputs.len();
    tracing::info!(total, out = %opts.out_dir.display(), "batch started");

    let mut report = BatchReport::default();
    for (i, audio) in inputs.into_iter().enumerate() {
        if cancel.is_cancelled() {
            tracing::info!(done = i, total, "batch cancelled");
            break;
        }
        let output = output_path_for(&opts.out_dir, &audio);
        if opts.skip_existing && output.exists() {
            tracing::info!(audio = %audio.display(), "output exists; skipping");
            report.skipped.push(audio);
            continue;
        }

        tracing::info!(index = i + 1, total, audio = %audio.display(), "rendering");
        let result = job_for(session, &meta, &audio, &opts.out_dir).and_then(|job| render(&job));
        match &result {
            Ok(stats) => tracing::info!(output = %stats.output.display(), "done"),
            Err(e) => tracing::warn!(audio = %audio.display(), error = %e, "job failed"),
        }
        let cancelled = matches!(result, Err(PulseError::Cancelled));
        report.outcomes.push(JobOutcome {
            audio,
            output,
            result,
        });
        if cancelled {
            break;
        }
    }

    tracing::info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        skipped = report.skipped.len(),
        "batch finished"
    );
    Ok(report)
}

#[cfg(test)]
#[path = "../tests/unit/batch.rs"]
mod tests;
