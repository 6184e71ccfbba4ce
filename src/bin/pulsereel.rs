use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pulsereel", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a single frame as a PNG.
    Frame(FrameArgs),
    /// Render an MP4 video (requires `ffmpeg` on PATH or `encoder_program` in the config).
    Render(RenderArgs),
    /// Render every `.mp3` in a directory, using `songs.csv` for per-song overrides.
    Batch(BatchArgs),
}

/// Flags shared by every subcommand that builds a session.
#[derive(Parser, Debug)]
struct ConfigArgs {
    /// Pipeline config JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output width (overrides the config).
    #[arg(long)]
    width: Option<u32>,

    /// Output height (overrides the config).
    #[arg(long)]
    height: Option<u32>,

    /// Frames per second (overrides the config).
    #[arg(long)]
    fps: Option<u32>,

    /// Visual preset: `neon` or `glowup` (overrides the config).
    #[arg(long)]
    preset: Option<pulsereel::PresetName>,

    /// Font file for logo, watermark and captions (overrides the config).
    #[arg(long)]
    font: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Input audio file.
    #[arg(long)]
    audio: PathBuf,

    /// Timestamp in seconds.
    #[arg(long, default_value_t = 0.0)]
    time: f64,

    /// Caption JSON (array of `{start, end, text}`).
    #[arg(long)]
    captions: Option<PathBuf>,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input audio file.
    #[arg(long)]
    audio: PathBuf,

    /// Caption JSON (array of `{start, end, text}`).
    #[arg(long)]
    captions: Option<PathBuf>,

    /// Output MP4 path.
    #[arg(long)]
    out: PathBuf,

    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Parser, Debug)]
struct BatchArgs {
    /// Directory with `.mp3` inputs (and optional `songs.csv`).
    #[arg(long)]
    songs: PathBuf,

    /// Output directory.
    #[arg(long)]
    out: PathBuf,

    /// Render at most this many songs.
    #[arg(long)]
    limit: Option<usize>,

    /// Metadata CSV (defaults to `<songs>/songs.csv`).
    #[arg(long)]
    metadata: Option<PathBuf>,

    /// Leave songs whose output already exists untouched.
    #[arg(long)]
    skip_existing: bool,

    #[command(flatten)]
    config: ConfigArgs,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pulsereel=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Frame(args) => cmd_frame(args),
        Command::Render(args) => cmd_render(args, &interrupt_token()?),
        Command::Batch(args) => cmd_batch(args, &interrupt_token()?),
    }
}

/// Token cancelled by Ctrl-C, so an interrupted render aborts its encoder and removes the partial
/// output instead of dying mid-stream.
fn interrupt_token() -> anyhow::Result<pulsereel::CancelToken> {
    let cancel = pulsereel::CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        tracing::warn!("interrupted; stopping after the current frame");
        handler_token.cancel();
    })
    .context("install Ctrl-C handler")?;
    Ok(cancel)
}

fn load_config(args: &ConfigArgs) -> anyhow::Result<pulsereel::PipelineConfig> {
    let mut cfg = match &args.config {
        Some(path) => pulsereel::PipelineConfig::from_path(path)?,
        None => pulsereel::PipelineConfig::default(),
    };
    if let Some(w) = args.width {
        cfg.width = w;
    }
    if let Some(h) = args.height {
        cfg.height = h;
    }
    if let Some(fps) = args.fps {
        cfg.fps = fps;
    }
    if let Some(preset) = args.preset {
        cfg.preset = preset;
    }
    if let Some(font) = &args.font {
        cfg.font_path = Some(font.clone());
    }
    cfg.validate()?;
    Ok(cfg)
}

fn read_captions(path: Option<&Path>) -> anyhow::Result<pulsereel::CaptionTimeline> {
    Ok(match path {
        Some(p) => pulsereel::CaptionTimeline::from_path(p)?,
        None => pulsereel::CaptionTimeline::empty(),
    })
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let session = pulsereel::RenderSession::new(load_config(&args.config)?)?;
    let job = pulsereel::RenderJob::new(&args.audio, &args.out)
        .with_captions(read_captions(args.captions.as_deref())?);

    let frame = session.preview_frame(&job, args.time)?;
    let mut rgba = frame.data;
    if frame.premultiplied {
        unpremultiply_in_place(&mut rgba);
    }

    if let Some(parent) = args.out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image::save_buffer_with_format(
        &args.out,
        &rgba,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_render(args: RenderArgs, cancel: &pulsereel::CancelToken) -> anyhow::Result<()> {
    let session = pulsereel::RenderSession::new(load_config(&args.config)?)?;
    let job = pulsereel::RenderJob::new(&args.audio, &args.out)
        .with_captions(read_captions(args.captions.as_deref())?);

    let stats = session.render(&job, cancel)?;
    eprintln!("wrote {} ({} frames)", stats.output.display(), stats.frames);
    Ok(())
}

fn cmd_batch(args: BatchArgs, cancel: &pulsereel::CancelToken) -> anyhow::Result<()> {
    let session = pulsereel::RenderSession::new(load_config(&args.config)?)?;
    let opts = pulsereel::BatchOptions {
        songs_dir: args.songs,
        out_dir: args.out,
        limit: args.limit,
        metadata: args.metadata,
        skip_existing: args.skip_existing,
    };
    let report = pulsereel::run_batch(&session, &opts, cancel)?;

    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(stats) => eprintln!("ok   {}", stats.output.display()),
            Err(e) => eprintln!("FAIL {}: {e}", outcome.audio.display()),
        }
    }
    eprintln!(
        "{} succeeded, {} failed, {} skipped",
        report.succeeded(),
        report.failed(),
        report.skipped.len()
    );
    if report.failed() > 0 {
        anyhow::bail!("{} of {} jobs failed", report.failed(), report.outcomes.len());
    }
    Ok(())
}

fn unpremultiply_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        if a == 0 || a == 255 {
            continue;
        }
        for c in &mut px[..3] {
            *c = ((u16::from(*c) * 255 + a / 2) / a).min(255) as u8;
        }
    }
}
