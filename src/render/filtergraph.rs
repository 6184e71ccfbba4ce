use std::ffi::OsString;
use std::fmt::Write as _;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use crate::captions::timeline::{CaptionEvent, CaptionLayer};
use crate::config::PipelineConfig;
use crate::encode::ffmpeg::{
    STDERR_TAIL_CHARS, detach_from_terminal_signals, ensure_parent_dir, last_n_chars,
};
use crate::foundation::core::Rgba8;
use crate::foundation::error::{PulseError, PulseResult};
use crate::render::backend::{FrameRenderer, RendererBackend};
use crate::session::{CancelToken, PreparedJob, RenderStats};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Text and font settings for the generated filtergraph.
#[derive(Clone, Debug, PartialEq)]
pub struct FiltergraphOptions {
    /// Font file passed to `drawtext`; the encoder's default font otherwise.
    pub font: Option<PathBuf>,
    /// Centre logo text.
    pub logo_text: String,
    /// Corner watermark text.
    pub watermark_text: Option<String>,
    /// Logo pulse amplitude.
    pub logo_pulse_amplitude: f64,
    /// Logo pulse frequency in Hz.
    pub logo_pulse_hz: f64,
}

impl FiltergraphOptions {
    /// Options taken from a pipeline config.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            font: config.font_path.clone(),
            logo_text: config.logo_text.clone(),
            watermark_text: config.watermark_text.clone(),
            logo_pulse_amplitude: config.logo_pulse_amplitude,
            logo_pulse_hz: config.logo_pulse_hz,
        }
    }
}

/// Whole-job renderer: the encoder draws the spectrum and captions itself from a generated
/// `-filter_complex_script`, so no frames cross the pipe.
#[derive(Clone, Debug)]
pub struct FiltergraphRenderer {
    program: PathBuf,
    opts: FiltergraphOptions,
}

impl FiltergraphRenderer {
    /// Renderer using the config's encoder program and text settings.
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            program: config.encoder_program.clone(),
            opts: FiltergraphOptions::from_config(config),
        }
    }
}

impl FrameRenderer for FiltergraphRenderer {
    fn backend(&self) -> RendererBackend {
        RendererBackend::Filtergraph
    }

    #[tracing::instrument(skip_all, fields(output = %job.output.display()))]
    fn render_job(&mut self, job: &PreparedJob, cancel: &CancelToken) -> PulseResult<RenderStats> {
        if cancel.is_cancelled() {
            return Err(PulseError::Cancelled);
        }
        ensure_parent_dir(&job.output)?;

        let script_path = job.output.with_extension("filtergraph.txt");
        std::fs::write(&script_path, build_filter_script(job, &self.opts)).map_err(|e| {
            PulseError::Other(anyhow::anyhow!(
                "failed to write filtergraph script '{}': {e}",
                script_path.display()
            ))
        })?;

        let result = self.run_encoder(job, &script_path, cancel);
        let _ = std::fs::remove_file(&script_path);
        if result.is_err() && job.output.is_file() {
            let _ = std::fs::remove_file(&job.output);
        }
        result
    }
}

impl FiltergraphRenderer {
    fn run_encoder(
        &self,
        job: &PreparedJob,
        script: &Path,
        cancel: &CancelToken,
    ) -> PulseResult<RenderStats> {
        let mut cmd = Command::new(&self.program);
        detach_from_terminal_signals(&mut cmd);
        let mut child = cmd
            .args(filtergraph_args(job, script))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                PulseError::encoder_spawn(format!(
                    "failed to spawn '{}': {e}",
                    self.program.display()
                ))
            })?;

        let stderr_drain = child.stderr.take().map(|mut stderr| {
            std::thread::spawn(move || {
                let mut bytes = Vec::new();
                let _ = stderr.read_to_end(&mut bytes);
                bytes
            })
        });

        let status = loop {
            if cancel.is_cancelled() {
                let _ = child.kill();
                let _ = child.wait();
                tracing::info!("filtergraph render cancelled");
                return Err(PulseError::Cancelled);
            }
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => std::thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(PulseError::Other(anyhow::anyhow!(
                        "failed to wait for encoder: {e}"
                    )));
                }
            }
        };

        let stderr = stderr_drain
            .and_then(|h| h.join().ok())
            .unwrap_or_default();
        if !status.success() {
            return Err(PulseError::EncoderExitNonZero {
                code: status.code(),
                stderr_tail: last_n_chars(&String::from_utf8_lossy(&stderr), STDERR_TAIL_CHARS),
            });
        }

        Ok(RenderStats {
            backend: RendererBackend::Filtergraph,
            frames: job.total_frames,
            duration_secs: job.asset.duration_secs,
            output: job.output.clone(),
        })
    }
}

/// Encoder arguments for a filtergraph job.
pub fn filtergraph_args(job: &PreparedJob, script: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-y".into(), "-loglevel".into(), "error".into(), "-i".into()];
    args.push(job.asset.path.as_os_str().to_owned());
    args.push("-filter_complex_script".into());
    args.push(script.as_os_str().to_owned());
    args.extend(
        [
            "-map", "[final]", "-map", "0:a", "-c:v", "libx264", "-pix_fmt", "yuv420p", "-c:a",
            "aac", "-movflags", "+faststart", "-t",
        ]
        .iter()
        .map(OsString::from),
    );
    args.push(format!("{:.3}", job.video_duration_secs()).into());
    args.push(job.output.as_os_str().to_owned());
    args
}

/// Build the `-filter_complex_script` body for `job`.
///
/// The chain is: solid background, centred `showspectrum` with a blurred glow copy, dark centre
/// box, pulsing logo, watermark, then one `drawtext` per caption gated by `enable`.
pub fn build_filter_script(job: &PreparedJob, opts: &FiltergraphOptions) -> String {
    let w = job.canvas.width;
    let h = job.canvas.height;
    let s = job.canvas.reference_scale();
    let spec = w.min(h);
    let hole = (2.0 * job.preset.inner_radius * f64::from(w)).round() as u32;
    let font = font_option(opts.font.as_deref());

    let mut g = String::new();
    let _ = writeln!(
        g,
        "color=c={}:s={w}x{h}:r={}:d={:.3}[bg];",
        color_arg(job.preset.background),
        job.fps.as_f64(),
        job.video_duration_secs()
    );
    let _ = writeln!(
        g,
        "[0:a]showspectrum=s={spec}x{spec}:mode=combined:color=intensity:scale=cbrt:orientation=vertical:saturation=2,format=rgba[spec];"
    );
    let _ = writeln!(g, "[spec]split=2[spec_sharp][spec_soft];");
    let _ = writeln!(g, "[spec_soft]gblur=sigma=30,hue=s=2.5[spec_glow];");
    let _ = writeln!(g, "[bg][spec_glow]overlay=(W-w)/2:(H-h)/2[bg1];");
    let _ = writeln!(g, "[bg1][spec_sharp]overlay=(W-w)/2:(H-h)/2[bg2];");

    let mut chain = Chain::new(g, "bg2");
    chain.step(&format!(
        "drawbox=x=(iw-{hole})/2:y=(ih-{hole})/2:w={hole}:h={hole}:c=black@0.85:t=fill"
    ));

    if !opts.logo_text.trim().is_empty() {
        let size = (88.0 * s).round();
        chain.step(&format!(
            "drawtext={font}text={}:expansion=none:fontsize='{size}*(1+{}*sin(2*PI*{}*t))':fontcolor=white:x=(w-text_w)/2:y=(h-text_h)/2:shadowcolor={}:shadowx=5:shadowy=5",
            escape_text(&opts.logo_text),
            opts.logo_pulse_amplitude,
            opts.logo_pulse_hz,
            color_arg(job.preset.accent),
        ));
    }

    if let Some(mark) = opts.watermark_text.as_deref()
        && !mark.trim().is_empty()
    {
        chain.step(&format!(
            "drawtext={font}text={}:expansion=none:fontsize={}:fontcolor=#00D9FF@0.9:x=w-text_w-{}:y={}",
            escape_text(mark),
            (34.0 * s).round(),
            (40.0 * s).round(),
            (70.0 * s).round(),
        ));
    }

    for event in job.captions.events() {
        chain.step(&caption_filter(event, &font, s, job.preset.accent));
    }

    chain.finish()
}

fn caption_filter(event: &CaptionEvent, font: &str, s: f64, accent: Rgba8) -> String {
    let (default_px, default_y, card) = match event.layer {
        CaptionLayer::Hook => (110.0, "(h-text_h)/2".to_owned(), None),
        CaptionLayer::Lyric => (
            96.0,
            "h*0.16".to_owned(),
            Some(("0x140028@0.96", (20.0 * s).round())),
        ),
        CaptionLayer::Caption => (
            56.0,
            format!("h-{}-text_h", (170.0 * s).round()),
            Some(("0x330044@0.9", (16.0 * s).round())),
        ),
        CaptionLayer::Free => (48.0, format!("h-{}-text_h/2", (80.0 * s).round()), None),
    };
    let size = (event.font_size.unwrap_or(default_px) * s).round();
    let x = event
        .x
        .map_or_else(|| "(w-text_w)/2".to_owned(), |x| format!("{}-text_w/2", (x * s).round()));
    let y = event
        .y
        .map_or(default_y, |y| format!("{}-text_h/2", (y * s).round()));
    let color = event.color.unwrap_or(Rgba8::rgb(255, 255, 255));
    let (start, end) = (event.start, event.end);

    let mut f = format!(
        "drawtext={font}text={}:expansion=none:fontsize={size}:fontcolor={}:x={x}:y={y}:shadowcolor={}:shadowx=5:shadowy=5:enable='between(t,{start:.3},{end:.3})':alpha='sin(PI*(0.5-0.5*cos(PI*clip((t-{start:.3})/({end:.3}-{start:.3}),0,1))))'",
        escape_text(&event.text),
        color_arg(color),
        color_arg(accent),
    );
    if let Some((box_color, border)) = card {
        let _ = write!(f, ":box=1:boxcolor={box_color}:boxborderw={border}");
    }
    f
}

/// Quote `text` for a `drawtext` option value.
///
/// Straight single quotes cannot appear inside a quoted value and become typographic ones.
pub(crate) fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for c in text.chars() {
        match c {
            '\'' => out.push('\u{2019}'),
            '\\' => out.push_str("\\\\"),
            ':' => out.push_str("\\:"),
            '\n' | '\r' => out.push(' '),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

fn font_option(font: Option<&Path>) -> String {
    match font {
        Some(path) => format!(
            "fontfile={}:",
            escape_text(&path.to_string_lossy().replace('\\', "/"))
        ),
        None => String::new(),
    }
}

fn color_arg(c: Rgba8) -> String {
    if c.a == 255 {
        format!("0x{:02X}{:02X}{:02X}", c.r, c.g, c.b)
    } else {
        format!(
            "0x{:02X}{:02X}{:02X}@{:.3}",
            c.r,
            c.g,
            c.b,
            f64::from(c.a) / 255.0
        )
    }
}

/// Linear chain of single-input filters with numbered intermediate labels.
struct Chain {
    script: String,
    label: String,
    next: usize,
}

impl Chain {
    fn new(script: String, input: &str) -> Self {
        Self {
            script,
            label: input.to_owned(),
            next: 0,
        }
    }

    fn step(&mut self, filter: &str) {
        let out = format!("v{}", self.next);
        self.next += 1;
        let _ = writeln!(self.script, "[{}]{filter}[{out}];", self.label);
        self.label = out;
    }

    fn finish(mut self) -> String {
        let _ = write!(self.script, "[{}]format=yuv420p[final]", self.label);
        self.script
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/filtergraph.rs"]
mod tests;
