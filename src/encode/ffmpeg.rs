use crate::encode::sink::{FrameSink, SinkConfig};
use crate::foundation::core::{Fps, FrameIndex};
use crate::foundation::error::{PulseError, PulseResult};
use crate::foundation::math::mul_div255_u16;
use crate::render::backend::FrameRGBA;
use std::ffi::OsString;
use std::io::{Read, Write as _};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

/// Characters of encoder stderr kept in [`PulseError::EncoderExitNonZero`].
pub const STDERR_TAIL_CHARS: usize = 500;

/// Options for [`FfmpegSink`] MP4 output.
#[derive(Clone, Debug)]
pub struct FfmpegSinkOpts {
    /// Encoder executable.
    pub program: PathBuf,
    /// Output MP4 file path.
    pub out_path: PathBuf,
    /// Background color used to flatten alpha (RGBA8, straight alpha).
    pub bg_rgba: [u8; 4],
}

impl FfmpegSinkOpts {
    /// Create options for outputting an MP4 to `out_path` with the system `ffmpeg`.
    pub fn new(out_path: impl Into<PathBuf>) -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
            out_path: out_path.into(),
            bg_rgba: [0, 0, 0, 255],
        }
    }

    /// Use a different encoder executable.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }
}

/// How a finished bridge ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BridgeOutcome {
    /// Encoder exited with status 0.
    Success,
    /// Encoder failed to start or exited unsuccessfully.
    Failure,
    /// The caller aborted the render.
    Cancelled,
}

/// Lifecycle of the encoder process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BridgeState {
    /// No process yet.
    Idle,
    /// Process running, frames accepted.
    Streaming,
    /// Stdin closed; waiting for the process to exit. No frames accepted.
    Draining,
    /// Process reaped.
    Closed(BridgeOutcome),
}

/// Sink that spawns the encoder and streams raw RGBA frames to its stdin, muxed against the
/// original audio file.
///
/// Writes block on the pipe, so a slow encoder throttles the frame loop. The partially written
/// output file is removed on any failure or cancellation.
pub struct FfmpegSink {
    opts: FfmpegSinkOpts,
    state: BridgeState,

    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,

    scratch: Vec<u8>,
    cfg: Option<SinkConfig>,
    last_idx: Option<FrameIndex>,
    frames_written: u64,
    undelivered: Option<(FrameIndex, String)>,
}

impl FfmpegSink {
    /// Create a new sink that streams into the configured encoder.
    pub fn new(opts: FfmpegSinkOpts) -> Self {
        Self {
            opts,
            state: BridgeState::Idle,
            child: None,
            stdin: None,
            stderr_drain: None,
            scratch: Vec::new(),
            cfg: None,
            last_idx: None,
            frames_written: 0,
            undelivered: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> BridgeState {
        self.state
    }

    /// Frames fully written to the encoder.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    fn remove_partial_output(&self) {
        if self.opts.out_path.is_file() {
            match std::fs::remove_file(&self.opts.out_path) {
                Ok(()) => tracing::debug!(
                    path = %self.opts.out_path.display(),
                    "removed partial output"
                ),
                Err(e) => tracing::warn!(
                    path = %self.opts.out_path.display(),
                    error = %e,
                    "failed to remove partial output"
                ),
            }
        }
    }

    fn join_stderr(&mut self) -> String {
        let bytes = match self.stderr_drain.take() {
            Some(handle) => match handle.join() {
                Ok(Ok(bytes)) => bytes,
                Ok(Err(e)) => format!("encoder stderr read failed: {e}").into_bytes(),
                Err(_) => b"encoder stderr drain thread panicked".to_vec(),
            },
            None => Vec::new(),
        };
        last_n_chars(&String::from_utf8_lossy(&bytes), STDERR_TAIL_CHARS)
    }

    fn fail(&mut self, err: PulseError) -> PulseError {
        self.state = BridgeState::Closed(BridgeOutcome::Failure);
        self.cfg = None;
        self.remove_partial_output();
        err
    }
}

impl FrameSink for FfmpegSink {
    fn begin(&mut self, cfg: SinkConfig) -> PulseResult<()> {
        if self.state != BridgeState::Idle {
            return Err(PulseError::validation("encoder bridge can only be started once"));
        }
        if cfg.width == 0 || cfg.height == 0 {
            return Err(PulseError::validation(
                "encoder width/height must be non-zero",
            ));
        }
        if !cfg.width.is_multiple_of(2) || !cfg.height.is_multiple_of(2) {
            return Err(PulseError::validation(
                "encoder width/height must be even (required for yuv420p mp4 output)",
            ));
        }
        let audio = cfg
            .audio
            .as_ref()
            .ok_or_else(|| PulseError::validation("encoder bridge requires an audio input"))?;

        ensure_parent_dir(&self.opts.out_path)?;

        let mut cmd = Command::new(&self.opts.program);
        detach_from_terminal_signals(&mut cmd);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .args(encoder_args(
                cfg.width,
                cfg.height,
                cfg.fps,
                audio,
                &self.opts.out_path,
            ));

        let mut child = cmd.spawn().map_err(|e| {
            self.state = BridgeState::Closed(BridgeOutcome::Failure);
            PulseError::encoder_spawn(format!(
                "failed to spawn '{}': {e}",
                self.opts.program.display()
            ))
        })?;

        let (Some(stdin), Some(mut stderr)) = (child.stdin.take(), child.stderr.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            self.state = BridgeState::Closed(BridgeOutcome::Failure);
            return Err(PulseError::encoder_spawn("failed to open encoder pipes"));
        };
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });

        tracing::debug!(
            program = %self.opts.program.display(),
            out = %self.opts.out_path.display(),
            width = cfg.width,
            height = cfg.height,
            "encoder started"
        );

        self.scratch = vec![0u8; (cfg.width as usize) * (cfg.height as usize) * 4];
        self.child = Some(child);
        self.stdin = Some(stdin);
        self.stderr_drain = Some(stderr_drain);
        self.cfg = Some(cfg);
        self.last_idx = None;
        self.frames_written = 0;
        self.undelivered = None;
        self.state = BridgeState::Streaming;
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> PulseResult<()> {
        if self.state != BridgeState::Streaming {
            return Err(PulseError::validation(format!(
                "encoder is not accepting frames (state {:?})",
                self.state
            )));
        }
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| PulseError::validation("encoder bridge not started"))?;
        if let Some(last) = self.last_idx
            && idx.0 <= last.0
        {
            return Err(PulseError::validation(
                "encoder bridge received out-of-order frame index",
            ));
        }

        if frame.width != cfg.width || frame.height != cfg.height {
            return Err(PulseError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, cfg.width, cfg.height
            )));
        }
        if frame.data.len() != self.scratch.len() {
            return Err(PulseError::validation(
                "frame.data size mismatch with width*height*4",
            ));
        }
        self.last_idx = Some(idx);

        if frame.premultiplied {
            flatten_premul_over_bg_to_opaque_rgba8(&mut self.scratch, &frame.data, self.opts.bg_rgba)?;
        } else {
            self.scratch.copy_from_slice(&frame.data);
        }

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(PulseError::validation("encoder stdin already closed"));
        };
        if let Err(e) = stdin.write_all(&self.scratch) {
            // The encoder went away; stop feeding it and let `end` report its exit status.
            drop(self.stdin.take());
            self.state = BridgeState::Draining;
            self.undelivered = Some((idx, e.to_string()));
            tracing::debug!(frame = idx.0, error = %e, "encoder stdin closed early");
            return Err(PulseError::Other(anyhow::anyhow!(
                "failed to write frame {} to encoder stdin: {e}",
                idx.0
            )));
        }
        self.frames_written += 1;
        Ok(())
    }

    fn end(&mut self) -> PulseResult<()> {
        match self.state {
            BridgeState::Streaming | BridgeState::Draining => {}
            BridgeState::Idle => return Err(PulseError::validation("encoder bridge not started")),
            BridgeState::Closed(_) => {
                return Err(PulseError::validation("encoder bridge already closed"));
            }
        }
        drop(self.stdin.take());
        self.state = BridgeState::Draining;

        let Some(mut child) = self.child.take() else {
            return Err(self.fail(PulseError::validation("encoder process missing")));
        };
        let status = match child.wait() {
            Ok(status) => status,
            Err(e) => {
                let _ = self.join_stderr();
                return Err(self.fail(PulseError::Other(anyhow::anyhow!(
                    "failed to wait for encoder to finish: {e}"
                ))));
            }
        };
        let stderr_tail = self.join_stderr();

        if !status.success() {
            return Err(self.fail(PulseError::EncoderExitNonZero {
                code: status.code(),
                stderr_tail,
            }));
        }

        // A clean exit after a lost frame still leaves a truncated file.
        if let Some((idx, cause)) = self.undelivered.take() {
            return Err(self.fail(PulseError::Other(anyhow::anyhow!(
                "encoder exited after {} frames; frame {} was not delivered: {cause}",
                self.frames_written,
                idx.0
            ))));
        }

        tracing::debug!(frames = self.frames_written, "encoder finished");
        self.state = BridgeState::Closed(BridgeOutcome::Success);
        self.cfg = None;
        Ok(())
    }

    fn abort(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        let _ = self.join_stderr();
        if matches!(
            self.state,
            BridgeState::Streaming | BridgeState::Draining | BridgeState::Idle
        ) {
            self.state = BridgeState::Closed(BridgeOutcome::Cancelled);
            self.remove_partial_output();
        }
        self.cfg = None;
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Full encoder argument list for one job.
pub fn encoder_args(width: u32, height: u32, fps: Fps, audio: &Path, out: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "-y",
        "-loglevel",
        "error",
        "-f",
        "rawvideo",
        "-pix_fmt",
        "rgba",
        "-s",
    ]
    .iter()
    .map(OsString::from)
    .collect();
    args.push(format!("{width}x{height}").into());
    args.push("-r".into());
    args.push(fps_arg(fps).into());
    args.extend(["-i", "pipe:0", "-i"].iter().map(OsString::from));
    args.push(audio.as_os_str().to_owned());
    args.extend(
        [
            "-map",
            "0:v:0",
            "-map",
            "1:a:0",
            "-c:v",
            "libx264",
            "-pix_fmt",
            "yuv420p",
            "-c:a",
            "aac",
            "-shortest",
            "-movflags",
            "+faststart",
        ]
        .iter()
        .map(OsString::from),
    );
    args.push(out.as_os_str().to_owned());
    args
}

fn fps_arg(fps: Fps) -> String {
    if fps.den == 1 {
        fps.num.to_string()
    } else {
        format!("{}/{}", fps.num, fps.den)
    }
}

pub(crate) fn flatten_premul_over_bg_to_opaque_rgba8(
    dst: &mut [u8],
    src_premul: &[u8],
    bg_rgba: [u8; 4],
) -> PulseResult<()> {
    if dst.len() != src_premul.len() || !dst.len().is_multiple_of(4) {
        return Err(PulseError::validation(
            "flatten_premul_over_bg_to_opaque_rgba8 expects equal-length rgba8 buffers",
        ));
    }

    let bg_r = u16::from(bg_rgba[0]);
    let bg_g = u16::from(bg_rgba[1]);
    let bg_b = u16::from(bg_rgba[2]);

    for (d, s) in dst.chunks_exact_mut(4).zip(src_premul.chunks_exact(4)) {
        let a = u16::from(s[3]);
        if a == 255 {
            d.copy_from_slice(s);
            continue;
        }

        let inv = 255u16 - a;
        d[0] = (u16::from(s[0]) + mul_div255_u16(bg_r, inv)).min(255) as u8;
        d[1] = (u16::from(s[1]) + mul_div255_u16(bg_g, inv)).min(255) as u8;
        d[2] = (u16::from(s[2]) + mul_div255_u16(bg_b, inv)).min(255) as u8;
        d[3] = 255;
    }

    Ok(())
}

pub(crate) fn last_n_chars(s: &str, max_chars: usize) -> String {
    let trimmed = s.trim();
    let count = trimmed.chars().count();
    trimmed
        .chars()
        .skip(count.saturating_sub(max_chars))
        .collect::<String>()
}

/// Run the encoder in its own process group so a terminal Ctrl-C reaches only pulsereel, which
/// then aborts the encoder itself.
pub(crate) fn detach_from_terminal_signals(cmd: &mut Command) {
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt as _;
        cmd.process_group(0);
    }
    #[cfg(not(unix))]
    let _ = cmd;
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> PulseResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/encode/ffmpeg.rs"]
mod tests;
