use std::path::Path;

use crate::foundation::error::{PulseError, PulseResult};

/// Sample rate used for spectral analysis.
pub const ANALYSIS_SAMPLE_RATE: u32 = 44_100;

/// Decoded single-channel floating-point PCM.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MonoPcm {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Samples in `[-1, 1]`.
    pub samples: Vec<f32>,
}

impl MonoPcm {
    /// Wrap already-decoded samples.
    pub fn new(sample_rate: u32, samples: Vec<f32>) -> Self {
        Self {
            sample_rate,
            samples,
        }
    }

    /// Downmix interleaved PCM by averaging channels.
    pub fn from_interleaved(sample_rate: u32, channels: u16, interleaved: &[f32]) -> Self {
        let ch = usize::from(channels.max(1));
        let samples = interleaved
            .chunks_exact(ch)
            .map(|frame| frame.iter().sum::<f32>() / ch as f32)
            .collect();
        Self {
            sample_rate,
            samples,
        }
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }

    /// Sample at absolute index, zero outside the decoded range.
    pub fn sample_at(&self, idx: i64) -> f32 {
        if idx < 0 {
            return 0.0;
        }
        usize::try_from(idx)
            .ok()
            .and_then(|i| self.samples.get(i))
            .copied()
            .unwrap_or(0.0)
    }
}

/// Decode `path` to mono `f32` PCM at `sample_rate` by piping `f32le` out of the decoder.
///
/// Any decoder failure is reported as [`PulseError::VisualizationUnavailable`]: without PCM the
/// render continues with silent visuals.
#[tracing::instrument(level = "debug", skip(program))]
pub fn decode_mono_f32(program: &Path, path: &Path, sample_rate: u32) -> PulseResult<MonoPcm> {
    if sample_rate == 0 {
        return Err(PulseError::validation("decode sample_rate must be non-zero"));
    }

    let out = std::process::Command::new(program)
        .args(["-v", "error", "-i"])
        .arg(path)
        .args([
            "-vn",
            "-f",
            "f32le",
            "-acodec",
            "pcm_f32le",
            "-ac",
            "1",
            "-ar",
            &sample_rate.to_string(),
            "pipe:1",
        ])
        .stdin(std::process::Stdio::null())
        .output()
        .map_err(|e| {
            PulseError::visualization(format!(
                "failed to run '{}' for audio decode: {e}",
                program.display()
            ))
        })?;

    if !out.status.success() {
        return Err(PulseError::visualization(format!(
            "audio decode failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let samples = f32le_to_samples(&out.stdout)?;
    tracing::debug!(samples = samples.len(), "decoded analysis pcm");
    Ok(MonoPcm::new(sample_rate, samples))
}

pub(crate) fn f32le_to_samples(bytes: &[u8]) -> PulseResult<Vec<f32>> {
    if !bytes.len().is_multiple_of(4) {
        return Err(PulseError::visualization(
            "decoded audio byte length is not aligned to f32 samples",
        ));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .map(|s| if s.is_finite() { s } else { 0.0 })
        .collect())
}

#[cfg(test)]
#[path = "../../tests/unit/audio/decode.rs"]
mod tests;
