use std::sync::Arc;

use rustfft::{Fft, FftPlanner, num_complex::Complex};

use crate::audio::decode::MonoPcm;
use crate::foundation::error::{PulseError, PulseResult};

/// Per-band audio energy for one instant, values in `[0, 1]`, indexed by angular position.
#[derive(Clone, Debug, PartialEq)]
pub struct VisualizationSample {
    values: Vec<f32>,
}

impl VisualizationSample {
    /// All-zero sample with `bands` entries.
    pub fn zeros(bands: usize) -> Self {
        Self {
            values: vec![0.0; bands],
        }
    }

    /// Wrap raw values, clamping each into `[0, 1]` (NaN becomes `0`).
    pub fn from_values(values: Vec<f32>) -> Self {
        let values = values
            .into_iter()
            .map(|v| if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) })
            .collect();
        Self { values }
    }

    /// Band values.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Number of bands.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no bands.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Aggregate beat strength: the arithmetic mean of all bands.
    pub fn beat_strength(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.values.iter().map(|&v| f64::from(v)).sum();
        sum / self.values.len() as f64
    }
}

/// Produces a [`VisualizationSample`] for a timestamp.
///
/// Implementations must be deterministic: the same audio and timestamp yield identical samples,
/// regardless of query order.
pub trait SpectrumSource: Send {
    /// Number of bands in every sample.
    fn bands(&self) -> usize;

    /// Position the source at `t_secs` before sampling. Stateless sources ignore this.
    fn set_time(&mut self, _t_secs: f64) {}

    /// Sample the spectrum at `t_secs`.
    fn sample(&mut self, t_secs: f64) -> PulseResult<VisualizationSample>;
}

/// Source that always reports silence.
#[derive(Clone, Copy, Debug)]
pub struct SilentSpectrum {
    bands: usize,
}

impl SilentSpectrum {
    /// Silent source with `bands` bands.
    pub fn new(bands: usize) -> Self {
        Self { bands }
    }
}

impl SpectrumSource for SilentSpectrum {
    fn bands(&self) -> usize {
        self.bands
    }

    fn sample(&mut self, _t_secs: f64) -> PulseResult<VisualizationSample> {
        Ok(VisualizationSample::zeros(self.bands))
    }
}

/// Analysis parameters for [`PcmSpectrumEngine`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpectrumSettings {
    /// Number of output bands.
    pub bands: usize,
    /// FFT window length in samples (power of two).
    pub fft_size: usize,
    /// Decibel level mapped to `0`.
    pub min_db: f32,
    /// Decibel level mapped to `1`.
    pub max_db: f32,
    /// Lowest band edge in Hz.
    pub min_freq_hz: f32,
    /// Highest band edge in Hz.
    pub max_freq_hz: f32,
    /// Weight of the k-th preceding window is `smoothing^k`.
    pub smoothing: f32,
    /// Preceding windows blended in addition to the current one.
    pub history: usize,
}

impl Default for SpectrumSettings {
    fn default() -> Self {
        Self {
            bands: 256,
            fft_size: 2048,
            min_db: -85.0,
            max_db: -25.0,
            min_freq_hz: 20.0,
            max_freq_hz: 16_000.0,
            smoothing: 0.7,
            history: 3,
        }
    }
}

impl SpectrumSettings {
    fn validate(&self) -> PulseResult<()> {
        if self.bands == 0 {
            return Err(PulseError::validation("spectrum bands must be >= 1"));
        }
        if self.fft_size < 32 || !self.fft_size.is_power_of_two() {
            return Err(PulseError::validation(
                "spectrum fft_size must be a power of two >= 32",
            ));
        }
        if !(self.max_db > self.min_db) {
            return Err(PulseError::validation("spectrum max_db must exceed min_db"));
        }
        if !(self.min_freq_hz > 0.0 && self.max_freq_hz > self.min_freq_hz) {
            return Err(PulseError::validation(
                "spectrum frequency range must be positive and increasing",
            ));
        }
        if !(0.0..1.0).contains(&self.smoothing) {
            return Err(PulseError::validation("spectrum smoothing must be in [0, 1)"));
        }
        Ok(())
    }
}

/// FFT analyser over decoded mono PCM.
///
/// Each query windows the audio ending at `t`, plus `history` windows stepping back by half a
/// window, and blends them with geometric weights. No state survives between queries, so frames
/// can be sampled in any order.
pub struct PcmSpectrumEngine {
    pcm: Arc<MonoPcm>,
    settings: SpectrumSettings,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    window_gain: f32,
    band_bins: Vec<(usize, usize)>,
    buf: Vec<Complex<f32>>,
    bins: Vec<f32>,
    acc: Vec<f32>,
}

impl std::fmt::Debug for PcmSpectrumEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PcmSpectrumEngine")
            .field("sample_rate", &self.pcm.sample_rate)
            .field("samples", &self.pcm.samples.len())
            .field("settings", &self.settings)
            .finish()
    }
}

impl PcmSpectrumEngine {
    /// Build an analyser over `pcm`.
    pub fn new(pcm: Arc<MonoPcm>, settings: SpectrumSettings) -> PulseResult<Self> {
        settings.validate()?;
        if pcm.sample_rate == 0 {
            return Err(PulseError::visualization("pcm sample_rate is zero"));
        }

        let n = settings.fft_size;
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(n);
        let window = hann_window(n);
        let window_gain = window.iter().sum::<f32>();
        let band_bins = log_band_bins(&settings, pcm.sample_rate);

        Ok(Self {
            pcm,
            settings,
            fft,
            window,
            window_gain,
            band_bins,
            buf: vec![Complex::new(0.0, 0.0); n],
            bins: vec![0.0; n / 2 + 1],
            acc: vec![0.0; settings.bands],
        })
    }

    /// Analysis settings.
    pub fn settings(&self) -> &SpectrumSettings {
        &self.settings
    }

    /// Fill `self.bins` with normalized `[0, 1]` levels for the window ending at `end_sample`.
    fn analyse_window(&mut self, end_sample: i64) {
        let n = self.settings.fft_size;
        let start = end_sample - n as i64;
        for (i, slot) in self.buf.iter_mut().enumerate() {
            let s = self.pcm.sample_at(start + i as i64) * self.window[i];
            *slot = Complex::new(s, 0.0);
        }
        self.fft.process(&mut self.buf);

        let scale = 2.0 / self.window_gain.max(f32::EPSILON);
        let range = self.settings.max_db - self.settings.min_db;
        for (bin, c) in self.bins.iter_mut().zip(self.buf.iter()) {
            let mag = c.norm() * scale;
            let db = 20.0 * mag.max(1e-12).log10();
            *bin = ((db - self.settings.min_db) / range).clamp(0.0, 1.0);
        }
    }
}

impl SpectrumSource for PcmSpectrumEngine {
    fn bands(&self) -> usize {
        self.settings.bands
    }

    fn sample(&mut self, t_secs: f64) -> PulseResult<VisualizationSample> {
        if !t_secs.is_finite() {
            return Err(PulseError::visualization(format!(
                "non-finite sample time {t_secs}"
            )));
        }

        let hop = (self.settings.fft_size / 2) as i64;
        let end = (t_secs.max(0.0) * f64::from(self.pcm.sample_rate)).floor() as i64;

        self.acc.iter_mut().for_each(|v| *v = 0.0);
        let mut weight_sum = 0.0f32;
        let mut weight = 1.0f32;
        for k in 0..=self.settings.history {
            self.analyse_window(end - (k as i64) * hop);
            for (out, &(lo, hi)) in self.acc.iter_mut().zip(self.band_bins.iter()) {
                let peak = self.bins[lo..hi].iter().copied().fold(0.0f32, f32::max);
                *out += weight * peak;
            }
            weight_sum += weight;
            weight *= self.settings.smoothing;
            if weight <= f32::EPSILON {
                break;
            }
        }

        let values = self.acc.iter().map(|v| v / weight_sum).collect();
        Ok(VisualizationSample::from_values(values))
    }
}

fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let phase = 2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32;
            0.5 * (1.0 - phase.cos())
        })
        .collect()
}

/// Half-open FFT bin ranges for log-spaced bands. Every band covers at least one bin.
pub(crate) fn log_band_bins(settings: &SpectrumSettings, sample_rate: u32) -> Vec<(usize, usize)> {
    let n_bins = settings.fft_size / 2 + 1;
    let bin_hz = sample_rate as f32 / settings.fft_size as f32;
    let nyquist = sample_rate as f32 / 2.0;
    let hi_hz = settings.max_freq_hz.min(nyquist);
    let lo_hz = settings.min_freq_hz.min(hi_hz);
    let ratio = (hi_hz / lo_hz).max(1.0);
    let bands = settings.bands;

    (0..bands)
        .map(|b| {
            let f0 = lo_hz * ratio.powf(b as f32 / bands as f32);
            let f1 = lo_hz * ratio.powf((b + 1) as f32 / bands as f32);
            let lo = ((f0 / bin_hz).round() as usize).min(n_bins - 1);
            let hi = ((f1 / bin_hz).round() as usize).clamp(lo + 1, n_bins);
            (lo, hi)
        })
        .collect()
}

#[cfg(test)]
#[path = "../../tests/unit/viz/spectrum.rs"]
mod tests;
