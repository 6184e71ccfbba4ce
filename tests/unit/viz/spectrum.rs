use super::*;

fn sine_pcm(freq_hz: f32, secs: f32) -> Arc<MonoPcm> {
    let sr = 44_100u32;
    let n = (secs * sr as f32) as usize;
    let samples = (0..n)
        .map(|i| 0.5 * (2.0 * std::f32::consts::PI * freq_hz * i as f32 / sr as f32).sin())
        .collect();
    Arc::new(MonoPcm::new(sr, samples))
}

fn band_of(settings: &SpectrumSettings, freq_hz: f32) -> usize {
    let ratio = settings.max_freq_hz / settings.min_freq_hz;
    let pos = (freq_hz / settings.min_freq_hz).ln() / ratio.ln();
    (pos * settings.bands as f32).floor() as usize
}

#[test]
fn beat_strength_is_mean() {
    let s = VisualizationSample::from_values(vec![0.0, 0.5, 1.0, 2.0, f32::NAN]);
    assert_eq!(s.values(), &[0.0, 0.5, 1.0, 1.0, 0.0]);
    assert!((s.beat_strength() - 0.5).abs() < 1e-9);
    assert_eq!(VisualizationSample::zeros(0).beat_strength(), 0.0);
}

#[test]
fn silent_source_is_all_zero() {
    let mut s = SilentSpectrum::new(16);
    let v = s.sample(3.0).unwrap();
    assert_eq!(v.len(), 16);
    assert!(v.values().iter().all(|&x| x == 0.0));
}

#[test]
fn sine_energy_lands_in_matching_band() {
    let settings = SpectrumSettings::default();
    let mut engine = PcmSpectrumEngine::new(sine_pcm(1000.0, 1.0), settings).unwrap();
    let v = engine.sample(0.5).unwrap();
    assert_eq!(v.len(), 256);

    let b = band_of(&settings, 1000.0);
    let near = v.values()[b.saturating_sub(2)..(b + 3).min(256)]
        .iter()
        .copied()
        .fold(0.0f32, f32::max);
    assert!(near > 0.8, "expected strong band near 1 kHz, got {near}");

    let far = v.values()[band_of(&settings, 12_000.0)];
    assert!(far < near, "far band {far} should be quieter than {near}");
    assert!(v.values().iter().all(|x| (0.0..=1.0).contains(x)));
}

#[test]
fn sampling_is_deterministic_and_seek_safe() {
    let mut engine =
        PcmSpectrumEngine::new(sine_pcm(440.0, 2.0), SpectrumSettings::default()).unwrap();
    let a = engine.sample(1.0).unwrap();
    let _ = engine.sample(0.25).unwrap();
    let _ = engine.sample(1.75).unwrap();
    let b = engine.sample(1.0).unwrap();
    assert_eq!(a, b);
}

#[test]
fn before_audio_start_is_silent() {
    let mut engine =
        PcmSpectrumEngine::new(sine_pcm(440.0, 1.0), SpectrumSettings::default()).unwrap();
    let v = engine.sample(0.0).unwrap();
    assert!(v.values().iter().all(|&x| x == 0.0));
}

#[test]
fn non_finite_time_is_unavailable() {
    let mut engine =
        PcmSpectrumEngine::new(sine_pcm(440.0, 0.1), SpectrumSettings::default()).unwrap();
    assert!(matches!(
        engine.sample(f64::NAN),
        Err(PulseError::VisualizationUnavailable(_))
    ));
}

#[test]
fn band_bins_are_ordered_and_non_empty() {
    let settings = SpectrumSettings::default();
    let bins = log_band_bins(&settings, 44_100);
    assert_eq!(bins.len(), 256);
    for w in bins.windows(2) {
        assert!(w[0].0 <= w[1].0);
    }
    assert!(bins.iter().all(|&(lo, hi)| hi > lo && hi <= 1025));
}

#[test]
fn invalid_settings_are_rejected() {
    let pcm = sine_pcm(440.0, 0.1);
    let bad = SpectrumSettings {
        fft_size: 1000,
        ..SpectrumSettings::default()
    };
    assert!(PcmSpectrumEngine::new(pcm.clone(), bad).is_err());
    let bad = SpectrumSettings {
        smoothing: 1.0,
        ..SpectrumSettings::default()
    };
    assert!(PcmSpectrumEngine::new(pcm, bad).is_err());
}
