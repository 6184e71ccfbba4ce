use super::*;

#[test]
fn interleaved_stereo_is_averaged() {
    let pcm = MonoPcm::from_interleaved(4, 2, &[1.0, 0.0, 0.5, 0.5, -1.0, 1.0, 9.0]);
    assert_eq!(pcm.samples, vec![0.5, 0.5, 0.0]);
    assert_eq!(pcm.duration_secs(), 0.75);
}

#[test]
fn sample_at_is_zero_outside_range() {
    let pcm = MonoPcm::new(10, vec![0.25, -0.5]);
    assert_eq!(pcm.sample_at(-1), 0.0);
    assert_eq!(pcm.sample_at(0), 0.25);
    assert_eq!(pcm.sample_at(1), -0.5);
    assert_eq!(pcm.sample_at(2), 0.0);
}

#[test]
fn f32le_bytes_decode_and_reject_misalignment() {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&0.5f32.to_le_bytes());
    bytes.extend_from_slice(&f32::NAN.to_le_bytes());
    assert_eq!(f32le_to_samples(&bytes).unwrap(), vec![0.5, 0.0]);
    assert!(matches!(
        f32le_to_samples(&bytes[..5]),
        Err(PulseError::VisualizationUnavailable(_))
    ));
}

#[test]
fn missing_decoder_is_visualization_unavailable() {
    let err = decode_mono_f32(
        Path::new("/no/such/decoder-binary"),
        Path::new("song.mp3"),
        ANALYSIS_SAMPLE_RATE,
    )
    .unwrap_err();
    assert!(matches!(err, PulseError::VisualizationUnavailable(_)));
}
