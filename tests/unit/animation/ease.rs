use super::*;

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn eases_hit_endpoints_and_clamp() {
    for e in [Ease::OutQuad, Ease::InOutSine] {
        assert!(close(e.apply(0.0), 0.0), "{e:?}");
        assert!(close(e.apply(1.0), 1.0), "{e:?}");
        assert_eq!(e.apply(-1.0), e.apply(0.0));
        assert_eq!(e.apply(2.0), e.apply(1.0));
    }
    assert!(Ease::OutQuad.apply(0.5) > 0.5);
}

#[test]
fn in_out_sine_is_symmetric() {
    assert!(close(Ease::InOutSine.apply(0.5), 0.5));
    let a = Ease::InOutSine.apply(0.2);
    let b = Ease::InOutSine.apply(0.8);
    assert!(close(a + b, 1.0));
}

#[test]
fn envelope_peaks_in_middle() {
    assert!(sine_envelope(0.0).abs() < 1e-12);
    assert!(close(sine_envelope(0.5), 1.0));
    assert!(sine_envelope(1.0) < 1e-12);
    assert_eq!(sine_envelope(f64::NAN), 0.0);
}

#[test]
fn remap_and_pulse_ranges() {
    assert!(close(remap_unit_wave(-1.0, 0.2, 0.9), 0.2));
    assert!(close(remap_unit_wave(1.0, 0.2, 0.9), 0.9));
    assert!(close(remap_unit_wave(0.0, 0.96, 1.18), 1.07));
    assert!(close(pulse(0.25, 0.12, 1.0), 1.12));
    assert!(close(pulse(0.0, 0.12, 1.0), 1.0));
}

#[test]
fn keyframes_interpolate_and_hold_ends() {
    let stops = [(0.0, 30.0), (0.7, 180.0), (1.4, 140.0), (2.6, 110.0)];
    assert!(close(keyframes(-1.0, &stops), 30.0));
    assert!(close(keyframes(0.35, &stops), 105.0));
    assert!(close(keyframes(1.4, &stops), 140.0));
    assert!(close(keyframes(10.0, &stops), 110.0));
    assert_eq!(keyframes(1.0, &[]), 0.0);
}

#[test]
fn hold_envelope_ramps_then_stays_up() {
    assert!(close(hold_envelope(0.0, 5.0, 0.4, 0.8), 0.0));
    assert!(close(hold_envelope(0.2, 5.0, 0.4, 0.8), 0.5));
    assert!(close(hold_envelope(0.4, 5.0, 0.4, 0.8), 1.0));
    assert!(close(hold_envelope(3.0, 5.0, 0.4, 0.8), 1.0));
    assert!(close(hold_envelope(4.6, 5.0, 0.4, 0.8), 0.5));
    assert!(close(hold_envelope(5.0, 5.0, 0.4, 0.8), 0.0));

    // Too short for both fades: each gets half the span.
    assert!(close(hold_envelope(0.5, 1.0, 0.8, 0.8), 1.0));
    assert_eq!(hold_envelope(0.5, 0.0, 0.4, 0.8), 0.0);
}

#[test]
fn pop_in_overshoots_then_settles() {
    assert!(close(pop_in_scale(0.0), 0.3));
    let peak = (0..500)
        .map(|i| pop_in_scale(f64::from(i) * 0.001))
        .fold(0.0, f64::max);
    assert!(peak > 1.1);
    assert!(close(pop_in_scale(POP_IN_SECS), 1.0));
    assert!(close(pop_in_scale(7.0), 1.0));
}

#[test]
fn ease_serde_is_snake_case() {
    let e: Ease = serde_json::from_str("\"in_out_sine\"").unwrap();
    assert_eq!(e, Ease::InOutSine);
    let e: Ease = serde_json::from_str("\"out_quad\"").unwrap();
    assert_eq!(e, Ease::OutQuad);
}
