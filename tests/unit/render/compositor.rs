use super::*;

use crate::captions::timeline::CaptionEvent;
use crate::config::PresetName;
use crate::encode::ffmpeg::flatten_premul_over_bg_to_opaque_rgba8;

const CANVAS: Canvas = Canvas {
    width: 108,
    height: 192,
};

fn compositor(seed: u64) -> Compositor {
    let opts = CompositorOptions {
        seed,
        ..CompositorOptions::default()
    };
    Compositor::new(CANVAS, PresetName::Neon.preset(), opts, None).unwrap()
}

fn render(c: &mut Compositor, sample: &VisualizationSample, beat: f64, t: f64) -> FrameRGBA {
    let mut frame = c.new_frame();
    c.render(
        &mut frame,
        &FrameInput {
            sample,
            beat_strength: beat,
            elapsed_secs: t,
            captions: &[],
        },
    )
    .unwrap();
    frame
}

fn px(frame: &FrameRGBA, x: u32, y: u32) -> [u8; 4] {
    let i = ((y * frame.width + x) * 4) as usize;
    [frame.data[i], frame.data[i + 1], frame.data[i + 2], frame.data[i + 3]]
}

#[test]
fn rejects_unusable_canvases() {
    let preset = PresetName::Neon.preset();
    let empty = Canvas {
        width: 0,
        height: 10,
    };
    assert!(Compositor::new(empty, preset, CompositorOptions::default(), None).is_err());
    let huge = Canvas {
        width: 70_000,
        height: 10,
    };
    assert!(Compositor::new(huge, preset, CompositorOptions::default(), None).is_err());
}

#[test]
fn identical_inputs_give_identical_frames() {
    let sample = VisualizationSample::from_values((0..64).map(|i| i as f32 / 64.0).collect());
    let beat = sample.beat_strength();

    let mut a = compositor(7);
    let mut b = compositor(7);
    let fa = render(&mut a, &sample, beat, 1.25);
    let fb = render(&mut b, &sample, beat, 1.25);
    let fa2 = render(&mut a, &sample, beat, 1.25);
    assert_eq!(fa.data, fb.data);
    assert_eq!(fa.data, fa2.data);
    assert_eq!(fa.data.len(), CANVAS.frame_len_bytes());
}

#[test]
fn starfield_depends_on_seed() {
    assert_eq!(
        seeded_stars(CANVAS, 1, 0.1),
        seeded_stars(CANVAS, 1, 0.1)
    );
    assert_ne!(
        seeded_stars(CANVAS, 1, 0.1),
        seeded_stars(CANVAS, 2, 0.1)
    );
    assert_eq!(seeded_stars(CANVAS, 1, 0.1).len(), STAR_COUNT);
}

#[test]
fn frames_flatten_to_opaque_output() {
    let mut c = compositor(0);
    let frame = render(&mut c, &VisualizationSample::zeros(32), 0.0, 0.0);
    assert!(frame.premultiplied);
    // Antialiased star edges may round a step or two below full coverage.
    assert!(frame.data.chunks_exact(4).all(|p| p[3] >= 250));

    let mut flat = vec![0u8; frame.data.len()];
    flatten_premul_over_bg_to_opaque_rgba8(&mut flat, &frame.data, [0, 0, 0, 255]).unwrap();
    assert!(flat.chunks_exact(4).all(|p| p[3] == 255));
}

#[test]
fn energy_draws_bars_above_the_centre() {
    let mut c = compositor(0);
    let quiet = render(&mut c, &VisualizationSample::zeros(256), 0.0, 0.0);
    let loud = render(&mut c, &VisualizationSample::from_values(vec![1.0; 256]), 0.0, 0.0);

    // Band 0 points straight up; r0 is 23 px on a 108 px canvas.
    let (x, y) = (54, 96 - 23 - 20);
    assert!(px(&loud, x, y)[0] > px(&quiet, x, y)[0].saturating_add(100));
}

#[test]
fn flash_ring_appears_only_above_threshold() {
    let mut c = compositor(0);
    let sample = VisualizationSample::zeros(256);
    let below = render(&mut c, &sample, FLASH_THRESHOLD - 0.01, 0.0);
    let above = render(&mut c, &sample, FLASH_THRESHOLD + 0.01, 0.0);

    // On the ring (radius ~33 px) at 45 degrees, away from the lasers.
    let (x, y) = (54 + 23, 96 + 23);
    let sum = |p: [u8; 4]| u32::from(p[0]) + u32::from(p[1]) + u32::from(p[2]);
    assert!(sum(px(&above, x, y)) > sum(px(&below, x, y)) + 60);
}

#[test]
fn text_layers_degrade_without_a_font() {
    let mut c = compositor(0);
    assert!(!c.has_text());

    let event = CaptionEvent::new(0.0, 2.0, "HOOK");
    let captions = [ActiveCaption {
        event: &event,
        progress: 0.5,
    }];
    let sample = VisualizationSample::zeros(16);
    let mut frame = c.new_frame();
    c.render(
        &mut frame,
        &FrameInput {
            sample: &sample,
            beat_strength: 0.0,
            elapsed_secs: 1.0,
            captions: &captions,
        },
    )
    .unwrap();

    assert_eq!(frame.data.len(), CANVAS.frame_len_bytes());
    assert!(c.warned.contains("logo"));
    assert!(c.warned.contains("watermark"));
    assert!(c.warned.contains("captions"));
    assert!(!c.warned.contains("bars"));
}

fn active(event: &CaptionEvent, t: f64) -> ActiveCaption<'_> {
    let progress = (t - event.start) / (event.end - event.start);
    ActiveCaption { event, progress }
}

#[test]
fn lyric_cards_hold_full_opacity_between_fades() {
    let lyric = CaptionEvent::new(4.0, 10.0, "line").with_layer(CaptionLayer::Lyric);
    let at = |t: f64| card_motion(&active(&lyric, t), t, 0.0);

    assert_eq!(at(4.0).opacity, 0.0);
    assert!((at(4.2).opacity - 0.5).abs() < 1e-9);
    for t in [4.5, 6.0, 8.0, 9.2] {
        assert!((at(t).opacity - 1.0).abs() < 1e-9, "t={t}");
    }
    assert!((at(9.6).opacity - 0.5).abs() < 1e-9);
    assert_eq!(at(9.95).opacity, 0.0);
    assert!((at(6.0).scale - 1.0).abs() < 1e-9);
}

#[test]
fn bottom_caption_stays_visible_and_wobbles_on_beats() {
    let caption =
        CaptionEvent::new(7.5, 15.0, "Tag your toxic ex").with_layer(CaptionLayer::Caption);
    let quiet = card_motion(&active(&caption, 7.5), 7.5, 0.0);
    assert_eq!(quiet.opacity, 1.0);
    assert!((quiet.scale - 0.3).abs() < 1e-9);

    let settled = card_motion(&active(&caption, 14.9), 14.9, 0.0);
    assert_eq!(settled.opacity, 1.0);
    assert!((settled.scale - 1.0).abs() < 1e-9);

    let t = 12.0;
    let loud = card_motion(&active(&caption, t), t, 0.9);
    let expected = 1.0 + (t * 18.0).sin() * 0.08;
    assert!((loud.scale - expected).abs() < 1e-9);
}

#[test]
fn hook_grows_from_small_and_free_captions_use_the_sine_envelope() {
    let hook = CaptionEvent::new(0.0, 3.3, "HOOK").with_layer(CaptionLayer::Hook);
    let first = card_motion(&active(&hook, 0.0), 0.0, 0.0);
    assert_eq!(first.opacity, 1.0);
    assert!((first.scale - 30.0 / 110.0 * 1.05).abs() < 1e-9);

    let free = CaptionEvent::new(2.0, 4.0, "hi");
    let mid = card_motion(&active(&free, 3.0), 3.0, 0.0);
    assert!((mid.opacity - 1.0).abs() < 1e-9);
    assert!((mid.scale - 1.5).abs() < 1e-9);
}

#[test]
fn hook_flash_whites_out_the_frame_in_its_bursts() {
    assert!(!hook_flash_at(0.8));
    assert!(hook_flash_at(0.9));
    assert!(!hook_flash_at(1.5));
    assert!(hook_flash_at(2.1));
    assert!(!hook_flash_at(2.2));

    let hook = CaptionEvent::new(0.0, 3.3, "HOOK").with_layer(CaptionLayer::Hook);
    let sample = VisualizationSample::zeros(16);
    let mut c = compositor(0);
    let mut frame_at = |t: f64| {
        let captions = [active(&hook, t)];
        let mut frame = c.new_frame();
        c.render(
            &mut frame,
            &FrameInput {
                sample: &sample,
                beat_strength: 0.0,
                elapsed_secs: t,
                captions: &captions,
            },
        )
        .unwrap();
        frame
    };
    let flashed = frame_at(0.9);
    let normal = frame_at(1.5);

    // Corner pixel: background only, unless the flash covers it.
    assert!(px(&flashed, 2, 2)[0] >= 220);
    assert!(px(&normal, 2, 2)[0] < 100);
}
