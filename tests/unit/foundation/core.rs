use super::*;

#[test]
fn fps_rejects_zero_parts() {
    assert!(Fps::new(30, 0).is_err());
    assert!(Fps::new(0, 1).is_err());
    assert!(Fps::new(30000, 1001).is_ok());
}

#[test]
fn fps_frames_secs_roundtrip_floor() {
    let fps = Fps::new(30000, 1001).unwrap();
    let secs = fps.frames_to_secs(123);
    assert_eq!(fps.secs_to_frames_floor(secs), 123);
}

#[test]
fn total_frames_is_never_zero() {
    let fps = Fps::whole(30).unwrap();
    assert_eq!(fps.total_frames_for(0.0), 1);
    assert_eq!(fps.total_frames_for(0.01), 1);
    assert_eq!(fps.total_frames_for(2.0), 60);
    assert_eq!(fps.total_frames_for(2.049), 61);
    assert_eq!(fps.total_frames_for(f64::NAN), 1);
    assert_eq!(fps.total_frames_for(-3.0), 1);
}

#[test]
fn frame_time_is_index_over_fps() {
    let fps = Fps::whole(30).unwrap();
    assert_eq!(fps.frame_time_secs(FrameIndex(0)), 0.0);
    assert!((fps.frame_time_secs(FrameIndex(45)) - 1.5).abs() < 1e-12);
}

#[test]
fn canvas_reference_scale_and_len() {
    let c = Canvas {
        width: 540,
        height: 960,
    };
    assert_eq!(c.reference_scale(), 0.5);
    assert_eq!(c.frame_len_bytes(), 540 * 960 * 4);
    assert_eq!(c.center(), Point::new(270.0, 480.0));
}

#[test]
fn hex_parses_both_lengths() {
    assert_eq!(Rgba8::from_hex("#00D9FF").unwrap(), Rgba8::rgb(0, 0xd9, 0xff));
    assert_eq!(
        Rgba8::from_hex("ff009980").unwrap(),
        Rgba8::rgba(0xff, 0, 0x99, 0x80)
    );
    assert!(Rgba8::from_hex("#fff").is_err());
    assert!(Rgba8::from_hex("#gg0000").is_err());
}

#[test]
fn rgba_deserializes_from_hex_or_array() {
    let c: Rgba8 = serde_json::from_str("\"#0F0019\"").unwrap();
    assert_eq!(c, Rgba8::rgb(0x0f, 0, 0x19));
    let c: Rgba8 = serde_json::from_str("[1,2,3,4]").unwrap();
    assert_eq!(c, Rgba8::rgba(1, 2, 3, 4));
    assert!(serde_json::from_str::<Rgba8>("[1,2]").is_err());
}

#[test]
fn lerp_endpoints_and_midpoint() {
    let a = Rgba8::rgb(255, 30, 255);
    let b = Rgba8::rgb(255, 150, 255);
    assert_eq!(a.lerp(b, 0.0), a);
    assert_eq!(a.lerp(b, 1.0), b);
    assert_eq!(a.lerp(b, 0.5).g, 90);
    assert_eq!(a.lerp(b, 7.0), b);
}

#[test]
fn premul_scales_channels() {
    let p = Rgba8::rgba(255, 128, 0, 128).to_premul();
    assert_eq!(p.to_array(), [128, 64, 0, 128]);
    assert_eq!(Rgba8::rgb(9, 8, 7).to_premul().to_array(), [9, 8, 7, 255]);
}

#[test]
fn hex_formatting_drops_opaque_alpha() {
    assert_eq!(Rgba8::rgb(0, 0xd9, 0xff).to_hex(), "#00D9FF");
    assert_eq!(Rgba8::rgba(1, 2, 3, 4).to_hex(), "#01020304");
    let json = serde_json::to_string(&Rgba8::rgb(0xff, 0, 0x99)).unwrap();
    assert_eq!(json, "\"#FF0099\"");
}
