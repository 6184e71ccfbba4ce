use super::*;

#[test]
fn layer_and_visualization_errors_are_recoverable() {
    assert!(!PulseError::layer("logo", "font missing").is_fatal_for_job());
    assert!(!PulseError::visualization("decoder not ready").is_fatal_for_job());
    assert!(PulseError::probe_failed("no duration").is_fatal_for_job());
    assert!(PulseError::Cancelled.is_fatal_for_job());
}

#[test]
fn exit_error_message_carries_code_and_tail() {
    let e = PulseError::EncoderExitNonZero {
        code: Some(1),
        stderr_tail: "Invalid argument".to_owned(),
    };
    let msg = e.to_string();
    assert!(msg.contains("Some(1)"));
    assert!(msg.contains("Invalid argument"));
}

#[test]
fn anyhow_errors_are_transparent() {
    let e: PulseError = anyhow::anyhow!("disk full").into();
    assert_eq!(e.to_string(), "disk full");
}
