//! Encoding sinks.
//!
//! Sinks consume rendered frames in timeline order and are driven by the session frame loop.

/// `ffmpeg` bridge (MP4 output via an external encoder process).
pub mod ffmpeg;
/// Generic frame sink trait and built-in sinks.
pub mod sink;
