use crate::captions::timeline::{CaptionEvent, CaptionLayer, CaptionTimeline};
use crate::foundation::core::Rgba8;
use crate::foundation::error::PulseResult;

/// The hook is on screen for `[0, HOOK_END_SECS]`.
pub const HOOK_END_SECS: f64 = 3.3;
/// Lyrics and rotating captions never start before this.
pub const BODY_START_SECS: f64 = 3.4;
/// Rotating captions change on multiples of this period.
pub const ROTATION_PERIOD_SECS: f64 = 7.5;
/// How long the final lyric line stays up when the audio duration is unknown.
pub const LAST_LYRIC_HOLD_SECS: f64 = 5.0;
/// Start time given to a plain-text lyric cell.
pub const PLAIN_LYRIC_START_SECS: f64 = 4.0;

/// Bottom captions, cycled in order.
pub const ROTATING_CAPTIONS: [&str; 6] = [
    "This AI is TOO petty",
    "He's crying in the DMs",
    "Tag your toxic ex",
    "Karma used AI",
    "Ex just got cooked",
    "Therapist = cancelled",
];

/// One lyric line, shown from `start` until the next line begins.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LyricLine {
    /// Start time in seconds.
    pub start: f64,
    /// Line text.
    pub text: String,
}

/// Per-job styling resolved from batch metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct JobStyle {
    /// Opening hook text.
    pub hook_text: String,
    /// Background centre colour.
    pub bg_color: Rgba8,
    /// Timed lyric lines.
    pub lyrics: Vec<LyricLine>,
}

impl JobStyle {
    /// Defaults keyed off the input file name: `glowup*` tracks get the glow-up hook and colour.
    pub fn default_for_file(file_name: &str) -> Self {
        if file_name.to_lowercase().starts_with("glowup") {
            Self {
                hook_text: "AI GLOWED ME UP ✨".to_owned(),
                bg_color: Rgba8::rgb(0x00, 0x19, 0x28),
                lyrics: Vec::new(),
            }
        } else {
            Self {
                hook_text: "AI COOKED MY TOXIC EX 💀".to_owned(),
                bg_color: Rgba8::rgb(0x04, 0x00, 0x0A),
                lyrics: Vec::new(),
            }
        }
    }
}

/// Parse a lyrics cell: a JSON array of `{start, text}`, or plain text shown from 4 s.
pub fn parse_lyrics_cell(cell: &str) -> Vec<LyricLine> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Vec::new();
    }
    if cell.starts_with('[')
        && let Ok(lines) = serde_json::from_str::<Vec<LyricLine>>(cell)
    {
        return lines
            .into_iter()
            .filter(|l| l.start.is_finite() && !l.text.trim().is_empty())
            .collect();
    }
    vec![LyricLine {
        start: PLAIN_LYRIC_START_SECS,
        text: cell.to_owned(),
    }]
}

/// Expand a job style into the hook, lyric and rotating-caption events for audio lasting
/// `duration_secs`.
///
/// The last lyric line holds until the audio ends. A zero duration leaves lyrics uncapped and
/// produces no rotating captions.
pub fn build_caption_script(style: &JobStyle, duration_secs: f64) -> PulseResult<CaptionTimeline> {
    let duration = if duration_secs.is_finite() {
        duration_secs.max(0.0)
    } else {
        0.0
    };
    let mut events = Vec::new();

    if !style.hook_text.trim().is_empty() {
        events.push(
            CaptionEvent::new(0.0, HOOK_END_SECS, style.hook_text.clone())
                .with_layer(CaptionLayer::Hook),
        );
    }

    let mut lyrics = style.lyrics.clone();
    lyrics.sort_by(|a, b| a.start.total_cmp(&b.start));
    for (i, line) in lyrics.iter().enumerate() {
        let start = line.start.max(BODY_START_SECS);
        let end = match lyrics.get(i + 1) {
            Some(next) if duration > 0.0 => next.start.min(duration),
            Some(next) => next.start,
            None if duration > 0.0 => duration,
            None => line.start + LAST_LYRIC_HOLD_SECS,
        };
        if end > start {
            events.push(
                CaptionEvent::new(start, end, line.text.clone()).with_layer(CaptionLayer::Lyric),
            );
        }
    }

    let mut k = 0usize;
    while (k as f64) * ROTATION_PERIOD_SECS < duration {
        let start = ((k as f64) * ROTATION_PERIOD_SECS).max(BODY_START_SECS);
        let end = ((k + 1) as f64 * ROTATION_PERIOD_SECS).min(duration);
        if end > start {
            let text = ROTATING_CAPTIONS[k % ROTATING_CAPTIONS.len()];
            events.push(CaptionEvent::new(start, end, text).with_layer(CaptionLayer::Caption));
        }
        k += 1;
    }

    CaptionTimeline::new(events)
}

#[cfg(test)]
#[path = "../../tests/unit/captions/script.rs"]
mod tests;
