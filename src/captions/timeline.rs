use std::path::Path;

use anyhow::Context as _;

use crate::animation::ease::Ease;
use crate::foundation::core::Rgba8;
use crate::foundation::error::{PulseError, PulseResult};

/// Card style a caption is drawn with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptionLayer {
    /// Opening hook, large and centred.
    Hook,
    /// Lyric card near the top.
    Lyric,
    /// Rotating caption card near the bottom.
    Caption,
    /// Plain popup text at `x`/`y` (bottom-centre by default).
    #[default]
    Free,
}

/// One timed caption, active on the closed interval `[start, end]`.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionEvent {
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds, `> start`.
    pub end: f64,
    /// Text to draw.
    pub text: String,
    /// Text colour.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Rgba8>,
    /// Font size in reference pixels (1080-wide canvas).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    /// Horizontal centre in reference pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    /// Vertical centre in reference pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    /// Card style.
    #[serde(default)]
    pub layer: CaptionLayer,
}

impl CaptionEvent {
    /// Free-layer caption with default styling.
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
            color: None,
            font_size: None,
            x: None,
            y: None,
            layer: CaptionLayer::Free,
        }
    }

    /// Same event on another layer.
    pub fn with_layer(mut self, layer: CaptionLayer) -> Self {
        self.layer = layer;
        self
    }

    /// Same event with an explicit colour.
    pub fn with_color(mut self, color: Rgba8) -> Self {
        self.color = Some(color);
        self
    }

    /// Whether `t` lies in `[start, end]`.
    pub fn is_active_at(&self, t: f64) -> bool {
        self.start <= t && t <= self.end
    }

    fn validate(&self, idx: usize) -> PulseResult<()> {
        if !self.start.is_finite() || !self.end.is_finite() {
            return Err(PulseError::validation(format!(
                "caption {idx}: start/end must be finite"
            )));
        }
        if self.start >= self.end {
            return Err(PulseError::validation(format!(
                "caption {idx}: start ({}) must be < end ({})",
                self.start, self.end
            )));
        }
        if self.text.trim().is_empty() {
            return Err(PulseError::validation(format!(
                "caption {idx}: text must be non-empty"
            )));
        }
        if let Some(size) = self.font_size
            && (!size.is_finite() || size <= 0.0)
        {
            return Err(PulseError::validation(format!(
                "caption {idx}: fontSize must be finite and > 0"
            )));
        }
        for (name, v) in [("x", self.x), ("y", self.y)] {
            if let Some(v) = v
                && !v.is_finite()
            {
                return Err(PulseError::validation(format!(
                    "caption {idx}: {name} must be finite"
                )));
            }
        }
        Ok(())
    }
}

/// An event active at a queried instant, with eased progress in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ActiveCaption<'a> {
    /// The event.
    pub event: &'a CaptionEvent,
    /// Eased progress through the event.
    pub progress: f64,
}

/// Ordered caption events.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CaptionTimeline {
    events: Vec<CaptionEvent>,
}

impl CaptionTimeline {
    /// Progress easing applied to every event.
    pub const EASE: Ease = Ease::InOutSine;

    /// Validate `events` and sort them by start time (stable).
    pub fn new(mut events: Vec<CaptionEvent>) -> PulseResult<Self> {
        for (i, e) in events.iter().enumerate() {
            e.validate(i)?;
        }
        events.sort_by(|a, b| a.start.total_cmp(&b.start));
        Ok(Self { events })
    }

    /// Timeline without events.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a JSON array of caption objects.
    pub fn from_json_str(s: &str) -> PulseResult<Self> {
        let events: Vec<CaptionEvent> = serde_json::from_str(s)
            .map_err(|e| PulseError::serde(format!("failed to parse captions: {e}")))?;
        Self::new(events)
    }

    /// Read and parse a caption file.
    pub fn from_path(path: &Path) -> PulseResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read captions '{}'", path.display()))?;
        Self::from_json_str(&text)
    }

    /// Events in start order.
    pub fn events(&self) -> &[CaptionEvent] {
        &self.events
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether there are no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// All events active at `t`, in start order.
    pub fn active_at(&self, t: f64) -> Vec<ActiveCaption<'_>> {
        self.events
            .iter()
            .filter(|e| e.is_active_at(t))
            .map(|event| ActiveCaption {
                event,
                progress: progress_of(event, t),
            })
            .collect()
    }

    /// Earliest-starting event active at `t`.
    pub fn first_active_at(&self, t: f64) -> Option<ActiveCaption<'_>> {
        self.events
            .iter()
            .find(|e| e.is_active_at(t))
            .map(|event| ActiveCaption {
                event,
                progress: progress_of(event, t),
            })
    }
}

fn progress_of(event: &CaptionEvent, t: f64) -> f64 {
    let span = event.end - event.start;
    let linear = ((t - event.start) / span).clamp(0.0, 1.0);
    CaptionTimeline::EASE.apply(linear)
}

#[cfg(test)]
#[path = "../../tests/unit/captions/timeline.rs"]
mod tests;
