use std::f64::consts::PI;

/// Easing functions used to map normalized progress.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ease {
    /// Quadratic ease-out. Card pop-ins use this.
    OutQuad,
    /// Sinusoidal ease-in/out, `0.5 - 0.5·cos(π·t)`. Caption progress uses this.
    #[default]
    InOutSine,
}

impl Ease {
    /// Apply this easing function to normalized progress `t` in `[0, 1]`.
    pub fn apply(self, t: f64) -> f64 {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        match self {
            Self::OutQuad => 1.0 - (1.0 - t) * (1.0 - t),
            Self::InOutSine => 0.5 - 0.5 * (PI * t).cos(),
        }
    }
}

/// Seconds a card takes to pop in.
pub const POP_IN_SECS: f64 = 0.5;

const POP_IN_SCALE: [(f64, f64); 3] = [(0.0, 0.3), (0.7, 1.12), (1.0, 1.0)];

/// Piecewise-linear interpolation through `(x, y)` stops sorted by `x`, held flat outside them.
pub fn keyframes(x: f64, stops: &[(f64, f64)]) -> f64 {
    let (Some(&(x0, y0)), Some(&(_, y_last))) = (stops.first(), stops.last()) else {
        return 0.0;
    };
    if x.is_nan() || x <= x0 {
        return y0;
    }
    for pair in stops.windows(2) {
        let ((ax, ay), (bx, by)) = (pair[0], pair[1]);
        if x <= bx {
            let span = bx - ax;
            if span <= 0.0 {
                return by;
            }
            return ay + (by - ay) * (x - ax) / span;
        }
    }
    y_last
}

/// Fade in over `fade_in`, hold at `1`, fade out over the last `fade_out` of `span` seconds.
///
/// Fades are shortened to half the span each when the span is too short for both.
pub fn hold_envelope(local_secs: f64, span: f64, fade_in: f64, fade_out: f64) -> f64 {
    if span.is_nan() || span <= 0.0 {
        return 0.0;
    }
    let fade_in = fade_in.clamp(0.0, span / 2.0);
    let fade_out = fade_out.clamp(0.0, span / 2.0);
    keyframes(
        local_secs,
        &[(0.0, 0.0), (fade_in, 1.0), (span - fade_out, 1.0), (span, 0.0)],
    )
}

/// Scale of a card `local_secs` after it appeared: grows from `0.3`, overshoots to `1.12`,
/// settles at `1`.
pub fn pop_in_scale(local_secs: f64) -> f64 {
    keyframes(Ease::OutQuad.apply(local_secs / POP_IN_SECS), &POP_IN_SCALE)
}

/// Pop-in/pop-out envelope: `0` at both ends, `1` at the midpoint.
pub fn sine_envelope(progress: f64) -> f64 {
    let p = if progress.is_nan() {
        0.0
    } else {
        progress.clamp(0.0, 1.0)
    };
    (PI * p).sin().max(0.0)
}

/// Map an oscillator value in `[-1, 1]` onto `[lo, hi]`, clamping outside input.
pub fn remap_unit_wave(wave: f64, lo: f64, hi: f64) -> f64 {
    let n = ((wave.clamp(-1.0, 1.0)) + 1.0) * 0.5;
    lo + (hi - lo) * n
}

/// `1 + amplitude·sin(2π·freq_hz·t)`.
pub fn pulse(t_secs: f64, amplitude: f64, freq_hz: f64) -> f64 {
    1.0 + amplitude * (2.0 * PI * freq_hz * t_secs).sin()
}

#[cfg(test)]
#[path = "../../tests/unit/animation/ease.rs"]
mod tests;
