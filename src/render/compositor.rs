use std::collections::HashSet;
use std::f64::consts::{FRAC_PI_2, TAU};

use kurbo::{Affine, Circle, Rect, RoundedRect, Vec2};

use crate::animation::ease::{
    hold_envelope, keyframes, pop_in_scale, pulse, remap_unit_wave, sine_envelope,
};
use crate::captions::timeline::{ActiveCaption, CaptionLayer};
use crate::config::Preset;
use crate::foundation::core::{Canvas, Rgba8};
use crate::foundation::error::{PulseError, PulseResult};
use crate::foundation::math::Rng64;
use crate::render::backend::FrameRGBA;
use crate::render::raster::{
    annulus, fill_shape, radial_backdrop_bytes, rgba_premul_to_image, shape_to_cpu,
};
use crate::render::text::{TextPainter, layout_size};
use crate::viz::spectrum::VisualizationSample;

/// Beat strength above which the white flash ring is drawn.
pub const FLASH_THRESHOLD: f64 = 0.68;
/// Beat strength above which lasers get the kick multiplier.
pub const KICK_THRESHOLD: f64 = 0.72;
/// Laser length/thickness multiplier on a kick.
pub const KICK_GAIN: f64 = 1.4;

const STAR_COUNT: usize = 350;
const LASER_LAYERS: usize = 6;
const CENTER_DISC: Rgba8 = Rgba8::rgba(10, 10, 40, 242);
const WATERMARK_COLOR: Rgba8 = Rgba8::rgb(0x00, 0xD9, 0xFF);
const WHITE: Rgba8 = Rgba8::rgb(255, 255, 255);

const HOOK_FONT_PX: f64 = 110.0;
/// Hook font size over its first seconds, in reference pixels.
const HOOK_SIZE_KEYS: [(f64, f64); 4] = [(0.0, 30.0), (0.7, 180.0), (1.4, 140.0), (2.6, 110.0)];
/// White-out bursts during the hook, in seconds after it starts (exclusive bounds).
const HOOK_FLASHES: [(f64, f64); 2] = [(0.8, 1.0), (2.0, 2.2)];
const HOOK_FLASH_ALPHA: f64 = 0.9;
const LYRIC_FADE_IN_SECS: f64 = 0.4;
const LYRIC_FADE_OUT_SECS: f64 = 0.8;
/// Lyric cards below this opacity are not drawn.
const LYRIC_MIN_OPACITY: f64 = 0.1;
/// Beat strength above which the bottom caption wobbles.
const CAPTION_WOBBLE_BEAT: f64 = 0.65;

/// Everything one frame depends on.
#[derive(Clone, Copy, Debug)]
pub struct FrameInput<'a> {
    /// Per-band energy.
    pub sample: &'a VisualizationSample,
    /// Mean of `sample`.
    pub beat_strength: f64,
    /// Seconds since the start of the audio.
    pub elapsed_secs: f64,
    /// Captions active at `elapsed_secs`.
    pub captions: &'a [ActiveCaption<'a>],
}

/// Static compositor settings that are not part of the preset.
#[derive(Clone, Debug, PartialEq)]
pub struct CompositorOptions {
    /// Starfield seed.
    pub seed: u64,
    /// Centre logo text.
    pub logo_text: String,
    /// Corner watermark text.
    pub watermark_text: Option<String>,
    /// Logo pulse amplitude.
    pub logo_pulse_amplitude: f64,
    /// Logo pulse frequency in Hz.
    pub logo_pulse_hz: f64,
}

impl Default for CompositorOptions {
    fn default() -> Self {
        Self {
            seed: 0,
            logo_text: "exroast.buzz".to_owned(),
            watermark_text: Some("exroast.buzz".to_owned()),
            logo_pulse_amplitude: 0.12,
            logo_pulse_hz: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Star {
    x: f64,
    y: f64,
    radius: f64,
    phase: f64,
}

fn seeded_stars(canvas: Canvas, seed: u64, scale: f64) -> Vec<Star> {
    let mut rng = Rng64::new(seed);
    (0..STAR_COUNT)
        .map(|i| Star {
            x: rng.next_f64_01() * f64::from(canvas.width),
            y: rng.next_f64_01() * f64::from(canvas.height),
            radius: rng.range_f64(0.75, 2.0) * scale,
            phase: i as f64,
        })
        .collect()
}

/// Text card appearance in reference pixels.
#[derive(Clone, Copy, Debug)]
struct CardStyle {
    font_px: f64,
    text: Rgba8,
    fill: Option<Rgba8>,
    border: Option<(Rgba8, f64)>,
    pad: Vec2,
    shadow_offset: Option<f64>,
}

/// Opacity and scale of one caption card on the current frame.
#[derive(Clone, Copy, Debug, PartialEq)]
struct CardMotion {
    opacity: f64,
    scale: f64,
}

/// Per-layer animation: the hook pumps its size and wobbles, lyrics fade in, hold and fade out
/// before the next line, the bottom caption stays up and pops in on every change, and free
/// captions follow the eased sine envelope.
fn card_motion(active: &ActiveCaption<'_>, elapsed_secs: f64, beat_strength: f64) -> CardMotion {
    let event = active.event;
    let local = (elapsed_secs - event.start).max(0.0);
    let span = event.end - event.start;
    match event.layer {
        CaptionLayer::Hook => {
            let wobble = remap_unit_wave((local * 14.0).sin(), 0.92, 1.18);
            CardMotion {
                opacity: 1.0,
                scale: keyframes(local, &HOOK_SIZE_KEYS) / HOOK_FONT_PX * wobble,
            }
        }
        CaptionLayer::Lyric => {
            let opacity = hold_envelope(local, span, LYRIC_FADE_IN_SECS, LYRIC_FADE_OUT_SECS);
            CardMotion {
                opacity: if opacity < LYRIC_MIN_OPACITY { 0.0 } else { opacity },
                scale: pop_in_scale(local),
            }
        }
        CaptionLayer::Caption => {
            let wobble = if beat_strength > CAPTION_WOBBLE_BEAT {
                1.0 + (elapsed_secs * 18.0).sin() * 0.08
            } else {
                1.0
            };
            CardMotion {
                opacity: 1.0,
                scale: pop_in_scale(local) * wobble,
            }
        }
        CaptionLayer::Free => {
            let envelope = sine_envelope(active.progress);
            CardMotion {
                opacity: envelope,
                scale: 0.5 + envelope,
            }
        }
    }
}

/// Whether the hook's white-out burst covers the frame `local_secs` into the hook.
fn hook_flash_at(local_secs: f64) -> bool {
    HOOK_FLASHES
        .iter()
        .any(|&(from, to)| local_secs > from && local_secs < to)
}

/// Rasterizes audio-reactive frames into a reusable vello_cpu context.
///
/// Layers are drawn back to front: background and starfield, radial bars, flash ring, lasers,
/// centre disc, logo and watermark, then captions. A layer that fails is skipped (with one warning
/// per layer name) and the frame is still produced.
pub struct Compositor {
    canvas: Canvas,
    preset: Preset,
    opts: CompositorOptions,
    scale: f64,
    backdrop: vello_cpu::Image,
    stars: Vec<Star>,
    text: Option<TextPainter>,
    ctx: Option<vello_cpu::RenderContext>,
    pixmap: vello_cpu::Pixmap,
    warned: HashSet<&'static str>,
}

impl std::fmt::Debug for Compositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compositor")
            .field("canvas", &self.canvas)
            .field("preset", &self.preset.name)
            .field("text", &self.text)
            .finish()
    }
}

impl Compositor {
    /// Build a compositor; the background gradient and starfield are computed here once.
    pub fn new(
        canvas: Canvas,
        preset: Preset,
        opts: CompositorOptions,
        text: Option<TextPainter>,
    ) -> PulseResult<Self> {
        let w: u16 = canvas
            .width
            .try_into()
            .map_err(|_| PulseError::validation("canvas width exceeds u16"))?;
        let h: u16 = canvas
            .height
            .try_into()
            .map_err(|_| PulseError::validation("canvas height exceeds u16"))?;
        if w == 0 || h == 0 {
            return Err(PulseError::validation("canvas must be non-empty"));
        }

        let scale = canvas.reference_scale();
        let backdrop = rgba_premul_to_image(
            &radial_backdrop_bytes(canvas, preset.background),
            canvas.width,
            canvas.height,
        )?;
        let stars = seeded_stars(canvas, opts.seed, scale);

        Ok(Self {
            canvas,
            preset,
            opts,
            scale,
            backdrop,
            stars,
            text,
            ctx: None,
            pixmap: vello_cpu::Pixmap::new(w, h),
            warned: HashSet::new(),
        })
    }

    /// Output canvas.
    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Whether a font is loaded (text layers are skipped otherwise).
    pub fn has_text(&self) -> bool {
        self.text.is_some()
    }

    /// A zeroed frame buffer sized for this compositor.
    pub fn new_frame(&self) -> FrameRGBA {
        FrameRGBA {
            width: self.canvas.width,
            height: self.canvas.height,
            data: vec![0u8; self.canvas.frame_len_bytes()],
            premultiplied: true,
        }
    }

    /// Draw one frame into `frame` (premultiplied RGBA8, resized if needed).
    pub fn render(&mut self, frame: &mut FrameRGBA, input: &FrameInput<'_>) -> PulseResult<()> {
        let mut ctx = match self.ctx.take() {
            Some(ctx) => ctx,
            None => vello_cpu::RenderContext::new(self.pixmap.width(), self.pixmap.height()),
        };
        ctx.reset();

        let layers: [(&'static str, LayerFn); 8] = [
            ("background", Self::draw_background),
            ("bars", Self::draw_bars),
            ("flash", Self::draw_flash),
            ("lasers", Self::draw_lasers),
            ("center", Self::draw_center),
            ("logo", Self::draw_logo),
            ("watermark", Self::draw_watermark),
            ("captions", Self::draw_captions),
        ];
        for (name, draw) in layers {
            if let Err(e) = draw(self, &mut ctx, input)
                && self.warned.insert(name)
            {
                tracing::warn!(layer = name, error = %e, "compositor layer skipped");
            }
        }

        ctx.flush();
        ctx.render_to_pixmap(&mut self.pixmap);
        self.ctx = Some(ctx);

        frame.width = self.canvas.width;
        frame.height = self.canvas.height;
        frame.premultiplied = true;
        let src = self.pixmap.data_as_u8_slice();
        frame.data.clear();
        frame.data.extend_from_slice(src);
        Ok(())
    }

    fn center_transform(&self) -> Affine {
        Affine::translate(self.canvas.center().to_vec2())
    }

    fn inner_radius(&self) -> f64 {
        self.preset.inner_radius * f64::from(self.canvas.width)
    }

    fn draw_background(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        input: &FrameInput<'_>,
    ) -> PulseResult<()> {
        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        ctx.set_paint(self.backdrop.clone());
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(self.canvas.width),
            f64::from(self.canvas.height),
        ));

        for star in &self.stars {
            let alpha = remap_unit_wave((input.elapsed_secs * 1.2 + star.phase).sin(), 0.2, 0.9);
            let dot = shape_to_cpu(&Circle::new((star.x, star.y), star.radius));
            fill_shape(ctx, Affine::IDENTITY, &dot, WHITE.with_alpha(alpha));
        }
        Ok(())
    }

    fn draw_bars(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        input: &FrameInput<'_>,
    ) -> PulseResult<()> {
        let values = input.sample.values();
        let n = values.len();
        if n == 0 {
            return Ok(());
        }
        let r0 = self.inner_radius();
        let max_len = self.preset.max_bar_len * f64::from(self.canvas.width);
        let center = self.center_transform();

        for (i, &v) in values.iter().enumerate() {
            let v = f64::from(v);
            let len = v * max_len;
            if len < 0.5 {
                continue;
            }
            let angle = (i as f64 / n as f64) * TAU - FRAC_PI_2;
            let f = (angle.sin() + 1.0) / 2.0;
            let color = self.preset.bar_from.lerp(self.preset.bar_to, f);
            let width = (8.0 + 40.0 * v) * self.scale;
            let tr = center * Affine::rotate(angle);

            let glow_w = width * 2.2;
            let glow = RoundedRect::new(r0, -glow_w / 2.0, r0 + len, glow_w / 2.0, glow_w / 2.0);
            fill_shape(ctx, tr, &shape_to_cpu(&glow), color.with_alpha(0.25 * v));

            let bar = RoundedRect::new(r0, -width / 2.0, r0 + len, width / 2.0, width / 2.0);
            fill_shape(ctx, tr, &shape_to_cpu(&bar), color.with_alpha(0.6 + 0.4 * v));
        }
        Ok(())
    }

    fn draw_flash(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        input: &FrameInput<'_>,
    ) -> PulseResult<()> {
        if input.beat_strength <= FLASH_THRESHOLD {
            return Ok(());
        }
        let radius = self.inner_radius() + 100.0 * self.scale;
        let half = 70.0 * self.scale;
        let ring = annulus(
            &Circle::new((0.0, 0.0), radius + half),
            &Circle::new((0.0, 0.0), (radius - half).max(0.0)),
        );
        let alpha = (input.beat_strength - 0.5).clamp(0.0, 1.0);
        fill_shape(ctx, self.center_transform(), &ring, WHITE.with_alpha(alpha));
        Ok(())
    }

    fn draw_lasers(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        input: &FrameInput<'_>,
    ) -> PulseResult<()> {
        let beat = input.beat_strength.clamp(0.0, 1.0);
        if beat <= 0.0 {
            return Ok(());
        }
        let kick = if beat > KICK_THRESHOLD { KICK_GAIN } else { 1.0 };
        let pulse = 1.0 + (input.elapsed_secs * 2.8).sin() * 0.18;
        let r0 = self.inner_radius();
        let center = self.center_transform();

        for quarter in 0..4 {
            let tr = center * Affine::rotate(f64::from(quarter) * FRAC_PI_2);
            for layer in 0..LASER_LAYERS {
                let l = layer as f64;
                let alpha = (0.9 - 0.13 * l) * beat;
                let thickness = (6.0 - l) * 10.0 * kick * self.scale;
                let length = (r0 + (600.0 * kick + 15.0 * l) * self.scale) * pulse;
                let color = if layer < 3 {
                    Rgba8::rgb(255, (layer * 70) as u8, 220)
                } else {
                    Rgba8::rgb(255, 80, 200)
                };
                let beam = Rect::new(0.0, -thickness / 2.0, length, thickness / 2.0);
                fill_shape(ctx, tr, &shape_to_cpu(&beam), color.with_alpha(alpha));
            }
        }
        Ok(())
    }

    fn draw_center(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        _input: &FrameInput<'_>,
    ) -> PulseResult<()> {
        let r0 = self.inner_radius();
        let center = self.center_transform();
        let disc = shape_to_cpu(&Circle::new((0.0, 0.0), r0));
        fill_shape(ctx, center, &disc, CENTER_DISC);

        let border = 16.0 * self.scale;
        let ring = annulus(
            &Circle::new((0.0, 0.0), r0),
            &Circle::new((0.0, 0.0), (r0 - border).max(0.0)),
        );
        fill_shape(ctx, center, &ring, self.preset.accent);
        Ok(())
    }

    fn draw_logo(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        input: &FrameInput<'_>,
    ) -> PulseResult<()> {
        if self.opts.logo_text.trim().is_empty() {
            return Ok(());
        }
        let scale = pulse(
            input.elapsed_secs,
            self.opts.logo_pulse_amplitude,
            self.opts.logo_pulse_hz,
        );
        let size = 88.0 * self.scale;
        let text = self.opts.logo_text.clone();
        let accent = self.preset.accent;
        let center = self.canvas.center().to_vec2();

        let glow = self.layout_centered(&text, size, accent.with_alpha(0.45), center, scale * 1.06)?;
        let main = self.layout_centered(&text, size, WHITE, center, scale)?;
        self.paint(ctx, &glow, 1.0);
        self.paint(ctx, &main, 1.0);
        Ok(())
    }

    fn draw_watermark(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        _input: &FrameInput<'_>,
    ) -> PulseResult<()> {
        let Some(text) = self.opts.watermark_text.clone() else {
            return Ok(());
        };
        if text.trim().is_empty() {
            return Ok(());
        }
        let font_px = (34.0 * self.scale) as f32;
        let layout = self
            .painter("watermark")?
            .layout(&text, font_px, WATERMARK_COLOR)?;
        let (w, _) = layout_size(&layout);
        let x = f64::from(self.canvas.width) - 40.0 * self.scale - w;
        let y = 70.0 * self.scale;
        let placed = PlacedText {
            layout,
            transform: Affine::translate((x, y)),
        };
        self.paint(ctx, &placed, 0.9);
        Ok(())
    }

    fn draw_captions(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        input: &FrameInput<'_>,
    ) -> PulseResult<()> {
        let mut first_err = None;
        for active in input.captions {
            if let Err(e) = self.draw_caption(ctx, active, input) {
                first_err.get_or_insert(e);
            }
        }

        let flash = input.captions.iter().any(|a| {
            a.event.layer == CaptionLayer::Hook && hook_flash_at(input.elapsed_secs - a.event.start)
        });
        if flash {
            let full = Rect::new(
                0.0,
                0.0,
                f64::from(self.canvas.width),
                f64::from(self.canvas.height),
            );
            fill_shape(
                ctx,
                Affine::IDENTITY,
                &shape_to_cpu(&full),
                WHITE.with_alpha(HOOK_FLASH_ALPHA),
            );
        }
        first_err.map_or(Ok(()), Err)
    }

    fn draw_caption(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        active: &ActiveCaption<'_>,
        input: &FrameInput<'_>,
    ) -> PulseResult<()> {
        let motion = card_motion(active, input.elapsed_secs, input.beat_strength);
        if motion.opacity <= 1e-3 {
            return Ok(());
        }
        let event = active.event;
        let style = self.card_style(event.layer);
        let s = self.scale;
        let font_px = event.font_size.unwrap_or(style.font_px) * s;
        let text_color = event.color.unwrap_or(style.text);

        let main = self
            .painter("captions")?
            .layout(&event.text, font_px as f32, text_color)?;
        let (tw, th) = layout_size(&main);
        let card_w = tw + 2.0 * style.pad.x * s;
        let card_h = th + 2.0 * style.pad.y * s;

        let w = f64::from(self.canvas.width);
        let h = f64::from(self.canvas.height);
        let default_center = match event.layer {
            CaptionLayer::Hook => Vec2::new(w / 2.0, h / 2.0),
            CaptionLayer::Lyric => Vec2::new(w / 2.0, 0.16 * h + card_h / 2.0),
            CaptionLayer::Caption => Vec2::new(w / 2.0, h - 170.0 * s - card_h / 2.0),
            CaptionLayer::Free => Vec2::new(w / 2.0, h - 80.0 * s),
        };
        let center = Vec2::new(
            event.x.map_or(default_center.x, |x| x * s),
            event.y.map_or(default_center.y, |y| y * s),
        );

        let card_tr = Affine::translate(center) * Affine::scale(motion.scale);

        let accent = self.preset.accent;
        let shadow = match style.shadow_offset {
            Some(off) => {
                let layout = self
                    .painter("captions")?
                    .layout(&event.text, font_px as f32, accent)?;
                Some(PlacedText {
                    layout,
                    transform: card_tr * Affine::translate((-tw / 2.0 + off * s, -th / 2.0 + off * s)),
                })
            }
            None => None,
        };
        let text = PlacedText {
            layout: main,
            transform: card_tr * Affine::translate((-tw / 2.0, -th / 2.0)),
        };

        ctx.push_opacity_layer(motion.opacity as f32);
        let radius = (card_h / 2.0).min(50.0 * s);
        let outer = RoundedRect::new(-card_w / 2.0, -card_h / 2.0, card_w / 2.0, card_h / 2.0, radius);
        if let Some((border_color, border_w)) = style.border {
            let bw = border_w * s;
            let inner = RoundedRect::new(
                -card_w / 2.0 + bw,
                -card_h / 2.0 + bw,
                card_w / 2.0 - bw,
                card_h / 2.0 - bw,
                (radius - bw).max(0.0),
            );
            fill_shape(ctx, card_tr, &annulus(&outer, &inner), border_color);
            if let Some(fill) = style.fill {
                fill_shape(ctx, card_tr, &shape_to_cpu(&inner), fill);
            }
        } else if let Some(fill) = style.fill {
            fill_shape(ctx, card_tr, &shape_to_cpu(&outer), fill);
        }
        if let Some(shadow) = &shadow {
            self.paint(ctx, shadow, 1.0);
        }
        self.paint(ctx, &text, 1.0);
        ctx.pop_layer();
        Ok(())
    }

    fn card_style(&self, layer: CaptionLayer) -> CardStyle {
        let accent = self.preset.accent;
        match layer {
            CaptionLayer::Hook => CardStyle {
                font_px: HOOK_FONT_PX,
                text: WHITE,
                fill: None,
                border: None,
                pad: Vec2::new(60.0, 0.0),
                shadow_offset: Some(8.0),
            },
            CaptionLayer::Lyric => CardStyle {
                font_px: 96.0,
                text: WHITE,
                fill: Some(Rgba8::rgba(20, 0, 40, 245)),
                border: Some((accent, 5.0)),
                pad: Vec2::new(60.0, 20.0),
                shadow_offset: Some(6.0),
            },
            CaptionLayer::Caption => CardStyle {
                font_px: 56.0,
                text: WHITE,
                fill: Some(accent.with_alpha(0.25)),
                border: Some((accent, 4.0)),
                pad: Vec2::new(50.0, 16.0),
                shadow_offset: Some(4.0),
            },
            CaptionLayer::Free => CardStyle {
                font_px: 48.0,
                text: WHITE,
                fill: None,
                border: None,
                pad: Vec2::ZERO,
                shadow_offset: None,
            },
        }
    }

    fn painter(&mut self, layer: &'static str) -> PulseResult<&mut TextPainter> {
        self.text
            .as_mut()
            .ok_or_else(|| PulseError::layer(layer, "font unavailable"))
    }

    fn layout_centered(
        &mut self,
        text: &str,
        size_px: f64,
        color: Rgba8,
        center: Vec2,
        scale: f64,
    ) -> PulseResult<PlacedText> {
        let layout = self.painter("logo")?.layout(text, size_px as f32, color)?;
        let (w, h) = layout_size(&layout);
        Ok(PlacedText {
            layout,
            transform: Affine::translate(center)
                * Affine::scale(scale)
                * Affine::translate((-w / 2.0, -h / 2.0)),
        })
    }

    fn paint(&self, ctx: &mut vello_cpu::RenderContext, placed: &PlacedText, opacity: f32) {
        let Some(painter) = self.text.as_ref() else {
            return;
        };
        if opacity < 1.0 {
            ctx.push_opacity_layer(opacity);
        }
        painter.draw(ctx, &placed.layout, placed.transform);
        if opacity < 1.0 {
            ctx.pop_layer();
        }
    }
}

type LayerFn =
    fn(&mut Compositor, &mut vello_cpu::RenderContext, &FrameInput<'_>) -> PulseResult<()>;

struct PlacedText {
    layout: std::sync::Arc<parley::Layout<Rgba8>>,
    transform: Affine,
}

#[cfg(test)]
#[path = "../../tests/unit/render/compositor.rs"]
mod tests;
